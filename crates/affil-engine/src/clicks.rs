//! Click tracker: converts an inbound `?ref=CODE` visit into a durable,
//! attributable referral record.
//!
//! Click tracking must never block page rendering, so `track_click`
//! degrades to `None` on any lookup or storage failure instead of
//! propagating errors.

use affil_core::db::unix_timestamp;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{AffiliateStatus, ClickContext, Database};
use crate::token::{AttributionToken, TokenStore};

/// Result of a referral-code lookup.
#[derive(Debug, Clone)]
pub struct CodeValidation {
    pub is_valid: bool,
    pub affiliate_id: Option<String>,
}

impl CodeValidation {
    const fn invalid() -> Self {
        Self {
            is_valid: false,
            affiliate_id: None,
        }
    }
}

/// Records referred visits and issues the client-held attribution token.
#[derive(Clone)]
pub struct ClickTracker {
    db: Database,
}

impl ClickTracker {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up a referral code against approved affiliates of an active
    /// program. Unknown or inactive codes are `is_valid = false`, never an
    /// error; only storage failures propagate.
    pub async fn validate_code(&self, code: &str) -> Result<CodeValidation> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Ok(CodeValidation::invalid());
        }

        let settings = self.db.get_settings().await?;
        if !settings.is_active() {
            return Ok(CodeValidation::invalid());
        }

        let affiliate = self.db.get_affiliate_by_code(&code).await?;
        Ok(match affiliate {
            Some(a) if AffiliateStatus::parse(&a.status) == Some(AffiliateStatus::Approved) => {
                CodeValidation {
                    is_valid: true,
                    affiliate_id: Some(a.id),
                }
            }
            _ => CodeValidation::invalid(),
        })
    }

    /// Track a referred visit: validates the code, records the click
    /// transactionally (referral insert + `total_clicks` bump), and writes
    /// the attribution token into `store` so it survives navigation until
    /// signup. A later click overwrites an earlier token (last-click
    /// attribution).
    ///
    /// Returns the new click ID, or `None` for invalid codes and on any
    /// failure.
    pub async fn track_click<S: TokenStore>(
        &self,
        store: &S,
        code: &str,
        ctx: &ClickContext,
    ) -> Option<String> {
        let outcome = self.try_track(code, ctx).await;
        match outcome {
            Ok(Some(token)) => {
                if let Err(e) = store.save(&token) {
                    warn!(error = %e, "Failed to persist attribution token");
                    return None;
                }
                Some(token.click_id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Click tracking degraded, page load continues");
                None
            }
        }
    }

    async fn try_track(&self, code: &str, ctx: &ClickContext) -> Result<Option<AttributionToken>> {
        let validation = self.validate_code(code).await?;
        let Some(affiliate_id) = validation.affiliate_id else {
            debug!(code = %normalize_code(code), "Ignoring click with unknown or inactive referral code");
            return Ok(None);
        };

        let click_id = Uuid::new_v4().to_string();
        let now = unix_timestamp();
        self.db.record_click(&click_id, &affiliate_id, ctx, now).await?;

        info!(
            click_id = %click_id,
            affiliate_id = %affiliate_id,
            landing_page = %ctx.landing_page,
            "Referral click tracked"
        );

        Ok(Some(AttributionToken {
            code: normalize_code(code),
            click_id,
            clicked_at: now,
        }))
    }

    /// Read the stored attribution token; `None` when absent or partial.
    pub fn get_stored_referral<S: TokenStore>(&self, store: &S) -> Option<AttributionToken> {
        store.load()
    }

    /// Drop the stored attribution token. Safe to call repeatedly.
    pub fn clear_stored_referral<S: TokenStore>(&self, store: &S) {
        store.clear();
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewAffiliate, PayoutMethod};
    use crate::token::MemoryTokenStore;

    async fn setup() -> (ClickTracker, Database) {
        let db = Database::open_in_memory().await.unwrap();
        db.insert_affiliate(
            "aff-1",
            "ABC123",
            &NewAffiliate {
                user_id: "user-1".to_string(),
                organization_id: "org-1".to_string(),
                email: "partner@example.com".to_string(),
                payout_method: PayoutMethod::Paypal,
                payout_destination: "partner@example.com".to_string(),
            },
        )
        .await
        .unwrap();
        db.update_affiliate_status("aff-1", AffiliateStatus::Approved)
            .await
            .unwrap();
        (ClickTracker::new(db.clone()), db)
    }

    fn ctx() -> ClickContext {
        ClickContext {
            landing_page: "/register".to_string(),
            ..ClickContext::default()
        }
    }

    #[tokio::test]
    async fn unknown_code_is_invalid_not_an_error() {
        let (tracker, _db) = setup().await;
        let v = tracker.validate_code("NOPE99").await.unwrap();
        assert!(!v.is_valid);
        assert!(v.affiliate_id.is_none());
    }

    #[tokio::test]
    async fn code_lookup_is_case_insensitive() {
        let (tracker, _db) = setup().await;
        let v = tracker.validate_code("  abc123 ").await.unwrap();
        assert!(v.is_valid);
        assert_eq!(v.affiliate_id.as_deref(), Some("aff-1"));
    }

    #[tokio::test]
    async fn unapproved_affiliate_code_is_invalid() {
        let (tracker, db) = setup().await;
        db.update_affiliate_status("aff-1", AffiliateStatus::Suspended)
            .await
            .unwrap();
        let v = tracker.validate_code("ABC123").await.unwrap();
        assert!(!v.is_valid);
    }

    #[tokio::test]
    async fn inactive_program_rejects_all_codes() {
        let (tracker, db) = setup().await;
        let mut settings = db.get_settings().await.unwrap();
        settings.program_active = 0;
        db.save_settings(&settings).await.unwrap();

        let v = tracker.validate_code("ABC123").await.unwrap();
        assert!(!v.is_valid);
    }

    #[tokio::test]
    async fn track_click_persists_token_and_counts() {
        let (tracker, db) = setup().await;
        let store = MemoryTokenStore::new();

        let click_id = tracker.track_click(&store, "abc123", &ctx()).await;
        let click_id = click_id.expect("click should be tracked");

        let token = tracker.get_stored_referral(&store).expect("token stored");
        assert_eq!(token.code, "ABC123");
        assert_eq!(token.click_id, click_id);

        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.total_clicks, 1);
    }

    #[tokio::test]
    async fn invalid_code_tracks_nothing() {
        let (tracker, db) = setup().await;
        let store = MemoryTokenStore::new();

        assert!(tracker.track_click(&store, "NOPE99", &ctx()).await.is_none());
        assert!(tracker.get_stored_referral(&store).is_none());

        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.total_clicks, 0);
    }

    #[tokio::test]
    async fn newer_click_overwrites_token() {
        let (tracker, _db) = setup().await;
        let store = MemoryTokenStore::new();

        let first = tracker.track_click(&store, "ABC123", &ctx()).await.unwrap();
        let second = tracker.track_click(&store, "ABC123", &ctx()).await.unwrap();
        assert_ne!(first, second);

        let token = tracker.get_stored_referral(&store).unwrap();
        assert_eq!(token.click_id, second);
    }

    #[tokio::test]
    async fn clear_stored_referral_is_idempotent() {
        let (tracker, _db) = setup().await;
        let store = MemoryTokenStore::new();
        tracker.track_click(&store, "ABC123", &ctx()).await.unwrap();

        tracker.clear_stored_referral(&store);
        tracker.clear_stored_referral(&store);
        assert!(tracker.get_stored_referral(&store).is_none());
    }
}
