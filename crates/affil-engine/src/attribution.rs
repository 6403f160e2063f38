//! Signup linker: binds a newly created account to the click that
//! referred it, subject to the attribution window.

use affil_core::db::unix_timestamp;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::storage::{Database, LinkOutcome};
use crate::token::TokenStore;

/// Binds signups to referrals. Idempotent: linking an already-converted
/// referral is a no-op reported as `Ok(false)`.
#[derive(Clone)]
pub struct SignupLinker {
    db: Database,
}

impl SignupLinker {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Link a signup to the referral identified by `click_id`.
    ///
    /// Returns `Ok(true)` when the referral converts, `Ok(false)` when it
    /// was already converted (repeat call, nothing changed). A signup
    /// strictly after the attribution window is rejected with
    /// [`EngineError::OutsideAttributionWindow`] and the account stays
    /// unattributed.
    pub async fn track_signup(
        &self,
        click_id: &str,
        user_id: &str,
        organization_id: &str,
    ) -> Result<bool> {
        if click_id.is_empty() || user_id.is_empty() || organization_id.is_empty() {
            return Err(EngineError::Validation(
                "click id, user id, and organization id are required".to_string(),
            ));
        }

        let settings = self.db.get_settings().await?;
        let outcome = self
            .db
            .link_signup(
                click_id,
                user_id,
                organization_id,
                unix_timestamp(),
                settings.attribution_window_secs(),
            )
            .await?;

        match outcome {
            LinkOutcome::Linked(referral) => {
                info!(
                    click_id = %click_id,
                    affiliate_id = %referral.affiliate_id,
                    organization_id = %organization_id,
                    "Signup linked to referral"
                );
                Ok(true)
            }
            LinkOutcome::AlreadyConverted => {
                debug!(click_id = %click_id, "Referral already converted, signup link is a no-op");
                Ok(false)
            }
            LinkOutcome::WindowExpired { clicked_at } => {
                Err(EngineError::OutsideAttributionWindow {
                    clicked_at,
                    window_days: settings.attribution_window_days,
                })
            }
            LinkOutcome::NotFound => Err(EngineError::NotFound(format!("Referral {click_id}"))),
        }
    }

    /// Exchange a stored attribution token for a signup link, clearing the
    /// token once the link succeeds. A missing token means the signup is
    /// simply unattributed (`Ok(false)`); a token older than the
    /// attribution window is discarded the same way, without touching the
    /// referral.
    pub async fn track_signup_from_token<S: TokenStore>(
        &self,
        store: &S,
        user_id: &str,
        organization_id: &str,
    ) -> Result<bool> {
        let Some(token) = store.load() else {
            return Ok(false);
        };

        let settings = self.db.get_settings().await?;
        if token.is_expired(unix_timestamp(), settings.attribution_window_days) {
            debug!(click_id = %token.click_id, "Discarding expired attribution token");
            store.clear();
            return Ok(false);
        }

        let linked = self
            .track_signup(&token.click_id, user_id, organization_id)
            .await?;
        if linked {
            store.clear();
        }
        Ok(linked)
    }
}
