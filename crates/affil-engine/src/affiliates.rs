//! Affiliate program administration: applications, approval lifecycle,
//! referral-code issuance, and read access to an affiliate's records.

use rand::RngExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::storage::{
    Affiliate, AffiliateStatus, Commission, Database, DatabaseError, NewAffiliate, Referral,
};

/// Referral codes: 6 characters, A-Z and 2-9 (no 0/O/1/I ambiguity).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;
const CODE_RETRIES: usize = 5;

/// Administrative operations on program participants.
#[derive(Clone)]
pub struct ProgramAdmin {
    db: Database,
}

impl ProgramAdmin {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Submit an affiliate application. The affiliate starts `pending`
    /// with a freshly issued referral code; the code is immutable from
    /// this point on.
    pub async fn apply(&self, new: &NewAffiliate) -> Result<Affiliate> {
        if new.user_id.is_empty() || new.organization_id.is_empty() {
            return Err(EngineError::Validation(
                "user id and organization id are required".to_string(),
            ));
        }
        if !new.email.contains('@') {
            return Err(EngineError::Validation(format!(
                "malformed email: {:?}",
                new.email
            )));
        }
        if new.payout_destination.is_empty() {
            return Err(EngineError::Validation(
                "payout destination is required".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        for attempt in 0..CODE_RETRIES {
            let code = generate_code();
            match self.db.insert_affiliate(&id, &code, new).await {
                Ok(affiliate) => {
                    info!(
                        affiliate_id = %affiliate.id,
                        referral_code = %affiliate.referral_code,
                        "Affiliate application submitted"
                    );
                    return Ok(affiliate);
                }
                Err(DatabaseError::Query(msg)) if msg.contains("UNIQUE") => {
                    warn!(attempt, "Referral code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Database(DatabaseError::Query(
            "could not allocate a unique referral code".to_string(),
        )))
    }

    /// Apply an administrative status transition
    /// (`pending -> approved|rejected`, `approved <-> suspended`).
    pub async fn set_status(&self, affiliate_id: &str, next: AffiliateStatus) -> Result<Affiliate> {
        let affiliate = self.db.get_affiliate(affiliate_id).await?;
        let legal = AffiliateStatus::parse(&affiliate.status)
            .is_some_and(|from| from.can_transition_to(next));
        if !legal {
            return Err(EngineError::InvalidTransition {
                entity: "affiliate",
                from: affiliate.status,
                to: next.as_str().to_string(),
            });
        }

        self.db.update_affiliate_status(affiliate_id, next).await?;
        info!(affiliate_id = %affiliate_id, status = %next, "Affiliate status updated");
        Ok(self.db.get_affiliate(affiliate_id).await?)
    }

    /// Get an affiliate by ID.
    pub async fn get(&self, affiliate_id: &str) -> Result<Affiliate> {
        Ok(self.db.get_affiliate(affiliate_id).await?)
    }

    /// Get an affiliate by referral code (normalized to uppercase).
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Affiliate>> {
        Ok(self
            .db
            .get_affiliate_by_code(&code.trim().to_uppercase())
            .await?)
    }

    /// Paginated referral history, newest click first.
    pub async fn list_referrals(
        &self,
        affiliate_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Referral>> {
        Ok(self.db.list_referrals(affiliate_id, limit, offset).await?)
    }

    /// Paginated commission ledger, newest first.
    pub async fn list_commissions(
        &self,
        affiliate_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Commission>> {
        Ok(self.db.list_commissions(affiliate_id, limit, offset).await?)
    }
}

/// Canonical shareable link: `{origin}/register?ref={CODE}`.
pub fn referral_url(origin: &str, code: &str) -> String {
    format!("{}/register?ref={}", origin.trim_end_matches('/'), code)
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
