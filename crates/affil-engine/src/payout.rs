//! Payout orchestrator: gates payout requests against the affiliate's
//! real-time pending balance and the program minimum.
//!
//! This engine only creates `pending` payouts; everything after that is
//! driven by the external payment-processing collaborator through
//! [`PayoutOrchestrator::advance_payout`].

use affil_core::db::unix_timestamp;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::storage::{Database, Payout, PayoutOutcome, PayoutStatus, TransitionOutcome};

/// Creates and tracks payout requests.
#[derive(Clone)]
pub struct PayoutOrchestrator {
    db: Database,
}

impl PayoutOrchestrator {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Request a payout of the affiliate's full pending balance.
    ///
    /// Fails with [`EngineError::InsufficientBalance`] below the program
    /// minimum (no payout row is created), and with
    /// [`EngineError::BalanceConflict`] when a concurrent request drained
    /// the balance first. On success the amount is fixed; commissions
    /// accruing afterwards go into the next request.
    pub async fn request_payout(&self, affiliate_id: &str) -> Result<Payout> {
        let settings = self.db.get_settings().await?;
        let payout_id = Uuid::new_v4().to_string();

        let outcome = self
            .db
            .create_payout_request(&payout_id, affiliate_id, settings.minimum_payout, unix_timestamp())
            .await?;

        match outcome {
            PayoutOutcome::Created(payout) => {
                info!(
                    payout_id = %payout.id,
                    affiliate_id = %affiliate_id,
                    amount = payout.amount,
                    "Payout requested"
                );
                Ok(payout)
            }
            PayoutOutcome::BelowMinimum { pending, minimum } => {
                Err(EngineError::InsufficientBalance { pending, minimum })
            }
            PayoutOutcome::Conflict => Err(EngineError::BalanceConflict),
        }
    }

    /// Paginated payout history, most recent request first.
    pub async fn get_payouts(
        &self,
        affiliate_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Payout>> {
        Ok(self.db.list_payouts(affiliate_id, limit, offset).await?)
    }

    /// Get a single payout.
    pub async fn get_payout(&self, payout_id: &str) -> Result<Payout> {
        Ok(self.db.get_payout(payout_id).await?)
    }

    /// Apply a status transition reported by the external processor.
    ///
    /// Only moves allowed by the payout state machine are accepted;
    /// completion settles the swept commissions, failure and cancellation
    /// return the amount to the pending balance.
    pub async fn advance_payout(
        &self,
        payout_id: &str,
        next: PayoutStatus,
        external_txn_id: Option<&str>,
    ) -> Result<Payout> {
        let outcome = self
            .db
            .apply_payout_transition(payout_id, next, external_txn_id, unix_timestamp())
            .await?;

        match outcome {
            TransitionOutcome::Applied(payout) => {
                info!(
                    payout_id = %payout.id,
                    status = %payout.status,
                    "Payout status advanced"
                );
                Ok(payout)
            }
            TransitionOutcome::Invalid { from } => Err(EngineError::InvalidTransition {
                entity: "payout",
                from,
                to: next.as_str().to_string(),
            }),
            TransitionOutcome::NotFound => {
                Err(EngineError::NotFound(format!("Payout {payout_id}")))
            }
        }
    }
}
