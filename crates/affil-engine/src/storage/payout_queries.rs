//! Payout queries: the transactional request procedure, history reads,
//! and the externally driven status transitions.

use super::db::{Database, DatabaseError};
use super::models::{CommissionStatus, Payout, PayoutStatus};

/// Outcome of the transactional payout-request procedure.
#[derive(Debug)]
pub enum PayoutOutcome {
    /// Payout created; balance decremented and earned commissions swept.
    Created(Payout),
    /// Pending balance is below the program minimum; nothing created.
    BelowMinimum { pending: i64, minimum: i64 },
    /// A concurrent request consumed the balance between read and
    /// decrement; the compare-and-decrement matched zero rows.
    Conflict,
}

/// Outcome of applying an external payout status transition.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Payout),
    /// The transition is not legal from the payout's current status.
    Invalid { from: String },
    NotFound,
}

impl Database {
    /// Transactional payout-request procedure.
    ///
    /// Inside one transaction: reads the affiliate's pending balance,
    /// gates it against `minimum_payout`, applies a compare-and-decrement
    /// (`pending_commission >= amount` in the WHERE clause), inserts the
    /// payout with a method snapshot, and sweeps `earned` commissions into
    /// `pending_payout`. The amount is the full pending balance at request
    /// time and is never recomputed afterwards.
    pub async fn create_payout_request(
        &self,
        payout_id: &str,
        affiliate_id: &str,
        minimum_payout: i64,
        now: i64,
    ) -> Result<PayoutOutcome, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let affiliate: Option<(i64, String, String)> = sqlx::query_as(
            "SELECT pending_commission, payout_method, payout_destination FROM affiliates WHERE id = ?",
        )
        .bind(affiliate_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((pending, payout_method, payout_destination)) = affiliate else {
            return Err(DatabaseError::NotFound(format!("Affiliate {affiliate_id}")));
        };

        if pending < minimum_payout {
            return Ok(PayoutOutcome::BelowMinimum {
                pending,
                minimum: minimum_payout,
            });
        }

        let amount = pending;
        let decremented = sqlx::query(
            r"
            UPDATE affiliates
            SET pending_commission = pending_commission - ?1
            WHERE id = ?2 AND pending_commission >= ?1
            ",
        )
        .bind(amount)
        .bind(affiliate_id)
        .execute(&mut *tx)
        .await?;

        if decremented.rows_affected() == 0 {
            return Ok(PayoutOutcome::Conflict);
        }

        sqlx::query(
            r"
            INSERT INTO affiliate_payouts (id, affiliate_id, amount, payout_method,
                                           payout_destination, status, requested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(payout_id)
        .bind(affiliate_id)
        .bind(amount)
        .bind(&payout_method)
        .bind(&payout_destination)
        .bind(PayoutStatus::Pending.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE affiliate_commissions
            SET status = ?, payout_id = ?
            WHERE affiliate_id = ? AND status = ?
            ",
        )
        .bind(CommissionStatus::PendingPayout.as_str())
        .bind(payout_id)
        .bind(affiliate_id)
        .bind(CommissionStatus::Earned.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let payout = self.get_payout(payout_id).await?;
        Ok(PayoutOutcome::Created(payout))
    }

    /// Get a payout by ID.
    pub async fn get_payout(&self, id: &str) -> Result<Payout, DatabaseError> {
        sqlx::query_as::<_, Payout>("SELECT * FROM affiliate_payouts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Payout {id}")))
    }

    /// List an affiliate's payouts, most recent request first.
    pub async fn list_payouts(
        &self,
        affiliate_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Payout>, DatabaseError> {
        let payouts = sqlx::query_as::<_, Payout>(
            "SELECT * FROM affiliate_payouts WHERE affiliate_id = ? ORDER BY requested_at DESC LIMIT ? OFFSET ?",
        )
        .bind(affiliate_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(payouts)
    }

    /// Apply an external processor's status transition.
    ///
    /// Legality is re-checked inside the transaction against the current
    /// status. Completion marks the swept commissions `paid` and credits
    /// `total_commission_paid`; failure and cancellation return the amount
    /// to `pending_commission` and revert the commissions to `earned`.
    pub async fn apply_payout_transition(
        &self,
        payout_id: &str,
        next: PayoutStatus,
        external_txn_id: Option<&str>,
        now: i64,
    ) -> Result<TransitionOutcome, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let payout = sqlx::query_as::<_, Payout>("SELECT * FROM affiliate_payouts WHERE id = ?")
            .bind(payout_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(payout) = payout else {
            return Ok(TransitionOutcome::NotFound);
        };

        let legal = PayoutStatus::parse(&payout.status)
            .is_some_and(|from| from.can_transition_to(next));
        if !legal {
            return Ok(TransitionOutcome::Invalid {
                from: payout.status,
            });
        }

        let processed_at = if next.is_terminal() { Some(now) } else { None };
        sqlx::query(
            r"
            UPDATE affiliate_payouts
            SET status = ?, processed_at = COALESCE(?, processed_at),
                external_txn_id = COALESCE(?, external_txn_id)
            WHERE id = ?
            ",
        )
        .bind(next.as_str())
        .bind(processed_at)
        .bind(external_txn_id)
        .bind(payout_id)
        .execute(&mut *tx)
        .await?;

        match next {
            PayoutStatus::Completed => {
                sqlx::query("UPDATE affiliate_commissions SET status = ? WHERE payout_id = ?")
                    .bind(CommissionStatus::Paid.as_str())
                    .bind(payout_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "UPDATE affiliates SET total_commission_paid = total_commission_paid + ? WHERE id = ?",
                )
                .bind(payout.amount)
                .bind(&payout.affiliate_id)
                .execute(&mut *tx)
                .await?;
            }
            PayoutStatus::Failed | PayoutStatus::Cancelled => {
                sqlx::query(
                    "UPDATE affiliate_commissions SET status = ?, payout_id = NULL WHERE payout_id = ?",
                )
                .bind(CommissionStatus::Earned.as_str())
                .bind(payout_id)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "UPDATE affiliates SET pending_commission = pending_commission + ? WHERE id = ?",
                )
                .bind(payout.amount)
                .bind(&payout.affiliate_id)
                .execute(&mut *tx)
                .await?;
            }
            PayoutStatus::Pending | PayoutStatus::Approved | PayoutStatus::Processing => {}
        }

        tx.commit().await?;

        let payout = self.get_payout(payout_id).await?;
        Ok(TransitionOutcome::Applied(payout))
    }
}
