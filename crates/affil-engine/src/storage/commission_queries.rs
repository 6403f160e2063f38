//! Commission ledger queries and the transactional accrual procedure.

use super::db::{Database, DatabaseError};
use super::models::{Commission, CommissionStatus, CommissionType, Referral};

/// Parameters for the transactional accrual procedure. Amounts are
/// computed by the accrual engine; this layer only applies them.
#[derive(Debug)]
pub struct AccrualParams<'a> {
    pub commission_id: &'a str,
    pub referral: &'a Referral,
    pub commission_type: CommissionType,
    /// Recurring-month cap; `None` = unlimited. Ignored for one-time.
    pub recurring_months: Option<i64>,
    pub billing_month: &'a str,
    pub payment_amount: i64,
    pub commission_amount: i64,
    pub now: i64,
}

/// Outcome of the accrual procedure.
#[derive(Debug)]
pub enum AccrualOutcome {
    /// A commission was created; affiliate totals updated in the same tx.
    Accrued(Commission),
    /// A commission for this (referral, billing month) already exists.
    DuplicateMonth,
    /// One-time program and this referral already earned its commission.
    OneTimeAlreadyPaid,
    /// Recurring program and the month cap is exhausted.
    CapReached,
}

impl Database {
    /// Transactional accrual procedure.
    ///
    /// Inside one transaction: stamps `first_payment_*` on the referral if
    /// unset (bumping `total_paid_signups` when it is the first payment),
    /// re-checks the recurrence rules against committed state, inserts the
    /// commission, and applies the relative counter updates. The
    /// first-payment stamp is kept even when no commission accrues.
    pub async fn accrue_commission(
        &self,
        params: &AccrualParams<'_>,
    ) -> Result<AccrualOutcome, DatabaseError> {
        let referral = params.referral;
        let mut tx = self.pool().begin().await?;

        let stamped = sqlx::query(
            r"
            UPDATE affiliate_referrals
            SET first_payment_at = ?, first_payment_amount = ?
            WHERE id = ? AND first_payment_at IS NULL
            ",
        )
        .bind(params.now)
        .bind(params.payment_amount)
        .bind(&referral.id)
        .execute(&mut *tx)
        .await?;

        if stamped.rows_affected() > 0 {
            sqlx::query(
                "UPDATE affiliates SET total_paid_signups = total_paid_signups + 1 WHERE id = ?",
            )
            .bind(&referral.affiliate_id)
            .execute(&mut *tx)
            .await?;
        }

        // Recurrence checks run inside the tx so a concurrent accrual for
        // the same referral cannot slip past the cap.
        let (existing,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM affiliate_commissions WHERE referral_id = ?",
        )
        .bind(&referral.id)
        .fetch_one(&mut *tx)
        .await?;

        let (duplicate,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM affiliate_commissions WHERE referral_id = ? AND billing_month = ?",
        )
        .bind(&referral.id)
        .bind(params.billing_month)
        .fetch_one(&mut *tx)
        .await?;

        if duplicate > 0 {
            tx.commit().await?;
            return Ok(AccrualOutcome::DuplicateMonth);
        }

        match params.commission_type {
            CommissionType::OneTime if existing > 0 => {
                tx.commit().await?;
                return Ok(AccrualOutcome::OneTimeAlreadyPaid);
            }
            CommissionType::Recurring
                if params.recurring_months.is_some_and(|cap| existing >= cap) =>
            {
                tx.commit().await?;
                return Ok(AccrualOutcome::CapReached);
            }
            _ => {}
        }

        sqlx::query(
            r"
            INSERT INTO affiliate_commissions (id, affiliate_id, referral_id, commission_type,
                                               billing_month, payment_amount, commission_amount,
                                               status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(params.commission_id)
        .bind(&referral.affiliate_id)
        .bind(&referral.id)
        .bind(params.commission_type.as_str())
        .bind(params.billing_month)
        .bind(params.payment_amount)
        .bind(params.commission_amount)
        .bind(CommissionStatus::Earned.as_str())
        .bind(params.now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE affiliates
            SET pending_commission = pending_commission + ?,
                total_commission_earned = total_commission_earned + ?
            WHERE id = ?
            ",
        )
        .bind(params.commission_amount)
        .bind(params.commission_amount)
        .bind(&referral.affiliate_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let commission = self.get_commission(params.commission_id).await?;
        Ok(AccrualOutcome::Accrued(commission))
    }

    /// Get a commission by ID.
    pub async fn get_commission(&self, id: &str) -> Result<Commission, DatabaseError> {
        sqlx::query_as::<_, Commission>("SELECT * FROM affiliate_commissions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Commission {id}")))
    }

    /// List an affiliate's commissions, newest first.
    pub async fn list_commissions(
        &self,
        affiliate_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Commission>, DatabaseError> {
        let commissions = sqlx::query_as::<_, Commission>(
            "SELECT * FROM affiliate_commissions WHERE affiliate_id = ? ORDER BY created_at DESC, billing_month DESC LIMIT ? OFFSET ?",
        )
        .bind(affiliate_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(commissions)
    }
}
