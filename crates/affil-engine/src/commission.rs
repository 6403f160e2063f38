//! Commission accrual engine: transforms qualifying billing payments into
//! commission ledger entries under the program rules.
//!
//! Invoked by the billing collaborator whenever a payment posts. The
//! event shape is a hard contract: amount in integer cents, the paying
//! organization's id, and a `YYYY-MM` billing month label.

use affil_core::db::unix_timestamp;
use affil_core::money::commission_amount;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::storage::{AccrualOutcome, AccrualParams, Commission, CommissionType, Database};

/// A "payment posted" event from the billing collaborator.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub organization_id: String,
    /// Gross payment in integer cents.
    pub amount: i64,
    /// Billing period label, `YYYY-MM`.
    pub billing_month: String,
}

/// Converts qualifying payments into commission records.
#[derive(Clone)]
pub struct AccrualEngine {
    db: Database,
}

impl AccrualEngine {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a payment event.
    ///
    /// Returns `Ok(Some(commission))` when a commission accrues, and
    /// `Ok(None)` when the payment is qualifying-but-non-accruing: the
    /// organization was not referred, the program is inactive, the
    /// one-time commission was already earned, the recurring cap is
    /// exhausted, or this (referral, billing month) pair was already
    /// processed (safe retry). The commission amount snapshots the
    /// program rate at accrual time and is never recomputed.
    pub async fn record_payment(&self, event: &PaymentEvent) -> Result<Option<Commission>> {
        if event.amount <= 0 {
            return Err(EngineError::Validation(
                "payment amount must be positive cents".to_string(),
            ));
        }
        if event.organization_id.is_empty() {
            return Err(EngineError::Validation("organization id is required".to_string()));
        }
        validate_billing_month(&event.billing_month)?;

        let settings = self.db.get_settings().await?;
        if !settings.is_active() {
            info!(
                organization_id = %event.organization_id,
                "Program inactive, payment does not accrue commission"
            );
            return Ok(None);
        }

        let referral = self
            .db
            .get_converted_referral_by_organization(&event.organization_id)
            .await?;
        let Some(referral) = referral else {
            debug!(organization_id = %event.organization_id, "Payment from unreferred organization");
            return Ok(None);
        };

        let commission_type = CommissionType::parse(&settings.commission_type).ok_or_else(|| {
            EngineError::Validation(format!(
                "unknown commission type in program settings: {}",
                settings.commission_type
            ))
        })?;

        let commission_id = Uuid::new_v4().to_string();
        let amount = commission_amount(event.amount, settings.commission_rate_bps);
        let outcome = self
            .db
            .accrue_commission(&AccrualParams {
                commission_id: &commission_id,
                referral: &referral,
                commission_type,
                recurring_months: settings.recurring_months,
                billing_month: &event.billing_month,
                payment_amount: event.amount,
                commission_amount: amount,
                now: unix_timestamp(),
            })
            .await?;

        match outcome {
            AccrualOutcome::Accrued(commission) => {
                info!(
                    commission_id = %commission.id,
                    affiliate_id = %commission.affiliate_id,
                    billing_month = %commission.billing_month,
                    amount = commission.commission_amount,
                    "Commission accrued"
                );
                Ok(Some(commission))
            }
            AccrualOutcome::DuplicateMonth => {
                debug!(
                    referral_id = %referral.id,
                    billing_month = %event.billing_month,
                    "Commission already accrued for billing month, no-op"
                );
                Ok(None)
            }
            AccrualOutcome::OneTimeAlreadyPaid => {
                debug!(referral_id = %referral.id, "One-time commission already earned");
                Ok(None)
            }
            AccrualOutcome::CapReached => {
                debug!(referral_id = %referral.id, "Recurring commission cap reached");
                Ok(None)
            }
        }
    }
}

fn validate_billing_month(label: &str) -> Result<()> {
    let bytes = label.as_bytes();
    let shape_ok = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes.iter().enumerate().all(|(i, b)| i == 4 || b.is_ascii_digit());
    let month_ok =
        shape_ok && label[5..7].parse::<u8>().is_ok_and(|m| (1..=12).contains(&m));
    if month_ok {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "billing month must be YYYY-MM, got {label:?}"
        )))
    }
}
