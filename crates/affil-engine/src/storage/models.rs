//! Database models for the affiliate engine.
//!
//! Rows store statuses as text; the closed enums below own the legal
//! values and every allowed transition, so nothing outside this module
//! compares status strings ad hoc.

use serde::{Deserialize, Serialize};

/// Affiliate record from the database.
///
/// Running totals are denormalized counters; they are only ever mutated
/// with relative updates inside the same transaction as the row that
/// justifies the change.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Affiliate {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub email: String,
    pub referral_code: String,
    pub status: String,
    pub payout_method: String,
    pub payout_destination: String,
    pub total_clicks: i64,
    pub total_signups: i64,
    pub total_paid_signups: i64,
    pub total_commission_earned: i64,
    pub total_commission_paid: i64,
    pub pending_commission: i64,
    pub created_at: i64,
}

/// One tracked visit attributable to an affiliate's code.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Referral {
    pub id: String,
    pub affiliate_id: String,
    pub clicked_at: i64,
    pub landing_page: String,
    pub referrer_url: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub converted: i64,
    pub signup_at: Option<i64>,
    pub signup_user_id: Option<String>,
    pub signup_organization_id: Option<String>,
    pub first_payment_at: Option<i64>,
    pub first_payment_amount: Option<i64>,
}

/// One commission accrual tied to a billing payment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Commission {
    pub id: String,
    pub affiliate_id: String,
    pub referral_id: String,
    pub payout_id: Option<String>,
    pub commission_type: String,
    pub billing_month: String,
    pub payment_amount: i64,
    pub commission_amount: i64,
    pub status: String,
    pub created_at: i64,
}

/// One payout request/execution.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payout {
    pub id: String,
    pub affiliate_id: String,
    pub amount: i64,
    pub payout_method: String,
    pub payout_destination: String,
    pub status: String,
    pub requested_at: i64,
    pub processed_at: Option<i64>,
    pub external_txn_id: Option<String>,
}

/// Program settings singleton (row id = 1).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgramSettings {
    pub id: i64,
    pub commission_rate_bps: i64,
    pub commission_type: String,
    pub recurring_months: Option<i64>,
    pub attribution_window_days: i64,
    pub minimum_payout: i64,
    pub payout_schedule: String,
    pub program_active: i64,
    pub updated_at: i64,
}

impl ProgramSettings {
    pub const fn is_active(&self) -> bool {
        self.program_active != 0
    }

    /// Attribution window in seconds.
    pub const fn attribution_window_secs(&self) -> i64 {
        self.attribution_window_days * 86_400
    }
}

/// Affiliate application status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffiliateStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl AffiliateStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }

    /// Admin transitions: applications are approved or rejected once, and
    /// approved affiliates can be suspended and reinstated.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Suspended)
                | (Self::Suspended, Self::Approved)
        )
    }
}

/// Commission program type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionType {
    OneTime,
    Recurring,
}

impl CommissionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Recurring => "recurring",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_time" => Some(Self::OneTime),
            "recurring" => Some(Self::Recurring),
            _ => None,
        }
    }
}

/// Commission ledger status; advances monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionStatus {
    Earned,
    PendingPayout,
    Paid,
}

impl CommissionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::PendingPayout => "pending_payout",
            Self::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earned" => Some(Self::Earned),
            "pending_payout" => Some(Self::PendingPayout),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Payout request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PayoutStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// The payout state machine:
    /// `pending -> approved -> processing -> completed`, with
    /// `pending|approved|processing -> failed` and `pending -> cancelled`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Failed | Self::Cancelled)
                | (Self::Approved, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Payout destination kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutMethod {
    Paypal,
    BankTransfer,
}

impl PayoutMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paypal" => Some(Self::Paypal),
            "bank_transfer" => Some(Self::BankTransfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for AffiliateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_machine_happy_path() {
        assert!(PayoutStatus::Pending.can_transition_to(PayoutStatus::Approved));
        assert!(PayoutStatus::Approved.can_transition_to(PayoutStatus::Processing));
        assert!(PayoutStatus::Processing.can_transition_to(PayoutStatus::Completed));
    }

    #[test]
    fn payout_machine_failure_paths() {
        assert!(PayoutStatus::Pending.can_transition_to(PayoutStatus::Failed));
        assert!(PayoutStatus::Approved.can_transition_to(PayoutStatus::Failed));
        assert!(PayoutStatus::Processing.can_transition_to(PayoutStatus::Failed));
        assert!(PayoutStatus::Pending.can_transition_to(PayoutStatus::Cancelled));
        assert!(!PayoutStatus::Approved.can_transition_to(PayoutStatus::Cancelled));
    }

    #[test]
    fn terminal_states_go_nowhere() {
        for terminal in [
            PayoutStatus::Completed,
            PayoutStatus::Failed,
            PayoutStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                PayoutStatus::Pending,
                PayoutStatus::Approved,
                PayoutStatus::Processing,
                PayoutStatus::Completed,
                PayoutStatus::Failed,
                PayoutStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn affiliate_machine() {
        assert!(AffiliateStatus::Pending.can_transition_to(AffiliateStatus::Approved));
        assert!(AffiliateStatus::Pending.can_transition_to(AffiliateStatus::Rejected));
        assert!(AffiliateStatus::Approved.can_transition_to(AffiliateStatus::Suspended));
        assert!(AffiliateStatus::Suspended.can_transition_to(AffiliateStatus::Approved));
        assert!(!AffiliateStatus::Rejected.can_transition_to(AffiliateStatus::Approved));
        assert!(!AffiliateStatus::Approved.can_transition_to(AffiliateStatus::Pending));
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ["pending", "approved", "rejected", "suspended"] {
            assert_eq!(AffiliateStatus::parse(s).map(AffiliateStatus::as_str), Some(s));
        }
        assert!(AffiliateStatus::parse("deleted").is_none());
        assert_eq!(CommissionType::parse("one_time"), Some(CommissionType::OneTime));
        assert_eq!(CommissionStatus::parse("pending_payout"), Some(CommissionStatus::PendingPayout));
    }
}
