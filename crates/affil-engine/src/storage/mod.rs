//! `SQLite` storage for the affiliate engine.
//!
//! Provides persistence for affiliates, referrals, commissions, payouts,
//! and the program settings singleton. The transactional procedures in
//! this module (click recording, signup linking, commission accrual,
//! payout request/transition) are the only place multi-row atomic
//! updates occur.

mod affiliate_queries;
mod commission_queries;
mod db;
mod models;
mod payout_queries;
mod referral_queries;
mod settings_queries;

pub use affiliate_queries::NewAffiliate;
pub use commission_queries::{AccrualOutcome, AccrualParams};
pub use db::{Database, DatabaseError};
pub use models::*;
pub use payout_queries::{PayoutOutcome, TransitionOutcome};
pub use referral_queries::{ClickContext, LinkOutcome};
