//! Affiliate Attribution & Commission Engine
//!
//! The one stateful subsystem of the Rentora platform with real business
//! invariants: click attribution, signup conversion linking, commission
//! accrual, and payout request gating.
//!
//! Four cooperating components:
//! - [`clicks::ClickTracker`] -- records referred visits and issues the
//!   client-held attribution token
//! - [`attribution::SignupLinker`] -- binds new accounts to the click that
//!   referred them, within the attribution window
//! - [`commission::AccrualEngine`] -- turns qualifying payments into
//!   commission ledger entries under the program rules
//! - [`payout::PayoutOrchestrator`] -- gates payout requests against the
//!   pending balance and minimum threshold
//!
//! All multi-row effects run as single `SQLite` transactions in the
//! [`storage`] layer; counters are only ever updated relatively
//! (`SET x = x + ?`) in the same transaction as the dependent row.

pub mod affiliates;
pub mod attribution;
pub mod clicks;
pub mod commission;
pub mod error;
pub mod payout;
pub mod storage;
pub mod token;

pub use error::{EngineError, Result};
pub use storage::Database;
