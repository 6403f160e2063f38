//! Error taxonomy for the affiliate engine.
//!
//! Three families matter to callers:
//! - validation errors: bad input, surfaced directly, never retried
//! - state conflicts: expected business outcomes with actionable,
//!   human-readable messages (below-minimum payout, expired window, ...)
//! - database errors: transient; the triggering collaborator retries the
//!   whole event (click tracking alone swallows them)

use affil_core::db::DatabaseError;
use affil_core::money::format_usd;
use thiserror::Error;

/// Result type alias using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by affiliate engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payout requested below the program minimum.
    #[error("minimum payout is {}, you have {}", format_usd(*minimum), format_usd(*pending))]
    InsufficientBalance { pending: i64, minimum: i64 },

    /// Signup attempted after the attribution window closed.
    #[error("attribution window of {window_days} days expired for click at {clicked_at}")]
    OutsideAttributionWindow { clicked_at: i64, window_days: i64 },

    /// Status transition not allowed by the entity's state machine.
    #[error("{entity}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// A concurrent request consumed the balance first.
    #[error("balance changed concurrently, retry the request")]
    BalanceConflict,

    /// Entity lookup failed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying storage failure (transient).
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl EngineError {
    /// Whether this is an expected business outcome rather than a failure.
    ///
    /// Conflicts should be shown to the user as-is; they are not retried
    /// and not logged as errors.
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::OutsideAttributionWindow { .. }
                | Self::InvalidTransition { .. }
                | Self::BalanceConflict
        )
    }
}
