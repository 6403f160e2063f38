//! Affil Core Library
//!
//! Shared functionality for the Rentora affiliate engine:
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers and the `define_database!` macro
//! - Money arithmetic (cents, basis points)
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod money;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use money::{commission_amount, format_usd};
