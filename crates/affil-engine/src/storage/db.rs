//! Database connection and initialization.

pub use affil_core::db::DatabaseError;

affil_core::define_database!(Database, "Affiliate database migrations complete");
