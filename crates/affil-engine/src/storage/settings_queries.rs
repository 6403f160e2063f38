//! Program settings queries.
//!
//! The settings row is a singleton (id = 1) seeded by the schema
//! migration. It is read per operation, never cached by the engine.

use affil_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::ProgramSettings;

impl Database {
    /// Get the program settings singleton.
    pub async fn get_settings(&self) -> Result<ProgramSettings, DatabaseError> {
        sqlx::query_as::<_, ProgramSettings>("SELECT * FROM affiliate_settings WHERE id = 1")
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Program settings".to_string()))
    }

    /// Replace the program settings. Administrative collaborators read,
    /// modify, and save the full row; `updated_at` is stamped here.
    pub async fn save_settings(&self, settings: &ProgramSettings) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            r"
            UPDATE affiliate_settings
            SET commission_rate_bps = ?, commission_type = ?, recurring_months = ?,
                attribution_window_days = ?, minimum_payout = ?, payout_schedule = ?,
                program_active = ?, updated_at = ?
            WHERE id = 1
            ",
        )
        .bind(settings.commission_rate_bps)
        .bind(&settings.commission_type)
        .bind(settings.recurring_months)
        .bind(settings.attribution_window_days)
        .bind(settings.minimum_payout)
        .bind(&settings.payout_schedule)
        .bind(settings.program_active)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
