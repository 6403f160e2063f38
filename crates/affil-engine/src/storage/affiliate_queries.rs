//! Affiliate record queries.

use affil_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::{Affiliate, AffiliateStatus, PayoutMethod};

/// Parameters for a new affiliate application.
#[derive(Debug, Clone)]
pub struct NewAffiliate {
    pub user_id: String,
    pub organization_id: String,
    pub email: String,
    pub payout_method: PayoutMethod,
    pub payout_destination: String,
}

impl Database {
    /// Insert a new affiliate application (`pending` status, zeroed totals).
    ///
    /// Fails with a unique-constraint query error if `referral_code` is
    /// already taken; the caller retries with a fresh code.
    pub async fn insert_affiliate(
        &self,
        id: &str,
        referral_code: &str,
        new: &NewAffiliate,
    ) -> Result<Affiliate, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            r"
            INSERT INTO affiliates (id, user_id, organization_id, email, referral_code,
                                    status, payout_method, payout_destination, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(id)
        .bind(&new.user_id)
        .bind(&new.organization_id)
        .bind(&new.email)
        .bind(referral_code)
        .bind(AffiliateStatus::Pending.as_str())
        .bind(new.payout_method.as_str())
        .bind(&new.payout_destination)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_affiliate(id).await
    }

    /// Get an affiliate by ID.
    pub async fn get_affiliate(&self, id: &str) -> Result<Affiliate, DatabaseError> {
        sqlx::query_as::<_, Affiliate>("SELECT * FROM affiliates WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Affiliate {id}")))
    }

    /// Look up an affiliate by referral code. Codes are stored uppercase;
    /// the caller normalizes before lookup.
    pub async fn get_affiliate_by_code(
        &self,
        referral_code: &str,
    ) -> Result<Option<Affiliate>, DatabaseError> {
        let affiliate =
            sqlx::query_as::<_, Affiliate>("SELECT * FROM affiliates WHERE referral_code = ?")
                .bind(referral_code)
                .fetch_optional(self.pool())
                .await?;

        Ok(affiliate)
    }

    /// Update an affiliate's status. Transition legality is checked by the
    /// caller against [`AffiliateStatus::can_transition_to`].
    pub async fn update_affiliate_status(
        &self,
        id: &str,
        status: AffiliateStatus,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE affiliates SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_affiliate() -> NewAffiliate {
    NewAffiliate {
        user_id: "user-1".to_string(),
        organization_id: "org-1".to_string(),
        email: "partner@example.com".to_string(),
        payout_method: PayoutMethod::Paypal,
        payout_destination: "partner@example.com".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get_affiliate() {
        let db = Database::open_in_memory().await.unwrap();

        let a = db
            .insert_affiliate("aff-1", "ABC123", &test_affiliate())
            .await
            .unwrap();

        assert_eq!(a.id, "aff-1");
        assert_eq!(a.referral_code, "ABC123");
        assert_eq!(a.status, "pending");
        assert_eq!(a.total_clicks, 0);
        assert_eq!(a.pending_commission, 0);
    }

    #[tokio::test]
    async fn referral_code_is_unique() {
        let db = Database::open_in_memory().await.unwrap();
        db.insert_affiliate("aff-1", "ABC123", &test_affiliate())
            .await
            .unwrap();

        let dup = db.insert_affiliate("aff-2", "ABC123", &test_affiliate()).await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn lookup_by_code() {
        let db = Database::open_in_memory().await.unwrap();
        db.insert_affiliate("aff-1", "ABC123", &test_affiliate())
            .await
            .unwrap();

        let found = db.get_affiliate_by_code("ABC123").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some("aff-1".to_string()));

        let missing = db.get_affiliate_by_code("NOPE99").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn status_update() {
        let db = Database::open_in_memory().await.unwrap();
        db.insert_affiliate("aff-1", "ABC123", &test_affiliate())
            .await
            .unwrap();

        db.update_affiliate_status("aff-1", AffiliateStatus::Approved)
            .await
            .unwrap();

        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.status, "approved");
    }
}
