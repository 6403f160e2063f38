//! Referral (click) queries, including the two transactional procedures
//! run server-side: click recording and signup linking.

use super::db::{Database, DatabaseError};
use super::models::Referral;

/// Request context captured with a tracked click.
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub landing_page: String,
    pub referrer_url: Option<String>,
    pub user_agent: Option<String>,
    /// Not always available behind proxies; nullable by design.
    pub ip_address: Option<String>,
}

/// Outcome of the transactional signup-link procedure.
#[derive(Debug)]
pub enum LinkOutcome {
    /// Referral converted; `total_signups` incremented.
    Linked(Referral),
    /// The referral was already converted; nothing changed.
    AlreadyConverted,
    /// The signup happened after the attribution window closed.
    WindowExpired { clicked_at: i64 },
    /// No referral with that click ID exists.
    NotFound,
}

impl Database {
    /// Transactional click procedure: inserts the referral row and bumps
    /// the owning affiliate's `total_clicks` in one transaction.
    pub async fn record_click(
        &self,
        click_id: &str,
        affiliate_id: &str,
        ctx: &ClickContext,
        now: i64,
    ) -> Result<Referral, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r"
            INSERT INTO affiliate_referrals (id, affiliate_id, clicked_at, landing_page,
                                             referrer_url, user_agent, ip_address)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(click_id)
        .bind(affiliate_id)
        .bind(now)
        .bind(&ctx.landing_page)
        .bind(&ctx.referrer_url)
        .bind(&ctx.user_agent)
        .bind(&ctx.ip_address)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE affiliates SET total_clicks = total_clicks + 1 WHERE id = ?")
            .bind(affiliate_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_referral(click_id).await
    }

    /// Get a referral by click ID.
    pub async fn get_referral(&self, id: &str) -> Result<Referral, DatabaseError> {
        sqlx::query_as::<_, Referral>("SELECT * FROM affiliate_referrals WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Referral {id}")))
    }

    /// Transactional signup-link procedure.
    ///
    /// Marks the referral converted, stamps `signup_at` and the signup
    /// identity, and bumps `total_signups` -- or reports why it could not.
    /// The converted flag is the idempotency key: a second call for the
    /// same click is [`LinkOutcome::AlreadyConverted`], not an error.
    pub async fn link_signup(
        &self,
        click_id: &str,
        user_id: &str,
        organization_id: &str,
        now: i64,
        window_secs: i64,
    ) -> Result<LinkOutcome, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let referral =
            sqlx::query_as::<_, Referral>("SELECT * FROM affiliate_referrals WHERE id = ?")
                .bind(click_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(referral) = referral else {
            return Ok(LinkOutcome::NotFound);
        };
        if referral.converted != 0 {
            return Ok(LinkOutcome::AlreadyConverted);
        }
        if now > referral.clicked_at + window_secs {
            return Ok(LinkOutcome::WindowExpired {
                clicked_at: referral.clicked_at,
            });
        }

        // Guard on converted = 0 so a concurrent linker cannot double-count.
        let updated = sqlx::query(
            r"
            UPDATE affiliate_referrals
            SET converted = 1, signup_at = ?, signup_user_id = ?, signup_organization_id = ?
            WHERE id = ? AND converted = 0
            ",
        )
        .bind(now)
        .bind(user_id)
        .bind(organization_id)
        .bind(click_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(LinkOutcome::AlreadyConverted);
        }

        sqlx::query("UPDATE affiliates SET total_signups = total_signups + 1 WHERE id = ?")
            .bind(&referral.affiliate_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let linked = self.get_referral(click_id).await?;
        Ok(LinkOutcome::Linked(linked))
    }

    /// Find the converted referral that produced an organization, if any.
    /// This is the accrual engine's entry point for payment events.
    pub async fn get_converted_referral_by_organization(
        &self,
        organization_id: &str,
    ) -> Result<Option<Referral>, DatabaseError> {
        let referral = sqlx::query_as::<_, Referral>(
            "SELECT * FROM affiliate_referrals WHERE signup_organization_id = ? AND converted = 1",
        )
        .bind(organization_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(referral)
    }

    /// List an affiliate's referrals, newest click first.
    pub async fn list_referrals(
        &self,
        affiliate_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Referral>, DatabaseError> {
        let referrals = sqlx::query_as::<_, Referral>(
            "SELECT * FROM affiliate_referrals WHERE affiliate_id = ? ORDER BY clicked_at DESC LIMIT ? OFFSET ?",
        )
        .bind(affiliate_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(referrals)
    }
}

#[cfg(test)]
mod tests {
    use super::super::affiliate_queries::test_affiliate;
    use super::*;
    use affil_core::db::unix_timestamp;

    const WINDOW_30_DAYS: i64 = 30 * 86_400;

    async fn db_with_affiliate() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.insert_affiliate("aff-1", "ABC123", &test_affiliate())
            .await
            .unwrap();
        db
    }

    fn ctx() -> ClickContext {
        ClickContext {
            landing_page: "/register".to_string(),
            referrer_url: Some("https://blog.example.com".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: None,
        }
    }

    #[tokio::test]
    async fn record_click_bumps_total_clicks() {
        let db = db_with_affiliate().await;
        let now = unix_timestamp();

        let r = db.record_click("click-1", "aff-1", &ctx(), now).await.unwrap();
        assert_eq!(r.affiliate_id, "aff-1");
        assert_eq!(r.converted, 0);
        assert!(r.signup_at.is_none());

        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.total_clicks, 1);

        db.record_click("click-2", "aff-1", &ctx(), now).await.unwrap();
        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.total_clicks, 2);
    }

    #[tokio::test]
    async fn link_signup_converts_once() {
        let db = db_with_affiliate().await;
        let now = unix_timestamp();
        db.record_click("click-1", "aff-1", &ctx(), now).await.unwrap();

        let outcome = db
            .link_signup("click-1", "user-9", "org-9", now + 100, WINDOW_30_DAYS)
            .await
            .unwrap();
        let LinkOutcome::Linked(r) = outcome else {
            panic!("expected Linked");
        };
        assert_eq!(r.converted, 1);
        assert_eq!(r.signup_at, Some(now + 100));
        assert_eq!(r.signup_organization_id.as_deref(), Some("org-9"));

        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.total_signups, 1);

        // Second link attempt is a no-op
        let outcome = db
            .link_signup("click-1", "user-9", "org-9", now + 200, WINDOW_30_DAYS)
            .await
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::AlreadyConverted));

        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.total_signups, 1);
    }

    #[tokio::test]
    async fn link_signup_rejects_expired_window() {
        let db = db_with_affiliate().await;
        let clicked_at = unix_timestamp() - 31 * 86_400;
        db.record_click("click-1", "aff-1", &ctx(), clicked_at)
            .await
            .unwrap();

        let outcome = db
            .link_signup("click-1", "u", "o", unix_timestamp(), WINDOW_30_DAYS)
            .await
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::WindowExpired { .. }));

        // Neither the referral nor the counter changed
        let r = db.get_referral("click-1").await.unwrap();
        assert_eq!(r.converted, 0);
        let a = db.get_affiliate("aff-1").await.unwrap();
        assert_eq!(a.total_signups, 0);
    }

    #[tokio::test]
    async fn link_signup_unknown_click() {
        let db = db_with_affiliate().await;
        let outcome = db
            .link_signup("missing", "u", "o", unix_timestamp(), WINDOW_30_DAYS)
            .await
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::NotFound));
    }

    #[tokio::test]
    async fn converted_referral_lookup_by_organization() {
        let db = db_with_affiliate().await;
        let now = unix_timestamp();
        db.record_click("click-1", "aff-1", &ctx(), now).await.unwrap();

        assert!(db
            .get_converted_referral_by_organization("org-9")
            .await
            .unwrap()
            .is_none());

        db.link_signup("click-1", "user-9", "org-9", now, WINDOW_30_DAYS)
            .await
            .unwrap();

        let r = db
            .get_converted_referral_by_organization("org-9")
            .await
            .unwrap();
        assert_eq!(r.map(|r| r.id), Some("click-1".to_string()));
    }

    #[tokio::test]
    async fn list_referrals_newest_first() {
        let db = db_with_affiliate().await;
        let now = unix_timestamp();
        db.record_click("click-1", "aff-1", &ctx(), now - 10).await.unwrap();
        db.record_click("click-2", "aff-1", &ctx(), now).await.unwrap();

        let referrals = db.list_referrals("aff-1", 10, 0).await.unwrap();
        assert_eq!(referrals.len(), 2);
        assert_eq!(referrals[0].id, "click-2");
    }
}
