//! End-to-end flow: click -> signup link -> monthly accruals -> payout.
//!
//! Program under test: affiliate code ABC123, rate 2000 bps, recurring
//! with a 3-month cap, $50.00 minimum payout, 30-day attribution window.

use affil_core::db::unix_timestamp;
use affil_engine::attribution::SignupLinker;
use affil_engine::clicks::ClickTracker;
use affil_engine::commission::{AccrualEngine, PaymentEvent};
use affil_engine::payout::PayoutOrchestrator;
use affil_engine::storage::{AffiliateStatus, ClickContext, Database, NewAffiliate, PayoutMethod};
use affil_engine::token::{MemoryTokenStore, TokenStore};
use affil_engine::EngineError;

async fn program_db() -> Database {
    let db = Database::open_in_memory().await.unwrap();

    let mut settings = db.get_settings().await.unwrap();
    settings.commission_rate_bps = 2_000;
    settings.commission_type = "recurring".to_string();
    settings.recurring_months = Some(3);
    settings.minimum_payout = 5_000;
    settings.attribution_window_days = 30;
    db.save_settings(&settings).await.unwrap();

    db.insert_affiliate(
        "aff-1",
        "ABC123",
        &NewAffiliate {
            user_id: "user-1".to_string(),
            organization_id: "org-1".to_string(),
            email: "partner@example.com".to_string(),
            payout_method: PayoutMethod::Paypal,
            payout_destination: "partner@example.com".to_string(),
        },
    )
    .await
    .unwrap();
    db.update_affiliate_status("aff-1", AffiliateStatus::Approved)
        .await
        .unwrap();

    db
}

fn payment(month: &str) -> PaymentEvent {
    PaymentEvent {
        organization_id: "org-referred".to_string(),
        amount: 10_000, // $100.00
        billing_month: month.to_string(),
    }
}

#[tokio::test]
async fn referred_customer_earns_a_payable_balance() {
    let db = program_db().await;
    let tracker = ClickTracker::new(db.clone());
    let linker = SignupLinker::new(db.clone());
    let accrual = AccrualEngine::new(db.clone());
    let orchestrator = PayoutOrchestrator::new(db.clone());
    let store = MemoryTokenStore::new();

    // Visitor lands on /register?ref=abc123
    let click_id = tracker
        .track_click(
            &store,
            "abc123",
            &ClickContext {
                landing_page: "/register".to_string(),
                referrer_url: Some("https://partner.blog".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
                ip_address: None,
            },
        )
        .await
        .expect("click should be tracked");

    let token = store.load().expect("token persisted across navigation");
    assert_eq!(token.code, "ABC123");
    assert_eq!(token.click_id, click_id);

    // Two days later (well inside the 30-day window) the visitor signs up
    let linked = linker
        .track_signup_from_token(&store, "user-new", "org-referred")
        .await
        .unwrap();
    assert!(linked);
    assert!(store.load().is_none(), "token cleared after linking");

    // After one $100.00 payment the balance is $20.00 -- below minimum
    assert!(accrual.record_payment(&payment("2026-01")).await.unwrap().is_some());
    let err = orchestrator.request_payout("aff-1").await.unwrap_err();
    let EngineError::InsufficientBalance { pending, minimum } = err else {
        panic!("expected InsufficientBalance");
    };
    assert_eq!(pending, 2_000);
    assert_eq!(minimum, 5_000);
    assert_eq!(err_to_message(pending, minimum), "minimum payout is $50.00, you have $20.00");

    // Months two and three accrue; months four and five hit the cap
    for month in ["2026-02", "2026-03"] {
        assert!(accrual.record_payment(&payment(month)).await.unwrap().is_some());
    }
    for month in ["2026-04", "2026-05"] {
        assert!(accrual.record_payment(&payment(month)).await.unwrap().is_none());
    }

    let affiliate = db.get_affiliate("aff-1").await.unwrap();
    assert_eq!(affiliate.total_clicks, 1);
    assert_eq!(affiliate.total_signups, 1);
    assert_eq!(affiliate.total_paid_signups, 1);
    assert_eq!(affiliate.pending_commission, 6_000);
    assert_eq!(affiliate.total_commission_earned, 6_000);

    let commissions = db.list_commissions("aff-1", 10, 0).await.unwrap();
    assert_eq!(commissions.len(), 3);
    assert!(commissions.iter().all(|c| c.commission_amount == 2_000));

    // $60.00 pending clears the $50.00 minimum
    let payout = orchestrator.request_payout("aff-1").await.unwrap();
    assert_eq!(payout.amount, 6_000);
    assert_eq!(payout.status, "pending");

    let affiliate = db.get_affiliate("aff-1").await.unwrap();
    assert_eq!(affiliate.pending_commission, 0);
    for c in db.list_commissions("aff-1", 10, 0).await.unwrap() {
        assert_eq!(c.status, "pending_payout");
    }
}

fn err_to_message(pending: i64, minimum: i64) -> String {
    EngineError::InsufficientBalance { pending, minimum }.to_string()
}

#[tokio::test]
async fn late_signup_is_not_attributed() {
    let db = program_db().await;
    let linker = SignupLinker::new(db.clone());

    // Click 31 days ago, strictly past the 30-day window
    let clicked_at = unix_timestamp() - 31 * 86_400;
    db.record_click("click-old", "aff-1", &ClickContext::default(), clicked_at)
        .await
        .unwrap();

    let err = linker
        .track_signup("click-old", "user-late", "org-late")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OutsideAttributionWindow { .. }));

    // The referral never converted and payments from that org accrue nothing
    let accrual = AccrualEngine::new(db.clone());
    let c = accrual
        .record_payment(&PaymentEvent {
            organization_id: "org-late".to_string(),
            amount: 10_000,
            billing_month: "2026-01".to_string(),
        })
        .await
        .unwrap();
    assert!(c.is_none());

    let affiliate = db.get_affiliate("aff-1").await.unwrap();
    assert_eq!(affiliate.total_signups, 0);
    assert_eq!(affiliate.pending_commission, 0);
}

#[tokio::test]
async fn webhook_retry_cannot_double_count() {
    let db = program_db().await;
    let linker = SignupLinker::new(db.clone());
    let accrual = AccrualEngine::new(db.clone());

    let now = unix_timestamp();
    db.record_click("click-1", "aff-1", &ClickContext::default(), now)
        .await
        .unwrap();

    // Signup webhook delivered twice
    assert!(linker.track_signup("click-1", "u", "org-referred").await.unwrap());
    assert!(!linker.track_signup("click-1", "u", "org-referred").await.unwrap());

    // Payment webhook delivered twice for the same billing month
    assert!(accrual.record_payment(&payment("2026-01")).await.unwrap().is_some());
    assert!(accrual.record_payment(&payment("2026-01")).await.unwrap().is_none());

    let affiliate = db.get_affiliate("aff-1").await.unwrap();
    assert_eq!(affiliate.total_signups, 1);
    assert_eq!(affiliate.total_commission_earned, 2_000);
}
