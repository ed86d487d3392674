//! End-to-end conversation tests over the in-memory backend and gateway.

use std::sync::Arc;

use async_trait::async_trait;
use coopbot::config::BotConfig;
use coopbot::dispatch::Dispatcher;
use coopbot::error::FaqError;
use coopbot::faq::FaqAssist;
use coopbot::onboarding::OnboardingStage;
use coopbot::store::model::{Direction, MembershipTier, PaymentStatus, config_keys};
use coopbot::store::{ConfigStore, LibSqlBackend, MemberStore, MessageLog, OrderStore};
use coopbot::transport::memory::MemoryGateway;

struct Harness {
    dispatcher: Dispatcher,
    db: Arc<LibSqlBackend>,
    gateway: Arc<MemoryGateway>,
}

async fn harness(config: BotConfig, faq: Option<Arc<dyn FaqAssist>>) -> Harness {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let gateway = Arc::new(MemoryGateway::new());
    let dispatcher = Dispatcher::new(
        db.clone(),
        db.clone(),
        db.clone(),
        db.clone(),
        gateway.clone(),
        faq,
        config,
    );
    Harness {
        dispatcher,
        db,
        gateway,
    }
}

async fn send(h: &Harness, phone: &str, body: &str) {
    h.dispatcher.handle_inbound(phone, body).await.unwrap();
}

/// Drive one member through the full onboarding conversation.
async fn onboard(h: &Harness, phone: &str, name: &str, city: &str, tier: &str) {
    send(h, phone, "hi").await;
    send(h, phone, name).await;
    send(h, phone, city).await;
    send(h, phone, tier).await;
    send(h, phone, "PAY-REF-001").await;
}

struct CannedFaq(&'static str);

#[async_trait]
impl FaqAssist for CannedFaq {
    async fn answer(&self, _question: &str) -> Result<String, FaqError> {
        Ok(self.0.to_string())
    }
}

struct BrokenFaq;

#[async_trait]
impl FaqAssist for BrokenFaq {
    async fn answer(&self, _question: &str) -> Result<String, FaqError> {
        Err(FaqError::RequestFailed("connection refused".into()))
    }
}

#[tokio::test]
async fn full_member_journey() {
    let h = harness(BotConfig::default(), None).await;
    onboard(&h, "+100", "my name is ada obi", "lagos", "monthly").await;

    let member = MemberStore::get(h.db.as_ref(), "+100").await.unwrap().unwrap();
    assert_eq!(member.stage, OnboardingStage::Complete);
    assert_eq!(member.name.as_deref(), Some("Ada Obi"));
    assert_eq!(member.city.as_deref(), Some("Lagos"));
    assert_eq!(member.payment_status, PaymentStatus::Pending);
    let code = member.referral_code.clone().unwrap();

    // Steady state: place an order
    send(&h, "+100", "order 5 bags of rice").await;
    let orders = OrderStore::list_recent(h.db.as_ref(), 10).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].body, "5 bags of rice");
    assert_eq!(orders[0].member_phone, "+100");

    // Referral reply names the code
    send(&h, "+100", "referral").await;
    assert!(h.gateway.last_body().unwrap().contains(&code));

    // Every exchange is in the audit log, both directions
    let records = MessageLog::list_recent(h.db.as_ref(), 50).await.unwrap();
    let inbound = records
        .iter()
        .filter(|r| matches!(r.direction, Direction::Inbound))
        .count();
    let outbound = records
        .iter()
        .filter(|r| matches!(r.direction, Direction::Outbound))
        .count();
    assert_eq!(inbound, 7);
    assert_eq!(outbound, 7);
}

#[tokio::test]
async fn founding_override_stops_at_limit() {
    let config = BotConfig {
        founding_member_limit: 3,
        ..BotConfig::default()
    };
    let h = harness(config, None).await;

    for i in 1..=3 {
        onboard(&h, &format!("+10{i}"), "Ada", "Lagos", "monthly").await;
        let member = MemberStore::get(h.db.as_ref(), &format!("+10{i}"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            member.tier,
            Some(MembershipTier::FoundingFree),
            "member {i} should be founding"
        );
    }

    // One past the limit keeps the chosen tier
    onboard(&h, "+104", "Ada", "Lagos", "monthly").await;
    let member = MemberStore::get(h.db.as_ref(), "+104").await.unwrap().unwrap();
    assert_eq!(member.tier, Some(MembershipTier::Monthly));
}

#[tokio::test]
async fn referral_codes_are_unique_and_counted() {
    let h = harness(BotConfig::default(), None).await;
    onboard(&h, "+100", "Ada", "Lagos", "monthly").await;
    onboard(&h, "+200", "Chidi", "Abuja", "one-time").await;

    let code_a = MemberStore::get(h.db.as_ref(), "+100")
        .await
        .unwrap()
        .unwrap()
        .referral_code
        .unwrap();
    let code_b = MemberStore::get(h.db.as_ref(), "+200")
        .await
        .unwrap()
        .unwrap()
        .referral_code
        .unwrap();
    assert_ne!(code_a, code_b);

    // Two members join naming Ada's code
    for phone in ["+300", "+400"] {
        send(&h, phone, "hello").await;
        send(&h, phone, &format!("Ngozi, referred by {code_a}")).await;
    }
    assert_eq!(h.db.count_referred_by(&code_a).await.unwrap(), 2);
    assert_eq!(h.db.count_referred_by(&code_b).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_tier_choice_reprompts_in_place() {
    let h = harness(BotConfig::default(), None).await;
    send(&h, "+100", "hi").await;
    send(&h, "+100", "Ada").await;
    send(&h, "+100", "Lagos").await;
    send(&h, "+100", "platinum").await;

    let member = MemberStore::get(h.db.as_ref(), "+100").await.unwrap().unwrap();
    assert_eq!(member.stage, OnboardingStage::AwaitingMembershipChoice);
    assert!(member.tier.is_none());

    // A valid answer still works afterwards
    send(&h, "+100", "per-use").await;
    let member = MemberStore::get(h.db.as_ref(), "+100").await.unwrap().unwrap();
    assert_eq!(member.stage, OnboardingStage::AwaitingPaymentProof);
}

#[tokio::test]
async fn admin_commands_gated_and_broadcast_isolates_failures() {
    let config = BotConfig {
        admin_numbers: vec!["+999".into()],
        ..BotConfig::default()
    };
    let h = harness(config, None).await;
    onboard(&h, "+100", "Ada", "Lagos", "monthly").await;
    onboard(&h, "+200", "Chidi", "Lagos", "monthly").await;
    onboard(&h, "+999", "Admin", "Lagos", "monthly").await;

    // Slash from a non-admin is never acknowledged as a command
    send(&h, "+100", "/members").await;
    assert!(!h.gateway.last_body().unwrap().contains("Recent members"));

    // Admin price sheet update is visible to members
    send(&h, "+999", "/set_price_sheet https://coop.test/prices").await;
    send(&h, "+100", "price").await;
    assert!(h.gateway.last_body().unwrap().contains("https://coop.test/prices"));

    // Admin confirms a payment
    send(&h, "+999", "/mark_paid +100").await;
    let member = MemberStore::get(h.db.as_ref(), "+100").await.unwrap().unwrap();
    assert_eq!(member.payment_status, PaymentStatus::Paid);

    // Broadcast: one recipient broken, the rest still get the message
    h.gateway.fail_for("+200");
    send(&h, "+999", "/broadcast all Rice arrives Friday!").await;
    let summary = h.gateway.last_body().unwrap();
    assert!(summary.contains("sent 2, failed 1, total 3"), "got: {summary}");
    assert!(
        h.gateway
            .sent_to("+100")
            .contains(&"Rice arrives Friday!".to_string())
    );
}

#[tokio::test]
async fn faq_answers_and_falls_back() {
    let h = harness(
        BotConfig::default(),
        Some(Arc::new(CannedFaq("Deliveries go out every Friday."))),
    )
    .await;
    onboard(&h, "+100", "Ada", "Lagos", "monthly").await;

    send(&h, "+100", "when do deliveries happen?").await;
    assert_eq!(
        h.gateway.last_body().unwrap(),
        "Deliveries go out every Friday."
    );

    let h = harness(BotConfig::default(), Some(Arc::new(BrokenFaq))).await;
    onboard(&h, "+100", "Ada", "Lagos", "monthly").await;
    send(&h, "+100", "when do deliveries happen?").await;
    // Broken assist falls back to the static menu
    assert!(h.gateway.last_body().unwrap().contains("order <items>"));
}

#[tokio::test]
async fn price_sheet_last_write_wins() {
    let config = BotConfig {
        admin_numbers: vec!["+999".into()],
        ..BotConfig::default()
    };
    let h = harness(config, None).await;
    onboard(&h, "+999", "Admin", "Lagos", "monthly").await;

    send(&h, "+999", "/set_price_sheet https://coop.test/v1").await;
    send(&h, "+999", "/set_price_sheet https://coop.test/v2").await;
    let entry = ConfigStore::get(h.db.as_ref(), config_keys::PRICE_SHEET_URL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.value, "https://coop.test/v2");
}
