//! E2E purchase conversations: dealer search, non-dealer notice, refinement.

mod helpers;

use helpers::TestHarness;

use al_orchestrator::dialogue::replies;
use al_protocol::Intent;

/// A non-dealer brand gets the dealer notice once, then a plain listing.
#[tokio::test]
async fn e2e_non_dealer_notice_is_sent_once() {
    let h = TestHarness::with_sample_data();
    h.say("100", "Иван").await;

    let replies = h.say("100", "хочу купить новый Porsche").await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("Porsche"));
    assert!(replies[0].contains("Chery, Jetour и Haval"));
    assert!(replies[0].contains("1. "));
    assert_eq!(h.state("100").await, "non_dealer_choice");

    let replies = h.say("100", "а кроссовер до 3 млн?").await;
    assert!(!replies[0].contains("Porsche"));
    let (_, session) = h.session("100").await;
    assert_eq!(session["non_dealer_notice_sent"], true);
    for offer in session["last_search_results"].as_array().unwrap() {
        assert!(offer["final_price"].as_u64().unwrap() <= 3_000_000);
    }
}

/// Numbered follow-ups pick from the cached listing.
#[tokio::test]
async fn e2e_variant_detail_after_search() {
    let h = TestHarness::with_sample_data();
    h.say("101", "Иван").await;
    h.say("101", "подберите кроссовер до 2.8 млн").await;

    let replies = h.say("101", "давайте второй вариант").await;
    assert!(replies[0].starts_with("🚙 "));
    let (_, session) = h.session("101").await;
    assert_eq!(session["last_variant_idx"], 1);
    assert_eq!(session["last_price_max"], 2_800_000);
}

/// Brand, budget, body, consent, phone, confirmation: one lead to the brand channel.
#[tokio::test]
async fn e2e_dealer_purchase_creates_routed_lead() {
    let h = TestHarness::with_sample_data();
    h.say("102", "Иван").await;

    assert_eq!(h.say("102", "Хочу Chery").await, vec![replies::ASK_BUDGET]);
    assert_eq!(h.say("102", "до 3 млн").await, vec![replies::ASK_BODY]);

    let listing = h.say("102", "кроссовер").await;
    assert!(listing[0].contains("Tiggo"));
    let (_, session) = h.session("102").await;
    assert_eq!(session["slots"]["budget_max"], 3_000_000);
    assert_eq!(session["slots"]["body"], "кроссовер");

    h.say("102", "да").await;
    assert_eq!(h.state("102").await, "collect_phone");

    let summary = h.say("102", "8 916 123 45 67").await;
    assert!(summary[0].contains("+791****4567"));
    assert_eq!(h.state("102").await, "confirm_final");

    let (_, json) = h.send("102", "да").await;
    assert_eq!(json["replies"][0], replies::CONFIRMED);
    assert_eq!(json["state"], "finished");
    assert_eq!(json["leads"][0]["channel"], "sales-chery");

    let leads = h.leads();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].lead.intent, Intent::BuyNew);
    assert_eq!(leads[0].lead.brand.as_deref(), Some("Chery"));
    assert_eq!(leads[0].lead.phone, "+79161234567");
    assert!(leads[0].text.contains("🎯 Интерес: Покупка НОВОГО"));
    assert!(leads[0].text.contains("🆔 User ID: 102"));
}

/// A catalog model name answers directly and enters the refinement loop.
#[tokio::test]
async fn e2e_direct_model_question() {
    let h = TestHarness::with_sample_data();
    let replies = h.say("103", "Сколько стоит Tiggo 7 Pro?").await;
    assert!(replies[0].starts_with("Да, Chery Tiggo 7 Pro есть в наличии"));

    let (_, session) = h.session("103").await;
    assert_eq!(session["state"], "non_dealer_choice");
    assert_eq!(session["target_brand"], "Chery");
    assert_eq!(session["intent"], "buy_new");
}

/// "Doesn't matter" answers budget and body at once and lists the brand.
#[tokio::test]
async fn e2e_budget_does_not_matter() {
    let h = TestHarness::with_sample_data();
    h.say("104", "Иван").await;
    assert_eq!(h.say("104", "Хочу Haval").await.last().map(String::as_str), Some(replies::ASK_BUDGET));

    let listing = h.say("104", "неважно").await;
    assert!(listing[0].contains("Haval"));
    assert_eq!(h.state("104").await, "non_dealer_choice");

    let (_, session) = h.session("104").await;
    assert_eq!(session["slots"]["budget_max"], al_catalog::specs::UNLIMITED_BUDGET);
    assert_eq!(session["slots"]["body"], "любой");
}
