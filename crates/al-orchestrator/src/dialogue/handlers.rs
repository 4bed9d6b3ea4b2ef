//! Greeting, intent routing and the slot-collection states.

use al_catalog::specs::{UNLIMITED_BUDGET, is_search_query};
use al_catalog::text::{has_any_word, has_cyrillic, has_digit, matches_any, normalize, words};
use al_catalog::phone::digit_count;
use al_catalog::{normalize_phone, parse_budget, parse_specs};
use al_protocol::{CarOffer, Intent, RepairType};

use super::replies;
use super::session::{DialogueState, PendingAction, Session};
use super::{Dialogue, Flow, TurnOutcome};
use crate::intent::signals::{
    has_bare_purchase_word, has_maintenance_word, has_purchase_phrase, has_repair_vocabulary,
    has_service_signal, is_accounting, is_spares_request, mentions_ownership,
};
use crate::intent::{Classification, Resolution};

const NAME_SEPARATORS: &[char] = &['.', '!', '?', '\n', ',', ';', ':'];
const NAME_PREFIXES: &[&str] = &["меня зовут ", "зовут ", "это ", "я "];
const SALUTATIONS: &[&str] = &[
    "привет", "здравствуйте", "здравствуй", "добрый", "доброе", "день", "вечер", "утро",
    "приветствую", "hello", "hi",
];

const USED_WORDS: &[&str] = &["б/у", "с пробегом", "подержан", "пробег"];

pub(crate) const YES_WORDS: &[&str] = &["да", "ага", "верно", "правильно", "конечно", "yes", "угу", "ок", "ok", "точно"];
const NO_WORDS: &[&str] = &["нет", "неверно", "неправильно", "no", "не"];

/// A question in the specs step means the user wants something else.
const SPEC_QUESTION_WORDS: &[&str] = &[
    "какие", "какой", "какая", "есть", "наличи", "посоветуй", "подбери", "покажи", "что есть",
];
const BODY_SKIP: &[&str] = &["любой", "любая", "любое", "неважно", "не важно", "все равно", "без разницы"];

const REPAIR_ESCAPE: &[&str] = &["куп", "прода", "цен", "стоит", "налич", "авто", "машин", "кредит"];
const WORKSHOP_ANSWERS: &[&str] = &[
    "слесар", "двигател", "подвеск", "техобслуж", "механ", "масл", "фильтр", "диагност",
];
const BODYWORK_ANSWERS: &[&str] = &["кузов", "покрас", "вмятин", "дтп", "царапин", "бампер"];

const GAVE_PHONE_ACTIONS: &[&str] = &["уже", "писал", "давал", "дал ", "оставлял", "указывал"];
const GAVE_PHONE_OBJECTS: &[&str] = &["номер", "телефон", "контакт"];
const PHONE_ESCAPE: &[&str] = &["кредит", "куп", "цен", "стоит", "ремонт", "запчаст", "машин", "авто"];
const PHONE_WORDS: &[&str] = &["номер", "телефон"];

pub(crate) fn is_yes(lower: &str) -> bool {
    has_any_word(lower, YES_WORDS)
}

pub(crate) fn wants_used(lower: &str) -> bool {
    matches_any(lower, USED_WORDS) || has_any_word(lower, &["бу"])
}

/// "I already gave you my number".
pub(crate) fn says_phone_given(lower: &str) -> bool {
    matches_any(lower, GAVE_PHONE_ACTIONS)
        && (matches_any(lower, GAVE_PHONE_OBJECTS) || words(lower).len() <= 4)
}

fn is_salutation(lower: &str) -> bool {
    let tokens = words(lower);
    !tokens.is_empty() && tokens.iter().all(|t| SALUTATIONS.contains(t))
}

fn clean_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = normalize(trimmed);
    for prefix in NAME_PREFIXES {
        if lower.starts_with(prefix) {
            // prefixes are pure Cyrillic, so char counts line up
            let skip = prefix.chars().count();
            return trimmed.chars().skip(skip).collect::<String>().trim().to_string();
        }
    }
    trimmed.to_string()
}

impl Dialogue {
    /// Anything that reads as a request rather than a name.
    fn looks_like_query(&self, text: &str) -> bool {
        let lower = normalize(text);
        has_digit(text)
            || self.brands.find_brand(text).is_some()
            || has_service_signal(&lower)
            || has_purchase_phrase(&lower)
            || has_bare_purchase_word(&lower)
            || has_repair_vocabulary(&lower)
            || is_spares_request(&lower)
            || is_accounting(&lower)
            || mentions_ownership(&lower)
            || is_search_query(text)
            || !self
                .search
                .catalog()
                .find_models(text, &self.brands.dealer_brands())
                .is_empty()
    }

    /// Split the first message into a name and a request to forward.
    fn split_greeting(&self, text: &str) -> (Option<String>, Option<String>) {
        if let Some(pos) = text.find(NAME_SEPARATORS) {
            let head = text[..pos].trim();
            let tail = text[pos + 1..].trim();
            if head.is_empty() || self.looks_like_query(head) {
                return (None, Some(text.to_string()));
            }
            let forward = (!tail.is_empty() && self.looks_like_query(tail)).then(|| tail.to_string());
            return (Some(clean_name(head)), forward);
        }

        if let Some((first, rest)) = text.split_once(char::is_whitespace) {
            let rest = rest.trim();
            if !self.looks_like_query(first) && self.looks_like_query(rest) {
                return (Some(first.to_string()), Some(rest.to_string()));
            }
        }
        if self.looks_like_query(text) {
            return (None, Some(text.to_string()));
        }
        (Some(clean_name(text)), None)
    }

    pub(crate) fn on_greeting(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) -> Flow {
        let lower = normalize(text);
        if text.is_empty() {
            out.say(replies::ASK_NAME);
            return Flow::Done;
        }
        if is_salutation(&lower) {
            out.say(replies::GREETING);
            return Flow::Done;
        }

        s.state = DialogueState::DetectIntent;
        match self.split_greeting(text) {
            (Some(name), None) if !name.is_empty() => {
                out.say(replies::greet_named(&name));
                s.name = Some(name);
                Flow::Done
            }
            (Some(name), Some(request)) if !name.is_empty() => {
                out.say(format!("Приятно познакомиться, {name}!"));
                s.name = Some(name);
                Flow::Detect(request)
            }
            (_, Some(request)) => Flow::Detect(request),
            _ => {
                s.state = DialogueState::Greeting;
                out.say(replies::ASK_NAME);
                Flow::Done
            }
        }
    }

    /// Route a message by intent. Runs at most once per turn.
    pub(crate) async fn detect(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) {
        s.pending = None;
        let lower = normalize(text);
        match self.pipeline.resolve(text, s.user_car_brand.as_deref()).await {
            Resolution::ModelMatch { offers } => {
                s.fallback_retry = 0;
                self.reply_models(s, &offers, out);
            }
            Resolution::DealerSearch { brand } => {
                s.fallback_retry = 0;
                s.intent = Intent::BuyNew;
                s.target_brand = Some(brand);
                s.non_dealer_brand = None;
                self.search_text(s, text, out).await;
            }
            Resolution::Purchase { brand, dealer } => {
                s.fallback_retry = 0;
                s.intent = if wants_used(&lower) { Intent::BuyUsed } else { Intent::BuyNew };
                s.target_brand = Some(brand.clone());
                if s.intent == Intent::BuyUsed {
                    let prompt = replies::ask_phone_named(self.name(s));
                    self.phone_or_confirm(s, prompt, out);
                } else if dealer {
                    s.non_dealer_brand = None;
                    self.next_spec_step(s, out).await;
                } else {
                    self.start_non_dealer_search(s, brand, text, out).await;
                }
            }
            Resolution::SpecSearch { brand } => {
                s.fallback_retry = 0;
                s.intent = Intent::BuyNew;
                match brand {
                    Some(b) if !self.brands.is_dealer(&b) => {
                        if s.non_dealer_brand.as_deref() != Some(b.as_str()) {
                            s.non_dealer_notice_sent = false;
                        }
                        s.target_brand = Some(b.clone());
                        s.non_dealer_brand = Some(b);
                    }
                    Some(b) => {
                        s.target_brand = Some(b);
                        s.non_dealer_brand = None;
                    }
                    None => s.non_dealer_brand = None,
                }
                self.search_text(s, text, out).await;
            }
            Resolution::Classified(c) => self.on_classified(s, c, text, out).await,
        }
    }

    /// Direct answer for named catalog models.
    pub(crate) fn reply_models(&self, s: &mut Session, offers: &[CarOffer], out: &mut TurnOutcome) {
        let policy = self.search.policy();
        out.say(replies::model_response(offers, policy.default_delivery_days));
        if let Some(first) = offers.first() {
            s.intent = Intent::BuyNew;
            s.target_brand = Some(first.brand.clone());
            s.slots.model = Some(first.model.clone());
        }
        s.non_dealer_brand = None;
        s.cache_results(offers, policy.max_cached);
        s.state = DialogueState::NonDealerChoice;
    }

    async fn start_non_dealer_search(&self, s: &mut Session, brand: String, text: &str, out: &mut TurnOutcome) {
        s.intent = Intent::BuyNew;
        s.target_brand = Some(brand.clone());
        s.non_dealer_brand = Some(brand);
        s.non_dealer_notice_sent = false;
        self.search_text(s, text, out).await;
    }

    /// Ask for the first missing purchase slot, or search once both are known.
    async fn next_spec_step(&self, s: &mut Session, out: &mut TurnOutcome) {
        s.state = DialogueState::CollectSpecs;
        if s.slots.budget_max.is_none() {
            out.say(replies::ASK_BUDGET);
        } else if s.slots.body.is_none() {
            out.say(replies::ASK_BODY);
        } else {
            self.search_slots(s, out).await;
        }
    }

    async fn on_classified(&self, s: &mut Session, c: Classification, text: &str, out: &mut TurnOutcome) {
        let lower = normalize(text);
        let result = c.result;
        tracing::info!(
            user_id = %s.user_id,
            intent = %result.intent,
            confidence = ?result.confidence,
            rule = c.rule.unwrap_or("-"),
            "intent detected"
        );
        s.apply_intent(&result);

        match result.intent {
            Intent::Other | Intent::FallbackOther => {
                let owned = result.user_car_brand.clone().or(c.text_brand.clone());
                if mentions_ownership(&lower)
                    && let Some(brand) = owned
                {
                    s.fallback_retry = 0;
                    out.say(replies::ownership_follow_up(&brand));
                    s.user_car_brand = Some(brand);
                    s.state = DialogueState::DetectIntent;
                } else if let Some(brand) = c.text_brand {
                    s.fallback_retry = 0;
                    out.say(replies::ask_buy_or_service(&brand));
                    s.user_car_brand = Some(brand);
                    s.state = DialogueState::DetectIntent;
                } else {
                    self.fallback(s, &lower, out);
                }
            }
            Intent::BuyNew | Intent::BuyUsed => {
                s.fallback_retry = 0;
                self.route_purchase(s, result.target_brand, text, out).await;
            }
            Intent::Repair | Intent::Spares | Intent::Sell => {
                s.fallback_retry = 0;
                self.route_owned_car(s, c.rule, out);
            }
            Intent::Accounting => {
                s.fallback_retry = 0;
                self.phone_or_confirm(s, replies::ASK_PHONE_PLAIN.to_string(), out);
            }
        }
    }

    async fn route_purchase(&self, s: &mut Session, brand: Option<String>, text: &str, out: &mut TurnOutcome) {
        match brand {
            Some(b) if s.intent == Intent::BuyNew && !self.brands.is_dealer(&b) => {
                self.start_non_dealer_search(s, b, text, out).await;
            }
            Some(_) if s.intent == Intent::BuyNew => {
                s.non_dealer_brand = None;
                self.next_spec_step(s, out).await;
            }
            Some(_) => {
                let prompt = replies::ask_phone_named(self.name(s));
                self.phone_or_confirm(s, prompt, out);
            }
            None => {
                if let Some(owned) = s.user_car_brand.clone() {
                    out.say(replies::ask_same_brand(&owned));
                    s.pending = Some(PendingAction::ConfirmTargetBrand { brand: owned });
                    s.state = DialogueState::CollectBrand;
                } else if is_search_query(text) {
                    s.non_dealer_brand = None;
                    self.search_text(s, text, out).await;
                } else {
                    s.pending = Some(PendingAction::ChooseNewOrUsed);
                    s.state = DialogueState::CollectBrand;
                    out.say(replies::ASK_PURCHASE_DETAILS);
                }
            }
        }
    }

    fn route_owned_car(&self, s: &mut Session, rule: Option<&'static str>, out: &mut TurnOutcome) {
        if s.intent == Intent::Repair
            && rule == Some("oil_change")
            && let Some(details) = s.slots.repair_details.clone()
        {
            out.say(replies::confirm_repair_car(&details, s.user_car_brand.as_deref()));
            s.pending = Some(PendingAction::ConfirmCarBrand);
            s.state = DialogueState::CollectRepairType;
            return;
        }
        if s.user_car_brand.is_none() {
            s.state = DialogueState::CollectBrand;
            out.say(replies::ASK_OWNED_CAR);
            return;
        }
        let prompt = replies::ask_phone_for_service(self.name(s));
        self.phone_or_confirm(s, prompt, out);
    }

    /// Unrecognized message: clarify, then escalate to a specialist.
    fn fallback(&self, s: &mut Session, lower: &str, out: &mut TurnOutcome) {
        if s.fallback_retry >= self.settings.fallback_threshold {
            s.intent = Intent::FallbackOther;
            match self.build_lead(s, Intent::FallbackOther) {
                Some(lead) => {
                    tracing::info!(user_id = %s.user_id, lead_id = %lead.id, "fallback lead created");
                    out.leads.push(lead);
                    out.say(replies::FALLBACK_WITH_PHONE);
                    s.state = DialogueState::Finished;
                }
                None => {
                    out.say(replies::ask_phone_after_fallback(self.name(s)));
                    s.state = DialogueState::CollectPhone;
                }
            }
            return;
        }

        s.fallback_retry += 1;
        if mentions_ownership(lower) {
            s.state = DialogueState::CollectBrand;
            out.say(replies::ASK_OWNED_BRAND);
        } else {
            s.state = DialogueState::DetectIntent;
            out.say(replies::CLARIFY);
        }
    }

    pub(crate) fn on_collect_brand(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) -> Flow {
        let lower = normalize(text);
        let escape = if s.intent.is_purchase() {
            has_service_signal(&lower)
        } else if s.intent.is_owned_car() {
            has_purchase_phrase(&lower) || is_search_query(text)
        } else {
            false
        };
        if escape {
            s.pending = None;
            return Flow::Detect(text.to_string());
        }

        let found = self.brands.find_brand(text).map(String::from);
        match s.pending.take() {
            Some(PendingAction::ConfirmTargetBrand { brand }) => {
                if wants_used(&lower) {
                    s.intent = Intent::BuyUsed;
                }
                let chosen = found.or_else(|| (is_yes(&lower) && !has_any_word(&lower, NO_WORDS)).then_some(brand));
                return match chosen {
                    Some(b) => {
                        s.target_brand = Some(b);
                        self.after_purchase_brand(s, out)
                    }
                    None => {
                        s.target_brand = None;
                        s.pending = Some(PendingAction::ChooseNewOrUsed);
                        out.say(replies::ASK_PURCHASE_DETAILS);
                        Flow::Done
                    }
                };
            }
            Some(PendingAction::ChooseNewOrUsed) => {
                s.intent = if wants_used(&lower) { Intent::BuyUsed } else { Intent::BuyNew };
            }
            Some(PendingAction::ConfirmCarBrand) | None => {}
        }

        s.slots.raw_model = Some(text.to_string());
        match s.intent {
            Intent::BuyNew | Intent::BuyUsed => match found {
                Some(b) => {
                    s.target_brand = Some(b);
                    self.after_purchase_brand(s, out)
                }
                None => {
                    s.pending = Some(PendingAction::ChooseNewOrUsed);
                    out.say(replies::ASK_BRAND_AGAIN);
                    Flow::Done
                }
            },
            Intent::Repair | Intent::Spares | Intent::Sell => match found {
                Some(b) => {
                    s.user_car_brand = Some(b);
                    if s.intent == Intent::Repair && s.slots.repair_type.is_none() {
                        s.state = DialogueState::CollectRepairType;
                        out.say(replies::ASK_REPAIR_TYPE);
                    } else {
                        let prompt = replies::ask_phone_named(self.name(s));
                        self.phone_or_confirm(s, prompt, out);
                    }
                    Flow::Done
                }
                None => {
                    out.say(replies::ASK_BRAND_AGAIN);
                    Flow::Done
                }
            },
            Intent::Accounting | Intent::Other | Intent::FallbackOther => match found {
                Some(b) => {
                    out.say(replies::ownership_follow_up(&b));
                    s.user_car_brand = Some(b);
                    s.state = DialogueState::DetectIntent;
                    Flow::Done
                }
                None => Flow::Detect(text.to_string()),
            },
        }
    }

    /// Purchase brand is known: notice for non-dealer brands, specs otherwise.
    fn after_purchase_brand(&self, s: &mut Session, out: &mut TurnOutcome) -> Flow {
        let Some(brand) = s.target_brand.clone() else {
            return Flow::Done;
        };
        if s.intent == Intent::BuyNew && !self.brands.is_dealer(&brand) {
            out.say(replies::non_dealer_notice(&self.company, &brand, &self.dealer_names));
            s.non_dealer_brand = Some(brand);
            s.non_dealer_notice_sent = true;
            s.state = DialogueState::NonDealerChoice;
        } else if s.slots.budget_max.is_none() {
            s.state = DialogueState::CollectSpecs;
            out.say(replies::ASK_BUDGET);
        } else {
            let prompt = replies::ask_phone_named(self.name(s));
            self.phone_or_confirm(s, prompt, out);
        }
        Flow::Done
    }

    pub(crate) async fn on_collect_specs(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) -> Flow {
        let lower = normalize(text);
        let question = matches_any(&lower, SPEC_QUESTION_WORDS) && !has_digit(text);
        if question || self.brands.find_brand(text).is_some() {
            return Flow::Detect(text.to_string());
        }

        if s.slots.budget_max.is_none() {
            match parse_budget(text) {
                Some(answer) => {
                    s.slots.budget_max = Some(answer.ceiling());
                    s.specs_retry = 0;
                }
                None => s.specs_retry += 1,
            }
        }

        let hints = parse_specs(text);
        if let Some(body) = hints.body {
            s.slots.body = Some(body.to_string());
        } else if matches_any(&lower, BODY_SKIP) {
            s.slots.body = Some("любой".to_string());
        }
        if let Some(drive) = hints.drive {
            s.slots.drive = Some(drive.to_string());
        }

        if s.slots.budget_max.is_none() {
            if s.specs_retry >= self.settings.budget_attempts {
                s.slots.budget_max = Some(UNLIMITED_BUDGET);
            } else {
                out.say(replies::ASK_BUDGET_AGAIN);
                return Flow::Done;
            }
        }
        if s.slots.body.is_none() {
            out.say(replies::ASK_BODY);
            return Flow::Done;
        }

        if s.intent == Intent::BuyUsed {
            let prompt = replies::ask_phone_named(self.name(s));
            self.phone_or_confirm(s, prompt, out);
        } else {
            self.search_slots(s, out).await;
        }
        Flow::Done
    }

    pub(crate) fn on_collect_repair_type(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) -> Flow {
        let lower = normalize(text);
        if s.pending == Some(PendingAction::ConfirmCarBrand) {
            s.pending = None;
            if let Some(b) = self.brands.find_brand(text) {
                s.user_car_brand = Some(b.to_string());
            }
            let prompt = replies::ask_phone_named(self.name(s));
            self.phone_or_confirm(s, prompt, out);
            return Flow::Done;
        }

        if matches_any(&lower, REPAIR_ESCAPE) || is_search_query(text) || self.brands.find_brand(text).is_some() {
            return Flow::Detect(text.to_string());
        }

        let repair_type = if matches_any(&lower, WORKSHOP_ANSWERS) || has_maintenance_word(&lower) {
            Some(RepairType::Workshop)
        } else if matches_any(&lower, BODYWORK_ANSWERS) {
            Some(RepairType::Bodywork)
        } else {
            RepairType::parse(&lower)
        };
        match repair_type {
            Some(t) => {
                s.slots.repair_type = Some(t);
                let prompt = replies::ask_phone_for_service(self.name(s));
                self.phone_or_confirm(s, prompt, out);
            }
            None => out.say(replies::ASK_REPAIR_TYPE_AGAIN),
        }
        Flow::Done
    }

    pub(crate) fn on_collect_phone(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) -> Flow {
        let lower = normalize(text);
        if says_phone_given(&lower) {
            if s.has_phone() {
                self.ask_confirm(s, out);
            } else {
                out.say(replies::PHONE_NOT_IN_SESSION);
            }
            return Flow::Done;
        }

        if let Some(phone) = normalize_phone(text) {
            s.phone = Some(phone);
            s.phone_attempts = 0;
            self.ask_confirm(s, out);
            return Flow::Done;
        }

        let looks_like_message =
            has_cyrillic(text) || matches_any(&lower, PHONE_ESCAPE) || text.chars().count() > 20;
        if digit_count(text) < 7 && looks_like_message {
            return Flow::Detect(text.to_string());
        }

        s.phone_attempts += 1;
        if s.phone_attempts >= self.settings.phone_attempts {
            tracing::info!(user_id = %s.user_id, attempts = s.phone_attempts, "phone collection abandoned");
            out.say(replies::PHONE_GIVE_UP);
            s.state = DialogueState::Finished;
        } else {
            out.say(replies::PHONE_RETRY);
        }
        Flow::Done
    }

    pub(crate) fn on_confirm_final(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) -> Flow {
        let lower = normalize(text);
        if is_yes(&lower) {
            match self.build_lead(s, s.intent) {
                Some(lead) => {
                    tracing::info!(
                        user_id = %s.user_id,
                        lead_id = %lead.id,
                        intent = %lead.intent,
                        "lead confirmed"
                    );
                    out.leads.push(lead);
                    out.say(replies::CONFIRMED);
                    s.state = DialogueState::Finished;
                }
                None => {
                    s.state = DialogueState::CollectPhone;
                    out.say(replies::ASK_PHONE_PLAIN);
                }
            }
            return Flow::Done;
        }

        if let Some(brand) = self.brands.find_brand(text)
            && s.lead_brand() != Some(brand)
        {
            let brand = brand.to_string();
            out.say(replies::brand_corrected(&brand));
            s.target_brand = Some(brand.clone());
            s.user_car_brand = Some(brand);
            s.non_dealer_notice_sent = false;
            self.ask_confirm(s, out);
            return Flow::Done;
        }

        if has_any_word(&lower, NO_WORDS) {
            if matches_any(&lower, PHONE_WORDS) {
                s.state = DialogueState::CollectPhone;
                out.say(replies::PHONE_FIX);
            } else {
                s.state = DialogueState::Finished;
                out.say(replies::RESTART_HINT);
            }
            return Flow::Done;
        }

        out.say(replies::CONFIRM_UNCLEAR);
        Flow::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::tests::{dialogue, dialogue_with, named_session};
    use crate::intent::StaticClassifier;
    use al_protocol::{Confidence, IntentResult};

    // ── greeting ───────────────────────────────────────────────

    #[tokio::test]
    async fn plain_name() {
        let d = dialogue();
        let mut s = Session::new("u");
        let out = d.handle(&mut s, "Иван").await;
        assert_eq!(s.name.as_deref(), Some("Иван"));
        assert_eq!(s.state, DialogueState::DetectIntent);
        assert_eq!(out.replies, vec![replies::greet_named("Иван")]);
    }

    #[tokio::test]
    async fn name_with_prefix() {
        let d = dialogue();
        let mut s = Session::new("u");
        d.handle(&mut s, "Меня зовут Ольга").await;
        assert_eq!(s.name.as_deref(), Some("Ольга"));
    }

    #[tokio::test]
    async fn salutation_is_not_a_name() {
        let d = dialogue();
        let mut s = Session::new("u");
        let out = d.handle(&mut s, "Добрый день!").await;
        assert_eq!(s.name, None);
        assert_eq!(s.state, DialogueState::Greeting);
        assert_eq!(out.replies, vec![replies::GREETING.to_string()]);
    }

    #[tokio::test]
    async fn name_and_request_in_one_message() {
        let d = dialogue();
        let mut s = Session::new("u");
        let out = d.handle(&mut s, "Иван, хочу Chery").await;
        assert_eq!(s.name.as_deref(), Some("Иван"));
        assert_eq!(s.target_brand.as_deref(), Some("Chery"));
        assert_eq!(s.state, DialogueState::CollectSpecs);
        assert_eq!(out.replies.len(), 2);
        assert_eq!(out.replies[1], replies::ASK_BUDGET);
    }

    #[tokio::test]
    async fn name_then_request_without_separator() {
        let d = dialogue();
        let mut s = Session::new("u");
        d.handle(&mut s, "Анна хочу купить Haval").await;
        assert_eq!(s.name.as_deref(), Some("Анна"));
        assert_eq!(s.intent, Intent::BuyNew);
        assert_eq!(s.target_brand.as_deref(), Some("Haval"));
    }

    #[tokio::test]
    async fn request_without_name_is_detected() {
        let d = dialogue();
        let mut s = Session::new("u");
        let out = d.handle(&mut s, "Сколько стоит Tiggo 7 Pro?").await;
        assert_eq!(s.name, None);
        assert_eq!(s.state, DialogueState::NonDealerChoice);
        assert!(out.replies[0].starts_with("Да, Chery Tiggo 7 Pro есть в наличии"));
    }

    // ── detection ──────────────────────────────────────────────

    #[tokio::test]
    async fn model_match_caches_offers() {
        let d = dialogue();
        let mut s = named_session();
        d.handle(&mut s, "Интересует Jolion").await;
        assert_eq!(s.state, DialogueState::NonDealerChoice);
        assert_eq!(s.target_brand.as_deref(), Some("Haval"));
        assert_eq!(s.slots.model.as_deref(), Some("Jolion"));
        assert_eq!(s.last_search_results.len(), 1);
    }

    #[tokio::test]
    async fn purchase_without_brand_asks_details() {
        let answer = IntentResult::new(Intent::BuyNew, Confidence::High);
        let d = dialogue_with(StaticClassifier::new().with("хочу машину", answer));
        let mut s = named_session();
        let out = d.handle(&mut s, "хочу машину").await;
        assert_eq!(s.state, DialogueState::CollectBrand);
        assert_eq!(s.pending, Some(PendingAction::ChooseNewOrUsed));
        assert_eq!(out.replies, vec![replies::ASK_PURCHASE_DETAILS.to_string()]);

        d.handle(&mut s, "с пробегом, Jetour").await;
        assert_eq!(s.intent, Intent::BuyUsed);
        assert_eq!(s.target_brand.as_deref(), Some("Jetour"));
        assert_eq!(s.state, DialogueState::CollectSpecs);
    }

    #[tokio::test]
    async fn purchase_with_owned_brand_asks_same_brand() {
        let answer = IntentResult::new(Intent::BuyNew, Confidence::High);
        let d = dialogue_with(StaticClassifier::new().with("хочу поменять машину", answer));
        let mut s = named_session();
        s.user_car_brand = Some("Haval".into());
        let out = d.handle(&mut s, "хочу поменять машину").await;
        assert_eq!(out.replies, vec![replies::ask_same_brand("Haval")]);
        assert_eq!(
            s.pending,
            Some(PendingAction::ConfirmTargetBrand { brand: "Haval".into() })
        );

        d.handle(&mut s, "да").await;
        assert_eq!(s.target_brand.as_deref(), Some("Haval"));
        assert_eq!(s.state, DialogueState::CollectSpecs);
    }

    #[tokio::test]
    async fn repair_without_brand_then_type_then_phone() {
        let answer = IntentResult::new(Intent::Repair, Confidence::High);
        let d = dialogue_with(StaticClassifier::new().with("нужен ремонт", answer));
        let mut s = named_session();
        let out = d.handle(&mut s, "нужен ремонт").await;
        assert_eq!(s.state, DialogueState::CollectBrand);
        assert_eq!(out.replies, vec![replies::ASK_OWNED_CAR.to_string()]);

        let out = d.handle(&mut s, "Jetour Dashing").await;
        assert_eq!(s.user_car_brand.as_deref(), Some("Jetour"));
        assert_eq!(s.state, DialogueState::CollectRepairType);
        assert_eq!(out.replies, vec![replies::ASK_REPAIR_TYPE.to_string()]);

        d.handle(&mut s, "кузовной").await;
        assert_eq!(s.slots.repair_type, Some(RepairType::Bodywork));
        assert_eq!(s.state, DialogueState::CollectPhone);

        let out = d.handle(&mut s, "+7 916 123-45-67").await;
        assert_eq!(s.phone.as_deref(), Some("+79161234567"));
        assert_eq!(s.state, DialogueState::ConfirmFinal);
        assert!(out.replies[0].contains("(кузовной)"));

        let out = d.handle(&mut s, "да").await;
        assert_eq!(s.state, DialogueState::Finished);
        assert_eq!(out.leads.len(), 1);
        assert_eq!(out.leads[0].intent, Intent::Repair);
        assert_eq!(out.leads[0].brand.as_deref(), Some("Jetour"));
    }

    #[tokio::test]
    async fn oil_change_confirms_car() {
        let d = dialogue();
        let mut s = named_session();
        s.user_car_brand = Some("Haval".into());
        let out = d.handle(&mut s, "хочу поменять масло").await;
        assert_eq!(s.state, DialogueState::CollectRepairType);
        assert_eq!(s.pending, Some(PendingAction::ConfirmCarBrand));
        assert!(out.replies[0].ends_with("Ваш автомобиль - Haval?"));

        d.handle(&mut s, "да").await;
        assert_eq!(s.state, DialogueState::CollectPhone);
        assert_eq!(s.user_car_brand.as_deref(), Some("Haval"));
    }

    #[tokio::test]
    async fn bare_brand_asks_buy_or_service() {
        let d = dialogue();
        let mut s = named_session();
        let out = d.handle(&mut s, "Haval").await;
        assert_eq!(out.replies, vec![replies::ask_buy_or_service("Haval")]);
        assert_eq!(s.user_car_brand.as_deref(), Some("Haval"));
        assert_eq!(s.state, DialogueState::DetectIntent);
    }

    #[tokio::test]
    async fn fallback_escalates_without_phone() {
        let d = dialogue();
        let mut s = named_session();
        assert_eq!(d.handle(&mut s, "ммм").await.replies, vec![replies::CLARIFY.to_string()]);
        assert_eq!(d.handle(&mut s, "эээ").await.replies, vec![replies::CLARIFY.to_string()]);
        let out = d.handle(&mut s, "ну").await;
        assert_eq!(s.intent, Intent::FallbackOther);
        assert_eq!(s.state, DialogueState::CollectPhone);
        assert_eq!(out.replies, vec![replies::ask_phone_after_fallback("Иван")]);
    }

    #[tokio::test]
    async fn fallback_with_phone_creates_lead() {
        let d = dialogue();
        let mut s = named_session();
        s.phone = Some("+79161234567".into());
        s.fallback_retry = 2;
        let out = d.handle(&mut s, "ммм").await;
        assert_eq!(s.state, DialogueState::Finished);
        assert_eq!(out.leads.len(), 1);
        assert_eq!(out.leads[0].intent, Intent::FallbackOther);
        assert_eq!(out.replies, vec![replies::FALLBACK_WITH_PHONE.to_string()]);
    }

    // ── specs ──────────────────────────────────────────────────

    #[tokio::test]
    async fn budget_then_body_then_search() {
        let d = dialogue();
        let mut s = named_session();
        d.handle(&mut s, "Хочу Chery").await;
        assert_eq!(s.state, DialogueState::CollectSpecs);

        let out = d.handle(&mut s, "до 3 млн").await;
        assert_eq!(s.slots.budget_max, Some(3_000_000));
        assert_eq!(out.replies, vec![replies::ASK_BODY.to_string()]);

        let out = d.handle(&mut s, "кроссовер").await;
        assert_eq!(s.slots.body.as_deref(), Some("кроссовер"));
        assert_eq!(s.state, DialogueState::NonDealerChoice);
        assert!(out.replies[0].contains("Tiggo"));
        assert!(s.last_search_results.iter().all(|o| o.brand == "Chery"));
    }

    #[tokio::test]
    async fn budget_gives_up_after_retries() {
        let d = dialogue();
        let mut s = named_session();
        s.intent = Intent::BuyNew;
        s.target_brand = Some("Haval".into());
        s.state = DialogueState::CollectSpecs;

        let out = d.handle(&mut s, "хм").await;
        assert_eq!(out.replies, vec![replies::ASK_BUDGET_AGAIN.to_string()]);
        let out = d.handle(&mut s, "хм").await;
        assert_eq!(s.slots.budget_max, Some(UNLIMITED_BUDGET));
        assert_eq!(out.replies, vec![replies::ASK_BODY.to_string()]);
    }

    #[tokio::test]
    async fn specs_question_escapes() {
        let d = dialogue();
        let mut s = named_session();
        s.intent = Intent::BuyNew;
        s.state = DialogueState::CollectSpecs;
        d.handle(&mut s, "а какие Haval есть?").await;
        assert_eq!(s.target_brand.as_deref(), Some("Haval"));
        assert_eq!(s.state, DialogueState::NonDealerChoice);
        assert!(s.last_search_results.iter().all(|o| o.brand == "Haval"));
    }

    // ── phone and confirmation ─────────────────────────────────

    fn at_phone_step() -> Session {
        let mut s = named_session();
        s.intent = Intent::Accounting;
        s.state = DialogueState::CollectPhone;
        s
    }

    #[tokio::test]
    async fn three_bad_phones_finish() {
        let d = dialogue();
        let mut s = at_phone_step();
        assert_eq!(d.handle(&mut s, "12345").await.replies, vec![replies::PHONE_RETRY.to_string()]);
        assert_eq!(d.handle(&mut s, "000").await.replies, vec![replies::PHONE_RETRY.to_string()]);
        let out = d.handle(&mut s, "abc").await;
        assert_eq!(out.replies, vec![replies::PHONE_GIVE_UP.to_string()]);
        assert_eq!(s.state, DialogueState::Finished);
        assert!(out.leads.is_empty());
    }

    #[tokio::test]
    async fn question_at_phone_step_is_redetected() {
        let d = dialogue();
        let mut s = at_phone_step();
        d.handle(&mut s, "а сколько стоит Jolion?").await;
        assert_eq!(s.state, DialogueState::NonDealerChoice);
        assert_eq!(s.phone_attempts, 0);
    }

    #[tokio::test]
    async fn already_gave_phone_without_one() {
        let d = dialogue();
        let mut s = at_phone_step();
        let out = d.handle(&mut s, "я уже давал номер").await;
        assert_eq!(out.replies, vec![replies::PHONE_NOT_IN_SESSION.to_string()]);
        assert_eq!(s.state, DialogueState::CollectPhone);
    }

    fn at_confirm_step() -> Session {
        let mut s = named_session();
        s.intent = Intent::BuyNew;
        s.target_brand = Some("Chery".into());
        s.phone = Some("+79161234567".into());
        s.state = DialogueState::ConfirmFinal;
        s
    }

    #[tokio::test]
    async fn brand_correction_reconfirms() {
        let d = dialogue();
        let mut s = at_confirm_step();
        let out = d.handle(&mut s, "нет, Haval").await;
        assert_eq!(out.replies[0], replies::brand_corrected("Haval"));
        assert!(out.replies[1].contains("Haval"));
        assert_eq!(s.target_brand.as_deref(), Some("Haval"));
        assert_eq!(s.state, DialogueState::ConfirmFinal);
    }

    #[tokio::test]
    async fn wrong_phone_is_asked_again() {
        let d = dialogue();
        let mut s = at_confirm_step();
        let out = d.handle(&mut s, "нет, номер не тот").await;
        assert_eq!(out.replies, vec![replies::PHONE_FIX.to_string()]);
        assert_eq!(s.state, DialogueState::CollectPhone);
    }

    #[tokio::test]
    async fn plain_no_restarts() {
        let d = dialogue();
        let mut s = at_confirm_step();
        let out = d.handle(&mut s, "нет").await;
        assert_eq!(out.replies, vec![replies::RESTART_HINT.to_string()]);
        assert_eq!(s.state, DialogueState::Finished);
        assert!(out.leads.is_empty());
    }

    #[tokio::test]
    async fn unclear_confirmation() {
        let d = dialogue();
        let mut s = at_confirm_step();
        let out = d.handle(&mut s, "хм").await;
        assert_eq!(out.replies, vec![replies::CONFIRM_UNCLEAR.to_string()]);
        assert_eq!(s.state, DialogueState::ConfirmFinal);
    }

    #[test]
    fn phone_given_phrases() {
        assert!(says_phone_given("я уже давал номер"));
        assert!(says_phone_given("уже писал"));
        assert!(!says_phone_given("какие есть кроссоверы"));
    }
}
