//! Search answers and the refinement loop that follows them.
//!
//! After a result list the user may leave a phone, ask for a manager, ask
//! about colors or a numbered variant, name a model, or refine the search.
//! Checks run in that order; the first that fires answers the message.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use al_catalog::specs::{UNLIMITED_BUDGET, is_search_query};
use al_catalog::text::{has_any_word, has_word, matches_any, normalize, words};
use al_catalog::{PriceTarget, RankStrategy, SearchQuery, normalize_phone, parse_specs, pick_top3_offers};
use al_protocol::{Intent, RepairType};
use regex::Regex;

use super::handlers::{says_phone_given, wants_used};
use crate::intent::signals::has_maintenance_word;
use super::replies;
use super::session::{DialogueState, Session};
use super::{Dialogue, TurnOutcome};

const MANAGER_WORDS: &[&str] = &[
    "менеджер", "специалист", "консультант", "позвон", "звонок", "перезвон", "связаться",
    "свяжитесь", "телефон", "заявк", "бронь", "заброни",
];
const CONSENT_WORDS: &[&str] = &["да", "давай", "давайте", "хочу", "ок", "ok", "согласен", "согласна", "можно", "конечно"];

const SERVICE_LIKE: &[&str] = &[
    "сервис", "обслуж", "ремонт", "диагност", "замен", "масл", "колодк", "шиномонтаж",
    "переобу", "стук", "шум", "скрип",
];

const COLOR_QUESTION: &[&str] = &["цвет"];
const PRICE_WORDS: &[&str] = &["цен", "стоим", "стоит", "руб", "млн", "тыс"];
const OTHER_COLOR_WORDS: &[&str] = &[
    "другой цвет",
    "другие цвета",
    "другого цвета",
    "других цветов",
    "еще цвета",
    "какие цвета",
];
const CONTEXT_WORDS: &[&str] = &["подробн", "скидк", "цвет", "комплектац", "детал", "расскаж"];
const MORE_EXPENSIVE: &[&str] = &["подороже", "дороже", "повыше", "дорого"];

/// Canonical color and the word forms that name it.
const COLORS: &[(&str, &[&str])] = &[
    ("белый", &["белый", "белая", "белое", "белые", "белого", "белом", "белую"]),
    ("черный", &["черный", "черная", "черное", "черные", "черного", "черном", "черную"]),
    ("серый", &["серый", "серая", "серое", "серые", "серого", "сером", "серую"]),
    ("серебристый", &["серебристый", "серебристая", "серебристое", "серебристые", "серебристого", "серебро"]),
    ("синий", &["синий", "синяя", "синее", "синие", "синего", "синем", "синюю"]),
    ("голубой", &["голубой", "голубая", "голубое", "голубые", "голубого"]),
    ("красный", &["красный", "красная", "красное", "красные", "красного", "красном", "красную"]),
    ("бордовый", &["бордовый", "бордовая", "бордовое", "бордовые", "бордо"]),
    ("зеленый", &["зеленый", "зеленая", "зеленое", "зеленые", "зеленого", "зеленую"]),
    ("коричневый", &["коричневый", "коричневая", "коричневое", "коричневые", "коричневого"]),
    ("бежевый", &["бежевый", "бежевая", "бежевое", "бежевые", "бежевого"]),
    ("оранжевый", &["оранжевый", "оранжевая", "оранжевое", "оранжевые", "оранжевого"]),
    ("желтый", &["желтый", "желтая", "желтое", "желтые", "желтого"]),
    ("фиолетовый", &["фиолетовый", "фиолетовая", "фиолетовое", "фиолетовые"]),
    ("золотой", &["золотой", "золотая", "золотое", "золотые", "золотистый"]),
    ("графитовый", &["графитовый", "графитовая", "графитовое", "графит"]),
];

const ORDINALS: &[(&[&str], usize)] = &[
    (&["первый", "первая", "первое", "первую", "первого", "первом"], 0),
    (&["второй", "вторая", "второе", "вторую", "второго", "втором"], 1),
    (&["третий", "третья", "третье", "третью", "третьего", "третьем"], 2),
    (&["четвертый", "четвертая", "четвертое", "четвертую", "четвертого"], 3),
    (&["пятый", "пятая", "пятое", "пятую", "пятого"], 4),
];

static VARIANT_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:вариант\w*|номер|позици\w*|№|#)\s*(\d{1,2})\b").expect("valid regex")
});
static VARIANT_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*-?\s*(?:й|ой|ый)?\s*вариант").expect("valid regex"));

fn requested_color(lower: &str) -> Option<&'static str> {
    COLORS
        .iter()
        .find(|(_, forms)| has_any_word(lower, forms))
        .map(|(canonical, _)| *canonical)
}

/// Zero-based index of a variant the user points at.
fn variant_index(lower: &str) -> Option<usize> {
    let number = VARIANT_AFTER
        .captures(lower)
        .or_else(|| VARIANT_BEFORE.captures(lower))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok());
    if let Some(n) = number {
        return n.checked_sub(1);
    }
    let tokens = words(lower);
    ORDINALS
        .iter()
        .find(|(forms, _)| forms.iter().any(|f| tokens.contains(f)))
        .map(|(_, idx)| *idx)
}

/// Manager request, or a short consent that does not point at a variant or color.
fn wants_manager(lower: &str) -> bool {
    matches_any(lower, MANAGER_WORDS)
        || (words(lower).len() <= 3
            && has_any_word(lower, CONSENT_WORDS)
            && variant_index(lower).is_none()
            && requested_color(lower).is_none())
}

fn looks_like_service(lower: &str) -> bool {
    matches_any(lower, SERVICE_LIKE) || has_word(lower, "сто") || has_maintenance_word(lower)
}

impl Dialogue {
    /// Search driven by free text: spec hints, price words and brands in the message.
    pub(crate) async fn search_text(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) {
        let lower = normalize(text);
        let hints = parse_specs(text);
        let policy = self.search.policy();
        let brands = self.search_brands(s, text);

        let mut query = SearchQuery::new(brands, text).with_hints(&hints, policy);
        if hints.price.is_some() {
            s.last_price_max = query.price_max;
        } else if matches_any(&lower, MORE_EXPENSIVE)
            && !lower.contains("недорог")
            && let Some(previous) = s.last_price_max
        {
            query.price_min = Some(previous);
        }
        query.prefer_crossovers = s.non_dealer_brand.is_some();

        let target = hints.price.map(|amount| PriceTarget {
            amount,
            approximate: hints.approximate,
        });
        let strategy = RankStrategy::for_text(text);
        let header = if query.price_min.is_some() {
            replies::HEADER_MORE_EXPENSIVE
        } else {
            match strategy {
                RankStrategy::PowerDesc => replies::HEADER_POWER,
                RankStrategy::PriceDesc => replies::HEADER_EXPENSIVE,
                RankStrategy::PriceMix => replies::HEADER_DEFAULT,
            }
        };
        self.run_search(s, &query, target, strategy, header, out).await;
    }

    /// Search driven by the collected budget, body and drive slots.
    pub(crate) async fn search_slots(&self, s: &mut Session, out: &mut TurnOutcome) {
        let brands = self.search_brands(s, "");
        let body = s.slots.body.clone().filter(|b| b != "любой");
        let budget = s.slots.budget_max.filter(|b| *b < UNLIMITED_BUDGET);

        let description: Vec<String> = [body.clone(), s.slots.drive.clone(), s.target_brand.clone()]
            .into_iter()
            .flatten()
            .collect();
        let mut query = SearchQuery::new(brands, description.join(" "));
        query.body = body;
        query.drive = s.slots.drive.clone();
        query.price_max = budget;
        query.prefer_crossovers = s.non_dealer_brand.is_some();
        s.last_price_max = budget;

        let target = budget.map(|amount| PriceTarget {
            amount,
            approximate: false,
        });
        self.run_search(s, &query, target, RankStrategy::PriceMix, replies::HEADER_DEFAULT, out)
            .await;
    }

    /// Dealer brands to search in: one named in the text, the dealer target,
    /// or all of them.
    fn search_brands(&self, s: &mut Session, text: &str) -> BTreeSet<String> {
        if let Some(brand) = self.brands.find_brand(text)
            && self.brands.is_dealer(brand)
        {
            if s.target_brand.as_deref() != Some(brand) {
                s.target_brand = Some(brand.to_string());
                s.intent = Intent::BuyNew;
            }
            return BTreeSet::from([brand.to_string()]);
        }
        if let Some(target) = &s.target_brand
            && self.brands.is_dealer(target)
        {
            return BTreeSet::from([target.clone()]);
        }
        self.brands.dealer_brands()
    }

    async fn run_search(
        &self,
        s: &mut Session,
        query: &SearchQuery,
        target: Option<PriceTarget>,
        strategy: RankStrategy,
        header: &str,
        out: &mut TurnOutcome,
    ) {
        let policy = self.search.policy();
        let outcome = self.search.search(query).await;
        let best = pick_top3_offers(&outcome.offers, target, strategy, policy);
        tracing::info!(
            user_id = %s.user_id,
            stage = ?outcome.stage,
            candidates = outcome.offers.len(),
            shown = best.len(),
            "search answered"
        );

        s.state = DialogueState::NonDealerChoice;
        let notice = match &s.non_dealer_brand {
            Some(brand) if !s.non_dealer_notice_sent => {
                Some(replies::non_dealer_notice(&self.company, brand, &self.dealer_names))
            }
            _ => None,
        };
        if notice.is_some() {
            s.non_dealer_notice_sent = true;
        }
        let name = self.name(s).to_string();
        let prompt = replies::phone_prompt_addressed(s.has_phone());

        if best.is_empty() {
            let first = match notice {
                Some(mut notice) => {
                    if self.search.catalog().is_empty() {
                        notice.push('\n');
                        notice.push_str(replies::CATALOG_UPDATING);
                    }
                    notice
                }
                None => replies::NOTHING_FOUND.to_string(),
            };
            out.say(first);
            out.say(format!("{}\n{name}, {prompt}", replies::OFFER_MANAGER_HELP));
            return;
        }

        s.cache_results(&best, policy.max_cached);
        let listing = format!("{}\n\n{name}, {prompt}", replies::offer_listing(header, &best));
        match notice {
            Some(notice) => out.say(format!("{notice}\n\n{listing}")),
            None => out.say(listing),
        }
    }

    /// Move the lead to the dealer brand of the first shown offer.
    fn route_to_shown_dealer(&self, s: &mut Session) {
        if let Some(first) = s.last_search_results.first()
            && self.brands.is_dealer(&first.brand)
        {
            s.intent = Intent::BuyNew;
            s.target_brand = Some(first.brand.clone());
            s.non_dealer_brand = None;
        }
    }

    /// A message received while search results are on screen.
    pub(crate) async fn on_follow_up(&self, s: &mut Session, text: &str, out: &mut TurnOutcome) {
        let lower = normalize(text);
        let hints = parse_specs(text);
        let default_days = self.search.policy().default_delivery_days;
        let has_phone_prompt = replies::phone_prompt(s.has_phone());

        if let Some(phone) = normalize_phone(text) {
            s.phone = Some(phone);
            self.route_to_shown_dealer(s);
            self.ask_confirm(s, out);
            return;
        }

        if says_phone_given(&lower) {
            if s.has_phone() {
                self.route_to_shown_dealer(s);
                self.ask_confirm(s, out);
            } else {
                s.state = DialogueState::CollectPhone;
                out.say(replies::PHONE_NOT_IN_SESSION_SEARCH);
            }
            return;
        }

        if wants_manager(&lower) {
            if wants_used(&lower) {
                s.intent = Intent::BuyUsed;
                if let Some(brand) = s.non_dealer_brand.clone() {
                    s.target_brand = Some(brand);
                }
            } else {
                self.route_to_shown_dealer(s);
            }
            let prompt = replies::ask_phone_for_manager(self.name(s));
            self.phone_or_confirm(s, prompt, out);
            return;
        }

        if !(hints.has_filters() || is_search_query(text)) && looks_like_service(&lower) {
            s.intent = Intent::Repair;
            if let Some(brand) = self.brands.find_brand(text) {
                s.user_car_brand = Some(brand.to_string());
            }
            if matches_any(&lower, &["кузов", "покрас", "вмятин"]) {
                s.slots.repair_type = Some(RepairType::Bodywork);
            }
            s.state = DialogueState::CollectRepairType;
            out.say(replies::SERVICE_IN_SEARCH);
            return;
        }

        let dealers = self.brands.dealer_brands();
        let named = self.search.catalog().find_models(text, &dealers);

        if matches_any(&lower, COLOR_QUESTION) && !matches_any(&lower, PRICE_WORDS) && !named.is_empty() {
            out.say(format!(
                "{}\n\n{has_phone_prompt}",
                replies::color_overview(&named, default_days)
            ));
            return;
        }

        if let Some(color) = requested_color(&lower) {
            let reply = match s.current_offer() {
                Some((idx, car)) => {
                    let line = if car.has_color(color) {
                        replies::color_in_stock(car, color)
                    } else {
                        replies::color_on_order(car.delivery_days.unwrap_or(default_days))
                    };
                    s.last_variant_idx = Some(idx);
                    format!("{line}\n\n{has_phone_prompt}")
                }
                None => format!("{} {has_phone_prompt}", replies::color_on_order(default_days)),
            };
            out.say(reply);
            return;
        }

        if matches_any(&lower, OTHER_COLOR_WORDS) {
            let reply = match s.current_offer() {
                Some((_, car)) => replies::other_colors(car, default_days),
                None => replies::other_colors_generic(default_days),
            };
            out.say(format!("{reply}\n\n{has_phone_prompt}"));
            return;
        }

        if !s.last_search_results.is_empty() {
            let pointed = variant_index(&lower);
            let new_search = hints.has_filters() || self.brands.find_brand(text).is_some();
            let context_question = matches_any(&lower, CONTEXT_WORDS) && !new_search;

            if let Some(idx) = pointed
                && idx < s.last_search_results.len()
            {
                s.last_variant_idx = Some(idx);
                let detail = replies::offer_detail(&s.last_search_results[idx], default_days);
                out.say(format!("{detail}\n\n{has_phone_prompt}"));
                return;
            }
            if pointed.is_none() && context_question {
                s.last_variant_idx = None;
                out.say(format!(
                    "{}\n\n{has_phone_prompt}",
                    replies::compact_listing(&s.last_search_results)
                ));
                return;
            }
        }

        if !named.is_empty() {
            self.reply_models(s, &named, out);
            return;
        }

        self.search_text(s, text, out).await;
    }
}
