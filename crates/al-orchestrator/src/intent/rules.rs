//! Post-classification correction rules.
//!
//! An ordered list of independent rules, each a predicate plus an effect.
//! The first rule whose predicate holds is applied and evaluation stops.
//! Apart from `repair_subtype`, every rule only fires on an uncertain
//! result (`other` or low confidence).

use al_protocol::{Confidence, Intent, IntentResult, RepairType};

use super::signals::{
    self, DETAILS_OIL_CHANGE, classify_repair, has_bare_purchase_word, has_purchase_phrase,
    has_repair_vocabulary, is_accounting, is_oil_change, is_spares_request,
};

/// What the rules may look at besides the result itself.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Normalized message text.
    pub lower: &'a str,
    pub service_signal: bool,
    /// Canonical brand mentioned in this message.
    pub text_brand: Option<&'a str>,
    /// Owned-car brand remembered from earlier turns.
    pub known_car_brand: Option<&'a str>,
}

impl<'a> RuleContext<'a> {
    pub fn new(lower: &'a str, text_brand: Option<&'a str>, known_car_brand: Option<&'a str>) -> Self {
        Self {
            lower,
            service_signal: signals::has_service_signal(lower),
            text_brand,
            known_car_brand,
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    applies: fn(&IntentResult, &RuleContext<'_>) -> bool,
    apply: fn(&mut IntentResult, &RuleContext<'_>),
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Priority order: parts before purchase ("купить колодки" is a parts
/// order), accounting before the broad repair vocabulary.
pub static RULES: &[Rule] = &[
    Rule {
        name: "spares",
        applies: |r, ctx| r.is_uncertain() && is_spares_request(ctx.lower),
        apply: |r, ctx| {
            r.intent = Intent::Spares;
            r.confidence = Confidence::High;
            fill_owned_brand(r, ctx.text_brand);
        },
    },
    Rule {
        name: "oil_change",
        applies: |r, ctx| r.is_uncertain() && is_oil_change(ctx.lower),
        apply: |r, ctx| {
            r.intent = Intent::Repair;
            r.confidence = Confidence::High;
            r.slots.repair_type = Some(RepairType::Workshop);
            r.slots.repair_details = Some(DETAILS_OIL_CHANGE.to_string());
            fill_owned_brand(r, ctx.text_brand.or(ctx.known_car_brand));
        },
    },
    Rule {
        name: "purchase_phrase",
        applies: |r, ctx| r.is_uncertain() && !ctx.service_signal && has_purchase_phrase(ctx.lower),
        apply: |r, ctx| {
            r.intent = Intent::BuyNew;
            r.confidence = Confidence::Medium;
            fill_target_brand(r, ctx.text_brand);
        },
    },
    Rule {
        name: "bare_purchase",
        applies: |r, ctx| {
            r.intent == Intent::Other && !ctx.service_signal && has_bare_purchase_word(ctx.lower)
        },
        apply: |r, ctx| {
            r.intent = Intent::BuyNew;
            fill_target_brand(r, ctx.text_brand);
        },
    },
    Rule {
        name: "accounting",
        applies: |r, ctx| r.is_uncertain() && is_accounting(ctx.lower),
        apply: |r, _| {
            r.intent = Intent::Accounting;
            r.confidence = Confidence::High;
        },
    },
    Rule {
        name: "repair",
        applies: |r, ctx| {
            r.is_uncertain() && (ctx.service_signal || has_repair_vocabulary(ctx.lower))
        },
        apply: |r, ctx| {
            r.intent = Intent::Repair;
            r.confidence = Confidence::Medium;
            fill_repair_type(r, ctx.lower);
            fill_owned_brand(r, ctx.text_brand);
        },
    },
    Rule {
        name: "repair_subtype",
        applies: |r, _| r.intent == Intent::Repair && !r.is_uncertain() && r.slots.repair_type.is_none(),
        apply: |r, ctx| fill_repair_type(r, ctx.lower),
    },
];

/// Apply the first matching rule. Returns its name.
pub fn apply_rules(rules: &[Rule], result: &mut IntentResult, ctx: &RuleContext<'_>) -> Option<&'static str> {
    let rule = rules.iter().find(|rule| (rule.applies)(result, ctx))?;
    (rule.apply)(result, ctx);
    tracing::debug!(rule = rule.name, intent = %result.intent, "intent rule applied");
    Some(rule.name)
}

fn fill_owned_brand(result: &mut IntentResult, brand: Option<&str>) {
    if result.user_car_brand.is_none() {
        result.user_car_brand = brand.map(String::from);
    }
}

fn fill_target_brand(result: &mut IntentResult, brand: Option<&str>) {
    if result.target_brand.is_none() {
        result.target_brand = brand.map(String::from);
    }
}

fn fill_repair_type(result: &mut IntentResult, lower: &str) {
    let (repair_type, details) = classify_repair(lower);
    if result.slots.repair_type.is_none() {
        result.slots.repair_type = repair_type;
    }
    if result.slots.repair_details.is_none() {
        result.slots.repair_details = details.map(String::from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use al_catalog::text::normalize;

    fn run(text: &str, brand: Option<&str>, known: Option<&str>, start: IntentResult) -> (IntentResult, Option<&'static str>) {
        let lower = normalize(text);
        let ctx = RuleContext::new(&lower, brand, known);
        let mut result = start;
        let rule = apply_rules(RULES, &mut result, &ctx);
        (result, rule)
    }

    fn unknown(text: &str) -> (IntentResult, Option<&'static str>) {
        run(text, None, None, IntentResult::unknown())
    }

    // ── individual rules ───────────────────────────────────────

    #[test]
    fn spares_beats_purchase() {
        let (r, rule) = unknown("хочу купить тормозные колодки");
        assert_eq!(rule, Some("spares"));
        assert_eq!(r.intent, Intent::Spares);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn spares_takes_brand_from_text() {
        let (r, _) = run("нужен фильтр на Haval", Some("Haval"), None, IntentResult::unknown());
        assert_eq!(r.intent, Intent::Spares);
        assert_eq!(r.user_car_brand.as_deref(), Some("Haval"));
    }

    #[test]
    fn replacement_is_service_not_spares() {
        let (r, rule) = unknown("замена колодок");
        assert_eq!(rule, Some("repair"));
        assert_eq!(r.intent, Intent::Repair);
        assert_eq!(r.slots.repair_type, Some(RepairType::Workshop));
    }

    #[test]
    fn oil_change_uses_context_brand() {
        let (r, rule) = run("поменять масло", None, Some("Chery"), IntentResult::unknown());
        assert_eq!(rule, Some("oil_change"));
        assert_eq!(r.intent, Intent::Repair);
        assert_eq!(r.slots.repair_type, Some(RepairType::Workshop));
        assert_eq!(r.slots.repair_details.as_deref(), Some(DETAILS_OIL_CHANGE));
        assert_eq!(r.user_car_brand.as_deref(), Some("Chery"));
    }

    #[test]
    fn purchase_phrase() {
        let (r, rule) = run("хочу купить новый Chery", Some("Chery"), None, IntentResult::unknown());
        assert_eq!(rule, Some("purchase_phrase"));
        assert_eq!(r.intent, Intent::BuyNew);
        assert_eq!(r.confidence, Confidence::Medium);
        assert_eq!(r.target_brand.as_deref(), Some("Chery"));
    }

    #[test]
    fn purchase_suppressed_by_service_signal() {
        let (r, rule) = unknown("хочу купить и сразу пройти ремонт");
        assert_eq!(rule, Some("repair"));
        assert_eq!(r.intent, Intent::Repair);
    }

    #[test]
    fn bare_purchase_keeps_low_confidence() {
        let (r, rule) = unknown("купить");
        assert_eq!(rule, Some("bare_purchase"));
        assert_eq!(r.intent, Intent::BuyNew);
        assert_eq!(r.confidence, Confidence::Low);
    }

    #[test]
    fn accounting() {
        let (r, rule) = unknown("нужны закрывающие документы");
        assert_eq!(rule, Some("accounting"));
        assert_eq!(r.intent, Intent::Accounting);
    }

    #[test]
    fn bodywork_repair() {
        let (r, _) = unknown("поцарапал дверь");
        assert_eq!(r.intent, Intent::Repair);
        assert_eq!(r.confidence, Confidence::Medium);
        assert_eq!(r.slots.repair_type, Some(RepairType::Bodywork));
    }

    // ── gating ─────────────────────────────────────────────────

    #[test]
    fn confident_result_is_left_alone() {
        let start = IntentResult::new(Intent::Sell, Confidence::High);
        let (r, rule) = run("продам машину, нужны колодки", None, None, start.clone());
        assert_eq!(rule, None);
        assert_eq!(r, start);
    }

    #[test]
    fn confident_repair_gets_subtype() {
        let start = IntentResult::new(Intent::Repair, Confidence::High);
        let (r, rule) = run("помял крыло", None, None, start);
        assert_eq!(rule, Some("repair_subtype"));
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.slots.repair_type, Some(RepairType::Bodywork));
    }

    #[test]
    fn nothing_matches_small_talk() {
        let (r, rule) = unknown("добрый день");
        assert_eq!(rule, None);
        assert_eq!(r, IntentResult::unknown());
    }

    #[test]
    fn low_confidence_purchase_can_be_corrected() {
        let start = IntentResult::new(Intent::BuyNew, Confidence::Low);
        let (r, _) = run("нужен ремонт двигателя", None, None, start);
        assert_eq!(r.intent, Intent::Repair);
        assert_eq!(r.slots.repair_type, Some(RepairType::Workshop));
    }
}
