//! Keyword families used by intent detection.
//!
//! All predicates take text already passed through
//! [`al_catalog::text::normalize`].

use al_catalog::text::{has_any_word, matches_any, words};
use al_protocol::RepairType;

/// Service, maintenance and parts vocabulary. Suppresses purchase shortcuts.
const SERVICE_WORDS: &[&str] = &[
    "ремонт", "сервис", "обслуж", "замен", "помен", "покрас", "кузов", "вмятин", "бампер",
    "крыло", "капот", "дверь", "диагност", "запчаст", "диск", "шин", "масло", "фильтр",
    "колодк", "свечи", "сто ", "переобу", "провести", "пройти",
];

/// Availability and price vocabulary that turns a dealer brand mention into a search.
const DEALER_SEARCH_WORDS: &[&str] = &[
    "какие", "есть", "наличи", "цен", "стоит", "сколько", "почем", "вариант", "модел",
];

/// Purchase verbs that, next to a brand, mean "sell me one".
const PURCHASE_TRIGGERS: &[&str] = &[
    "куп", "есть", "налич", "прод", "хочу", "брони", "интересует", "новый", "новая", "новое",
    "новую", "новых",
];

const PURCHASE_PHRASES: &[&str] = &[
    "хочу купить",
    "покупка",
    "нужен новый",
    "ищу новый",
    "хочу новый",
    "купить новый",
    "купить новую",
    "забронировать",
    "оформить",
];

const BARE_PURCHASE_WORDS: &[&str] = &["купить", "покупка"];

/// "Same as mine" phrasing: buy another car of the brand already owned.
const SAME_CAR_PHRASES: &[&str] = &["такой же", "такую же", "новую такую", "нового такого", "обновить"];

const SPARES_WORDS: &[&str] = &[
    "запчаст", "запчасть", "деталь", "детали", "колодк", "фильтр", "свеч", "диск", "шин",
    "аккумулятор", "ремень", "масло для", "антифриз", "амортизатор", "стойк", "рычаг",
    "подшипник", "сцеплени", "радиатор", "фар", "зеркал", "дворник", "щетк", "оригинал",
    "артикул", "каталог запчаст",
];

/// "Replace X" is a service job, not a parts order.
const REPLACE_WORDS: &[&str] = &["замен", "помен", "установ", "шиномонтаж", "переобу"];

const OIL_WORDS: &[&str] = &["масло", "масла", "маслом", "моторное масло", "замена масла"];

const ACCOUNTING_STEMS: &[&str] = &["бухгалтер", "документ", "оплат", "счет", "закрывающ"];
const ACCOUNTING_WORDS: &[&str] = &["акт", "акты", "акта", "актов", "акту", "инн", "кпп"];

const GENERAL_REPAIR_WORDS: &[&str] = &[
    "ремонт", "починить", "почин", "сломал", "сломан", "не работает", "неисправ", "сервис",
    "обслуж", "техобслуж", "диагност", "проверить", "посмотреть машину",
];

const WORKSHOP_WORDS: &[&str] = &[
    "двигател", "мотор", "подвеск", "ходов", "тормоз", "коробк", "кпп", "сцеплени", "стук",
    "шум", "вибрац", "масло", "фильтр", "свечи", "колодк", "электрик", "проводк", "генератор",
    "стартер", "кондиционер", "слесар",
];

const BODYWORK_WORDS: &[&str] = &[
    "кузов", "покрас", "вмятин", "царапин", "поцарап", "сколы", "скола", "ржавчин", "коррози", "рихтов",
    "полировк", "дтп", "авари", "помял", "удар",
];

const BODY_PARTS: &[&str] = &[
    "бампер", "крыло", "крыла", "капот", "дверь", "двери", "багажник", "порог", "крыш",
    "стекло", "фара", "фару",
];

const OWNERSHIP_PHRASES: &[&str] = &[
    "у меня",
    "езжу на",
    "владею",
    "мой автомобиль",
    "моя машина",
    "мою машину",
    "мой авто",
];

/// Detail strings attached to repair slots.
pub const DETAILS_OIL_CHANGE: &str = "замена масла в двигателе";
pub const DETAILS_BODYWORK: &str = "кузовной ремонт";
pub const DETAILS_BODY_PART: &str = "замена кузовной детали";
pub const DETAILS_MAINTENANCE: &str = "техническое обслуживание";
pub const DETAILS_WORKSHOP: &str = "слесарный ремонт";
pub const DETAILS_REPLACEMENT: &str = "замена детали";

/// "ТО" (scheduled maintenance) as a standalone word. Hyphenated
/// particles ("что-то", "где-то") don't count.
pub fn has_maintenance_word(lower: &str) -> bool {
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .any(|w| w == "то")
}

pub fn has_service_signal(lower: &str) -> bool {
    matches_any(lower, SERVICE_WORDS) || has_maintenance_word(lower)
}

pub fn has_dealer_search_words(lower: &str) -> bool {
    matches_any(lower, DEALER_SEARCH_WORDS)
}

pub fn has_purchase_trigger(lower: &str) -> bool {
    matches_any(lower, PURCHASE_TRIGGERS)
}

pub fn has_purchase_phrase(lower: &str) -> bool {
    matches_any(lower, PURCHASE_PHRASES)
}

pub fn has_bare_purchase_word(lower: &str) -> bool {
    matches_any(lower, BARE_PURCHASE_WORDS)
}

pub fn wants_same_car(lower: &str) -> bool {
    matches_any(lower, SAME_CAR_PHRASES)
}

pub fn has_replace_word(lower: &str) -> bool {
    matches_any(lower, REPLACE_WORDS)
}

pub fn is_spares_request(lower: &str) -> bool {
    matches_any(lower, SPARES_WORDS) && !has_replace_word(lower)
}

pub fn is_oil_change(lower: &str) -> bool {
    matches_any(lower, OIL_WORDS)
}

pub fn is_accounting(lower: &str) -> bool {
    has_any_word(lower, ACCOUNTING_WORDS)
        || words(lower)
            .iter()
            .any(|w| ACCOUNTING_STEMS.iter().any(|s| w.starts_with(s)))
}

pub fn mentions_ownership(lower: &str) -> bool {
    matches_any(lower, OWNERSHIP_PHRASES)
}

/// Any repair vocabulary at all.
pub fn has_repair_vocabulary(lower: &str) -> bool {
    matches_any(lower, GENERAL_REPAIR_WORDS)
        || matches_any(lower, WORKSHOP_WORDS)
        || matches_any(lower, BODYWORK_WORDS)
        || matches_any(lower, BODY_PARTS)
        || has_maintenance_word(lower)
}

/// Workshop vs bodywork, with a short description of the job.
///
/// Bodywork wins when bodywork words appear, or when a body part is
/// mentioned together with a replacement verb.
pub fn classify_repair(lower: &str) -> (Option<RepairType>, Option<&'static str>) {
    let replace = has_replace_word(lower);
    if matches_any(lower, BODYWORK_WORDS) {
        return (Some(RepairType::Bodywork), Some(DETAILS_BODYWORK));
    }
    if matches_any(lower, BODY_PARTS) {
        let details = if replace { DETAILS_BODY_PART } else { DETAILS_BODYWORK };
        return (Some(RepairType::Bodywork), Some(details));
    }
    if has_maintenance_word(lower) {
        return (Some(RepairType::Workshop), Some(DETAILS_MAINTENANCE));
    }
    if matches_any(lower, WORKSHOP_WORDS) {
        return (Some(RepairType::Workshop), Some(DETAILS_WORKSHOP));
    }
    if replace {
        return (Some(RepairType::Workshop), Some(DETAILS_REPLACEMENT));
    }
    (None, None)
}
