//! Free-text car-spec parser.
//!
//! Extracts structured search hints (body, drive, engine, transmission,
//! gear count, price target, minimum power) from a user message, plus the
//! coarse "search-like" / "power" / "expensive" signals used for routing
//! and ranking. The first keyword family that matches wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::phone::normalize_phone;
use crate::text::{collapse_digit_groups, has_any_word, matches_any, normalize};

/// Budget used when the user explicitly has no ceiling.
pub const UNLIMITED_BUDGET: u64 = 100_000_000;

/// Grouped or bare numbers outside this range are not read as prices.
const PLAIN_PRICE_MIN: u64 = 500_000;
const PLAIN_PRICE_MAX: u64 = 30_000_000;

/// Plausible horsepower range for "от 150" style mentions.
const POWER_MIN: u32 = 50;
const POWER_MAX: u32 = 800;

/// Minimum bare number accepted as a budget answer.
const BUDGET_FLOOR: f64 = 100_000.0;

const BODY_KEYWORDS: &[(&str, &[&str])] = &[
    ("кроссовер", &["кроссовер", "кросс", "suv", "внедорожник", "джип", "паркетник"]),
    ("седан", &["седан", "sedan"]),
    ("хэтчбек", &["хэтчбек", "хетчбек", "hatchback", "хетч"]),
    ("универсал", &["универсал", "wagon", "вагон"]),
    ("пикап", &["пикап", "pickup"]),
    ("купе", &["купе", "coupe"]),
    ("кабриолет", &["кабриолет", "cabriolet", "кабрио"]),
    ("лифтбек", &["лифтбек", "liftback"]),
    ("минивэн", &["минивэн", "minivan", "вэн"]),
];

const DRIVE_KEYWORDS: &[(&str, &[&str])] = &[
    ("4x4", &["полный привод", "полноприводн", "4x4", "4х4", "awd", "4wd", "полный", "полном"]),
    ("передний", &["передний привод", "переднеприводн", "передний", "переднем", "fwd"]),
    ("задний", &["задний привод", "заднеприводн", "задний", "заднем", "rwd"]),
];

const ENGINE_KEYWORDS: &[(&str, &[&str])] = &[
    ("бензин", &["бензин", "бензиновый"]),
    ("дизель", &["дизель", "дизельный", "солярк"]),
    ("гибрид", &["гибрид", "hybrid"]),
    ("электро", &["электро", "electric"]),
];

/// Engine aliases too short to match as substrings.
const ENGINE_WORDS: &[(&str, &[&str])] = &[("дизель", &["дт", "dt"]), ("электро", &["ev"])];

const TRANSMISSION_KEYWORDS: &[(&str, &[&str])] = &[
    ("мкпп", &["механик", "механическ", "мкпп", "ручка", "manual"]),
    ("акпп", &["автомат", "акпп", "automatic", "гидротрансформатор"]),
    ("вариатор", &["вариатор", "cvt", "бесступенчат"]),
    ("робот", &["робот", "dsg", "dct", "ркпп"]),
];

const APPROXIMATE_WORDS: &[&str] = &[
    "около", "примерно", "где-то", "где то", "порядка", "районе", "плюс минус", "+-", "~",
];

const SEARCH_PHRASES: &[&str] = &[
    "что есть",
    "что можете предложить",
    "подобрать",
    "подбери",
    "найди",
    "альтернатив",
    "варианты",
    "посоветуй",
    "какие есть",
    "в наличии",
    "хочу купить",
    "ищу машину",
    "нужна машина",
    "покажи",
];

const POWER_WORDS: &[&str] = &["мощн", "быстр", "динамич", "лошад", "сил", "спорт", "разгон"];

const EXPENSIVE_WORDS: &[&str] = &[
    "дорог",
    "дороже",
    "максимальная цена",
    "подороже",
    "самый дорогой",
    "топ комплектаци",
    "full",
    "фулл",
];

const BUDGET_SKIP_PHRASES: &[&str] = &[
    "неважно",
    "не важно",
    "любой",
    "любая",
    "пропусти",
    "далее",
    "без разницы",
    "потом",
    "не знаю",
];

static MILLIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:млн|миллион|лям)").expect("valid regex"));
static KK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*кк").expect("valid regex"));
static GROUPED_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}(?:[ .]\d{3}){1,3}\b|\b\d{5,9}\b").expect("valid regex")
});
static GEARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*-?\s*(?:ступ\p{L}*|ст)\b").expect("valid regex"));
static POWER_FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"от\s*(\d{2,3})\b(\s*(?:тыс|т\.|млн|к\b))?").expect("valid regex"));
static POWER_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{2,3})\s*(?:л\.?\s?с|сил|hp|лошад)").expect("valid regex")
});
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid regex"));

/// Structured hints extracted from one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecHints {
    pub body: Option<&'static str>,
    pub drive: Option<&'static str>,
    pub engine_type: Option<&'static str>,
    pub transmission: Option<&'static str>,
    pub gears: Option<u8>,
    /// Price target in rubles.
    pub price: Option<u64>,
    /// The price was hedged ("около 3 млн").
    pub approximate: bool,
    pub power_min: Option<u32>,
}

impl SpecHints {
    /// Any structural filter present.
    pub fn has_filters(&self) -> bool {
        self.body.is_some()
            || self.drive.is_some()
            || self.engine_type.is_some()
            || self.transmission.is_some()
            || self.gears.is_some()
            || self.price.is_some()
            || self.power_min.is_some()
    }
}

/// Parse body, drive, engine, transmission, gears, price and power hints.
pub fn parse_specs(text: &str) -> SpecHints {
    let lower = normalize(text);

    SpecHints {
        body: first_family(&lower, BODY_KEYWORDS),
        drive: first_family(&lower, DRIVE_KEYWORDS),
        engine_type: first_family(&lower, ENGINE_KEYWORDS).or_else(|| {
            ENGINE_WORDS
                .iter()
                .find(|(_, words)| has_any_word(&lower, words))
                .map(|(name, _)| *name)
        }),
        transmission: first_family(&lower, TRANSMISSION_KEYWORDS),
        gears: GEARS_RE
            .captures(&lower)
            .and_then(|c| c[1].parse::<u8>().ok())
            .filter(|g| (2..=10).contains(g)),
        price: if normalize_phone(&lower).is_some() {
            None
        } else {
            parse_price(&lower)
        },
        approximate: matches_any(&lower, APPROXIMATE_WORDS),
        power_min: parse_power(&lower),
    }
}

fn first_family(lower: &str, families: &[(&'static str, &[&str])]) -> Option<&'static str> {
    families
        .iter()
        .find(|(_, keywords)| matches_any(lower, keywords))
        .map(|(name, _)| *name)
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}

fn parse_price(lower: &str) -> Option<u64> {
    for re in [&*MILLIONS_RE, &*KK_RE] {
        if let Some(value) = re.captures(lower).and_then(|c| parse_decimal(&c[1])) {
            return Some((value * 1_000_000.0).round() as u64);
        }
    }

    GROUPED_NUMBER_RE.find_iter(lower).find_map(|m| {
        let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
        digits
            .parse::<u64>()
            .ok()
            .filter(|v| (PLAIN_PRICE_MIN..=PLAIN_PRICE_MAX).contains(v))
    })
}

fn parse_power(lower: &str) -> Option<u32> {
    let plausible = |v: &u32| *v > POWER_MIN && *v < POWER_MAX;

    let from = POWER_FROM_RE
        .captures_iter(lower)
        .filter(|c| c.get(2).is_none())
        .filter_map(|c| c[1].parse::<u32>().ok())
        .find(plausible);
    if from.is_some() {
        return from;
    }

    POWER_UNIT_RE
        .captures_iter(lower)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .find(plausible)
}

/// The message reads like a request to browse the catalog.
pub fn is_search_query(text: &str) -> bool {
    parse_specs(text).has_filters() || matches_any(&normalize(text), SEARCH_PHRASES)
}

/// The user asks for the most powerful options.
pub fn is_power_query(text: &str) -> bool {
    matches_any(&normalize(text), POWER_WORDS)
}

/// The user asks for the most expensive or best-equipped options.
pub fn is_expensive_query(text: &str) -> bool {
    matches_any(&normalize(text), EXPENSIVE_WORDS)
}

/// A reply to "up to what amount?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetAnswer {
    Max(u64),
    /// "неважно", "без разницы", ...
    Unlimited,
}

impl BudgetAnswer {
    /// Value stored in the budget slot.
    pub fn ceiling(&self) -> u64 {
        match self {
            BudgetAnswer::Max(v) => *v,
            BudgetAnswer::Unlimited => UNLIMITED_BUDGET,
        }
    }
}

/// Parse a budget answer: "до 2.5 млн", "2 500 000 рублей", "неважно".
pub fn parse_budget(text: &str) -> Option<BudgetAnswer> {
    let lower = normalize(text);

    if let Some(value) = MILLIONS_RE
        .captures(&lower)
        .and_then(|c| parse_decimal(&c[1]))
    {
        return Some(BudgetAnswer::Max((value * 1_000_000.0).round() as u64));
    }

    let collapsed = collapse_digit_groups(&lower);
    let plain = NUMBER_RE
        .find_iter(&collapsed)
        .filter_map(|m| parse_decimal(m.as_str()))
        .find(|v| *v > BUDGET_FLOOR);
    if let Some(value) = plain {
        return Some(BudgetAnswer::Max(value.round() as u64));
    }

    if matches_any(&lower, BUDGET_SKIP_PHRASES) || has_any_word(&lower, &["нет"]) {
        return Some(BudgetAnswer::Unlimited);
    }
    None
}
