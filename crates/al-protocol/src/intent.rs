use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the user wants from the dealership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BuyNew,
    BuyUsed,
    Sell,
    Repair,
    Spares,
    Accounting,
    #[default]
    Other,
    /// Classification gave up; a human follows up on the phone.
    FallbackOther,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::BuyNew => "buy_new",
            Intent::BuyUsed => "buy_used",
            Intent::Sell => "sell",
            Intent::Repair => "repair",
            Intent::Spares => "spares",
            Intent::Accounting => "accounting",
            Intent::Other => "other",
            Intent::FallbackOther => "fallback_other",
        }
    }

    /// Label used in manager notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::BuyNew => "Покупка НОВОГО",
            Intent::BuyUsed => "Покупка С ПРОБЕГОМ",
            Intent::Sell => "Продажа (выкуп)",
            Intent::Repair => "Сервис/Ремонт",
            Intent::Spares => "Запчасти",
            Intent::Accounting => "Бухгалтерия",
            Intent::Other => "Другое",
            Intent::FallbackOther => "Непонятный запрос (требует уточнения)",
        }
    }

    pub fn is_purchase(&self) -> bool {
        matches!(self, Intent::BuyNew | Intent::BuyUsed)
    }

    /// Intents that concern a car the user already owns.
    pub fn is_owned_car(&self) -> bool {
        matches!(self, Intent::Repair | Intent::Spares | Intent::Sell)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown intent: {0}")]
pub struct UnknownIntent(pub String);

impl FromStr for Intent {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy_new" => Ok(Intent::BuyNew),
            "buy_used" => Ok(Intent::BuyUsed),
            "sell" => Ok(Intent::Sell),
            "repair" => Ok(Intent::Repair),
            "spares" => Ok(Intent::Spares),
            "accounting" => Ok(Intent::Accounting),
            "other" => Ok(Intent::Other),
            "fallback_other" => Ok(Intent::FallbackOther),
            other => Err(UnknownIntent(other.to_string())),
        }
    }
}

/// Coarse classifier certainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl FromStr for Confidence {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(UnknownIntent(other.to_string())),
        }
    }
}

/// Workshop (engine, suspension, maintenance) versus bodywork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairType {
    #[serde(alias = "слесарный")]
    Workshop,
    #[serde(alias = "кузовной")]
    Bodywork,
}

impl RepairType {
    pub fn label(&self) -> &'static str {
        match self {
            RepairType::Workshop => "слесарный",
            RepairType::Bodywork => "кузовной",
        }
    }

    /// Accepts both the English and the Russian spelling.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        if lower.starts_with("слесар") || lower == "workshop" {
            Some(RepairType::Workshop)
        } else if lower.starts_with("кузов") || lower == "bodywork" {
            Some(RepairType::Bodywork)
        } else {
            None
        }
    }
}

/// Named pieces of information collected during the dialogue.
///
/// Absent means unknown. Merging only ever fills or overwrites keys that the
/// incoming side actually carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_type: Option<RepairType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_model: Option<String>,
    /// Concrete model picked from the catalog (direct model match).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Slots {
    pub fn merge(&mut self, other: Slots) {
        if other.budget_max.is_some() {
            self.budget_max = other.budget_max;
        }
        if other.body.is_some() {
            self.body = other.body;
        }
        if other.drive.is_some() {
            self.drive = other.drive;
        }
        if other.repair_type.is_some() {
            self.repair_type = other.repair_type;
        }
        if other.repair_details.is_some() {
            self.repair_details = other.repair_details;
        }
        if other.raw_model.is_some() {
            self.raw_model = other.raw_model;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Slots::default()
    }
}

/// One turn's classification, merged into the session by the dialogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    #[serde(default)]
    pub target_brand: Option<String>,
    #[serde(default)]
    pub user_car_brand: Option<String>,
    #[serde(default)]
    pub slots: Slots,
    #[serde(default)]
    pub confidence: Confidence,
}

impl IntentResult {
    /// The degraded result used whenever classification is unavailable.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(intent: Intent, confidence: Confidence) -> Self {
        Self {
            intent,
            confidence,
            ..Self::default()
        }
    }

    /// Whether heuristic repair rules may override this result.
    pub fn is_uncertain(&self) -> bool {
        self.intent == Intent::Other || self.confidence == Confidence::Low
    }

    pub fn brand(&self) -> Option<&str> {
        self.target_brand
            .as_deref()
            .or(self.user_car_brand.as_deref())
    }
}
