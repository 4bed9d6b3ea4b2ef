//! Per-user conversation state.

use std::fmt;

use al_protocol::{CarOffer, Confidence, Intent, IntentResult, Slots};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exactly one is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Greeting,
    DetectIntent,
    CollectBrand,
    CollectSpecs,
    CollectRepairType,
    CollectPhone,
    Confirm,
    ConfirmFinal,
    /// Search and refinement loop.
    NonDealerChoice,
    Finished,
}

impl DialogueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogueState::Greeting => "greeting",
            DialogueState::DetectIntent => "detect_intent",
            DialogueState::CollectBrand => "collect_brand",
            DialogueState::CollectSpecs => "collect_specs",
            DialogueState::CollectRepairType => "collect_repair_type",
            DialogueState::CollectPhone => "collect_phone",
            DialogueState::Confirm => "confirm",
            DialogueState::ConfirmFinal => "confirm_final",
            DialogueState::NonDealerChoice => "non_dealer_choice",
            DialogueState::Finished => "finished",
        }
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question the bot asked that the next message answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    /// "Do you want to buy a {brand} or something else?"
    ConfirmTargetBrand { brand: String },
    /// Purchase without type: the brand answer may also say new or used.
    ChooseNewOrUsed,
    /// "Your car is a {brand}?" after a preset repair job.
    ConfirmCarBrand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub state: DialogueState,
    #[serde(default)]
    pub pending: Option<PendingAction>,
    #[serde(default)]
    pub name: Option<String>,
    /// Canonical `+7XXXXXXXXXX`.
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub confidence: Confidence,
    /// Brand the user wants to buy.
    #[serde(default)]
    pub target_brand: Option<String>,
    /// Brand the user already owns.
    #[serde(default)]
    pub user_car_brand: Option<String>,
    #[serde(default)]
    pub slots: Slots,
    #[serde(default)]
    pub phone_attempts: u32,
    #[serde(default)]
    pub specs_retry: u32,
    #[serde(default)]
    pub fallback_retry: u32,
    #[serde(default)]
    pub non_dealer_brand: Option<String>,
    #[serde(default)]
    pub non_dealer_notice_sent: bool,
    #[serde(default)]
    pub last_search_results: Vec<CarOffer>,
    #[serde(default)]
    pub last_variant_idx: Option<usize>,
    #[serde(default)]
    pub last_price_max: Option<u64>,
    /// Store version this snapshot was read at. 0 = never stored.
    #[serde(default)]
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: DialogueState::Greeting,
            pending: None,
            name: None,
            phone: None,
            intent: Intent::Other,
            confidence: Confidence::Low,
            target_brand: None,
            user_car_brand: None,
            slots: Slots::default(),
            phone_attempts: 0,
            specs_retry: 0,
            fallback_retry: 0,
            non_dealer_brand: None,
            non_dealer_notice_sent: false,
            last_search_results: Vec::new(),
            last_variant_idx: None,
            last_price_max: None,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Clear everything except identity and store version. With
    /// `keep_contact`, name and phone survive too.
    pub fn reset(&mut self, keep_contact: bool) {
        let mut fresh = Session::new(std::mem::take(&mut self.user_id));
        fresh.version = self.version;
        if keep_contact {
            fresh.name = self.name.take();
            fresh.phone = self.phone.take();
        }
        *self = fresh;
    }

    pub fn display_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }

    pub fn has_phone(&self) -> bool {
        self.phone.is_some()
    }

    /// Brand used for summaries and leads.
    pub fn lead_brand(&self) -> Option<&str> {
        self.target_brand
            .as_deref()
            .or(self.user_car_brand.as_deref())
    }

    /// Fold a classification in. Brands and slots only overwrite when the
    /// result carries a value.
    pub fn apply_intent(&mut self, result: &IntentResult) {
        self.intent = result.intent;
        self.confidence = result.confidence;
        if let Some(brand) = &result.target_brand {
            self.target_brand = Some(brand.clone());
        }
        if let Some(brand) = &result.user_car_brand {
            self.user_car_brand = Some(brand.clone());
        }
        self.slots.merge(result.slots.clone());
    }

    /// Replace the result cache and forget the selected variant.
    pub fn cache_results(&mut self, offers: &[CarOffer], max: usize) {
        self.last_search_results = offers.iter().take(max).cloned().collect();
        self.last_variant_idx = None;
    }

    /// The selected cached offer, or the first one.
    pub fn current_offer(&self) -> Option<(usize, &CarOffer)> {
        if self.last_search_results.is_empty() {
            return None;
        }
        let idx = self
            .last_variant_idx
            .unwrap_or(0)
            .min(self.last_search_results.len() - 1);
        Some((idx, &self.last_search_results[idx]))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
