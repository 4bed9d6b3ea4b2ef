//! Delivery channel per lead: by intent, brand and repair type.

use std::collections::HashMap;
use std::sync::Arc;

use al_catalog::BrandMatcher;
use al_protocol::{Intent, Lead, RepairType};
use serde::Deserialize;

/// Channel ids per routing group (`[routing]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// New-car sales channel per dealer brand.
    #[serde(default = "default_dealer_channels")]
    pub dealer: HashMap<String, String>,
    /// Used cars: non-dealer purchases, used purchases, buyouts.
    #[serde(default = "default_used")]
    pub used: String,
    #[serde(default = "default_bodywork")]
    pub bodywork: String,
    /// Workshop repair for ecosystem brands.
    #[serde(default = "default_workshop_ecosystem")]
    pub workshop_ecosystem: String,
    #[serde(default = "default_workshop_other")]
    pub workshop_other: String,
    #[serde(default = "default_spares_ecosystem")]
    pub spares_ecosystem: String,
    #[serde(default = "default_spares_other")]
    pub spares_other: String,
    #[serde(default = "default_accounting")]
    pub accounting: String,
    /// Unrecognized requests.
    #[serde(default = "default_general")]
    pub general: String,
}

fn default_dealer_channels() -> HashMap<String, String> {
    [("Chery", "sales-chery"), ("Jetour", "sales-jetour"), ("Haval", "sales-haval")]
        .into_iter()
        .map(|(brand, channel)| (brand.to_string(), channel.to_string()))
        .collect()
}

fn default_used() -> String {
    "sales-used".into()
}
fn default_bodywork() -> String {
    "service-bodywork".into()
}
fn default_workshop_ecosystem() -> String {
    "service-chery".into()
}
fn default_workshop_other() -> String {
    "service-other".into()
}
fn default_spares_ecosystem() -> String {
    "spares-chery".into()
}
fn default_spares_other() -> String {
    "spares-other".into()
}
fn default_accounting() -> String {
    "accounting".into()
}
fn default_general() -> String {
    "general".into()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            dealer: default_dealer_channels(),
            used: default_used(),
            bodywork: default_bodywork(),
            workshop_ecosystem: default_workshop_ecosystem(),
            workshop_other: default_workshop_other(),
            spares_ecosystem: default_spares_ecosystem(),
            spares_other: default_spares_other(),
            accounting: default_accounting(),
            general: default_general(),
        }
    }
}

pub struct LeadRouter {
    config: RoutingConfig,
    brands: Arc<BrandMatcher>,
}

impl LeadRouter {
    pub fn new(config: RoutingConfig, brands: Arc<BrandMatcher>) -> Self {
        Self { config, brands }
    }

    /// Channel for `lead`, or `None` when the table has no entry for it.
    pub fn route(&self, lead: &Lead) -> Option<String> {
        let brand = lead.brand.as_deref();
        let ecosystem = brand.is_some_and(|b| self.brands.is_ecosystem(b));

        let channel = match lead.intent {
            Intent::BuyNew => match brand {
                Some(b) if self.brands.is_dealer(b) => self.dealer_channel(b),
                _ => Some(&self.config.used),
            },
            Intent::BuyUsed | Intent::Sell => Some(&self.config.used),
            Intent::Spares if ecosystem => Some(&self.config.spares_ecosystem),
            Intent::Spares => Some(&self.config.spares_other),
            Intent::Repair if lead.slots.repair_type == Some(RepairType::Bodywork) => {
                Some(&self.config.bodywork)
            }
            Intent::Repair if ecosystem => Some(&self.config.workshop_ecosystem),
            Intent::Repair => Some(&self.config.workshop_other),
            Intent::Accounting => Some(&self.config.accounting),
            Intent::Other | Intent::FallbackOther => Some(&self.config.general),
        };
        channel.filter(|c| !c.is_empty()).cloned()
    }

    /// Case-insensitive lookup in the dealer table.
    fn dealer_channel(&self, brand: &str) -> Option<&String> {
        self.config
            .dealer
            .iter()
            .find(|(b, _)| b.eq_ignore_ascii_case(brand))
            .map(|(_, channel)| channel)
    }
}
