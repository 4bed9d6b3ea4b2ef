use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Delivery lead time assumed when a record carries none.
pub const DEFAULT_DELIVERY_DAYS: u32 = 14;

/// One sellable catalog record (a concrete trim in stock or on order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarOffer {
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub trim: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub drive: String,
    /// Transmission family as written in the price list ("АКПП", "Вариатор", ...).
    #[serde(default)]
    pub transmission: String,
    #[serde(default)]
    pub transmission_details: String,
    #[serde(default)]
    pub gears: Option<u8>,
    #[serde(default)]
    pub engine_type: String,
    pub power: u32,
    pub final_price: u64,
    #[serde(default)]
    pub base_price: Option<u64>,
    #[serde(default)]
    pub discount_tradein: u64,
    #[serde(default)]
    pub discount_credit: u64,
    #[serde(default)]
    pub discount_gov: u64,
    #[serde(default)]
    pub discount_other: u64,
    #[serde(default)]
    pub available_colors: BTreeSet<String>,
    #[serde(default)]
    pub delivery_days: Option<u32>,
}

impl CarOffer {
    /// "Brand Model".
    pub fn model_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    /// "Brand Model Trim".
    pub fn full_name(&self) -> String {
        if self.trim.is_empty() {
            self.model_name()
        } else {
            format!("{} {} {}", self.brand, self.model, self.trim)
        }
    }

    pub fn total_discount(&self) -> u64 {
        self.discount_tradein + self.discount_credit + self.discount_gov + self.discount_other
    }

    pub fn delivery_days_or_default(&self) -> u32 {
        self.delivery_days.unwrap_or(DEFAULT_DELIVERY_DAYS)
    }

    /// Power is mandatory for a record to be offered.
    pub fn is_eligible(&self) -> bool {
        self.power > 0
    }

    /// Substring match in either direction ("белый" vs "белый перламутр").
    pub fn has_color(&self, color: &str) -> bool {
        let wanted = normalize_color(color);
        self.available_colors
            .iter()
            .any(|c| c.contains(&wanted) || wanted.contains(c.as_str()))
    }

    /// Lower-cases colors and drops a base price that contradicts the final price.
    pub fn normalized(mut self) -> Self {
        self.available_colors = self
            .available_colors
            .iter()
            .map(|c| normalize_color(c))
            .filter(|c| !c.is_empty())
            .collect();
        if let Some(base) = self.base_price
            && base < self.final_price
        {
            self.base_price = None;
        }
        self
    }
}

fn normalize_color(color: &str) -> String {
    color.trim().to_lowercase().replace('ё', "е")
}
