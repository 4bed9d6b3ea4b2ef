//! Intent resolution: local shortcuts first, then the classifier plus rules.
//!
//! Stage order:
//! 1. service pre-scan (suppresses every purchase shortcut below)
//! 2. catalog model names
//! 3. dealer brand + availability/price vocabulary
//! 4. any brand + purchase verb
//! 5. spec or "find me something" query
//! 6. classifier, brand canonicalization, correction rules, context carry-over

use std::collections::BTreeSet;
use std::sync::Arc;

use al_catalog::specs::{is_expensive_query, is_power_query, is_search_query};
use al_catalog::text::normalize;
use al_catalog::{BrandMatcher, SearchEngine};
use al_protocol::{CarOffer, Intent, IntentResult};

use super::IntentClassifier;
use super::rules::{RULES, Rule, RuleContext, apply_rules};
use super::signals::{has_dealer_search_words, has_purchase_trigger, has_service_signal, wants_same_car};

/// Where a message should go next.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The message names catalog models (dealer brands only).
    ModelMatch { offers: Vec<CarOffer> },
    /// A dealer brand together with availability or price questions.
    DealerSearch { brand: String },
    /// A brand together with a purchase verb.
    Purchase { brand: String, dealer: bool },
    /// A spec query or generic "what do you have". `brand` is whatever
    /// brand the text names, dealer or not.
    SpecSearch { brand: Option<String> },
    /// Nothing local fired; the classifier (and rules) decided.
    Classified(Classification),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub result: IntentResult,
    /// Canonical brand named in the message, if any.
    pub text_brand: Option<String>,
    /// Correction rule that changed the classifier's answer.
    pub rule: Option<&'static str>,
}

impl Classification {
    /// The effective intent after rules.
    pub fn intent(&self) -> Intent {
        self.result.intent
    }
}

pub struct IntentPipeline {
    brands: Arc<BrandMatcher>,
    search: Arc<SearchEngine>,
    classifier: Arc<dyn IntentClassifier>,
    rules: &'static [Rule],
    dealer_brands: BTreeSet<String>,
}

impl IntentPipeline {
    pub fn new(brands: Arc<BrandMatcher>, search: Arc<SearchEngine>, classifier: Arc<dyn IntentClassifier>) -> Self {
        let dealer_brands = brands.dealer_brands();
        Self {
            brands,
            search,
            classifier,
            rules: RULES,
            dealer_brands,
        }
    }

    /// Resolve one message. `known_car_brand` is the owned-car brand the
    /// session already holds.
    pub async fn resolve(&self, text: &str, known_car_brand: Option<&str>) -> Resolution {
        let lower = normalize(text);
        let text_brand = self.brands.find_brand(text).map(String::from);

        if !has_service_signal(&lower)
            && let Some(resolution) = self.shortcut(text, &lower, text_brand.as_deref())
        {
            tracing::debug!(resolution = ?ResolutionKind::from(&resolution), "intent shortcut");
            return resolution;
        }

        Resolution::Classified(self.classify(text, &lower, text_brand, known_car_brand).await)
    }

    fn shortcut(&self, text: &str, lower: &str, text_brand: Option<&str>) -> Option<Resolution> {
        let offers = self.search.catalog().find_models(text, &self.dealer_brands);
        if !offers.is_empty() {
            return Some(Resolution::ModelMatch { offers });
        }

        let search_like = is_search_query(text) || is_expensive_query(text) || is_power_query(text);

        if let Some(brand) = text_brand {
            let dealer = self.brands.is_dealer(brand);
            if dealer && (search_like || has_dealer_search_words(lower)) {
                return Some(Resolution::DealerSearch {
                    brand: brand.to_string(),
                });
            }
            if has_purchase_trigger(lower) {
                return Some(Resolution::Purchase {
                    brand: brand.to_string(),
                    dealer,
                });
            }
        }

        search_like.then(|| Resolution::SpecSearch {
            brand: text_brand.map(String::from),
        })
    }

    async fn classify(
        &self,
        text: &str,
        lower: &str,
        text_brand: Option<String>,
        known_car_brand: Option<&str>,
    ) -> Classification {
        let mut result = self.classifier.classify(text).await;
        tracing::debug!(
            classifier = self.classifier.name(),
            intent = %result.intent,
            confidence = ?result.confidence,
            "classified"
        );

        result.target_brand = self.canonical(result.target_brand.take());
        result.user_car_brand = self.canonical(result.user_car_brand.take());

        if result.target_brand.is_none()
            && result.user_car_brand.is_none()
            && let Some(brand) = &text_brand
        {
            if result.intent.is_purchase() {
                result.target_brand = Some(brand.clone());
            } else if result.intent.is_owned_car() {
                result.user_car_brand = Some(brand.clone());
            }
        }

        if result.intent.is_purchase() && result.target_brand.is_none() && wants_same_car(lower) {
            result.target_brand = known_car_brand.map(String::from);
        }

        let ctx = RuleContext::new(lower, text_brand.as_deref(), known_car_brand);
        let rule = apply_rules(self.rules, &mut result, &ctx);

        if result.intent.is_owned_car() && result.user_car_brand.is_none() {
            result.user_car_brand = known_car_brand.map(String::from);
        }

        Classification {
            result,
            text_brand,
            rule,
        }
    }

    /// Classifier brands in gazetteer spelling; unknown names pass through.
    fn canonical(&self, brand: Option<String>) -> Option<String> {
        let brand = brand?;
        Some(
            self.brands
                .canonicalize(&brand)
                .map(String::from)
                .unwrap_or(brand),
        )
    }
}

/// Payload-free view of a resolution for logs.
#[derive(Debug)]
enum ResolutionKind {
    ModelMatch,
    DealerSearch,
    Purchase,
    SpecSearch,
    Classified,
}

impl From<&Resolution> for ResolutionKind {
    fn from(r: &Resolution) -> Self {
        match r {
            Resolution::ModelMatch { .. } => ResolutionKind::ModelMatch,
            Resolution::DealerSearch { .. } => ResolutionKind::DealerSearch,
            Resolution::Purchase { .. } => ResolutionKind::Purchase,
            Resolution::SpecSearch { .. } => ResolutionKind::SpecSearch,
            Resolution::Classified(_) => ResolutionKind::Classified,
        }
    }
}
