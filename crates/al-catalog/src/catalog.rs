//! Catalog provider abstraction and the loaded, read-only offer list.

use std::collections::BTreeSet;
use std::path::PathBuf;

use al_protocol::CarOffer;
use async_trait::async_trait;

use crate::error::{CatalogError, CatalogResult};
use crate::text::{normalize, words};

/// Supplies the full list of offers once at startup.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn load(&self) -> CatalogResult<Vec<CarOffer>>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

/// Reads a JSON array of offers from disk.
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogProvider for JsonFileCatalog {
    async fn load(&self) -> CatalogResult<Vec<CarOffer>> {
        let display = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CatalogError::NotFound(display.clone())
            } else {
                CatalogError::Io(format!("{display}: {e}"))
            }
        })?;
        serde_json::from_str(&content).map_err(|e| CatalogError::Parse(format!("{display}: {e}")))
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

/// Immutable list of eligible offers, shared by every conversation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    offers: Vec<CarOffer>,
}

impl Catalog {
    /// Normalizes records and drops the ones without power.
    pub fn new(offers: Vec<CarOffer>) -> Self {
        let total = offers.len();
        let offers: Vec<CarOffer> = offers
            .into_iter()
            .filter(CarOffer::is_eligible)
            .map(CarOffer::normalized)
            .collect();
        if offers.len() < total {
            tracing::warn!(dropped = total - offers.len(), "skipped catalog records without power");
        }
        Self { offers }
    }

    /// Load through a provider. An empty catalog is an error.
    pub async fn load(provider: &dyn CatalogProvider) -> CatalogResult<Self> {
        let catalog = Self::new(provider.load().await?);
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        tracing::info!(provider = provider.name(), offers = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn offers(&self) -> &[CarOffer] {
        &self.offers
    }

    pub fn get(&self, idx: usize) -> Option<&CarOffer> {
        self.offers.get(idx)
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// Offers whose brand is in `brands` (case-insensitive), in catalog order.
    pub fn in_brands<'a>(
        &'a self,
        brands: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a CarOffer> + 'a {
        self.offers.iter().filter(move |o| brand_allowed(brands, &o.brand))
    }

    /// Offers whose model is named in `text`.
    ///
    /// Either "brand model" occurs as a substring, or the model's tokens
    /// appear as a contiguous run of words (models of three or more
    /// characters only). When one matched model name contains another
    /// ("Tiggo 7 Pro Max" vs "Tiggo 7 Pro"), only the longer one is kept.
    pub fn find_models(&self, text: &str, brands: &BTreeSet<String>) -> Vec<CarOffer> {
        let lower = normalize(text);
        let tokens = words(&lower);

        let matched: Vec<&CarOffer> = self
            .in_brands(brands)
            .filter(|o| {
                let model = normalize(&o.model);
                let full = format!("{} {}", normalize(&o.brand), model);
                if lower.contains(&full) {
                    return true;
                }
                model.chars().count() > 2 && contains_run(&tokens, &words(&model))
            })
            .collect();

        let models: BTreeSet<String> = matched.iter().map(|o| normalize(&o.model)).collect();
        matched
            .into_iter()
            .filter(|o| {
                let model = normalize(&o.model);
                !models.iter().any(|other| other != &model && other.contains(&model))
            })
            .cloned()
            .collect()
    }
}

pub(crate) fn brand_allowed(brands: &BTreeSet<String>, brand: &str) -> bool {
    brands.iter().any(|b| b.eq_ignore_ascii_case(brand))
}

fn contains_run(tokens: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty() && tokens.windows(needle.len()).any(|w| w == needle)
}
