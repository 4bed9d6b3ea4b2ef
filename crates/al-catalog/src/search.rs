//! Structural search with the degrade ladder and the optional semantic stage.
//!
//! Order of attempts for one query:
//! 1. semantic top-K + structural post-filter (only when an index exists
//!    and the query carries no transmission, gear or engine filter),
//! 2. strict structural filter,
//! 3. relaxed structural filter (wider price band, no drive filter,
//!    lower power floor, no gear count),
//! 4. the brand-restricted catalog itself.

use std::collections::BTreeSet;
use std::sync::Arc;

use al_protocol::CarOffer;
use serde::Deserialize;

use crate::catalog::{Catalog, brand_allowed};
use crate::semantic::SemanticIndex;
use crate::specs::SpecHints;
use crate::text::{matches_any, normalize};

/// Tunable constants for search and ranking.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchPolicy {
    /// Offers with power ≥ this share of the requested minimum pass.
    #[serde(default = "default_power_tolerance")]
    pub power_tolerance: f64,
    #[serde(default = "default_relax_price_max")]
    pub relax_price_max: f64,
    #[serde(default = "default_relax_price_min")]
    pub relax_price_min: f64,
    #[serde(default = "default_relax_power")]
    pub relax_power: f64,
    /// Ceiling multiplier when nothing fits under an exact price target.
    #[serde(default = "default_exact_band_relax")]
    pub exact_band_relax: f64,
    /// Half-width of the band around an approximate price target.
    #[serde(default = "default_approx_band")]
    pub approx_band: f64,
    /// Offers kept by distance when the approximate band is empty.
    #[serde(default = "default_approx_closest")]
    pub approx_closest: usize,
    /// Ceiling multiplier for searches driven by an approximate price.
    #[serde(default = "default_approx_ceiling")]
    pub approx_ceiling: f64,
    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,
    /// Brand fallback size when the query had no filters.
    #[serde(default = "default_fallback_pool")]
    pub fallback_pool: usize,
    /// Brand fallback size when the query had filters.
    #[serde(default = "default_fallback_pool_filtered")]
    pub fallback_pool_filtered: usize,
    /// Offers kept as conversation context after a search.
    #[serde(default = "default_max_cached")]
    pub max_cached: usize,
    #[serde(default = "default_delivery_days")]
    pub default_delivery_days: u32,
}

fn default_power_tolerance() -> f64 {
    0.9
}
fn default_relax_price_max() -> f64 {
    1.15
}
fn default_relax_price_min() -> f64 {
    0.9
}
fn default_relax_power() -> f64 {
    0.8
}
fn default_exact_band_relax() -> f64 {
    1.2
}
fn default_approx_band() -> f64 {
    0.10
}
fn default_approx_closest() -> usize {
    5
}
fn default_approx_ceiling() -> f64 {
    1.10
}
fn default_semantic_top_k() -> usize {
    50
}
fn default_fallback_pool() -> usize {
    10
}
fn default_fallback_pool_filtered() -> usize {
    5
}
fn default_max_cached() -> usize {
    5
}
fn default_delivery_days() -> u32 {
    al_protocol::DEFAULT_DELIVERY_DAYS
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            power_tolerance: default_power_tolerance(),
            relax_price_max: default_relax_price_max(),
            relax_price_min: default_relax_price_min(),
            relax_power: default_relax_power(),
            exact_band_relax: default_exact_band_relax(),
            approx_band: default_approx_band(),
            approx_closest: default_approx_closest(),
            approx_ceiling: default_approx_ceiling(),
            semantic_top_k: default_semantic_top_k(),
            fallback_pool: default_fallback_pool(),
            fallback_pool_filtered: default_fallback_pool_filtered(),
            max_cached: default_max_cached(),
            default_delivery_days: default_delivery_days(),
        }
    }
}

/// One catalog query. Empty `brands` matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub brands: BTreeSet<String>,
    pub body: Option<String>,
    pub drive: Option<String>,
    pub price_min: Option<u64>,
    pub price_max: Option<u64>,
    pub power_min: Option<u32>,
    pub transmission: Option<String>,
    pub gears: Option<u8>,
    pub engine_type: Option<String>,
    /// Original message, used for the semantic stage.
    pub text: String,
    /// Brand fallback prefers crossovers.
    pub prefer_crossovers: bool,
}

impl SearchQuery {
    pub fn new(brands: BTreeSet<String>, text: impl Into<String>) -> Self {
        Self {
            brands,
            text: text.into(),
            ..Self::default()
        }
    }

    /// Copy structural hints from a parsed message. The price becomes a
    /// ceiling (widened for approximate targets).
    pub fn with_hints(mut self, hints: &SpecHints, policy: &SearchPolicy) -> Self {
        self.body = hints.body.map(String::from).or(self.body);
        self.drive = hints.drive.map(String::from).or(self.drive);
        self.engine_type = hints.engine_type.map(String::from).or(self.engine_type);
        self.transmission = hints.transmission.map(String::from).or(self.transmission);
        self.gears = hints.gears.or(self.gears);
        self.power_min = hints.power_min.or(self.power_min);
        if let Some(price) = hints.price {
            self.price_max = Some(if hints.approximate {
                scale(price, policy.approx_ceiling)
            } else {
                price
            });
        }
        self
    }

    /// Transmission, gear count or engine type require exact matching.
    pub fn has_discrete_filters(&self) -> bool {
        self.transmission.is_some() || self.gears.is_some() || self.engine_type.is_some()
    }

    pub fn has_filters(&self) -> bool {
        self.has_discrete_filters()
            || self.body.as_deref().is_some_and(|b| !is_wildcard(b))
            || self.drive.is_some()
            || self.price_min.is_some()
            || self.price_max.is_some()
            || self.power_min.is_some()
    }

    fn relaxed(&self, policy: &SearchPolicy) -> Self {
        Self {
            price_max: self.price_max.map(|p| scale(p, policy.relax_price_max)),
            price_min: self.price_min.map(|p| scale(p, policy.relax_price_min)),
            power_min: self
                .power_min
                .map(|p| (f64::from(p) * policy.relax_power).round() as u32),
            drive: None,
            gears: None,
            ..self.clone()
        }
    }

    /// Structural predicate for one offer.
    pub fn matches(&self, offer: &CarOffer, policy: &SearchPolicy) -> bool {
        if !brand_allowed(&self.brands, &offer.brand) {
            return false;
        }
        if let Some(body) = &self.body
            && !is_wildcard(body)
            && normalize(&offer.body) != normalize(body)
        {
            return false;
        }
        if let Some(drive) = &self.drive
            && let Some(wanted) = DriveBucket::of(drive)
            && DriveBucket::of(&offer.drive) != Some(wanted)
        {
            return false;
        }
        if self.price_max.is_some_and(|max| offer.final_price > max) {
            return false;
        }
        if self.price_min.is_some_and(|min| offer.final_price < min) {
            return false;
        }
        if let Some(min) = self.power_min
            && f64::from(offer.power) < f64::from(min) * policy.power_tolerance
        {
            return false;
        }
        if let Some(transmission) = &self.transmission
            && let Some(wanted) = GearboxBucket::of(transmission)
            && !GearboxBucket::all(&format!("{} {}", offer.transmission, offer.transmission_details))
                .contains(&wanted)
        {
            return false;
        }
        if let Some(gears) = self.gears
            && offer.gears != Some(gears)
        {
            return false;
        }
        if let Some(engine) = &self.engine_type
            && !normalize(&offer.engine_type).contains(&normalize(engine))
        {
            return false;
        }
        true
    }
}

fn is_wildcard(body: &str) -> bool {
    matches!(normalize(body).as_str(), "любой" | "любая" | "any")
}

fn scale(value: u64, factor: f64) -> u64 {
    (value as f64 * factor).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveBucket {
    AllWheel,
    Front,
    Rear,
}

impl DriveBucket {
    fn of(text: &str) -> Option<Self> {
        let t = normalize(text);
        if matches_any(&t, &["полн", "4x4", "4х4", "awd", "4wd"]) {
            Some(Self::AllWheel)
        } else if matches_any(&t, &["передн", "fwd"]) {
            Some(Self::Front)
        } else if matches_any(&t, &["задн", "rwd"]) {
            Some(Self::Rear)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GearboxBucket {
    Manual,
    Automatic,
    Cvt,
    DualClutch,
}

const GEARBOX_KEYWORDS: &[(GearboxBucket, &[&str])] = &[
    (GearboxBucket::Cvt, &["вариатор", "cvt"]),
    (GearboxBucket::DualClutch, &["робот", "ркпп", "dct", "dsg"]),
    (GearboxBucket::Manual, &["мкпп", "механ", "manual"]),
    (GearboxBucket::Automatic, &["акпп", "автомат", "automatic"]),
];

impl GearboxBucket {
    /// The requested family: first keyword group that matches.
    fn of(text: &str) -> Option<Self> {
        let t = normalize(text);
        GEARBOX_KEYWORDS
            .iter()
            .find(|(_, words)| matches_any(&t, words))
            .map(|(bucket, _)| *bucket)
    }

    /// Every family an offer's description mentions ("Робот 7DCT").
    fn all(text: &str) -> Vec<Self> {
        let t = normalize(text);
        GEARBOX_KEYWORDS
            .iter()
            .filter(|(_, words)| matches_any(&t, words))
            .map(|(bucket, _)| *bucket)
            .collect()
    }
}

/// Which rung of the ladder produced the offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Semantic,
    Structural,
    Relaxed,
    BrandFallback,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub offers: Vec<CarOffer>,
    pub stage: SearchStage,
}

impl SearchOutcome {
    /// The literal query was satisfied (no relaxation).
    pub fn is_exact(&self) -> bool {
        matches!(self.stage, SearchStage::Semantic | SearchStage::Structural)
    }
}

/// Shared, read-only search over the catalog.
#[derive(Clone)]
pub struct SearchEngine {
    catalog: Arc<Catalog>,
    semantic: Option<Arc<SemanticIndex>>,
    policy: SearchPolicy,
}

impl SearchEngine {
    pub fn new(catalog: Arc<Catalog>, policy: SearchPolicy) -> Self {
        Self {
            catalog,
            semantic: None,
            policy,
        }
    }

    pub fn with_semantic(mut self, index: Arc<SemanticIndex>) -> Self {
        self.semantic = Some(index);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic.is_some()
    }

    /// Strict structural filter, in catalog order.
    pub fn structural(&self, query: &SearchQuery) -> Vec<CarOffer> {
        self.catalog
            .offers()
            .iter()
            .filter(|o| query.matches(o, &self.policy))
            .cloned()
            .collect()
    }

    /// Run the full ladder. Returns an empty list only when the brand
    /// restriction leaves nothing in the catalog.
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        if let Some(index) = &self.semantic
            && !query.has_discrete_filters()
            && !query.text.trim().is_empty()
        {
            match index.search(&query.text, self.policy.semantic_top_k).await {
                Ok(hits) => {
                    let offers: Vec<CarOffer> = hits
                        .into_iter()
                        .filter_map(|i| self.catalog.get(i))
                        .filter(|o| query.matches(o, &self.policy))
                        .cloned()
                        .collect();
                    if !offers.is_empty() {
                        tracing::debug!(found = offers.len(), "semantic search hit");
                        return SearchOutcome {
                            offers,
                            stage: SearchStage::Semantic,
                        };
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "semantic search failed, using structural search");
                }
            }
        }

        let strict = self.structural(query);
        if !strict.is_empty() {
            return SearchOutcome {
                offers: strict,
                stage: SearchStage::Structural,
            };
        }

        let relaxed = self.structural(&query.relaxed(&self.policy));
        if !relaxed.is_empty() {
            tracing::debug!(found = relaxed.len(), "relaxed search hit");
            return SearchOutcome {
                offers: relaxed,
                stage: SearchStage::Relaxed,
            };
        }

        tracing::debug!(brands = ?query.brands, "falling back to brand catalog");
        SearchOutcome {
            offers: self.brand_pool(query),
            stage: SearchStage::BrandFallback,
        }
    }

    fn brand_pool(&self, query: &SearchQuery) -> Vec<CarOffer> {
        let pool: Vec<&CarOffer> = self.catalog.in_brands(&query.brands).collect();
        if query.prefer_crossovers || !query.has_filters() {
            let crossovers: Vec<&CarOffer> = pool
                .iter()
                .copied()
                .filter(|o| matches!(normalize(&o.body).as_str(), "кроссовер" | "suv"))
                .collect();
            if !crossovers.is_empty() {
                return take_cloned(&crossovers, self.policy.fallback_pool);
            }
            return take_cloned(&pool, self.policy.fallback_pool);
        }
        take_cloned(&pool, self.policy.fallback_pool_filtered)
    }
}

fn take_cloned(offers: &[&CarOffer], n: usize) -> Vec<CarOffer> {
    offers.iter().take(n).map(|o| (*o).clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEmbedder, sample_catalog};
    use crate::semantic::SemanticIndex;
    use crate::specs::parse_specs;

    fn dealer() -> BTreeSet<String> {
        ["Chery", "Jetour", "Haval"].iter().map(|s| s.to_string()).collect()
    }

    fn engine() -> SearchEngine {
        SearchEngine::new(Arc::new(Catalog::new(sample_catalog())), SearchPolicy::default())
    }

    // ── structural filters ───────────────────────────────────────

    #[test]
    fn body_is_case_insensitive_and_any_is_wildcard() {
        let e = engine();
        let mut q = SearchQuery::new(dealer(), "");
        q.body = Some("СЕДАН".into());
        let found = e.structural(&q);
        assert!(!found.is_empty());
        assert!(found.iter().all(|o| o.body == "седан"));

        q.body = Some("любой".into());
        assert_eq!(e.structural(&q).len(), e.catalog().len());
    }

    #[test]
    fn drive_uses_buckets() {
        let e = engine();
        let mut q = SearchQuery::new(dealer(), "");
        q.drive = Some("полный привод".into());
        let found = e.structural(&q);
        assert!(!found.is_empty());
        assert!(found.iter().all(|o| o.drive == "4x4" || o.drive.contains("полн")));
    }

    #[test]
    fn power_has_tolerance() {
        let e = engine();
        let mut q = SearchQuery::new(dealer(), "");
        // 245 hp Jetour T2 passes a 270 hp floor at 90%.
        q.power_min = Some(270);
        let found = e.structural(&q);
        assert!(found.iter().any(|o| o.model == "T2"));
        assert!(found.iter().all(|o| o.power >= 243));
    }

    #[test]
    fn transmission_gears_and_engine() {
        let e = engine();
        let mut q = SearchQuery::new(dealer(), "");
        q.transmission = Some("мкпп".into());
        let found = e.structural(&q);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].model, "Tiggo 4 Pro");

        let mut q = SearchQuery::new(dealer(), "");
        q.transmission = Some("акпп".into());
        q.gears = Some(8);
        assert!(e.structural(&q).iter().all(|o| o.gears == Some(8)));

        let mut q = SearchQuery::new(dealer(), "");
        q.engine_type = Some("дизель".into());
        assert_eq!(e.structural(&q)[0].model, "Poer");
    }

    #[test]
    fn structural_is_deterministic() {
        let e = engine();
        let q = SearchQuery::new(dealer(), "кроссовер до 3 млн")
            .with_hints(&parse_specs("кроссовер до 3 млн"), e.policy());
        assert_eq!(e.structural(&q), e.structural(&q));
    }

    #[test]
    fn approximate_price_widens_ceiling() {
        let policy = SearchPolicy::default();
        let q = SearchQuery::new(dealer(), "").with_hints(&parse_specs("около 3 млн"), &policy);
        assert_eq!(q.price_max, Some(3_300_000));
    }

    // ── degrade ladder ───────────────────────────────────────────

    #[tokio::test]
    async fn strict_hit_is_structural() {
        let e = engine();
        let mut q = SearchQuery::new(dealer(), "");
        q.body = Some("седан".into());
        let out = e.search(&q).await;
        assert_eq!(out.stage, SearchStage::Structural);
        assert!(out.is_exact());
    }

    #[tokio::test]
    async fn relaxed_widens_price() {
        let e = engine();
        let mut q = SearchQuery::new(dealer(), "");
        // Cheapest offer is 1.8M; 1.6M * 1.15 = 1.84M.
        q.price_max = Some(1_600_000);
        let out = e.search(&q).await;
        assert_eq!(out.stage, SearchStage::Relaxed);
        assert!(out.offers.iter().all(|o| o.final_price <= 1_840_000));
    }

    #[tokio::test]
    async fn never_empty_for_non_empty_brand_set() {
        let e = engine();
        let mut q = SearchQuery::new(dealer(), "");
        q.body = Some("кабриолет".into());
        q.price_max = Some(100_000);
        let out = e.search(&q).await;
        assert_eq!(out.stage, SearchStage::BrandFallback);
        assert_eq!(out.offers.len(), 5);
    }

    #[tokio::test]
    async fn brand_fallback_prefers_crossovers() {
        let e = engine();
        let only_chery: BTreeSet<String> = ["Chery".to_string()].into();
        let mut q = SearchQuery::new(only_chery, "");
        q.prefer_crossovers = true;
        q.engine_type = Some("электро".into());
        let out = e.search(&q).await;
        assert_eq!(out.stage, SearchStage::BrandFallback);
        assert!(!out.offers.is_empty());
        assert!(out.offers.iter().all(|o| o.brand == "Chery" && o.body == "кроссовер"));
    }

    #[tokio::test]
    async fn empty_brand_set_finds_nothing() {
        let e = engine();
        let out = e.search(&SearchQuery::new(BTreeSet::new(), "что есть")).await;
        assert!(out.offers.is_empty());
    }

    // ── semantic stage ───────────────────────────────────────────

    #[tokio::test]
    async fn semantic_results_are_post_filtered() {
        let catalog = Arc::new(Catalog::new(sample_catalog()));
        let index = SemanticIndex::build(&catalog, Arc::new(MockEmbedder::new()), 10)
            .await
            .unwrap();
        let e = SearchEngine::new(catalog, SearchPolicy::default()).with_semantic(Arc::new(index));

        let mut q = SearchQuery::new(dealer(), "кроссовер полный привод");
        q.body = Some("кроссовер".into());
        let out = e.search(&q).await;
        assert_eq!(out.stage, SearchStage::Semantic);
        assert!(out.offers.iter().all(|o| o.body == "кроссовер"));
    }

    #[tokio::test]
    async fn discrete_filters_skip_semantic() {
        let catalog = Arc::new(Catalog::new(sample_catalog()));
        let embedder = Arc::new(MockEmbedder::new());
        let index = SemanticIndex::build(&catalog, embedder.clone(), 10).await.unwrap();
        let calls_after_build = embedder.calls();
        let e = SearchEngine::new(catalog, SearchPolicy::default()).with_semantic(Arc::new(index));

        let mut q = SearchQuery::new(dealer(), "на механике");
        q.transmission = Some("мкпп".into());
        let out = e.search(&q).await;
        assert_eq!(out.stage, SearchStage::Structural);
        assert_eq!(embedder.calls(), calls_after_build);
    }

    #[tokio::test]
    async fn failing_embedder_degrades_to_structural() {
        let catalog = Arc::new(Catalog::new(sample_catalog()));
        let embedder = Arc::new(MockEmbedder::new());
        let index = SemanticIndex::build(&catalog, embedder.clone(), 10).await.unwrap();
        embedder.set_failing(true);
        let e = SearchEngine::new(catalog, SearchPolicy::default()).with_semantic(Arc::new(index));

        let mut q = SearchQuery::new(dealer(), "седан");
        q.body = Some("седан".into());
        let out = e.search(&q).await;
        assert_eq!(out.stage, SearchStage::Structural);
        assert!(!out.offers.is_empty());
    }
}
