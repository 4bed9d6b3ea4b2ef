//! Top-3 offer selection: narrow to a price band, then pick by strategy.

use std::collections::HashSet;

use al_protocol::CarOffer;

use crate::search::SearchPolicy;
use crate::specs::{is_expensive_query, is_power_query};

const TOP_N: usize = 3;

/// How to choose three offers out of the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankStrategy {
    /// Most powerful distinct models.
    PowerDesc,
    /// Most expensive distinct (model, trim) pairs.
    PriceDesc,
    /// Two cheapest plus the most expensive, distinct models.
    #[default]
    PriceMix,
}

impl RankStrategy {
    /// Strategy implied by the wording of a request.
    pub fn for_text(text: &str) -> Self {
        if is_power_query(text) {
            RankStrategy::PowerDesc
        } else if is_expensive_query(text) {
            RankStrategy::PriceDesc
        } else {
            RankStrategy::PriceMix
        }
    }
}

/// User's price target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTarget {
    pub amount: u64,
    pub approximate: bool,
}

/// At most three offers, never repeating a model (`PowerDesc`, `PriceMix`)
/// or a (model, trim) pair (`PriceDesc`).
pub fn pick_top3_offers(
    candidates: &[CarOffer],
    target: Option<PriceTarget>,
    strategy: RankStrategy,
    policy: &SearchPolicy,
) -> Vec<CarOffer> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut pool = match target {
        Some(t) => price_band(candidates, t, policy),
        None => Vec::new(),
    };
    if pool.is_empty() {
        pool = candidates.iter().collect();
    }

    match strategy {
        RankStrategy::PowerDesc => {
            pool.sort_by(|a, b| b.power.cmp(&a.power).then(a.final_price.cmp(&b.final_price)));
            distinct_by(pool, |o| o.model.clone(), TOP_N)
        }
        RankStrategy::PriceDesc => {
            pool.sort_by(|a, b| b.final_price.cmp(&a.final_price));
            distinct_by(pool, |o| format!("{}\u{1f}{}", o.model, o.trim), TOP_N)
        }
        RankStrategy::PriceMix => price_mix(pool),
    }
}

fn price_band<'a>(candidates: &'a [CarOffer], target: PriceTarget, policy: &SearchPolicy) -> Vec<&'a CarOffer> {
    let amount = target.amount as f64;
    if target.approximate {
        let lower = amount * (1.0 - policy.approx_band);
        let upper = amount * (1.0 + policy.approx_band);
        let band: Vec<&CarOffer> = candidates
            .iter()
            .filter(|o| (lower..=upper).contains(&(o.final_price as f64)))
            .collect();
        if !band.is_empty() {
            return band;
        }
        let mut closest: Vec<&CarOffer> = candidates.iter().collect();
        closest.sort_by_key(|o| o.final_price.abs_diff(target.amount));
        closest.truncate(policy.approx_closest);
        closest
    } else {
        let under: Vec<&CarOffer> = candidates
            .iter()
            .filter(|o| o.final_price <= target.amount)
            .collect();
        if !under.is_empty() {
            return under;
        }
        let ceiling = amount * policy.exact_band_relax;
        candidates
            .iter()
            .filter(|o| o.final_price as f64 <= ceiling)
            .collect()
    }
}

fn distinct_by<K, F>(sorted: Vec<&CarOffer>, key: F, n: usize) -> Vec<CarOffer>
where
    K: Eq + std::hash::Hash,
    F: Fn(&CarOffer) -> K,
{
    let mut seen = HashSet::new();
    sorted
        .into_iter()
        .filter(|o| seen.insert(key(o)))
        .take(n)
        .cloned()
        .collect()
}

fn price_mix(mut pool: Vec<&CarOffer>) -> Vec<CarOffer> {
    pool.sort_by_key(|o| o.final_price);
    let mut seen = HashSet::new();
    let distinct: Vec<&CarOffer> = pool.into_iter().filter(|o| seen.insert(o.model.clone())).collect();
    if distinct.len() <= TOP_N {
        return distinct.into_iter().cloned().collect();
    }
    let mut picked: Vec<CarOffer> = distinct[..TOP_N - 1].iter().map(|o| (*o).clone()).collect();
    if let Some(top) = distinct.last() {
        picked.push((*top).clone());
    }
    picked
}
