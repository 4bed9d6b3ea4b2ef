//! Mock catalog provider, deterministic embedder and a sample catalog for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use al_protocol::CarOffer;
use async_trait::async_trait;

use crate::catalog::CatalogProvider;
use crate::error::{CatalogError, CatalogResult};
use crate::semantic::Embedder;
use crate::text::{normalize, words};

const MOCK_DIMENSIONS: usize = 256;

/// Serves a fixed list of offers.
pub struct MockCatalogProvider {
    offers: Vec<CarOffer>,
}

impl MockCatalogProvider {
    pub fn new(offers: Vec<CarOffer>) -> Self {
        Self { offers }
    }

    pub fn with_sample_data() -> Self {
        Self::new(sample_catalog())
    }
}

#[async_trait]
impl CatalogProvider for MockCatalogProvider {
    async fn load(&self) -> CatalogResult<Vec<CarOffer>> {
        Ok(self.offers.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Bag-of-words hashing embedder. Texts sharing words get similar vectors.
#[derive(Default)]
pub struct MockEmbedder {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `embed` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; MOCK_DIMENSIONS];
        for word in words(&normalize(text)) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            v[(hasher.finish() % MOCK_DIMENSIONS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> CatalogResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Embedding("mock embedder failure".into()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[allow(clippy::too_many_arguments)]
fn offer(
    brand: &str,
    model: &str,
    trim: &str,
    body: &str,
    drive: &str,
    transmission: (&str, &str, Option<u8>),
    engine_type: &str,
    power: u32,
    final_price: u64,
    discounts: [u64; 4],
    colors: &[&str],
    delivery_days: Option<u32>,
) -> CarOffer {
    let (transmission, transmission_details, gears) = transmission;
    CarOffer {
        brand: brand.into(),
        model: model.into(),
        trim: trim.into(),
        body: body.into(),
        drive: drive.into(),
        transmission: transmission.into(),
        transmission_details: transmission_details.into(),
        gears,
        engine_type: engine_type.into(),
        power,
        final_price,
        base_price: Some(final_price + discounts.iter().sum::<u64>()),
        discount_tradein: discounts[0],
        discount_credit: discounts[1],
        discount_gov: discounts[2],
        discount_other: discounts[3],
        available_colors: colors.iter().map(|c| c.to_string()).collect(),
        delivery_days,
    }
}

/// Ten offers across the three dealer brands, cheapest 1.8M, dearest 4.2M.
pub fn sample_catalog() -> Vec<CarOffer> {
    vec![
        offer(
            "Chery", "Tiggo 7 Pro", "Elite", "кроссовер", "передний",
            ("Вариатор", "CVT", None), "бензин", 147, 2_700_000,
            [150_000, 100_000, 0, 50_000], &["белый", "черный", "серый"], None,
        ),
        offer(
            "Haval", "Jolion", "Premium", "кроссовер", "4x4",
            ("Робот", "7DCT", Some(7)), "бензин", 150, 2_400_000,
            [100_000, 0, 0, 0], &["белый", "синий"], Some(7),
        ),
        offer(
            "Chery", "Arrizo 8", "Prestige", "седан", "передний",
            ("Робот", "7DCT", Some(7)), "бензин", 186, 2_800_000,
            [200_000, 0, 0, 0], &["черный", "красный"], None,
        ),
        offer(
            "Jetour", "Dashing", "Luxury", "кроссовер", "передний",
            ("Робот", "7DCT", Some(7)), "бензин", 197, 3_100_000,
            [0, 150_000, 0, 0], &["серый", "зеленый"], Some(30),
        ),
        offer(
            "Haval", "F7", "Tech Plus", "кроссовер", "4x4",
            ("Робот", "7DCT", Some(7)), "бензин", 190, 3_200_000,
            [150_000, 0, 0, 0], &["белый"], None,
        ),
        offer(
            "Chery", "Tiggo 8 Pro Max", "Dreamline", "кроссовер", "4x4",
            ("АКПП", "8AT", Some(8)), "бензин", 249, 3_600_000,
            [200_000, 100_000, 0, 0], &["черный", "белый"], Some(21),
        ),
        offer(
            "Jetour", "T2", "Ultra", "внедорожник", "4x4",
            ("Робот", "7DCT", Some(7)), "бензин", 245, 4_200_000,
            [0, 0, 0, 0], &["хаки", "черный"], Some(45),
        ),
        offer(
            "Haval", "Dargo", "Tech", "кроссовер", "4x4",
            ("Робот", "7DCT", Some(7)), "бензин", 192, 3_400_000,
            [200_000, 0, 0, 0], &["зеленый", "белый"], None,
        ),
        offer(
            "Haval", "Poer", "Comfort", "пикап", "4x4",
            ("АКПП", "8AT", Some(8)), "дизель", 150, 3_500_000,
            [0, 0, 0, 100_000], &["серый"], None,
        ),
        offer(
            "Chery", "Tiggo 4 Pro", "Action", "кроссовер", "передний",
            ("МКПП", "5MT", Some(5)), "бензин", 113, 1_800_000,
            [100_000, 0, 50_000, 0], &["белый", "красный"], None,
        ),
    ]
}
