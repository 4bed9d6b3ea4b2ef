//! Catalog search and ranking for the AutoLider orchestrator.
//!
//! Holds the read-only pieces shared by every conversation: the brand
//! gazetteer, the free-text car-spec parser, phone normalization,
//! the catalog itself with its structural search and degrade ladder,
//! top-3 offer selection, and the optional semantic index.

pub mod brands;
pub mod catalog;
pub mod error;
pub mod mock;
pub mod phone;
pub mod ranking;
pub mod search;
pub mod semantic;
pub mod specs;
pub mod text;

// Re-export key types for convenience
pub use brands::BrandMatcher;
pub use catalog::{Catalog, CatalogProvider, JsonFileCatalog};
pub use error::{CatalogError, CatalogResult};
pub use mock::{MockCatalogProvider, MockEmbedder, sample_catalog};
pub use phone::{mask_phone, normalize_phone};
pub use ranking::{PriceTarget, RankStrategy, pick_top3_offers};
pub use search::{SearchEngine, SearchOutcome, SearchPolicy, SearchQuery, SearchStage};
pub use semantic::{Embedder, EmbeddingConfig, HttpEmbedder, SemanticIndex};
pub use specs::{BudgetAnswer, SpecHints, parse_budget, parse_specs};
