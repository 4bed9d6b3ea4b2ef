//! Shared application state for the Axum server.

use std::sync::Arc;

use al_catalog::{BrandMatcher, Catalog, SearchEngine, sample_catalog};

use crate::config::OrchestratorConfig;
use crate::dialogue::Dialogue;
use crate::intent::{IntentClassifier, NoopClassifier};
use crate::leads::routing::LeadRouter;
use crate::leads::{LeadDispatcher, LeadSink};
use crate::service::ChatService;
use crate::store::{InMemorySessionStore, SessionStore};

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    /// Offers loaded at startup, for the health report.
    pub catalog_size: usize,
}

impl AppState {
    /// Wire every component from `config` around an already built search engine.
    pub fn from_parts(
        config: &OrchestratorConfig,
        search: Arc<SearchEngine>,
        classifier: Arc<dyn IntentClassifier>,
        store: Arc<dyn SessionStore>,
        sinks: Vec<Arc<dyn LeadSink>>,
    ) -> Self {
        let brands = Arc::new(BrandMatcher::new(
            config.dealer.brands.as_slice(),
            config.dealer.ecosystem_brands.as_slice(),
        ));
        let catalog_size = search.catalog().len();

        let dialogue = Dialogue::new(brands.clone(), search, classifier, config.dialogue.clone())
            .with_company(&config.dealer.company_name, config.dealer.brands.clone());
        let dispatcher = sinks.into_iter().fold(
            LeadDispatcher::new(LeadRouter::new(config.routing.clone(), brands)),
            LeadDispatcher::with_sink,
        );

        Self {
            chat: Arc::new(ChatService::new(dialogue, store, dispatcher)),
            catalog_size,
        }
    }

    /// Default config, empty catalog, no classifier, no sinks.
    pub fn new() -> Self {
        Self::with_catalog(Catalog::default())
    }

    /// Default config over the built-in sample catalog (development / tests).
    pub fn with_sample_data() -> Self {
        Self::with_catalog(Catalog::new(sample_catalog()))
    }

    fn with_catalog(catalog: Catalog) -> Self {
        let config = OrchestratorConfig::default();
        let search = SearchEngine::new(Arc::new(catalog), config.search.clone());
        Self::from_parts(
            &config,
            Arc::new(search),
            Arc::new(NoopClassifier),
            Arc::new(InMemorySessionStore::new()),
            Vec::new(),
        )
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
