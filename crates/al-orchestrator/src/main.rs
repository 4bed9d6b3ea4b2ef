//! AutoLider orchestrator — chat lead-qualification server.
//!
//! Loads the catalog, optionally builds the semantic index and the remote
//! classifier client, then serves the chat API.

use std::sync::Arc;

use al_catalog::{Catalog, HttpEmbedder, JsonFileCatalog, SearchEngine, SemanticIndex};
use al_orchestrator::config::{DEFAULT_CONFIG_PATH, OrchestratorConfig};
use al_orchestrator::intent::{IntentClassifier, LlmClassifier, NoopClassifier};
use al_orchestrator::leads::{JsonlFileSink, LeadSink, WebhookSink};
use al_orchestrator::routes;
use al_orchestrator::state::AppState;
use al_orchestrator::store::InMemorySessionStore;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "al-orchestrator starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = OrchestratorConfig::load(&config_path)?;

    let catalog = Catalog::load(&JsonFileCatalog::new(&config.catalog.path)).await?;
    let catalog = Arc::new(catalog);

    let mut search = SearchEngine::new(catalog.clone(), config.search.clone());
    if config.embeddings.enabled {
        let embedder = Arc::new(HttpEmbedder::new(config.embeddings.clone())?);
        match SemanticIndex::build(&catalog, embedder, config.embeddings.batch_size).await {
            Ok(index) => search = search.with_semantic(Arc::new(index)),
            Err(e) => tracing::warn!(error = %e, "semantic index unavailable, structural search only"),
        }
    }

    let classifier: Arc<dyn IntentClassifier> = if config.classifier.enabled {
        tracing::info!(base_url = %config.classifier.base_url, model = %config.classifier.model, "remote classifier enabled");
        Arc::new(LlmClassifier::new(config.classifier.clone())?)
    } else {
        tracing::warn!("classifier disabled, local shortcuts and rules only");
        Arc::new(NoopClassifier)
    };

    let mut sinks: Vec<Arc<dyn LeadSink>> = Vec::new();
    if let Some(path) = &config.leads.file_path {
        sinks.push(Arc::new(JsonlFileSink::new(path)));
    }
    if let Some(url) = &config.leads.webhook_url {
        sinks.push(Arc::new(WebhookSink::new(url, config.leads.webhook_timeout_secs)?));
    }
    if sinks.is_empty() {
        tracing::warn!("no lead sinks configured, leads are only logged");
    }

    let state = AppState::from_parts(
        &config,
        Arc::new(search),
        classifier,
        Arc::new(InMemorySessionStore::new()),
        sinks,
    );
    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
