//! Shared test harness for E2E conversation tests.
//!
//! Drives the real router over the sample catalog, with a recording lead
//! sink in place of the delivery channels.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use al_catalog::{Catalog, SearchEngine, sample_catalog};
use al_orchestrator::config::OrchestratorConfig;
use al_orchestrator::intent::{ClassifierConfig, IntentClassifier, LlmClassifier, NoopClassifier};
use al_orchestrator::leads::{LeadSink, MockLeadSink, RoutedLead};
use al_orchestrator::routes::build_router;
use al_orchestrator::state::AppState;
use al_orchestrator::store::InMemorySessionStore;

/// Router plus the sink that collects dispatched leads.
pub struct TestHarness {
    pub router: Router,
    pub sink: Arc<MockLeadSink>,
}

impl TestHarness {
    /// Sample catalog, no remote classifier.
    pub fn with_sample_data() -> Self {
        Self::with_classifier(Arc::new(NoopClassifier))
    }

    /// Sample catalog with the remote classifier at `base_url`
    /// (an OpenAI-compatible `/v1` root).
    pub fn with_remote_classifier(base_url: &str) -> Self {
        let classifier = LlmClassifier::new(ClassifierConfig {
            enabled: true,
            base_url: base_url.to_string(),
            timeout_secs: 2,
            ..ClassifierConfig::default()
        })
        .unwrap();
        Self::with_classifier(Arc::new(classifier))
    }

    pub fn with_classifier(classifier: Arc<dyn IntentClassifier>) -> Self {
        let config = OrchestratorConfig::default();
        let search = SearchEngine::new(Arc::new(Catalog::new(sample_catalog())), config.search.clone());
        let sink = Arc::new(MockLeadSink::new());
        let state = AppState::from_parts(
            &config,
            Arc::new(search),
            classifier,
            Arc::new(InMemorySessionStore::new()),
            vec![sink.clone() as Arc<dyn LeadSink>],
        );

        Self {
            router: build_router(state),
            sink,
        }
    }

    /// POST one message. Returns (HTTP status, response JSON body).
    pub async fn send(&self, user_id: &str, text: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "text": text });
        let request = Request::post(format!("/api/v1/chat/{user_id}/messages"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.call(request).await
    }

    /// POST one message and return the reply texts, asserting success.
    pub async fn say(&self, user_id: &str, text: &str) -> Vec<String> {
        let (status, json) = self.send(user_id, text).await;
        assert_eq!(status, StatusCode::OK, "message '{text}' failed: {json}");
        json["replies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_str().unwrap().to_string())
            .collect()
    }

    /// GET the session snapshot.
    pub async fn session(&self, user_id: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::get(format!("/api/v1/chat/{user_id}"))
            .body(Body::empty())
            .unwrap();
        self.call(request).await
    }

    /// DELETE the session. Returns the HTTP status.
    pub async fn clear(&self, user_id: &str) -> StatusCode {
        let request = Request::delete(format!("/api/v1/chat/{user_id}"))
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }

    /// Current dialogue state name from the snapshot.
    pub async fn state(&self, user_id: &str) -> String {
        let (_, json) = self.session(user_id).await;
        json["state"].as_str().unwrap_or_default().to_string()
    }

    pub fn leads(&self) -> Vec<RoutedLead> {
        self.sink.delivered()
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
