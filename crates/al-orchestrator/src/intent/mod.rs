//! Intent detection for free-text chat messages.
//!
//! Local shortcuts (catalog model names, dealer-brand searches, purchase
//! verbs, spec queries) run first; only messages they cannot place reach
//! the remote classifier, whose answer is then corrected by keyword rules.

pub mod llm;
pub mod pipeline;
pub mod rules;
pub mod signals;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use al_protocol::IntentResult;
use async_trait::async_trait;

pub use llm::{ClassifierConfig, LlmClassifier};
pub use pipeline::{Classification, IntentPipeline, Resolution};

/// Classifies one message. Implementations never fail: an unavailable or
/// confused backend answers `IntentResult::unknown()`.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> IntentResult;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Used when no classifier is configured.
pub struct NoopClassifier;

#[async_trait]
impl IntentClassifier for NoopClassifier {
    async fn classify(&self, _text: &str) -> IntentResult {
        IntentResult::unknown()
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Canned answers keyed by exact message text, for tests.
#[derive(Default)]
pub struct StaticClassifier {
    answers: Mutex<HashMap<String, IntentResult>>,
    calls: AtomicUsize,
}

impl StaticClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, text: &str, result: IntentResult) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(text.to_string(), result);
        self
    }

    /// Number of `classify` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for StaticClassifier {
    async fn classify(&self, text: &str) -> IntentResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use al_protocol::{Confidence, Intent};

    #[tokio::test]
    async fn noop_is_unknown() {
        assert_eq!(NoopClassifier.classify("что угодно").await, IntentResult::unknown());
    }

    #[tokio::test]
    async fn static_answers_and_counts() {
        let classifier = StaticClassifier::new()
            .with("продам авто", IntentResult::new(Intent::Sell, Confidence::High));
        assert_eq!(classifier.classify("продам авто").await.intent, Intent::Sell);
        assert_eq!(classifier.classify("другое").await, IntentResult::unknown());
        assert_eq!(classifier.calls(), 2);
    }
}
