//! Lead hand-off: route, format, deliver.
//!
//! Delivery is best effort. Every sink is tried once; failures are logged
//! and never reach the user, who has already been told a manager will call.

pub mod routing;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use al_catalog::specs::UNLIMITED_BUDGET;
use al_protocol::Lead;
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{SinkError, SinkResult};
use routing::LeadRouter;

/// A lead with its channel and rendered notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedLead {
    pub channel: Option<String>,
    pub text: String,
    pub lead: Lead,
}

/// Manager notification text.
pub fn format_lead_message(lead: &Lead) -> String {
    let mut lines = vec![
        "🔔 НОВАЯ ЗАЯВКА".to_string(),
        format!("👤 Клиент: {}", lead.name),
        format!("📞 Телефон: {}", lead.phone),
        format!("🎯 Интерес: {}", lead.intent.label()),
    ];
    if let Some(brand) = &lead.brand {
        lines.push(format!("🚗 Марка: {brand}"));
    }

    let slots = &lead.slots;
    let mut details = Vec::new();
    if let Some(model) = &slots.model {
        details.push(format!("Модель: {model}"));
    }
    if let Some(body) = &slots.body {
        details.push(format!("Кузов: {body}"));
    }
    if let Some(budget) = slots.budget_max.filter(|b| *b < UNLIMITED_BUDGET) {
        details.push(format!("Бюджет: {budget}"));
    }
    if let Some(repair_type) = slots.repair_type {
        details.push(format!("Тип ремонта: {}", repair_type.label()));
    }
    if let Some(repair_details) = &slots.repair_details {
        details.push(format!("Детали: {repair_details}"));
    }
    if !details.is_empty() {
        lines.push("📝 Подробности:".to_string());
        lines.extend(details.into_iter().map(|d| format!("- {d}")));
    }

    lines.push(format!("🆔 User ID: {}", lead.user_id));
    lines.join("\n")
}

#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn deliver(&self, lead: &RoutedLead) -> SinkResult<()>;

    /// Sink name for logs.
    fn name(&self) -> &str;
}

/// Appends one JSON object per line.
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LeadSink for JsonlFileSink {
    async fn deliver(&self, lead: &RoutedLead) -> SinkResult<()> {
        let mut line = serde_json::to_string(lead).map_err(|e| SinkError::Serialize(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SinkError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| SinkError::Io(e.to_string()))?;
        file.flush().await.map_err(|e| SinkError::Io(e.to_string()))
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// POSTs `{channel, text, lead}` to a notification endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> SinkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LeadSink for WebhookSink {
    async fn deliver(&self, lead: &RoutedLead) -> SinkResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(lead)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::Rejected(format!("HTTP {}", response.status().as_u16())));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Records deliveries in memory, for tests.
#[derive(Default)]
pub struct MockLeadSink {
    delivered: Mutex<Vec<RoutedLead>>,
    fail: bool,
}

impl MockLeadSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<RoutedLead> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeadSink for MockLeadSink {
    async fn deliver(&self, lead: &RoutedLead) -> SinkResult<()> {
        if self.fail {
            return Err(SinkError::Rejected("mock failure".into()));
        }
        self.delivered.lock().unwrap().push(lead.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Routes each lead and hands it to every sink.
pub struct LeadDispatcher {
    router: LeadRouter,
    sinks: Vec<Arc<dyn LeadSink>>,
}

impl LeadDispatcher {
    pub fn new(router: LeadRouter) -> Self {
        Self {
            router,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LeadSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Never fails; returns what was attempted.
    pub async fn dispatch(&self, lead: Lead) -> RoutedLead {
        let channel = self.router.route(&lead);
        if channel.is_none() {
            tracing::warn!(lead_id = %lead.id, intent = %lead.intent, brand = ?lead.brand, "no channel for lead");
        }
        let routed = RoutedLead {
            channel,
            text: format_lead_message(&lead),
            lead,
        };

        for sink in &self.sinks {
            match sink.deliver(&routed).await {
                Ok(()) => tracing::info!(
                    sink = sink.name(),
                    lead_id = %routed.lead.id,
                    channel = ?routed.channel,
                    "lead delivered"
                ),
                Err(e) => tracing::error!(
                    sink = sink.name(),
                    lead_id = %routed.lead.id,
                    error = %e,
                    "lead delivery failed"
                ),
            }
        }
        routed
    }
}
