//! Orchestrator configuration, loadable from TOML with environment overrides.

use std::path::Path;

use al_catalog::brands::{DEFAULT_DEALER_BRANDS, DEFAULT_ECOSYSTEM_BRANDS};
use al_catalog::{EmbeddingConfig, SearchPolicy};
use serde::Deserialize;

use crate::dialogue::DialogueSettings;
use crate::intent::llm::ClassifierConfig;
use crate::leads::routing::RoutingConfig;

/// Used when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/autolider/orchestrator.toml";

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub dealer: DealerConfig,
    #[serde(default)]
    pub search: SearchPolicy,
    #[serde(default)]
    pub dialogue: DialogueSettings,
    #[serde(default)]
    pub leads: LeadsConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// JSON array of offers.
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

fn default_catalog_path() -> String {
    "/var/lib/autolider/catalog.json".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

/// Which brands the dealership sells new, and which belong to the service ecosystem.
#[derive(Debug, Clone, Deserialize)]
pub struct DealerConfig {
    #[serde(default = "default_dealer_brands")]
    pub brands: Vec<String>,
    #[serde(default = "default_ecosystem_brands")]
    pub ecosystem_brands: Vec<String>,
    #[serde(default = "default_company_name")]
    pub company_name: String,
}

fn default_dealer_brands() -> Vec<String> {
    DEFAULT_DEALER_BRANDS.iter().map(|b| b.to_string()).collect()
}

fn default_ecosystem_brands() -> Vec<String> {
    DEFAULT_ECOSYSTEM_BRANDS.iter().map(|b| b.to_string()).collect()
}

fn default_company_name() -> String {
    "АвтоЛидер".to_string()
}

impl Default for DealerConfig {
    fn default() -> Self {
        Self {
            brands: default_dealer_brands(),
            ecosystem_brands: default_ecosystem_brands(),
            company_name: default_company_name(),
        }
    }
}

/// Where confirmed leads go besides the routed channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadsConfig {
    /// JSON-lines file; `None` disables the file sink.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Notification endpoint; `None` disables the webhook sink.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    10
}

impl OrchestratorConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields defaults.
    /// Secrets are then overridden from the environment.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("CLASSIFIER_API_KEY")
            && !key.is_empty()
        {
            self.classifier.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("EMBEDDINGS_API_KEY")
            && !key.is_empty()
        {
            self.embeddings.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.dealer.brands, vec!["Chery", "Jetour", "Haval"]);
        assert!(!config.classifier.enabled);
        assert!(!config.embeddings.enabled);
        assert_eq!(config.dialogue.phone_attempts, 3);
        assert_eq!(config.dialogue.budget_attempts, 2);
        assert!(config.leads.file_path.is_none());
    }

    #[test]
    fn deserialize_empty_config() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.search, SearchPolicy::default());
        assert_eq!(config.embeddings.batch_size, 10);
    }

    #[test]
    fn deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8088

[classifier]
enabled = true
base_url = "http://llm.local/v1"
model = "GigaChat-Pro"
timeout_secs = 5

[embeddings]
enabled = true
batch_size = 4

[catalog]
path = "/data/cars.json"

[dealer]
brands = ["Chery", "Haval"]
company_name = "Тест"

[search]
power_tolerance = 0.85
fallback_pool = 7

[dialogue]
phone_attempts = 5
default_name = "Гость"

[leads]
file_path = "/tmp/leads.jsonl"
webhook_url = "http://hooks.local/leads"

[routing]
general = "ops"
dealer = { Chery = "chery-sales" }
"#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8088);
        assert!(config.classifier.enabled);
        assert_eq!(config.classifier.model, "GigaChat-Pro");
        assert_eq!(config.classifier.max_tokens, 800); // default
        assert_eq!(config.embeddings.batch_size, 4);
        assert_eq!(config.catalog.path, "/data/cars.json");
        assert_eq!(config.dealer.brands.len(), 2);
        assert_eq!(config.dealer.ecosystem_brands.len(), 5); // default
        assert!((config.search.power_tolerance - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.search.fallback_pool, 7);
        assert_eq!(config.search.max_cached, 5); // default
        assert_eq!(config.dialogue.phone_attempts, 5);
        assert_eq!(config.dialogue.default_name, "Гость");
        assert_eq!(config.leads.webhook_timeout_secs, 10);
        assert_eq!(config.routing.general, "ops");
        assert_eq!(config.routing.dealer.get("Chery").map(String::as_str), Some("chery-sales"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = OrchestratorConfig::load("/nonexistent/orchestrator.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("al-orch-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(OrchestratorConfig::load(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
