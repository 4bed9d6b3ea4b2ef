//! LLM intent classifier — OpenAI-compatible chat-completions client.
//!
//! Sends the raw user message with a fixed Russian system prompt and parses
//! the JSON object the model answers with. Every failure (transport, HTTP
//! status, missing content, malformed JSON) is logged and degraded to
//! `IntentResult::unknown()`, so the dialogue never sees an error.

use std::time::Duration;

use al_protocol::{Confidence, Intent, IntentResult, RepairType, Slots};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::IntentClassifier;
use crate::error::{ClassifierError, ClassifierResult};

const SYSTEM_PROMPT: &str = r#"Ты классифицируешь обращения клиентов автосалона. Определи намерение клиента и извлеки данные из сообщения.

Ответь одним JSON-объектом, без пояснений:
{
  "intent": "buy_new" | "buy_used" | "sell" | "repair" | "spares" | "accounting" | "other",
  "target_brand": "марка, которую клиент хочет купить" | null,
  "user_car_brand": "марка автомобиля клиента" | null,
  "slots": {
    "budget_max": число в рублях | null,
    "body": "кроссовер" | "седан" | "хэтчбек" | "универсал" | null,
    "drive": "4x4" | "передний" | "задний" | null,
    "repair_type": "слесарный" | "кузовной" | null,
    "raw_model": "модель как её написал клиент" | null
  },
  "confidence": "high" | "medium" | "low"
}

Правила:
- "хочу купить", "покупка", "нужен новый" означают buy_new, а не repair.
- buy_used: покупка автомобиля с пробегом. sell: клиент продаёт свой автомобиль.
- repair: ремонт, обслуживание, диагностика. spares: запчасти. accounting: документы, счета, оплата.
- target_brand заполняй для buy_new и buy_used, user_car_brand для repair, spares и sell.
- Если не уверен, ставь confidence "low".

Примеры:
"Хочу купить новый Chery Tiggo 8 до 2.5 млн" -> {"intent":"buy_new","target_brand":"Chery","user_car_brand":null,"slots":{"budget_max":2500000,"body":null,"drive":null,"repair_type":null,"raw_model":"Chery Tiggo 8"},"confidence":"high"}
"Нужен ремонт двигателя на моей Ладе" -> {"intent":"repair","target_brand":null,"user_car_brand":"Lada","slots":{"budget_max":null,"body":null,"drive":null,"repair_type":"слесарный","raw_model":"Лада"},"confidence":"high"}
"Поцарапал бампер на Haval" -> {"intent":"repair","target_brand":null,"user_car_brand":"Haval","slots":{"budget_max":null,"body":null,"drive":null,"repair_type":"кузовной","raw_model":null},"confidence":"high"}
"Хочу продать свой Солярис" -> {"intent":"sell","target_brand":null,"user_car_brand":"Hyundai","slots":{"budget_max":null,"body":null,"drive":null,"repair_type":null,"raw_model":"Солярис"},"confidence":"high"}"#;

/// Classifier endpoint settings (`[classifier]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Off by default; the dialogue then relies on local rules only.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token. Usually supplied via `CLASSIFIER_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".into()
}
fn default_model() -> String {
    "GigaChat".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    800
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Model output before validation. Every field is lenient: models quote
/// numbers, invent intents and drop keys.
#[derive(Deserialize, Default)]
struct RawResult {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    target_brand: Option<String>,
    #[serde(default)]
    user_car_brand: Option<String>,
    #[serde(default)]
    slots: RawSlots,
    #[serde(default)]
    confidence: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawSlots {
    #[serde(default)]
    budget_max: Option<serde_json::Value>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    drive: Option<String>,
    #[serde(default)]
    repair_type: Option<String>,
    #[serde(default)]
    repair_details: Option<String>,
    #[serde(default)]
    raw_model: Option<String>,
}

/// Client for the remote intent classifier.
pub struct LlmClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl LlmClassifier {
    pub fn new(config: ClassifierConfig) -> ClassifierResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// One classification round trip, errors included.
    pub async fn request(&self, text: &str) -> ClassifierResult<IntentResult> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ClassifierError::Malformed("no choices".into()))?;

        parse_content(&content)
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, text: &str) -> IntentResult {
        match self.request(text).await {
            Ok(result) => {
                tracing::debug!(
                    intent = %result.intent,
                    confidence = ?result.confidence,
                    "classifier answered"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "classifier failed, treating message as unknown");
                IntentResult::unknown()
            }
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// The JSON object between the first `{` and the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_content(content: &str) -> ClassifierResult<IntentResult> {
    let json = extract_json(content)
        .ok_or_else(|| ClassifierError::Malformed(format!("no JSON object in {content:?}")))?;
    let raw: RawResult =
        serde_json::from_str(json).map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    let intent = match raw.intent.as_deref().map(str::parse::<Intent>) {
        Some(Ok(Intent::FallbackOther)) | None => Intent::Other,
        Some(Ok(intent)) => intent,
        Some(Err(e)) => return Err(ClassifierError::Malformed(e.to_string())),
    };
    let confidence = raw
        .confidence
        .as_deref()
        .and_then(|c| c.parse::<Confidence>().ok())
        .unwrap_or_default();

    Ok(IntentResult {
        intent,
        target_brand: non_empty(raw.target_brand),
        user_car_brand: non_empty(raw.user_car_brand),
        slots: Slots {
            budget_max: raw.slots.budget_max.as_ref().and_then(budget_value),
            body: non_empty(raw.slots.body),
            drive: non_empty(raw.slots.drive),
            repair_type: raw.slots.repair_type.as_deref().and_then(RepairType::parse),
            repair_details: non_empty(raw.slots.repair_details),
            raw_model: non_empty(raw.slots.raw_model),
            model: None,
        },
        confidence,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "null")
}

/// Budgets arrive as integers, floats or numeric strings.
fn budget_value(value: &serde_json::Value) -> Option<u64> {
    let amount = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.replace([' ', '\u{a0}'], "").replace(',', ".").parse().ok()?,
        _ => return None,
    };
    (amount > 0.0).then(|| amount.round() as u64)
}
