//! Dialogue state machine — one user message in, replies and leads out.
//!
//! Each state has a handler. A handler either finishes the turn or hands the
//! message to intent detection, which never hands it back, so a turn runs at
//! most two handlers.

pub mod followup;
pub mod handlers;
pub mod replies;
pub mod session;

use std::sync::Arc;

use al_catalog::brands::DEFAULT_DEALER_BRANDS;
use al_catalog::{BrandMatcher, SearchEngine};
use al_protocol::{Intent, Lead};
use serde::Deserialize;

use crate::intent::{IntentClassifier, IntentPipeline};

pub use session::{DialogueState, PendingAction, Session};

/// Retry limits and defaults for the conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct DialogueSettings {
    /// Invalid phone answers before the bot gives up.
    #[serde(default = "default_phone_attempts")]
    pub phone_attempts: u32,
    /// Unparseable budget answers before the budget is treated as unlimited.
    #[serde(default = "default_budget_attempts")]
    pub budget_attempts: u32,
    /// Consecutive unrecognized messages before escalating to a specialist.
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: u32,
    /// Used in replies when the user never gave a name.
    #[serde(default = "default_name")]
    pub default_name: String,
}

fn default_phone_attempts() -> u32 {
    3
}

fn default_budget_attempts() -> u32 {
    2
}

fn default_fallback_threshold() -> u32 {
    2
}

fn default_name() -> String {
    "Клиент".to_string()
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            phone_attempts: default_phone_attempts(),
            budget_attempts: default_budget_attempts(),
            fallback_threshold: default_fallback_threshold(),
            default_name: default_name(),
        }
    }
}

/// Result of one turn.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Reply texts, in send order.
    pub replies: Vec<String>,
    /// Leads confirmed during this turn.
    pub leads: Vec<Lead>,
}

impl TurnOutcome {
    pub fn say(&mut self, text: impl Into<String>) {
        self.replies.push(text.into());
    }
}

/// What a state handler wants next.
pub(crate) enum Flow {
    Done,
    /// Re-run the message through intent detection.
    Detect(String),
}

pub struct Dialogue {
    brands: Arc<BrandMatcher>,
    search: Arc<SearchEngine>,
    pipeline: IntentPipeline,
    settings: DialogueSettings,
    company: String,
    /// Dealer brands in display order, for the non-dealer notice.
    dealer_names: Vec<String>,
}

impl Dialogue {
    pub fn new(
        brands: Arc<BrandMatcher>,
        search: Arc<SearchEngine>,
        classifier: Arc<dyn IntentClassifier>,
        settings: DialogueSettings,
    ) -> Self {
        let pipeline = IntentPipeline::new(brands.clone(), search.clone(), classifier);
        Self {
            brands,
            search,
            pipeline,
            settings,
            company: "АвтоЛидер".to_string(),
            dealer_names: DEFAULT_DEALER_BRANDS.iter().map(|b| b.to_string()).collect(),
        }
    }

    /// Company name and dealer brand list used in the non-dealer notice.
    pub fn with_company(mut self, company: impl Into<String>, dealer_names: Vec<String>) -> Self {
        self.company = company.into();
        self.dealer_names = dealer_names;
        self
    }

    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    /// Process one message against `session`, mutating it in place.
    pub async fn handle(&self, session: &mut Session, text: &str) -> TurnOutcome {
        let mut out = TurnOutcome::default();
        let text = text.trim();

        if text == "/start" {
            session.reset(false);
            session.state = DialogueState::Greeting;
            out.say(replies::GREETING);
            session.touch();
            return out;
        }

        let before = session.state;
        let flow = match session.state {
            DialogueState::Greeting => self.on_greeting(session, text, &mut out),
            DialogueState::DetectIntent => Flow::Detect(text.to_string()),
            DialogueState::CollectBrand => self.on_collect_brand(session, text, &mut out),
            DialogueState::CollectSpecs => self.on_collect_specs(session, text, &mut out).await,
            DialogueState::CollectRepairType => self.on_collect_repair_type(session, text, &mut out),
            DialogueState::CollectPhone => self.on_collect_phone(session, text, &mut out),
            DialogueState::Confirm => {
                self.ask_confirm(session, &mut out);
                Flow::Done
            }
            DialogueState::ConfirmFinal => self.on_confirm_final(session, text, &mut out),
            DialogueState::NonDealerChoice => {
                self.on_follow_up(session, text, &mut out).await;
                Flow::Done
            }
            DialogueState::Finished => {
                session.reset(true);
                Flow::Detect(text.to_string())
            }
        };

        if let Flow::Detect(message) = flow {
            session.state = DialogueState::DetectIntent;
            self.detect(session, &message, &mut out).await;
        }

        session.touch();
        tracing::debug!(
            user_id = %session.user_id,
            from = %before,
            to = %session.state,
            replies = out.replies.len(),
            "turn handled"
        );
        out
    }

    fn name<'a>(&'a self, session: &'a Session) -> &'a str {
        session.display_name(&self.settings.default_name)
    }

    /// Render the summary and wait for the yes/no answer.
    pub(crate) fn ask_confirm(&self, session: &mut Session, out: &mut TurnOutcome) {
        out.say(replies::confirm_summary(session, &self.settings.default_name));
        session.state = DialogueState::ConfirmFinal;
    }

    /// Straight to confirmation when the phone is known, otherwise ask for it.
    pub(crate) fn phone_or_confirm(&self, session: &mut Session, prompt: String, out: &mut TurnOutcome) {
        if session.has_phone() {
            self.ask_confirm(session, out);
        } else {
            session.state = DialogueState::CollectPhone;
            out.say(prompt);
        }
    }

    /// Lead for the session's current intent. `None` without a phone.
    pub(crate) fn build_lead(&self, session: &Session, intent: Intent) -> Option<Lead> {
        let phone = session.phone.clone()?;
        Some(Lead::new(
            session.user_id.clone(),
            self.name(session),
            intent,
            session.lead_brand().map(String::from),
            phone,
            session.slots.clone(),
        ))
    }
}
