use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::{Intent, Slots};

/// Handoff payload created once per confirmed conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Unique lead ID (UUIDv7 for time-sortability).
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub intent: Intent,
    #[serde(default)]
    pub brand: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub slots: Slots,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        intent: Intent,
        brand: Option<String>,
        phone: impl Into<String>,
        slots: Slots,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            name: name.into(),
            intent,
            brand,
            phone: phone.into(),
            slots,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lead_has_fresh_id_and_timestamp() {
        let a = Lead::new("42", "Иван", Intent::BuyNew, Some("Chery".into()), "+79161234567", Slots::default());
        let b = Lead::new("42", "Иван", Intent::BuyNew, None, "+79161234567", Slots::default());
        assert_ne!(a.id, b.id);
        assert!(a.created_at <= Utc::now());
    }

    #[test]
    fn lead_json_shape() {
        let lead = Lead::new("7", "Анна", Intent::Repair, None, "+79990001122", Slots::default());
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["intent"], "repair");
        assert_eq!(json["user_id"], "7");
        assert!(json["created_at"].is_string());
    }
}
