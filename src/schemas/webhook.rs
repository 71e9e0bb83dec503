use serde::{Deserialize, Serialize};

/// Envelope of an identity provider webhook delivery
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEmailAddress {
    pub id: String,
    pub email_address: String,
}

/// `data` of a `user.created` event
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreatedData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<WebhookEmailAddress>,
    pub primary_email_address_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserCreatedData {
    /// Primary address, falling back to the first one listed
    pub fn primary_email(&self) -> Option<&str> {
        self.primary_email_address_id
            .as_deref()
            .and_then(|primary| self.email_addresses.iter().find(|e| e.id == primary))
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.as_str())
            .filter(|e| !e.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WebhookAck {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(json: serde_json::Value) -> UserCreatedData {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_primary_email_preferred() {
        let d = data(serde_json::json!({
            "id": "user_1",
            "primary_email_address_id": "idn_2",
            "email_addresses": [
                {"id": "idn_1", "email_address": "old@co.com"},
                {"id": "idn_2", "email_address": "alice@co.com"}
            ]
        }));
        assert_eq!(d.primary_email(), Some("alice@co.com"));
    }

    #[test]
    fn test_first_email_when_primary_unknown() {
        let d = data(serde_json::json!({
            "id": "user_1",
            "primary_email_address_id": "idn_missing",
            "email_addresses": [{"id": "idn_1", "email_address": "first@co.com"}]
        }));
        assert_eq!(d.primary_email(), Some("first@co.com"));
    }

    #[test]
    fn test_no_email() {
        let d = data(serde_json::json!({"id": "user_1"}));
        assert_eq!(d.primary_email(), None);
    }
}
