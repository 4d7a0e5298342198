use serde::{Deserialize, Serialize};

use super::{lenient_millis, Timestamp};

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Roles the backend may add later (system, tool, ...)
    #[serde(other)]
    Other,
}

/// One message of a test conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Timestamp,
    /// Agent latency reported by the test runner
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time_ms: Option<u64>,
    /// Outcome of the runner's per-turn validation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_passed: Option<bool>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            response_time_ms: None,
            validation_passed: None,
        }
    }

    /// A user turn at the given epoch milliseconds
    pub fn user(content: impl Into<String>, at_ms: i64) -> Self {
        Self::new(Role::User, content, Timestamp::EpochMillis(at_ms))
    }

    /// An assistant turn at the given epoch milliseconds
    pub fn assistant(content: impl Into<String>, at_ms: i64) -> Self {
        Self::new(Role::Assistant, content, Timestamp::EpochMillis(at_ms))
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_turn() {
        let json = r#"{
            "role": "assistant",
            "content": "Your appointment is booked",
            "timestamp": "2024-05-01T10:00:00Z",
            "responseTimeMs": 840,
            "validationPassed": true
        }"#;

        let turn: ConversationTurn = serde_json::from_str(json).unwrap();

        assert!(turn.is_assistant());
        assert_eq!(turn.response_time_ms, Some(840));
        assert_eq!(turn.validation_passed, Some(true));
        assert!(turn.timestamp.epoch_millis().is_some());
    }

    #[test]
    fn test_odd_response_times_do_not_reject_turn() {
        let turns: Vec<ConversationTurn> = serde_json::from_str(
            r#"[
                {"role": "assistant", "content": "a", "timestamp": 0, "responseTimeMs": -15},
                {"role": "assistant", "content": "b", "timestamp": 0, "responseTimeMs": 840.5},
                {"role": "assistant", "content": "c", "timestamp": 0, "responseTimeMs": "slow"},
                {"role": "assistant", "content": "d", "timestamp": 0, "responseTimeMs": null}
            ]"#,
        )
        .unwrap();

        let times: Vec<Option<u64>> = turns.iter().map(|t| t.response_time_ms).collect();
        assert_eq!(times, vec![None, Some(841), None, None]);
    }

    #[test]
    fn test_unknown_role_and_missing_timestamp() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role": "system", "content": "boot"}"#).unwrap();

        assert_eq!(turn.role, Role::Other);
        assert_eq!(turn.timestamp.epoch_millis(), None);
    }
}
