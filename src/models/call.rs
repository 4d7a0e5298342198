use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lenient_millis, Timestamp};

/// Completion status reported for a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallStatus {
    Completed,
    Failed,
    /// Any other status string, kept verbatim
    Other(String),
}

impl From<String> for CallStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "completed" => CallStatus::Completed,
            "failed" => CallStatus::Failed,
            _ => CallStatus::Other(status),
        }
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Completed => "completed".to_string(),
            CallStatus::Failed => "failed".to_string(),
            CallStatus::Other(s) => s,
        }
    }
}

/// A recorded tool/API invocation made while the agent handled a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Unique within a run
    pub id: i64,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub timestamp: Timestamp,
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<Value>,
}

/// Evidence that a call failed, extracted from its status or response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorSignal {
    /// The runner marked the call as failed
    StatusFailed,
    /// The response carried an `error` field
    ErrorField { message: String },
    /// The response carried `success: false`
    SuccessFalse,
    /// The response carried an HTTP error status
    HttpStatus { code: u64 },
    /// No failure evidence
    None,
}

impl ErrorSignal {
    pub fn is_error(&self) -> bool {
        !matches!(self, ErrorSignal::None)
    }
}

impl ToolCall {
    pub fn new(id: i64, tool_name: impl Into<String>, at_ms: i64) -> Self {
        Self {
            id,
            tool_name: tool_name.into(),
            timestamp: Timestamp::EpochMillis(at_ms),
            duration_ms: None,
            status: None,
            request_payload: None,
            response_payload: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_status(mut self, status: CallStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_response(mut self, payload: Value) -> Self {
        self.response_payload = Some(payload);
        self
    }

    /// Reported duration, treating zero as absent
    pub fn reported_duration_ms(&self) -> Option<u64> {
        self.duration_ms.filter(|&d| d > 0)
    }

    /// Classify the call's failure evidence, strongest signal first
    pub fn error_signal(&self) -> ErrorSignal {
        if self.status == Some(CallStatus::Failed) {
            return ErrorSignal::StatusFailed;
        }

        let Some(Value::Object(payload)) = &self.response_payload else {
            return ErrorSignal::None;
        };

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            let message = match error {
                Value::String(s) => s.clone(),
                Value::Object(obj) => obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
                other => other.to_string(),
            };
            return ErrorSignal::ErrorField { message };
        }

        if payload.get("success").and_then(Value::as_bool) == Some(false) {
            return ErrorSignal::SuccessFalse;
        }

        let code = ["statusCode", "status"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_u64));
        match code {
            Some(code) if code >= 400 => ErrorSignal::HttpStatus { code },
            _ => ErrorSignal::None,
        }
    }
}
