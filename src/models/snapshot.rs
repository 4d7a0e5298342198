use serde::{Deserialize, Serialize};

use super::{ConversationTurn, Fix, ToolCall};

/// Everything the dashboard backend returns for one test run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
    #[serde(default, alias = "apiCalls")]
    pub calls: Vec<ToolCall>,
    #[serde(default)]
    pub fixes: Vec<Fix>,
}

impl RunSnapshot {
    /// Label for logs and reports
    pub fn label(&self) -> &str {
        self.run_id.as_deref().unwrap_or("<unnamed run>")
    }
}
