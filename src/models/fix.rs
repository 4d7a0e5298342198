use serde::{Deserialize, Serialize};

/// Lifecycle state of a proposed fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    Pending,
    Applied,
    Rejected,
    Verified,
}

/// Where inside the target file a fix applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_line: Option<String>,
}

/// A remediation proposed by the diagnosis backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    pub fix_id: String,
    pub target_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<FixLocation>,
    /// Backend confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
    pub status: FixStatus,
}

impl Fix {
    pub fn pending(fix_id: impl Into<String>, target_file: impl Into<String>, confidence: f64) -> Self {
        Self {
            fix_id: fix_id.into(),
            target_file: target_file.into(),
            location: None,
            confidence,
            status: FixStatus::Pending,
        }
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.location.get_or_insert_with(FixLocation::default).section = Some(section.into());
        self
    }

    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.location.get_or_insert_with(FixLocation::default).function = Some(function.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == FixStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fix() {
        let json = r###"{
            "fixId": "fix-01",
            "targetFile": "prompts/system.md",
            "location": {"section": "introSection", "afterLine": "## Greeting"},
            "confidence": 0.82,
            "status": "pending",
            "description": "ignored by the arbiter"
        }"###;

        let fix: Fix = serde_json::from_str(json).unwrap();

        assert_eq!(fix.fix_id, "fix-01");
        assert!(fix.is_pending());
        let location = fix.location.unwrap();
        assert_eq!(location.section.as_deref(), Some("introSection"));
        assert_eq!(location.function, None);
        assert_eq!(location.after_line.as_deref(), Some("## Greeting"));
    }
}
