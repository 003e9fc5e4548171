use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for scalar fields the model left out.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Which kind of source text is being analyzed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Email,
    Meeting,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Email => "email",
            AnalysisMode::Meeting => "meeting",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase and drop separators so "On_Track", "on-track" and "On Track" compare equal.
fn fold(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Priority of an action item, severity of a risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Level {
    High,
    #[default]
    Medium,
    Low,
}

impl Level {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "high" => Some(Level::High),
            "medium" => Some(Level::Medium),
            "low" => Some(Level::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UpdateType {
    Progress,
    Blocker,
    Delay,
    #[serde(rename = "Resource Issue")]
    ResourceIssue,
    Budget,
    #[default]
    Other,
}

impl UpdateType {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "progress" => Some(UpdateType::Progress),
            "blocker" => Some(UpdateType::Blocker),
            "delay" => Some(UpdateType::Delay),
            "resourceissue" => Some(UpdateType::ResourceIssue),
            "budget" => Some(UpdateType::Budget),
            "other" => Some(UpdateType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum HealthStatus {
    #[default]
    #[serde(rename = "On Track")]
    OnTrack,
    #[serde(rename = "At Risk")]
    AtRisk,
    Blocked,
}

impl HealthStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "ontrack" => Some(HealthStatus::OnTrack),
            "atrisk" => Some(HealthStatus::AtRisk),
            "blocked" => Some(HealthStatus::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMetadata {
    pub subject: String,
    #[serde(rename = "from")]
    pub from_party: String,
    pub date: String,
    pub project_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingMetadata {
    pub project_name: String,
    pub date: String,
    pub attendees: Vec<String>,
}

/// Provenance of the analyzed text. Serializes as `email_metadata` or
/// `meeting_metadata` when flattened into [`ExtractionResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SourceMetadata {
    #[serde(rename = "email_metadata")]
    Email(EmailMetadata),
    #[serde(rename = "meeting_metadata")]
    Meeting(MeetingMetadata),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionItem {
    pub task: String,
    pub assignee: String,
    pub due_date: String,
    pub priority: Level,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub decision: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Risk {
    pub risk: String,
    pub severity: Level,
    pub impact: String,
    #[serde(rename = "mentioned_by")]
    pub raised_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub area: String,
    pub status: String,
    #[serde(rename = "type")]
    pub update_type: UpdateType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectHealth {
    pub status: HealthStatus,
    pub summary: String,
}

impl Default for ProjectHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::default(),
            summary: NOT_SPECIFIED.to_string(),
        }
    }
}

/// Normalized output of one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    #[serde(flatten)]
    pub source_metadata: SourceMetadata,
    pub action_items: Vec<ActionItem>,
    pub decisions: Vec<Decision>,
    pub risks: Vec<Risk>,
    pub key_topics: Vec<String>,
    /// Present in email mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_updates: Option<Vec<StatusUpdate>>,
    pub project_health: ProjectHealth,
}

impl ExtractionResult {
    pub fn mode(&self) -> AnalysisMode {
        match self.source_metadata {
            SourceMetadata::Email(_) => AnalysisMode::Email,
            SourceMetadata::Meeting(_) => AnalysisMode::Meeting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enum_parsing_is_lenient_about_case_and_separators() {
        assert_eq!(Level::parse("HIGH"), Some(Level::High));
        assert_eq!(Level::parse(" low "), Some(Level::Low));
        assert_eq!(Level::parse("Urgent"), None);

        assert_eq!(HealthStatus::parse("on_track"), Some(HealthStatus::OnTrack));
        assert_eq!(HealthStatus::parse("At-Risk"), Some(HealthStatus::AtRisk));
        assert_eq!(UpdateType::parse("resource issue"), Some(UpdateType::ResourceIssue));
        assert_eq!(UpdateType::parse("ResourceIssue"), Some(UpdateType::ResourceIssue));
    }

    #[test]
    fn test_email_result_serializes_with_wire_names() {
        let result = ExtractionResult {
            source_metadata: SourceMetadata::Email(EmailMetadata {
                subject: "Delay".to_string(),
                from_party: "Sarah".to_string(),
                date: NOT_SPECIFIED.to_string(),
                project_name: "Buildout".to_string(),
            }),
            action_items: vec![],
            decisions: vec![],
            risks: vec![Risk {
                risk: "processor delay".to_string(),
                severity: Level::High,
                impact: "install date".to_string(),
                raised_by: "supplier".to_string(),
            }],
            key_topics: vec!["supply chain".to_string()],
            status_updates: Some(vec![StatusUpdate {
                area: "Equipment".to_string(),
                status: "late".to_string(),
                update_type: UpdateType::ResourceIssue,
            }]),
            project_health: ProjectHealth {
                status: HealthStatus::AtRisk,
                summary: "Slipping".to_string(),
            },
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["email_metadata"]["from"], "Sarah");
        assert_eq!(value["risks"][0]["mentioned_by"], "supplier");
        assert_eq!(value["status_updates"][0]["type"], "Resource Issue");
        assert_eq!(value["project_health"]["status"], "At Risk");
        assert!(value.get("meeting_metadata").is_none());
    }

    #[test]
    fn test_meeting_result_omits_status_updates() {
        let result = ExtractionResult {
            source_metadata: SourceMetadata::Meeting(MeetingMetadata {
                project_name: "Buildout".to_string(),
                date: "November 12, 2024".to_string(),
                attendees: vec!["Sarah".to_string(), "Mark".to_string()],
            }),
            action_items: vec![],
            decisions: vec![],
            risks: vec![],
            key_topics: vec![],
            status_updates: None,
            project_health: ProjectHealth::default(),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["meeting_metadata"]["attendees"], json!(["Sarah", "Mark"]));
        assert!(value.get("status_updates").is_none());
        assert_eq!(value["project_health"]["status"], "On Track");
        assert_eq!(result.mode(), AnalysisMode::Meeting);
    }
}
