use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::schema::{
    ActionItem, AnalysisMode, Decision, EmailMetadata, ExtractionResult, HealthStatus, Level,
    MeetingMetadata, ProjectHealth, Risk, SourceMetadata, StatusUpdate, UpdateType, NOT_SPECIFIED,
};

/// Opening fence with optional language tag, or a bare closing fence, plus trailing whitespace.
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```[a-z0-9_+\-]*\s*").expect("code fence pattern is valid"));

const PREVIEW_CHARS: usize = 200;

/// What kind of deviation from the result schema was papered over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    Missing,
    WrongType { found: &'static str },
    UnknownVariant(String),
}

/// One field that did not match the schema and received a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub path: String,
    pub kind: MismatchKind,
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MismatchKind::Missing => write!(f, "{}: missing", self.path),
            MismatchKind::WrongType { found } => write!(f, "{}: unexpected {}", self.path, found),
            MismatchKind::UnknownVariant(raw) => write!(f, "{}: unknown value {:?}", self.path, raw),
        }
    }
}

/// A normalized result together with the substitutions made to get there.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub result: ExtractionResult,
    pub mismatches: Vec<SchemaMismatch>,
}

/// Coerces free-form model replies into an [`ExtractionResult`].
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, reply: &str, mode: AnalysisMode) -> Result<ExtractionResult, AnalysisError> {
        self.normalize_with_report(reply, mode).map(|normalized| normalized.result)
    }

    /// De-fence, isolate, parse, then coerce field by field.
    pub fn normalize_with_report(
        &self,
        reply: &str,
        mode: AnalysisMode,
    ) -> Result<Normalized, AnalysisError> {
        if reply.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }
        debug!(raw = %preview(reply), "Raw model reply");

        let cleaned = strip_code_fences(reply);
        if cleaned.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }
        debug!(cleaned = %preview(&cleaned), "Cleaned model reply");

        let payload = parse_object(&cleaned)?;

        let mut coercer = Coercer::default();
        let result = coercer.extraction(&payload, mode);

        if !coercer.mismatches.is_empty() {
            let fields: Vec<String> = coercer.mismatches.iter().map(ToString::to_string).collect();
            warn!(
                mode = %mode,
                count = fields.len(),
                fields = ?fields,
                "Substituted defaults for off-schema fields"
            );
        }

        Ok(Normalized {
            result,
            mismatches: coercer.mismatches,
        })
    }
}

/// Remove every Markdown code fence marker and trim the remainder.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Slice from the first `{` to the last `}`. Returns the input unchanged
/// when there is no such span.
pub fn isolate_payload(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Top-level `{...}` spans with balanced braces, skipping braces inside JSON strings.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }

    spans
}

fn parse_object(cleaned: &str) -> Result<Map<String, Value>, AnalysisError> {
    let primary = isolate_payload(cleaned);

    let reason = match serde_json::from_str::<Value>(primary) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => format!("top-level JSON value is {}, expected an object", type_name(&other)),
        Err(err) => err.to_string(),
    };

    // Stray braces in surrounding prose break the simple slice. Fall back to
    // the largest balanced object that parses on its own.
    let recovered = balanced_objects(cleaned)
        .into_iter()
        .filter(|candidate| *candidate != primary)
        .filter_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some((candidate.len(), map)),
            _ => None,
        })
        .max_by_key(|(len, _)| *len);

    if let Some((len, map)) = recovered {
        debug!(payload_len = len, "Recovered JSON object with balanced-brace scan");
        return Ok(map);
    }

    Err(AnalysisError::MalformedResponse {
        cleaned: cleaned.to_string(),
        reason,
    })
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn field_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

#[derive(Default)]
struct Coercer {
    mismatches: Vec<SchemaMismatch>,
}

impl Coercer {
    fn record(&mut self, path: String, kind: MismatchKind) {
        self.mismatches.push(SchemaMismatch { path, kind });
    }

    fn extraction(&mut self, root: &Map<String, Value>, mode: AnalysisMode) -> ExtractionResult {
        let source_metadata = match mode {
            AnalysisMode::Email => SourceMetadata::Email(self.email_metadata(root)),
            AnalysisMode::Meeting => SourceMetadata::Meeting(self.meeting_metadata(root)),
        };

        let action_items = self.records(root, "", "action_items", |c, item, path| ActionItem {
            task: c.string(item, path, "task"),
            assignee: c.string(item, path, "assignee"),
            due_date: c.string(item, path, "due_date"),
            priority: c.variant(item, path, "priority", Level::parse),
        });

        let decisions = self.records(root, "", "decisions", |c, item, path| Decision {
            decision: c.string(item, path, "decision"),
            context: c.string(item, path, "context"),
        });

        let risks = self.records(root, "", "risks", |c, item, path| Risk {
            risk: c.string(item, path, "risk"),
            severity: c.variant(item, path, "severity", Level::parse),
            impact: c.string(item, path, "impact"),
            raised_by: c.string(item, path, "mentioned_by"),
        });

        let key_topics = self.strings(root, "", "key_topics");

        let status_updates = match mode {
            AnalysisMode::Email => Some(self.records(root, "", "status_updates", |c, item, path| {
                StatusUpdate {
                    area: c.string(item, path, "area"),
                    status: c.string(item, path, "status"),
                    update_type: c.variant(item, path, "type", UpdateType::parse),
                }
            })),
            AnalysisMode::Meeting => None,
        };

        let project_health = self.project_health(root);

        ExtractionResult {
            source_metadata,
            action_items,
            decisions,
            risks,
            key_topics,
            status_updates,
            project_health,
        }
    }

    fn email_metadata(&mut self, root: &Map<String, Value>) -> EmailMetadata {
        let empty = Map::new();
        let meta = self.object(root, "", "email_metadata").unwrap_or(&empty);
        let path = "email_metadata";
        EmailMetadata {
            subject: self.string(meta, path, "subject"),
            from_party: self.string(meta, path, "from"),
            date: self.string(meta, path, "date"),
            project_name: self.string(meta, path, "project_name"),
        }
    }

    fn meeting_metadata(&mut self, root: &Map<String, Value>) -> MeetingMetadata {
        let empty = Map::new();
        let meta = self.object(root, "", "meeting_metadata").unwrap_or(&empty);
        let path = "meeting_metadata";
        MeetingMetadata {
            project_name: self.string(meta, path, "project_name"),
            date: self.string(meta, path, "date"),
            attendees: self.strings(meta, path, "attendees"),
        }
    }

    fn project_health(&mut self, root: &Map<String, Value>) -> ProjectHealth {
        let Some(health) = self.object(root, "", "project_health") else {
            return ProjectHealth::default();
        };
        ProjectHealth {
            status: self.variant(health, "project_health", "status", HealthStatus::parse),
            summary: self.string(health, "project_health", "summary"),
        }
    }

    fn object<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        parent: &str,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        match obj.get(key) {
            Some(Value::Object(map)) => Some(map),
            None | Some(Value::Null) => {
                self.record(field_path(parent, key), MismatchKind::Missing);
                None
            }
            Some(other) => {
                self.record(field_path(parent, key), MismatchKind::WrongType { found: type_name(other) });
                None
            }
        }
    }

    fn string(&mut self, obj: &Map<String, Value>, parent: &str, key: &str) -> String {
        match obj.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => {
                self.record(field_path(parent, key), MismatchKind::WrongType { found: "number" });
                n.to_string()
            }
            Some(Value::Bool(b)) => {
                self.record(field_path(parent, key), MismatchKind::WrongType { found: "boolean" });
                b.to_string()
            }
            None | Some(Value::Null) | Some(Value::String(_)) => {
                self.record(field_path(parent, key), MismatchKind::Missing);
                NOT_SPECIFIED.to_string()
            }
            Some(other) => {
                self.record(field_path(parent, key), MismatchKind::WrongType { found: type_name(other) });
                NOT_SPECIFIED.to_string()
            }
        }
    }

    fn variant<T: Default>(
        &mut self,
        obj: &Map<String, Value>,
        parent: &str,
        key: &str,
        parse: fn(&str) -> Option<T>,
    ) -> T {
        match obj.get(key) {
            Some(Value::String(raw)) => parse(raw).unwrap_or_else(|| {
                self.record(field_path(parent, key), MismatchKind::UnknownVariant(raw.clone()));
                T::default()
            }),
            None | Some(Value::Null) => {
                self.record(field_path(parent, key), MismatchKind::Missing);
                T::default()
            }
            Some(other) => {
                self.record(field_path(parent, key), MismatchKind::WrongType { found: type_name(other) });
                T::default()
            }
        }
    }

    fn array<'a>(&mut self, obj: &'a Map<String, Value>, parent: &str, key: &str) -> &'a [Value] {
        match obj.get(key) {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => {
                self.record(field_path(parent, key), MismatchKind::Missing);
                &[]
            }
            Some(other) => {
                self.record(field_path(parent, key), MismatchKind::WrongType { found: type_name(other) });
                &[]
            }
        }
    }

    /// Array of records; elements that aren't objects are dropped.
    fn records<T>(
        &mut self,
        obj: &Map<String, Value>,
        parent: &str,
        key: &str,
        mut build: impl FnMut(&mut Self, &Map<String, Value>, &str) -> T,
    ) -> Vec<T> {
        let base = field_path(parent, key);
        let mut out = Vec::new();
        for (idx, item) in self.array(obj, parent, key).iter().enumerate() {
            let path = format!("{}[{}]", base, idx);
            match item {
                Value::Object(map) => out.push(build(self, map, &path)),
                other => self.record(path, MismatchKind::WrongType { found: type_name(other) }),
            }
        }
        out
    }

    fn strings(&mut self, obj: &Map<String, Value>, parent: &str, key: &str) -> Vec<String> {
        let base = field_path(parent, key);
        let mut out = Vec::new();
        for (idx, item) in self.array(obj, parent, key).iter().enumerate() {
            match item {
                Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
                Value::Number(n) => {
                    self.record(format!("{}[{}]", base, idx), MismatchKind::WrongType { found: "number" });
                    out.push(n.to_string());
                }
                other => self.record(
                    format!("{}[{}]", base, idx),
                    MismatchKind::WrongType { found: type_name(other) },
                ),
            }
        }
        out
    }
}
