//! Core data models used throughout Campus Connect.
//!
//! Each persisted entity has a matching `*Row` struct holding the exact
//! column values stored in SQLite, plus explicit `to_row` / `from_row`
//! conversions. Decoding a row never panics: bad enum text, dates or
//! timestamps come back as [`Error::Decode`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Campus area assigned to entries created without one.
pub const DEFAULT_CAMPUS_AREA: &str = "Other";

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a timestamp for storage. Fixed nanosecond precision keeps text
/// ordering equal to time ordering.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Decode(format!("invalid timestamp '{}': {}", raw, e)))
}

/// Parse a `YYYY-MM-DD` due date.
pub fn parse_due_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        Error::validation(format!("Due date must be YYYY-MM-DD, got '{}'", raw))
    })
}

/// Trim, drop empties, dedupe and sort.
///
/// Commas separate tags in the stored form, so an input containing one
/// is split into several tags here rather than on the way back out.
pub fn normalize_tags<I, T>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|tag| {
            tag.as_ref()
                .split(',')
                .map(|part| part.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Split a comma-separated tag list (as stored or typed on the CLI).
pub fn split_tags(raw: &str) -> Vec<String> {
    normalize_tags([raw])
}

// ============ Enumerations ============

/// Workflow state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Blocked,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Status must be one of todo, in_progress, blocked, done (got '{}')",
                    s
                ))
            })
    }
}

/// Urgency of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Priority must be one of low, medium, high, critical (got '{}')",
                    s
                ))
            })
    }
}

/// Author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(Error::Decode(format!("unknown chat role '{}'", other))),
        }
    }
}

// ============ Knowledge entries ============

/// Structured note captured from Campus Connect or typed by the student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Normalized: trimmed, deduplicated, sorted.
    pub tags: Vec<String>,
    pub campus_area: String,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values of the `knowledge_entries` table.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Option<String>,
    pub campus_area: Option<String>,
    pub source: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl KnowledgeEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            campus_area: DEFAULT_CAMPUS_AREA.to_string(),
            source: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_campus_area(mut self, campus_area: impl Into<String>) -> Self {
        self.campus_area = campus_area.into();
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn to_row(&self) -> KnowledgeRow {
        KnowledgeRow {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            tags: Some(normalize_tags(&self.tags).join(",")),
            campus_area: Some(self.campus_area.clone()),
            source: self.source.clone(),
            created_at: format_ts(&self.created_at),
            updated_at: format_ts(&self.updated_at),
        }
    }

    pub fn from_row(row: KnowledgeRow) -> Result<Self> {
        Ok(Self {
            tags: row.tags.as_deref().map(split_tags).unwrap_or_default(),
            campus_area: row
                .campus_area
                .unwrap_or_else(|| DEFAULT_CAMPUS_AREA.to_string()),
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            id: row.id,
            title: row.title,
            content: row.content,
            source: row.source,
        })
    }
}

// ============ Tasks ============

/// Task tracked alongside knowledge entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    /// Weak reference to a [`KnowledgeEntry`]; may be nulled by the store.
    pub related_entry_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values of the `tasks` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub related_entry_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            related_entry_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    pub fn to_row(&self) -> TaskRow {
        TaskRow {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status.as_str().to_string(),
            priority: self.priority.as_str().to_string(),
            due_date: self.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            related_entry_id: self.related_entry_id.clone(),
            created_at: format_ts(&self.created_at),
            updated_at: format_ts(&self.updated_at),
        }
    }

    pub fn from_row(row: TaskRow) -> Result<Self> {
        let decode = |e: Error| Error::Decode(format!("task {}: {}", row.id, e));
        let status = row.status.parse::<TaskStatus>().map_err(decode)?;
        let priority = row.priority.parse::<TaskPriority>().map_err(decode)?;
        let due_date = row
            .due_date
            .as_deref()
            .map(parse_due_date)
            .transpose()
            .map_err(decode)?;
        Ok(Self {
            status,
            priority,
            due_date,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            id: row.id,
            title: row.title,
            description: row.description,
            related_entry_id: row.related_entry_id,
        })
    }
}

// ============ Portal records ============

/// Raw Campus Connect snapshot entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalRecord {
    pub id: String,
    pub record_id: String,
    pub course: Option<String>,
    pub component: String,
    pub grade: Option<String>,
    pub points: Option<String>,
    pub campus_area: String,
    pub needs_follow_up: bool,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Column values of the `portal_records` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalRecordRow {
    pub id: String,
    pub record_id: String,
    pub course: Option<String>,
    pub component: String,
    pub grade: Option<String>,
    pub points: Option<String>,
    pub campus_area: Option<String>,
    pub needs_follow_up: i64,
    pub notes: Option<String>,
    pub updated_at: String,
}

impl PortalRecord {
    /// Title of the follow-up task derived from this record.
    pub fn follow_up_title(&self) -> String {
        format!("Follow up: {}", self.component)
    }

    pub fn to_row(&self) -> PortalRecordRow {
        PortalRecordRow {
            id: self.id.clone(),
            record_id: self.record_id.clone(),
            course: self.course.clone(),
            component: self.component.clone(),
            grade: self.grade.clone(),
            points: self.points.clone(),
            campus_area: Some(self.campus_area.clone()),
            needs_follow_up: i64::from(self.needs_follow_up),
            notes: self.notes.clone(),
            updated_at: format_ts(&self.updated_at),
        }
    }

    pub fn from_row(row: PortalRecordRow) -> Result<Self> {
        Ok(Self {
            campus_area: row
                .campus_area
                .unwrap_or_else(|| DEFAULT_CAMPUS_AREA.to_string()),
            needs_follow_up: row.needs_follow_up != 0,
            updated_at: parse_ts(&row.updated_at)?,
            id: row.id,
            record_id: row.record_id,
            course: row.course,
            component: row.component,
            grade: row.grade,
            points: row.points,
            notes: row.notes,
        })
    }
}

// ============ Chat transcript ============

/// One turn of a chat session. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    /// Ids of the entries and tasks the turn referenced.
    pub citations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Column values of the `chat_messages` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessageRow {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub citations: Option<String>,
    pub created_at: String,
}

impl ChatMessage {
    pub fn new(
        session_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        citations: Vec<String>,
    ) -> Self {
        Self {
            id: new_id(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            citations,
            created_at: Utc::now(),
        }
    }

    pub fn to_row(&self) -> ChatMessageRow {
        ChatMessageRow {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            role: self.role.as_str().to_string(),
            content: self.content.clone(),
            citations: Some(self.citations.join(",")),
            created_at: format_ts(&self.created_at),
        }
    }

    pub fn from_row(row: ChatMessageRow) -> Result<Self> {
        let citations = row
            .citations
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            role: row.role.parse()?,
            citations,
            created_at: parse_ts(&row.created_at)?,
            id: row.id,
            session_id: row.session_id,
            content: row.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags_dedupes_sorts_and_trims() {
        let tags = normalize_tags(["  finaid", "grades", "", "finaid ", "  "]);
        assert_eq!(tags, vec!["finaid", "grades"]);
    }

    #[test]
    fn test_split_tags_handles_stored_form() {
        assert_eq!(split_tags("b, a,,a"), vec!["a", "b"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn test_knowledge_entry_roundtrip() {
        let entry = KnowledgeEntry::new("Financial Aid Deadline", "FAFSA due March 1")
            .with_tags(["finaid", " deadlines ", "finaid"])
            .with_campus_area("Financial Aid")
            .with_source(Some("Campus Connect > Financial Aid".to_string()));
        let row = entry.to_row();
        assert_eq!(row.tags.as_deref(), Some("deadlines,finaid"));
        let restored = KnowledgeEntry::from_row(row).unwrap();
        assert_eq!(restored, entry);
    }

    #[test]
    fn test_tag_with_comma_survives_row_roundtrip() {
        let entry = KnowledgeEntry::new("Fees", "Spring fees posted").with_tags(["fees, tuition"]);
        assert_eq!(entry.tags, vec!["fees", "tuition"]);
        let restored = KnowledgeEntry::from_row(entry.to_row()).unwrap();
        assert_eq!(restored, entry);
    }

    #[test]
    fn test_knowledge_row_without_area_defaults_to_other() {
        let mut row = KnowledgeEntry::new("t", "c").to_row();
        row.campus_area = None;
        row.tags = None;
        let entry = KnowledgeEntry::from_row(row).unwrap();
        assert_eq!(entry.campus_area, "Other");
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_task_roundtrip() {
        let mut task = Task::new("Email advisor", "Ask about CSC 301 prerequisites");
        task.status = TaskStatus::InProgress;
        task.priority = TaskPriority::Critical;
        task.due_date = Some(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        task.related_entry_id = Some(new_id());
        let restored = Task::from_row(task.to_row()).unwrap();
        assert_eq!(restored, task);
    }

    #[test]
    fn test_task_row_with_unknown_status_fails_to_decode() {
        let mut row = Task::new("t", "d").to_row();
        row.status = "someday".to_string();
        match Task::from_row(row) {
            Err(Error::Decode(msg)) => assert!(msg.contains("someday")),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_and_priority_parse() {
        assert_eq!("blocked".parse::<TaskStatus>().unwrap(), TaskStatus::Blocked);
        assert_eq!(
            "critical".parse::<TaskPriority>().unwrap(),
            TaskPriority::Critical
        );
        assert!(matches!(
            "Done".parse::<TaskStatus>(),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            "urgent".parse::<TaskPriority>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_portal_record_roundtrip() {
        let record = PortalRecord {
            id: new_id(),
            record_id: "CC-1001".to_string(),
            course: Some("CSC 301".to_string()),
            component: "Midterm Grade".to_string(),
            grade: Some("B+".to_string()),
            points: Some("87".to_string()),
            campus_area: "Grades".to_string(),
            needs_follow_up: true,
            notes: None,
            updated_at: Utc::now(),
        };
        let row = record.to_row();
        assert_eq!(row.needs_follow_up, 1);
        assert_eq!(PortalRecord::from_row(row).unwrap(), record);
    }

    #[test]
    fn test_chat_message_roundtrip_with_and_without_citations() {
        let cited = ChatMessage::new("s1", Role::Assistant, "answer", vec![new_id(), new_id()]);
        assert_eq!(ChatMessage::from_row(cited.to_row()).unwrap(), cited);

        let bare = ChatMessage::new("s1", Role::User, "question", Vec::new());
        assert_eq!(ChatMessage::from_row(bare.to_row()).unwrap(), bare);
    }

    #[test]
    fn test_timestamp_text_orders_chronologically() {
        let earlier = parse_ts("2025-01-01T00:00:00.1Z").unwrap();
        let later = parse_ts("2025-01-01T00:00:00.12Z").unwrap();
        assert!(format_ts(&earlier) < format_ts(&later));
    }

    #[test]
    fn test_parse_due_date_rejects_garbage() {
        assert!(parse_due_date("2025-02-30").is_err());
        assert!(parse_due_date("next week").is_err());
        assert_eq!(
            parse_due_date(" 2025-12-01 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
        );
    }
}
