//! Task management: create, list, update, and follow-up generation.
//!
//! Status, priority and due-date text is validated before any store
//! write, so a rejected command leaves no partial state behind.

use anyhow::Result as AnyResult;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{parse_due_date, PortalRecord, Task, TaskPriority, TaskStatus};
use crate::store::Store;

/// Campus area whose follow-ups are created with high priority.
pub const URGENT_AREA: &str = "Financial Aid";

/// Input for [`add_task`]. Enumerated fields are raw text from the caller.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub related_entry_id: Option<String>,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Todo.as_str().to_string(),
            priority: TaskPriority::Medium.as_str().to_string(),
            due_date: None,
            related_entry_id: None,
        }
    }
}

/// Fields to change in [`update_task`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

pub async fn add_task(store: &dyn Store, new: NewTask) -> Result<Task> {
    let status: TaskStatus = new.status.trim().parse()?;
    let priority: TaskPriority = new.priority.trim().parse()?;
    let due_date = new.due_date.as_deref().map(parse_due_date).transpose()?;

    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::validation("Task title must not be blank"));
    }

    let related_entry_id = new
        .related_entry_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    if let Some(ref id) = related_entry_id {
        let found = store.fetch_knowledge_by_ids(std::slice::from_ref(id)).await?;
        if found.is_empty() {
            return Err(Error::not_found("Knowledge entry", id.clone()));
        }
    }

    let mut task = Task::new(title, new.description.trim());
    task.status = status;
    task.priority = priority;
    task.due_date = due_date;
    task.related_entry_id = related_entry_id;

    store.upsert_task(&task).await?;
    Ok(task)
}

pub async fn list_tasks(
    store: &dyn Store,
    status: Option<TaskStatus>,
    limit: usize,
) -> Result<Vec<Task>> {
    store.fetch_recent_tasks(status, limit).await
}

/// Apply `update` to the task with `task_id` and bump `updated_at`.
///
/// Every supplied field is validated before the task is looked up or
/// written.
pub async fn update_task(store: &dyn Store, task_id: &str, update: TaskUpdate) -> Result<Task> {
    let status = update
        .status
        .as_deref()
        .map(|s| s.trim().parse::<TaskStatus>())
        .transpose()?;
    let priority = update
        .priority
        .as_deref()
        .map(|p| p.trim().parse::<TaskPriority>())
        .transpose()?;
    let due_date = update.due_date.as_deref().map(parse_due_date).transpose()?;

    let mut task = store
        .fetch_task(task_id)
        .await?
        .ok_or_else(|| Error::not_found("Task", task_id))?;

    if let Some(title) = update.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        task.title = title.to_string();
    }
    if let Some(description) = update
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        task.description = description.to_string();
    }
    if let Some(status) = status {
        task.status = status;
    }
    if let Some(priority) = priority {
        task.priority = priority;
    }
    if due_date.is_some() {
        task.due_date = due_date;
    }
    task.updated_at = Utc::now();

    store.upsert_task(&task).await?;
    Ok(task)
}

/// Build the follow-up task for a record that needs action.
pub fn derive_follow_up(record: &PortalRecord) -> Task {
    let description = match record.notes.as_deref().map(str::trim) {
        Some(notes) if !notes.is_empty() => notes.to_string(),
        _ => format!(
            "Review {} in Campus Connect.",
            record.course.as_deref().unwrap_or("record")
        ),
    };
    let mut task = Task::new(record.follow_up_title(), description);
    task.priority = if record.campus_area == URGENT_AREA {
        TaskPriority::High
    } else {
        TaskPriority::Medium
    };
    task
}

/// Create one follow-up task per record flagged `needs_follow_up`.
///
/// A record is skipped when a task titled `Follow up: {component}`
/// already exists in the store or was created earlier in this batch.
/// Store failures for one record are logged and do not stop the rest.
/// Returns only the newly created tasks.
pub async fn ensure_follow_up_tasks(store: &dyn Store, records: &[PortalRecord]) -> Vec<Task> {
    let mut created = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for record in records.iter().filter(|r| r.needs_follow_up) {
        let title = record.follow_up_title();
        if seen.contains(&title) {
            debug!(%title, record_id = %record.record_id, "duplicate follow-up in batch");
            continue;
        }

        match store.fetch_task_by_title(&title).await {
            Ok(Some(_)) => {
                seen.insert(title);
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(record_id = %record.record_id, error = %e, "follow-up lookup failed");
                continue;
            }
        }

        let task = derive_follow_up(record);
        match store.upsert_task(&task).await {
            Ok(()) => {
                seen.insert(title);
                created.push(task);
            }
            Err(e) => {
                warn!(record_id = %record.record_id, error = %e, "failed to create follow-up");
            }
        }
    }

    created
}

fn describe(task: &Task) -> String {
    let mut line = format!(
        "[{}] {} ({} / {})",
        task.id, task.title, task.status, task.priority
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
    }
    line
}

/// CLI entry point for `campus add-task`.
pub async fn run_add_task(store: &dyn Store, new: NewTask) -> AnyResult<()> {
    let task = add_task(store, new).await?;
    println!(
        "Created task {} (status={}, priority={})",
        task.id, task.status, task.priority
    );
    Ok(())
}

/// CLI entry point for `campus list-tasks`.
pub async fn run_list_tasks(
    store: &dyn Store,
    status: Option<String>,
    limit: usize,
) -> AnyResult<()> {
    let status = status.as_deref().map(str::parse::<TaskStatus>).transpose()?;
    let tasks = list_tasks(store, status, limit).await?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    for task in &tasks {
        println!("{}", describe(task));
    }
    Ok(())
}

/// CLI entry point for `campus update-task`.
pub async fn run_update_task(store: &dyn Store, task_id: &str, update: TaskUpdate) -> AnyResult<()> {
    let task = update_task(store, task_id, update).await?;
    println!(
        "Updated task {}: status={}, priority={}",
        task.id, task.status, task.priority
    );
    Ok(())
}
