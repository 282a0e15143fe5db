//! In-memory [`Store`] implementation for tests.
//!
//! Rows live in `Vec`s behind `std::sync::RwLock`. Ordering matches the
//! SQLite store: "recent" means `updated_at` descending, with insertion
//! order as the tiebreak.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{ChatMessage, KnowledgeEntry, PortalRecord, Task, TaskStatus};

use super::Store;

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct InMemoryStore {
    knowledge: RwLock<Vec<KnowledgeEntry>>,
    tasks: RwLock<Vec<Task>>,
    records: RwLock<Vec<PortalRecord>>,
    messages: RwLock<Vec<ChatMessage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logged chat turns across all sessions.
    pub fn message_count(&self) -> usize {
        self.messages.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Number of stored portal records.
    pub fn record_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| Error::Poisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| Error::Poisoned)
}

/// Replace the row with the same id in place, or append it.
fn upsert_by_id<T: Clone>(rows: &mut Vec<T>, item: &T, id_of: impl Fn(&T) -> &str) {
    let id = id_of(item);
    match rows.iter().position(|row| id_of(row) == id) {
        Some(pos) => rows[pos] = item.clone(),
        None => rows.push(item.clone()),
    }
}

fn by_ids<T: Clone>(rows: &[T], ids: &[String], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    ids.iter()
        .filter_map(|id| rows.iter().find(|row| id_of(row) == id.as_str()).cloned())
        .collect()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_knowledge(&self, entry: &KnowledgeEntry) -> Result<()> {
        let mut rows = write(&self.knowledge)?;
        upsert_by_id(&mut rows, entry, |e| e.id.as_str());
        Ok(())
    }

    async fn fetch_recent_knowledge(&self, limit: usize) -> Result<Vec<KnowledgeEntry>> {
        let mut rows = read(&self.knowledge)?.clone();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn fetch_knowledge_by_ids(&self, ids: &[String]) -> Result<Vec<KnowledgeEntry>> {
        let rows = read(&self.knowledge)?;
        Ok(by_ids(&rows, ids, |e| e.id.as_str()))
    }

    async fn upsert_task(&self, task: &Task) -> Result<()> {
        let mut rows = write(&self.tasks)?;
        upsert_by_id(&mut rows, task, |t| t.id.as_str());
        Ok(())
    }

    async fn fetch_recent_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let mut rows: Vec<Task> = read(&self.tasks)?
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn fetch_tasks_by_ids(&self, ids: &[String]) -> Result<Vec<Task>> {
        let rows = read(&self.tasks)?;
        Ok(by_ids(&rows, ids, |t| t.id.as_str()))
    }

    async fn fetch_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(read(&self.tasks)?.iter().find(|t| t.id == id).cloned())
    }

    async fn fetch_task_by_title(&self, title: &str) -> Result<Option<Task>> {
        Ok(read(&self.tasks)?.iter().find(|t| t.title == title).cloned())
    }

    async fn upsert_portal_records(&self, records: &[PortalRecord]) -> Result<u64> {
        let mut rows = write(&self.records)?;
        for record in records {
            upsert_by_id(&mut rows, record, |r| r.id.as_str());
        }
        Ok(records.len() as u64)
    }

    async fn append_chat_message(&self, message: &ChatMessage) -> Result<()> {
        write(&self.messages)?.push(message.clone());
        Ok(())
    }

    async fn fetch_chat_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let mut rows: Vec<ChatMessage> = read(&self.messages)?
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
