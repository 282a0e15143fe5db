//! Persistence gateway for Campus Connect.
//!
//! The [`Store`] trait defines every storage operation the knowledge
//! search, task ranking, follow-up generation and chat modules need,
//! so the scoring logic never touches SQL directly.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Each write is one logical operation: it either fully applies or
//! leaves the store unchanged.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatMessage, KnowledgeEntry, PortalRecord, Task, TaskStatus};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_knowledge`](Store::upsert_knowledge) | Insert or replace an entry by id |
/// | [`fetch_recent_knowledge`](Store::fetch_recent_knowledge) | Most recently updated entries |
/// | [`fetch_knowledge_by_ids`](Store::fetch_knowledge_by_ids) | Entries in input order, unknown ids dropped |
/// | [`upsert_task`](Store::upsert_task) | Insert or replace a task by id |
/// | [`fetch_recent_tasks`](Store::fetch_recent_tasks) | Most recently updated tasks, optional status filter |
/// | [`fetch_tasks_by_ids`](Store::fetch_tasks_by_ids) | Tasks in input order, unknown ids dropped |
/// | [`fetch_task`](Store::fetch_task) | One task by id |
/// | [`fetch_task_by_title`](Store::fetch_task_by_title) | Exact, case-sensitive title lookup |
/// | [`upsert_portal_records`](Store::upsert_portal_records) | Batch insert or replace of imported records |
/// | [`append_chat_message`](Store::append_chat_message) | Append one transcript turn |
/// | [`fetch_chat_history`](Store::fetch_chat_history) | Transcript of a session, newest first |
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_knowledge(&self, entry: &KnowledgeEntry) -> Result<()>;

    async fn fetch_recent_knowledge(&self, limit: usize) -> Result<Vec<KnowledgeEntry>>;

    async fn fetch_knowledge_by_ids(&self, ids: &[String]) -> Result<Vec<KnowledgeEntry>>;

    async fn upsert_task(&self, task: &Task) -> Result<()>;

    async fn fetch_recent_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<Task>>;

    async fn fetch_tasks_by_ids(&self, ids: &[String]) -> Result<Vec<Task>>;

    async fn fetch_task(&self, id: &str) -> Result<Option<Task>>;

    async fn fetch_task_by_title(&self, title: &str) -> Result<Option<Task>>;

    /// Returns the number of records written.
    async fn upsert_portal_records(&self, records: &[PortalRecord]) -> Result<u64>;

    async fn append_chat_message(&self, message: &ChatMessage) -> Result<()>;

    async fn fetch_chat_history(&self, session_id: &str, limit: usize)
        -> Result<Vec<ChatMessage>>;
}
