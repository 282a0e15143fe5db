//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the schema created by
//! [`migrate::run_migrations`]. Every write runs in its own transaction:
//! it commits on success and rolls back when the transaction is dropped
//! on an error path.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::migrate;
use crate::models::{
    ChatMessage, ChatMessageRow, KnowledgeEntry, KnowledgeRow, PortalRecord, Task, TaskRow,
    TaskStatus,
};

use super::Store;

/// SQLite implementation of the [`Store`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and bring the schema up to date.
    ///
    /// This is the only place the database file and its directory get
    /// created; the entry point calls it once and passes the handle on.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn knowledge_from_row(row: &SqliteRow) -> Result<KnowledgeEntry> {
    KnowledgeEntry::from_row(KnowledgeRow {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        tags: row.try_get("tags")?,
        campus_area: row.try_get("campus_area")?,
        source: row.try_get("source")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    Task::from_row(TaskRow {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        due_date: row.try_get("due_date")?,
        related_entry_id: row.try_get("related_entry_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage> {
    ChatMessage::from_row(ChatMessageRow {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        citations: row.try_get("citations")?,
        created_at: row.try_get("created_at")?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Reorder `rows` to follow `ids`, dropping ids with no row.
fn in_id_order<T: Clone>(rows: Vec<T>, ids: &[String], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    ids.iter()
        .filter_map(|id| rows.iter().find(|row| id_of(row) == id.as_str()).cloned())
        .collect()
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_knowledge(&self, entry: &KnowledgeEntry) -> Result<()> {
        let row = entry.to_row();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO knowledge_entries (id, title, content, tags, campus_area, source,
                                           created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                tags = excluded.tags,
                campus_area = excluded.campus_area,
                source = excluded.source,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.title)
        .bind(&row.content)
        .bind(&row.tags)
        .bind(&row.campus_area)
        .bind(&row.source)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id = %row.id, "upserted knowledge entry");
        Ok(())
    }

    async fn fetch_recent_knowledge(&self, limit: usize) -> Result<Vec<KnowledgeEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_entries ORDER BY updated_at DESC, rowid ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(knowledge_from_row).collect()
    }

    async fn fetch_knowledge_by_ids(&self, ids: &[String]) -> Result<Vec<KnowledgeEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM knowledge_entries WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        let entries = rows
            .iter()
            .map(knowledge_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(in_id_order(entries, ids, |e| e.id.as_str()))
    }

    async fn upsert_task(&self, task: &Task) -> Result<()> {
        let row = task.to_row();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, due_date,
                               related_entry_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                status = excluded.status,
                priority = excluded.priority,
                due_date = excluded.due_date,
                related_entry_id = excluded.related_entry_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.status)
        .bind(&row.priority)
        .bind(&row.due_date)
        .bind(&row.related_entry_id)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id = %row.id, title = %row.title, "upserted task");
        Ok(())
    }

    async fn fetch_recent_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let mut sql = String::from("SELECT * FROM tasks");
        if status.is_some() {
            sql.push_str(" WHERE status = ?");
        }
        sql.push_str(" ORDER BY updated_at DESC, rowid ASC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query.bind(limit as i64).fetch_all(&self.pool).await?;

        rows.iter().map(task_from_row).collect()
    }

    async fn fetch_tasks_by_ids(&self, ids: &[String]) -> Result<Vec<Task>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM tasks WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        let tasks = rows.iter().map(task_from_row).collect::<Result<Vec<_>>>()?;

        Ok(in_id_order(tasks, ids, |t| t.id.as_str()))
    }

    async fn fetch_task(&self, id: &str) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn fetch_task_by_title(&self, title: &str) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE title = ? LIMIT 1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn upsert_portal_records(&self, records: &[PortalRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for record in records {
            let row = record.to_row();
            let result = sqlx::query(
                r#"
                INSERT INTO portal_records (id, record_id, course, component, grade, points,
                                            campus_area, needs_follow_up, notes, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    record_id = excluded.record_id,
                    course = excluded.course,
                    component = excluded.component,
                    grade = excluded.grade,
                    points = excluded.points,
                    campus_area = excluded.campus_area,
                    needs_follow_up = excluded.needs_follow_up,
                    notes = excluded.notes,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&row.id)
            .bind(&row.record_id)
            .bind(&row.course)
            .bind(&row.component)
            .bind(&row.grade)
            .bind(&row.points)
            .bind(&row.campus_area)
            .bind(row.needs_follow_up)
            .bind(&row.notes)
            .bind(&row.updated_at)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        debug!(written, "upserted portal records");
        Ok(written)
    }

    async fn append_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let row = message.to_row();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, session_id, role, content, citations, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.session_id)
        .bind(&row.role)
        .bind(&row.content)
        .bind(&row.citations)
        .bind(&row.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_chat_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM chat_messages
            WHERE session_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}
