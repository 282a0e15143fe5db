//! Task ranking for chat context.
//!
//! Scores the most recently updated tasks against a query:
//! 2.5 for a title match, 1.5 for a description match (both
//! case-insensitive substring tests) and 1.0 for any task not yet done.
//! When nothing scores, the first `limit` tasks are returned with a
//! score of 1.0 so the assistant always has something to point at.

use serde::Serialize;
use std::cmp::Ordering;

use crate::error::Result;
use crate::models::Task;
use crate::store::Store;

pub const TITLE_WEIGHT: f64 = 2.5;
pub const DESCRIPTION_WEIGHT: f64 = 1.5;
pub const OPEN_BONUS: f64 = 1.0;
pub const FALLBACK_SCORE: f64 = 1.0;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredTask {
    pub score: f64,
    pub task: Task,
}

pub fn score_task(task: &Task, query: &str) -> f64 {
    let q = query.to_lowercase();
    let mut score = 0.0;
    if task.title.to_lowercase().contains(&q) {
        score += TITLE_WEIGHT;
    }
    if task.description.to_lowercase().contains(&q) {
        score += DESCRIPTION_WEIGHT;
    }
    if !task.is_done() {
        score += OPEN_BONUS;
    }
    score
}

/// Rank `tasks` (already in recency order) for `query`.
pub fn rank_tasks(tasks: Vec<Task>, query: &str, limit: usize) -> Vec<ScoredTask> {
    let mut scored: Vec<ScoredTask> = tasks
        .iter()
        .filter_map(|task| {
            let score = score_task(task, query);
            (score > 0.0).then(|| ScoredTask {
                score,
                task: task.clone(),
            })
        })
        .collect();

    if scored.is_empty() {
        return tasks
            .into_iter()
            .take(limit)
            .map(|task| ScoredTask {
                score: FALLBACK_SCORE,
                task,
            })
            .collect();
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Rank the `scan_limit` most recently updated tasks for `query`.
pub async fn rank_recent_tasks(
    store: &dyn Store,
    query: &str,
    limit: usize,
    scan_limit: usize,
) -> Result<Vec<ScoredTask>> {
    let tasks = store.fetch_recent_tasks(None, scan_limit).await?;
    Ok(rank_tasks(tasks, query, limit))
}
