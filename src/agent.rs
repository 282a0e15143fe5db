//! Question answering over stored notes and tasks.
//!
//! [`CampusAgent::answer`] retrieves the best knowledge entries and tasks
//! for a prompt, composes them into a completion request and returns the
//! reply together with the ids it was grounded on.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::llm::Responder;
use crate::models::{KnowledgeEntry, Task};
use crate::ranking::rank_recent_tasks;
use crate::search::search_knowledge;
use crate::store::Store;

pub const SYSTEM_PROMPT: &str = "You are a helpful academic success coach for university students. \
Use the provided knowledge entries and tasks to answer user questions. \
Cite concrete action items and stay concise.";

const CLOSING_INSTRUCTION: &str =
    "Respond with 2-3 sentences highlighting risks, upcoming deadlines, and a suggested next step.";

/// Everything produced for one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub answer: String,
    /// Knowledge entry ids followed by task ids.
    pub citations: Vec<String>,
    pub knowledge: Vec<KnowledgeEntry>,
    pub tasks: Vec<Task>,
    pub suggested_actions: Vec<String>,
}

pub struct CampusAgent {
    store: Arc<dyn Store>,
    responder: Responder,
    retrieval: RetrievalConfig,
}

impl CampusAgent {
    pub fn new(store: Arc<dyn Store>, responder: Responder, retrieval: RetrievalConfig) -> Self {
        Self {
            store,
            responder,
            retrieval,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Answer `prompt`. Only retrieval errors propagate; completion
    /// failures are absorbed by the [`Responder`].
    pub async fn answer(&self, prompt: &str) -> Result<AgentResult> {
        let knowledge: Vec<KnowledgeEntry> = search_knowledge(
            self.store.as_ref(),
            prompt,
            self.retrieval.chat_knowledge_limit,
            self.retrieval.knowledge_scan_limit,
        )
        .await?
        .into_iter()
        .map(|hit| hit.entry)
        .collect();

        let tasks: Vec<Task> = rank_recent_tasks(
            self.store.as_ref(),
            prompt,
            self.retrieval.chat_task_limit,
            self.retrieval.task_scan_limit,
        )
        .await?
        .into_iter()
        .map(|hit| hit.task)
        .collect();

        debug!(
            knowledge = knowledge.len(),
            tasks = tasks.len(),
            "retrieved chat context"
        );

        let user = build_context(prompt, &knowledge, &tasks);
        let answer = self.responder.respond(SYSTEM_PROMPT, &user).await;

        let citations = knowledge
            .iter()
            .map(|e| e.id.clone())
            .chain(tasks.iter().map(|t| t.id.clone()))
            .collect();
        let suggested_actions = tasks
            .iter()
            .map(|t| format!("Advance task '{}' (status: {})", t.title, t.status))
            .collect();

        Ok(AgentResult {
            answer,
            citations,
            knowledge,
            tasks,
            suggested_actions,
        })
    }
}

/// Compose the user message sent to the completion service.
pub fn build_context(prompt: &str, knowledge: &[KnowledgeEntry], tasks: &[Task]) -> String {
    let knowledge_block = if knowledge.is_empty() {
        "No knowledge entries yet.".to_string()
    } else {
        knowledge
            .iter()
            .map(|e| {
                let tags = if e.tags.is_empty() {
                    "untagged".to_string()
                } else {
                    e.tags.join(", ")
                };
                format!("- [{}] {} ({}): {}", e.id, e.title, tags, e.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let task_block = if tasks.is_empty() {
        "No tasks found.".to_string()
    } else {
        tasks
            .iter()
            .map(|t| {
                format!(
                    "- [{}] {} (status={}, priority={}): {}",
                    t.id, t.title, t.status, t.priority, t.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Question: {}\n\nKnowledge entries:\n{}\n\nTasks:\n{}\n\n{}",
        prompt, knowledge_block, task_block, CLOSING_INSTRUCTION
    )
}
