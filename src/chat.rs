//! Interactive terminal chat.
//!
//! A session moves through [`ChatState`]s:
//!
//! ```text
//! Idle -> AwaitingInput -> Processing -> Responded -> AwaitingInput ...
//!                  \-> Terminated (quit/exit, end of input, Ctrl-C)
//! ```
//!
//! Every user and assistant turn is appended to the transcript under a
//! session id generated once per session.

use anyhow::Result as AnyResult;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::agent::{AgentResult, CampusAgent};
use crate::error::Result;
use crate::models::{new_id, ChatMessage, Role};
use crate::store::Store;

pub const BANNER: &str = "Campus Connect chat ready. Type 'quit' to exit.";
pub const PROMPT: &str = "you> ";
pub const WRAP_WIDTH: usize = 88;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingInput,
    Processing,
    Responded,
    Terminated,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `quit` or `exit`.
    Quit,
    /// End of input or Ctrl-C.
    Interrupted,
}

pub struct ChatSession {
    agent: CampusAgent,
    session_id: String,
    state: ChatState,
}

impl ChatSession {
    pub fn new(agent: CampusAgent) -> Self {
        Self {
            agent,
            session_id: new_id(),
            state: ChatState::Idle,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Drive the session until the user quits or input ends.
    ///
    /// Input lines that are not valid UTF-8 are decoded lossily. A store
    /// failure during a turn is reported to the user and the session goes
    /// back to waiting for input.
    pub async fn run<R, W>(&mut self, mut input: R, out: &mut W) -> Result<SessionEnd>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "{}", BANNER)?;
        let mut buf = Vec::new();

        let end = loop {
            self.state = ChatState::AwaitingInput;
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            buf.clear();
            let read = tokio::select! {
                read = input.read_until(b'\n', &mut buf) => read,
                _ = tokio::signal::ctrl_c() => Ok(0),
            };
            let read = match read {
                Ok(n) => n,
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "failed to read chat input");
                    0
                }
            };
            if read == 0 {
                writeln!(out, "\nSession ended.")?;
                break SessionEnd::Interrupted;
            }

            let line = String::from_utf8_lossy(&buf);
            let prompt = line.trim();
            if prompt.is_empty() {
                continue;
            }
            if is_quit(prompt) {
                writeln!(out, "Goodbye!")?;
                break SessionEnd::Quit;
            }

            self.state = ChatState::Processing;
            if let Err(e) = self.turn(prompt, out).await {
                warn!(session_id = %self.session_id, error = %e, "chat turn failed");
                writeln!(out, "\nassistant> Something went wrong: {}\n", e)?;
            }
            self.state = ChatState::Responded;
        };

        self.state = ChatState::Terminated;
        info!(session_id = %self.session_id, ?end, "chat session finished");
        Ok(end)
    }

    async fn turn<W: Write>(&self, prompt: &str, out: &mut W) -> Result<()> {
        self.log(Role::User, prompt, Vec::new()).await?;
        let result = self.agent.answer(prompt).await?;
        display(out, &result)?;
        self.log(Role::Assistant, &result.answer, result.citations.clone())
            .await
    }

    async fn log(&self, role: Role, content: &str, citations: Vec<String>) -> Result<()> {
        let message = ChatMessage::new(&self.session_id, role, content, citations);
        debug!(session_id = %self.session_id, role = role.as_str(), "logging chat turn");
        self.agent.store().append_chat_message(&message).await
    }
}

fn is_quit(input: &str) -> bool {
    let lower = input.to_lowercase();
    lower == "quit" || lower == "exit"
}

fn display<W: Write>(out: &mut W, result: &AgentResult) -> Result<()> {
    writeln!(out, "\nassistant> {}", wrap(&result.answer, WRAP_WIDTH))?;
    if !result.suggested_actions.is_empty() {
        writeln!(out, "actions:")?;
        for action in &result.suggested_actions {
            writeln!(out, "  - {}", action)?;
        }
    }
    if !result.citations.is_empty() {
        writeln!(out, "citations: {}", result.citations.join(", "))?;
    }
    writeln!(out)?;
    Ok(())
}

/// Greedy word wrap; words longer than `width` get a line of their own.
pub fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// CLI entry point for `campus chat`.
pub async fn run_chat(agent: CampusAgent) -> AnyResult<()> {
    let mut session = ChatSession::new(agent);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, &mut stdout).await?;
    println!("Session id: {}", session.session_id());
    Ok(())
}

/// CLI entry point for `campus history`. Prints oldest turn first.
pub async fn run_history(store: Arc<dyn Store>, session_id: &str, limit: usize) -> AnyResult<()> {
    let mut messages = store.fetch_chat_history(session_id, limit).await?;
    if messages.is_empty() {
        println!("No messages for session {}.", session_id);
        return Ok(());
    }
    messages.reverse();
    for message in &messages {
        println!(
            "[{}] {}> {}",
            message.created_at.format("%Y-%m-%d %H:%M:%S"),
            message.role.as_str(),
            message.content
        );
        if !message.citations.is_empty() {
            println!("    citations: {}", message.citations.join(", "));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::error::Error;
    use crate::llm::{CompletionClient, Responder, EMPTY_FALLBACK};
    use crate::models::{KnowledgeEntry, PortalRecord, Task, TaskStatus};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingClient;

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Err(Error::Completion("service unavailable".to_string()))
        }
    }

    /// Delegates to an [`InMemoryStore`] but fails knowledge reads.
    struct BrokenSearchStore(InMemoryStore);

    #[async_trait]
    impl Store for BrokenSearchStore {
        async fn upsert_knowledge(&self, entry: &KnowledgeEntry) -> Result<()> {
            self.0.upsert_knowledge(entry).await
        }
        async fn fetch_recent_knowledge(&self, _limit: usize) -> Result<Vec<KnowledgeEntry>> {
            Err(Error::Poisoned)
        }
        async fn fetch_knowledge_by_ids(&self, ids: &[String]) -> Result<Vec<KnowledgeEntry>> {
            self.0.fetch_knowledge_by_ids(ids).await
        }
        async fn upsert_task(&self, task: &Task) -> Result<()> {
            self.0.upsert_task(task).await
        }
        async fn fetch_recent_tasks(
            &self,
            status: Option<TaskStatus>,
            limit: usize,
        ) -> Result<Vec<Task>> {
            self.0.fetch_recent_tasks(status, limit).await
        }
        async fn fetch_tasks_by_ids(&self, ids: &[String]) -> Result<Vec<Task>> {
            self.0.fetch_tasks_by_ids(ids).await
        }
        async fn fetch_task(&self, id: &str) -> Result<Option<Task>> {
            self.0.fetch_task(id).await
        }
        async fn fetch_task_by_title(&self, title: &str) -> Result<Option<Task>> {
            self.0.fetch_task_by_title(title).await
        }
        async fn upsert_portal_records(&self, records: &[PortalRecord]) -> Result<u64> {
            self.0.upsert_portal_records(records).await
        }
        async fn append_chat_message(&self, message: &ChatMessage) -> Result<()> {
            self.0.append_chat_message(message).await
        }
        async fn fetch_chat_history(
            &self,
            session_id: &str,
            limit: usize,
        ) -> Result<Vec<ChatMessage>> {
            self.0.fetch_chat_history(session_id, limit).await
        }
    }

    fn session(store: Arc<InMemoryStore>) -> ChatSession {
        ChatSession::new(CampusAgent::new(
            store,
            Responder::offline(),
            RetrievalConfig::default(),
        ))
    }

    async fn run_with(session: &mut ChatSession, input: &str) -> (SessionEnd, String) {
        let mut out = Vec::new();
        let end = session.run(input.as_bytes(), &mut out).await.unwrap();
        (end, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_quit_logs_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let mut chat = session(store.clone());
        let (end, out) = run_with(&mut chat, "  QUIT \n").await;
        assert_eq!(end, SessionEnd::Quit);
        assert!(out.starts_with(BANNER));
        assert!(out.contains("Goodbye!"));
        assert_eq!(chat.state(), ChatState::Terminated);
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped_and_eof_ends_session() {
        let store = Arc::new(InMemoryStore::new());
        let mut chat = session(store.clone());
        let (end, out) = run_with(&mut chat, "\n   \n").await;
        assert_eq!(end, SessionEnd::Interrupted);
        assert!(out.contains("Session ended."));
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn test_turns_are_logged_with_citations() {
        let store = Arc::new(InMemoryStore::new());
        let entry = KnowledgeEntry::new("Tuition payment plan", "Enroll before the term starts")
            .with_campus_area("Student Accounts");
        store.upsert_knowledge(&entry).await.unwrap();
        let task = Task::new("Pay tuition", "First installment");
        store.upsert_task(&task).await.unwrap();

        let mut chat = session(store.clone());
        let (_, out) = run_with(&mut chat, "tuition\nexit\n").await;
        assert!(out.contains("assistant> Knowledge insights:"));
        assert!(out.contains("Advance task 'Pay tuition' (status: todo)"));

        let history = store
            .fetch_chat_history(chat.session_id(), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        let assistant = history.iter().find(|m| m.role == Role::Assistant).unwrap();
        let user = history.iter().find(|m| m.role == Role::User).unwrap();
        assert_eq!(user.content, "tuition");
        assert!(user.citations.is_empty());
        assert_eq!(assistant.citations, vec![entry.id, task.id]);
    }

    #[tokio::test]
    async fn test_empty_store_answer() {
        let store = Arc::new(InMemoryStore::new());
        let mut chat = session(store.clone());
        let (_, out) = run_with(&mut chat, "hello\n").await;
        assert!(out.contains(EMPTY_FALLBACK));
        assert_eq!(store.message_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_decoded_lossily() {
        let store = Arc::new(InMemoryStore::new());
        let mut chat = session(store.clone());
        let mut out = Vec::new();
        let end = chat
            .run(&b"hello\n\xff\xfe\nexit\n"[..], &mut out)
            .await
            .unwrap();
        assert_eq!(end, SessionEnd::Quit);
        assert_eq!(chat.state(), ChatState::Terminated);
        assert!(String::from_utf8_lossy(&out).contains("Goodbye!"));

        let history = store
            .fetch_chat_history(chat.session_id(), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 4);
        assert!(history
            .iter()
            .any(|m| m.role == Role::User && m.content == "\u{FFFD}\u{FFFD}"));
    }

    #[tokio::test]
    async fn test_failing_completion_client_falls_back_and_logs_turn() {
        let store = Arc::new(InMemoryStore::new());
        let entry = KnowledgeEntry::new("Tuition payment plan", "Enroll before the term starts");
        store.upsert_knowledge(&entry).await.unwrap();
        let task = Task::new("Pay tuition", "First installment");
        store.upsert_task(&task).await.unwrap();

        let responder = Responder::new(Some(Box::new(FailingClient)), Duration::from_secs(1));
        let mut chat = ChatSession::new(CampusAgent::new(
            store.clone(),
            responder,
            RetrievalConfig::default(),
        ));
        let (end, out) = run_with(&mut chat, "tuition\nquit\n").await;
        assert_eq!(end, SessionEnd::Quit);
        assert!(out.contains("assistant> Knowledge insights:"));

        let history = store
            .fetch_chat_history(chat.session_id(), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        let assistant = history.iter().find(|m| m.role == Role::Assistant).unwrap();
        assert!(!assistant.content.trim().is_empty());
        assert_eq!(assistant.citations, vec![entry.id, task.id]);
    }

    #[tokio::test]
    async fn test_store_error_during_turn_keeps_session_open() {
        let store = Arc::new(BrokenSearchStore(InMemoryStore::new()));
        let mut chat = ChatSession::new(CampusAgent::new(
            store.clone(),
            Responder::offline(),
            RetrievalConfig::default(),
        ));
        let (end, out) = run_with(&mut chat, "tuition\nadvising\nquit\n").await;
        assert_eq!(end, SessionEnd::Quit);
        assert_eq!(chat.state(), ChatState::Terminated);
        assert_eq!(out.matches("Something went wrong").count(), 2);
        assert!(out.contains("Goodbye!"));
        // User turns are logged before the failing lookup.
        assert_eq!(store.0.message_count(), 2);
    }

    #[test]
    fn test_wrap() {
        let text = "word ".repeat(30);
        let wrapped = wrap(&text, 20);
        assert!(wrapped.lines().all(|l| l.chars().count() <= 20));
        assert_eq!(wrapped.split_whitespace().count(), 30);
        assert_eq!(wrap("", 88), "");
    }
}
