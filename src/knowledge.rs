//! Knowledge base: creating and listing notes.
//!
//! Search lives in [`crate::search`]; this module owns the write path
//! and the `add-note` / `list-notes` commands.

use anyhow::Result as AnyResult;

use crate::error::{Error, Result};
use crate::models::{KnowledgeEntry, DEFAULT_CAMPUS_AREA};
use crate::store::Store;

/// Input for [`add_entry`].
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub campus_area: Option<String>,
    pub source: Option<String>,
}

/// Create and persist a knowledge entry.
///
/// Title and content are trimmed; a blank title is rejected.
pub async fn add_entry(store: &dyn Store, new: NewEntry) -> Result<KnowledgeEntry> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::validation("Knowledge entry title must not be blank"));
    }

    let campus_area = new
        .campus_area
        .map(|area| area.trim().to_string())
        .filter(|area| !area.is_empty())
        .unwrap_or_else(|| DEFAULT_CAMPUS_AREA.to_string());

    let entry = KnowledgeEntry::new(title, new.content.trim())
        .with_tags(&new.tags)
        .with_campus_area(campus_area)
        .with_source(new.source);

    store.upsert_knowledge(&entry).await?;
    Ok(entry)
}

pub async fn list_entries(store: &dyn Store, limit: usize) -> Result<Vec<KnowledgeEntry>> {
    store.fetch_recent_knowledge(limit).await
}

/// CLI entry point for `campus add-note`.
pub async fn run_add_note(store: &dyn Store, new: NewEntry) -> AnyResult<()> {
    let entry = add_entry(store, new).await?;
    let tags = if entry.tags.is_empty() {
        "untagged".to_string()
    } else {
        entry.tags.join(", ")
    };
    println!("Created entry {} with tags: {}", entry.id, tags);
    Ok(())
}

/// CLI entry point for `campus list-notes`.
pub async fn run_list_notes(store: &dyn Store, limit: usize) -> AnyResult<()> {
    let entries = list_entries(store, limit).await?;
    if entries.is_empty() {
        println!("No knowledge entries yet. Add one with `add-note`.");
        return Ok(());
    }
    for entry in &entries {
        let tags = if entry.tags.is_empty() {
            "untagged".to_string()
        } else {
            entry.tags.join(", ")
        };
        println!("[{}] {} (tags: {})", entry.id, entry.title, tags);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_add_entry_trims_and_normalizes() {
        let store = InMemoryStore::new();
        let entry = add_entry(
            &store,
            NewEntry {
                title: "  Advising appointment ".to_string(),
                content: "\nBring transcript\n".to_string(),
                tags: vec!["advising".into(), " advising".into(), "spring ".into()],
                campus_area: Some("Advising".to_string()),
                source: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(entry.title, "Advising appointment");
        assert_eq!(entry.content, "Bring transcript");
        assert_eq!(entry.tags, vec!["advising", "spring"]);

        let stored = list_entries(&store, 10).await.unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[tokio::test]
    async fn test_add_entry_defaults_campus_area() {
        let store = InMemoryStore::new();
        let entry = add_entry(
            &store,
            NewEntry {
                title: "Note".to_string(),
                content: "text".to_string(),
                campus_area: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(entry.campus_area, "Other");
    }

    #[tokio::test]
    async fn test_blank_title_rejected_without_write() {
        let store = InMemoryStore::new();
        let err = add_entry(
            &store,
            NewEntry {
                title: "   ".to_string(),
                content: "text".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(list_entries(&store, 10).await.unwrap().is_empty());
    }
}
