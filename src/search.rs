//! Knowledge search: lexical and fuzzy scoring over stored notes.
//!
//! # Scoring
//!
//! For a query `q` compared case-insensitively against an entry:
//!
//! | Signal | Points |
//! |--------|--------|
//! | `q` is a substring of the title | 3.0 |
//! | `q` is a substring of any tag | 2.0 |
//! | [`similarity_ratio`] of content and `q` | 0.0 – 2.0 |
//! | campus area is `Grades` or `Financial Aid` | 1.0 |
//!
//! Only the most recently updated entries are scanned (200 by default).
//! Entries scoring `<= 0` are dropped; the rest are sorted by score with a
//! stable sort, so ties keep the store's recency order.

use anyhow::Result as AnyResult;
use serde::Serialize;
use std::cmp::Ordering;

use crate::error::Result;
use crate::models::KnowledgeEntry;
use crate::similarity::similarity_ratio;
use crate::store::Store;

pub const TITLE_WEIGHT: f64 = 3.0;
pub const TAG_WEIGHT: f64 = 2.0;
pub const SIMILARITY_WEIGHT: f64 = 2.0;
pub const CAMPUS_BONUS: f64 = 1.0;

/// Campus areas that earn [`CAMPUS_BONUS`].
pub const BONUS_AREAS: &[&str] = &["Grades", "Financial Aid"];

/// A knowledge entry paired with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    pub score: f64,
    pub entry: KnowledgeEntry,
}

/// Relevance of `entry` for `query`.
pub fn score_entry(entry: &KnowledgeEntry, query: &str) -> f64 {
    let q = query.to_lowercase();

    let title_hit = if entry.title.to_lowercase().contains(&q) {
        TITLE_WEIGHT
    } else {
        0.0
    };
    let tag_hit = if entry.tags.iter().any(|tag| tag.to_lowercase().contains(&q)) {
        TAG_WEIGHT
    } else {
        0.0
    };
    let fuzz = similarity_ratio(&entry.content.to_lowercase(), &q) * SIMILARITY_WEIGHT;
    let campus_bonus = if BONUS_AREAS.contains(&entry.campus_area.as_str()) {
        CAMPUS_BONUS
    } else {
        0.0
    };

    title_hit + tag_hit + fuzz + campus_bonus
}

/// Score, filter and order `entries` (already in recency order).
pub fn rank_entries(entries: Vec<KnowledgeEntry>, query: &str, limit: usize) -> Vec<ScoredEntry> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredEntry> = entries
        .into_iter()
        .filter_map(|entry| {
            let score = score_entry(&entry, query);
            (score > 0.0).then_some(ScoredEntry { score, entry })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Search the most recent `scan_limit` entries for `query`.
///
/// A blank query returns an empty result without touching the store.
pub async fn search_knowledge(
    store: &dyn Store,
    query: &str,
    limit: usize,
    scan_limit: usize,
) -> Result<Vec<ScoredEntry>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries = store.fetch_recent_knowledge(scan_limit).await?;
    Ok(rank_entries(entries, query, limit))
}

/// CLI entry point for `campus search-notes`.
pub async fn run_search_notes(
    store: &dyn Store,
    query: &str,
    limit: usize,
    scan_limit: usize,
) -> AnyResult<()> {
    let hits = search_knowledge(store, query, limit, scan_limit).await?;
    if hits.is_empty() {
        println!("No matching knowledge entries. Try adding more context.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let entry = &hit.entry;
        let preview: String = entry.content.chars().take(120).collect();
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            hit.score,
            entry.title,
            entry.campus_area
        );
        if !entry.tags.is_empty() {
            println!("    tags: {}", entry.tags.join(", "));
        }
        println!("    excerpt: \"{}\"", preview.replace('\n', " ").trim());
        println!("    id: {}", entry.id);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::{Duration, Utc};

    fn entry(title: &str, content: &str, tags: &[&str], area: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(title, content)
            .with_tags(tags.iter().copied())
            .with_campus_area(area)
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let entries = vec![entry("Grades", "anything", &[], "Grades")];
        assert!(rank_entries(entries.clone(), "", 5).is_empty());
        assert!(rank_entries(entries, "   \t", 5).is_empty());
    }

    #[test]
    fn test_tag_hit_scores_at_least_two() {
        let e = entry(
            "Financial Aid Deadline",
            "Bring your ID to the bursar window",
            &["finaid"],
            "Other",
        );
        let score = score_entry(&e, "finaid");
        assert!(score >= TAG_WEIGHT, "score was {}", score);

        let hits = rank_entries(vec![e.clone()], "finaid", 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.id, e.id);
    }

    #[test]
    fn test_score_components_add_up() {
        let e = entry("Midterm grades", "midterm", &["midterm-week"], "Grades");
        // title 3 + tag 2 + similarity 1.0*2 + campus 1
        let score = score_entry(&e, "MIDTERM");
        assert!((score - 8.0).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_campus_bonus_only_for_bonus_areas() {
        let graded = entry("x", "zzz", &[], "Grades");
        let advising = entry("x", "zzz", &[], "Advising");
        assert!((score_entry(&graded, "q") - CAMPUS_BONUS).abs() < 1e-9);
        assert_eq!(score_entry(&advising, "q"), 0.0);
    }

    #[test]
    fn test_zero_scores_excluded_and_results_subset() {
        let keep = entry("Registration hold", "hold on account", &[], "Registration");
        let drop = entry("zzz", "zzz", &[], "Advising");
        let hits = rank_entries(vec![keep.clone(), drop], "hold", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.id, keep.id);
        assert!(hits.iter().all(|h| h.score > 0.0));
    }

    #[test]
    fn test_ties_keep_input_order_and_limit_applies() {
        let a = entry("alpha", "same", &[], "Other");
        let b = entry("beta", "same", &[], "Other");
        let c = entry("gamma", "same", &[], "Other");
        let hits = rank_entries(vec![a.clone(), b.clone(), c], "same", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.id, a.id);
        assert_eq!(hits[1].entry.id, b.id);
    }

    #[test]
    fn test_scores_non_increasing() {
        let entries = vec![
            entry("tuition", "pay tuition", &[], "Student Accounts"),
            entry("Tuition refund", "refund", &["tuition"], "Financial Aid"),
            entry("misc", "tuition tuition", &[], "Other"),
        ];
        let hits = rank_entries(entries, "tuition", 10);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_scans_only_recent_window() {
        let store = InMemoryStore::new();
        let mut old = entry("Scholarship essay", "essay", &[], "Other");
        old.updated_at = Utc::now() - Duration::days(30);
        store.upsert_knowledge(&old).await.unwrap();
        let fresh = entry("Advising notes", "unrelated", &[], "Other");
        store.upsert_knowledge(&fresh).await.unwrap();

        let wide = search_knowledge(&store, "scholarship", 3, 200).await.unwrap();
        assert!(wide.iter().any(|h| h.entry.id == old.id));

        let narrow = search_knowledge(&store, "scholarship", 3, 1).await.unwrap();
        assert!(narrow.iter().all(|h| h.entry.id != old.id));
    }
}
