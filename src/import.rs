//! Campus Connect snapshot import.
//!
//! A snapshot is a JSON array of portal records. The whole payload is
//! parsed and checked before anything is written; once it is accepted the
//! records are persisted in one transaction, then a knowledge entry is
//! derived per record and follow-up tasks are generated. Those later
//! steps are best-effort per record.

use anyhow::{Context, Result as AnyResult};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::knowledge::{add_entry, NewEntry};
use crate::models::{new_id, parse_ts, PortalRecord, Task};
use crate::store::Store;
use crate::tasks::ensure_follow_up_tasks;

/// Snapshot bundled with the binary for `campus seed --sample`.
pub const SAMPLE_SNAPSHOT: &str = include_str!("../data/campus_connect_sample.json");

pub const IMPORT_SOURCE: &str = "Campus Connect import";
pub const IMPORT_CAMPUS_AREA: &str = "Grades";
const IMPORT_CONTENT: &str = "Imported from Campus Connect snapshot.";

/// One record as it appears in an exported snapshot.
#[derive(Debug, Deserialize)]
struct RecordPayload {
    record_id: String,
    #[serde(default)]
    course: Option<String>,
    component: String,
    #[serde(default, deserialize_with = "loose_string")]
    grade: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    points: Option<String>,
    #[serde(default)]
    campus_area: Option<String>,
    #[serde(default)]
    needs_follow_up: bool,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// Accept a JSON string or number and keep it as text.
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|value| match value {
        Loose::Text(text) => text,
        Loose::Number(number) => number.to_string(),
    }))
}

impl RecordPayload {
    fn into_record(self, index: usize) -> Result<PortalRecord> {
        let record_id = self.record_id.trim().to_string();
        if record_id.is_empty() {
            return Err(Error::Import(format!("record {}: blank record_id", index)));
        }
        let component = self.component.trim().to_string();
        if component.is_empty() {
            return Err(Error::Import(format!(
                "record {} ({}): blank component",
                index, record_id
            )));
        }
        let updated_at = match self.updated_at.as_deref() {
            Some(raw) => parse_ts(raw)
                .map_err(|e| Error::Import(format!("record {} ({}): {}", index, record_id, e)))?,
            None => Utc::now(),
        };

        Ok(PortalRecord {
            id: new_id(),
            record_id,
            course: self.course.filter(|c| !c.trim().is_empty()),
            component,
            grade: self.grade,
            points: self.points,
            campus_area: self
                .campus_area
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| IMPORT_CAMPUS_AREA.to_string()),
            needs_follow_up: self.needs_follow_up,
            notes: self.notes,
            updated_at,
        })
    }
}

/// Parse a snapshot. Fails on the first malformed record.
pub fn parse_snapshot(json: &str) -> Result<Vec<PortalRecord>> {
    let payloads: Vec<RecordPayload> =
        serde_json::from_str(json).map_err(|e| Error::Import(format!("invalid snapshot: {}", e)))?;
    payloads
        .into_iter()
        .enumerate()
        .map(|(i, payload)| payload.into_record(i))
        .collect()
}

/// Outcome of [`import_records`].
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub records: u64,
    pub entries: usize,
    pub tasks: Vec<Task>,
}

/// Lowercase and hyphenate a value for use as a tag. Commas are dropped
/// since they separate stored tags.
pub fn slugify(value: &str) -> String {
    value.to_lowercase().replace(',', "").replace(' ', "-")
}

fn entry_for(record: &PortalRecord) -> NewEntry {
    NewEntry {
        title: format!("{} ({})", record.component, record.campus_area),
        content: record
            .notes
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| IMPORT_CONTENT.to_string()),
        tags: vec![
            slugify(&record.campus_area),
            slugify(record.course.as_deref().unwrap_or("general")),
        ],
        campus_area: Some(record.campus_area.clone()),
        source: Some(IMPORT_SOURCE.to_string()),
    }
}

/// Persist parsed records and derive their entries and follow-up tasks.
pub async fn import_records(store: &dyn Store, records: &[PortalRecord]) -> Result<ImportSummary> {
    let written = store.upsert_portal_records(records).await?;

    let mut entries = 0;
    for record in records {
        match add_entry(store, entry_for(record)).await {
            Ok(_) => entries += 1,
            Err(e) => warn!(record_id = %record.record_id, error = %e, "failed to derive knowledge entry"),
        }
    }

    let tasks = ensure_follow_up_tasks(store, records).await;
    info!(
        records = written,
        entries,
        tasks = tasks.len(),
        "imported Campus Connect snapshot"
    );

    Ok(ImportSummary {
        records: written,
        entries,
        tasks,
    })
}

/// Where `campus seed` reads its snapshot from.
pub enum SnapshotSource<'a> {
    File(&'a Path),
    Sample,
}

/// CLI entry point for `campus seed`.
pub async fn run_seed(store: &dyn Store, source: SnapshotSource<'_>) -> AnyResult<()> {
    let json = match source {
        SnapshotSource::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?,
        SnapshotSource::Sample => SAMPLE_SNAPSHOT.to_string(),
    };
    let records = parse_snapshot(&json)?;
    let summary = import_records(store, &records).await?;
    println!(
        "Imported {} records and created {} tasks.",
        summary.records,
        summary.tasks.len()
    );
    Ok(())
}
