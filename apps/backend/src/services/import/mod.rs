//! Reconciliation of Rekordbox candidates into the local library.
//!
//! A run walks the candidates in order and, for each one, either inserts a
//! new track, overwrites the track already carrying its foreign id, or leaves
//! it alone when nothing changed. Problems with one candidate are recorded in
//! the summary and the run moves on.

mod playlists;

pub use playlists::import_playlists;

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::db::models::Track;
use crate::db::now_timestamp;
use crate::services::library::{NewTrack, TrackStore};
use crate::services::rekordbox::CandidateTrack;

/// Why a single record could not be imported.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// First error hit by one failed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    /// Position in the candidate sequence.
    pub index: usize,
    pub foreign_id: String,
    pub error: String,
}

/// Outcome of one track or playlist import run.
///
/// `seen == inserted + updated + unchanged + failed` always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub seen: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
    /// The run stopped at its deadline before reaching every candidate.
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Stop before the next candidate once this instant has passed.
    pub deadline: Option<Instant>,
}

impl ImportOptions {
    pub fn deadline_reached(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

enum Outcome {
    Inserted,
    Updated,
    Unchanged,
}

impl ImportSummary {
    /// Counts one processed record, keeping the failure when there is one.
    fn record(
        &mut self,
        kind: &str,
        index: usize,
        foreign_id: String,
        result: Result<Outcome, RecordError>,
    ) {
        self.seen += 1;
        match result {
            Ok(Outcome::Inserted) => self.inserted += 1,
            Ok(Outcome::Updated) => self.updated += 1,
            Ok(Outcome::Unchanged) => self.unchanged += 1,
            Err(e) => {
                tracing::warn!(index, foreign_id = %foreign_id, error = %e, "Skipping {}", kind);
                self.failed += 1;
                self.failures.push(RecordFailure {
                    index,
                    foreign_id,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Imports every candidate into `store`.
///
/// Candidates sharing a foreign id are applied in order, so the last one's
/// values end up stored.
pub fn import_all<S: TrackStore>(
    store: &mut S,
    candidates: Vec<CandidateTrack>,
    options: &ImportOptions,
) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for (index, candidate) in candidates.into_iter().enumerate() {
        if options.deadline_reached() {
            tracing::warn!(
                processed = summary.seen,
                "Import deadline reached, stopping early"
            );
            summary.interrupted = true;
            break;
        }

        let foreign_id = candidate.foreign_id.clone();
        let result = reconcile_one(store, candidate);
        summary.record("track", index, foreign_id, result);
    }

    tracing::info!(
        seen = summary.seen,
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed = summary.failed,
        interrupted = summary.interrupted,
        "Track import finished"
    );

    summary
}

fn reconcile_one<S: TrackStore>(store: &mut S, candidate: CandidateTrack) -> Result<Outcome, RecordError> {
    validate(&candidate)?;

    let tags = clean_tags(&candidate.tags);

    match store.find_by_foreign_id(&candidate.foreign_id)? {
        None => {
            store.insert(NewTrack {
                title: candidate.title,
                artist: candidate.artist,
                album: candidate.album,
                genre: candidate.genre,
                duration: candidate.duration,
                file_path: candidate.file_path,
                bpm: candidate.bpm,
                key: candidate.key,
                rekordbox_id: Some(candidate.foreign_id),
                tags,
            })?;
            Ok(Outcome::Inserted)
        }
        Some(existing) => {
            let missing_tags: Vec<String> = tags
                .into_iter()
                .filter(|name| !existing.has_tag(name))
                .collect();

            if fields_match(&existing, &candidate) && missing_tags.is_empty() {
                return Ok(Outcome::Unchanged);
            }

            let track = Track {
                title: candidate.title,
                artist: candidate.artist,
                album: candidate.album,
                genre: candidate.genre,
                duration: candidate.duration,
                file_path: candidate.file_path,
                bpm: candidate.bpm,
                key: candidate.key,
                updated_at: now_timestamp(),
                ..existing
            };
            store.update(&track, &missing_tags)?;
            Ok(Outcome::Updated)
        }
    }
}

fn validate(candidate: &CandidateTrack) -> Result<(), RecordError> {
    if candidate.foreign_id.trim().is_empty() {
        return Err(RecordError::Invalid("missing foreign id".to_string()));
    }
    if candidate.title.trim().is_empty() {
        return Err(RecordError::Invalid("missing title".to_string()));
    }
    if !candidate.duration.is_finite() || candidate.duration < 0.0 {
        return Err(RecordError::Invalid(format!(
            "duration out of range: {}",
            candidate.duration
        )));
    }
    if let Some(bpm) = candidate.bpm {
        if !bpm.is_finite() || bpm < 0.0 {
            return Err(RecordError::Invalid(format!("bpm out of range: {}", bpm)));
        }
    }
    Ok(())
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for name in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !cleaned.iter().any(|c| c == name) {
            cleaned.push(name.to_string());
        }
    }
    cleaned
}

fn fields_match(track: &Track, candidate: &CandidateTrack) -> bool {
    track.title == candidate.title
        && track.artist == candidate.artist
        && track.album == candidate.album
        && track.genre == candidate.genre
        && track.duration == candidate.duration
        && track.file_path == candidate.file_path
        && track.bpm == candidate.bpm
        && track.key == candidate.key
}
