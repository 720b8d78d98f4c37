//! Playlist and folder import.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use super::{ImportOptions, ImportSummary, Outcome, RecordError};
use crate::db::now_timestamp;
use crate::services::library::queries::{playlist_track_ids, replace_playlist_tracks};
use crate::services::rekordbox::CandidatePlaylist;

struct ExistingPlaylist {
    id: i64,
    name: String,
    parent_id: Option<i64>,
    is_folder: bool,
}

/// Upserts playlists by their Rekordbox id.
///
/// Membership is rewritten to the local ids of member tracks already in the
/// library; members that were never imported are left out. Parents are
/// processed before their children so folder links resolve within one run.
pub fn import_playlists(
    conn: &Connection,
    candidates: Vec<CandidatePlaylist>,
    options: &ImportOptions,
) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for (index, candidate) in parents_first(candidates) {
        if options.deadline_reached() {
            tracing::warn!(processed = summary.seen, "Playlist import deadline reached");
            summary.interrupted = true;
            break;
        }

        let result = upsert_playlist(conn, &candidate);
        summary.record("playlist", index, candidate.foreign_id, result);
    }

    tracing::info!(
        seen = summary.seen,
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed = summary.failed,
        interrupted = summary.interrupted,
        "Playlist import finished"
    );

    summary
}

/// Reorders candidates so every parent in the batch precedes its children,
/// keeping the original index for failure reports.
fn parents_first(candidates: Vec<CandidatePlaylist>) -> Vec<(usize, CandidatePlaylist)> {
    let parents: HashMap<&str, Option<&str>> = candidates
        .iter()
        .map(|c| (c.foreign_id.as_str(), c.parent_foreign_id.as_deref()))
        .collect();

    let depth = |id: &str| -> usize {
        let mut depth = 0;
        let mut current = parents.get(id).copied().flatten();
        // Bounded so a parent cycle cannot loop forever
        while let Some(parent) = current {
            if depth > parents.len() {
                break;
            }
            match parents.get(parent) {
                Some(next) => {
                    depth += 1;
                    current = *next;
                }
                None => break,
            }
        }
        depth
    };

    let depths: Vec<usize> = candidates.iter().map(|c| depth(&c.foreign_id)).collect();
    let mut ordered: Vec<(usize, usize, CandidatePlaylist)> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| (depths[i], i, c))
        .collect();
    ordered.sort_by_key(|(depth, index, _)| (*depth, *index));
    ordered.into_iter().map(|(_, i, c)| (i, c)).collect()
}

fn upsert_playlist(conn: &Connection, candidate: &CandidatePlaylist) -> Result<Outcome, RecordError> {
    if candidate.foreign_id.trim().is_empty() {
        return Err(RecordError::Invalid("missing foreign id".to_string()));
    }

    let tx = conn.unchecked_transaction()?;

    let parent_id = match candidate.parent_foreign_id.as_deref() {
        Some(parent) => local_playlist_id(&tx, parent)?,
        None => None,
    };
    let track_ids = local_track_ids(&tx, &candidate.track_foreign_ids)?;

    let existing = tx
        .query_row(
            "SELECT id, name, parent_id, is_folder FROM playlists WHERE rekordbox_id = ?1",
            [&candidate.foreign_id],
            |row| {
                Ok(ExistingPlaylist {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    parent_id: row.get(2)?,
                    is_folder: row.get(3)?,
                })
            },
        )
        .optional()?;

    let outcome = match existing {
        None => {
            let now = now_timestamp();
            tx.execute(
                r#"
                INSERT INTO playlists (name, parent_id, is_folder, rekordbox_id, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                "#,
                params![
                    candidate.name,
                    parent_id,
                    candidate.is_folder,
                    candidate.foreign_id,
                    now
                ],
            )?;
            let id = tx.last_insert_rowid();
            replace_playlist_tracks(&tx, id, &track_ids)?;
            Outcome::Inserted
        }
        Some(existing) => {
            let unchanged = existing.name == candidate.name
                && existing.parent_id == parent_id
                && existing.is_folder == candidate.is_folder
                && playlist_track_ids(&tx, existing.id)? == track_ids;

            if unchanged {
                Outcome::Unchanged
            } else {
                tx.execute(
                    r#"
                    UPDATE playlists
                    SET name = ?1, parent_id = ?2, is_folder = ?3, updated_at = ?4
                    WHERE id = ?5
                    "#,
                    params![
                        candidate.name,
                        parent_id,
                        candidate.is_folder,
                        now_timestamp(),
                        existing.id
                    ],
                )?;
                replace_playlist_tracks(&tx, existing.id, &track_ids)?;
                Outcome::Updated
            }
        }
    };

    tx.commit()?;
    Ok(outcome)
}

fn local_playlist_id(conn: &Connection, foreign_id: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM playlists WHERE rekordbox_id = ?1",
        [foreign_id],
        |row| row.get(0),
    )
    .optional()
}

/// Maps member foreign ids to local track ids, dropping unknown and repeated
/// members.
fn local_track_ids(conn: &Connection, foreign_ids: &[String]) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached("SELECT id FROM tracks WHERE rekordbox_id = ?1")?;
    let mut ids = Vec::with_capacity(foreign_ids.len());
    for foreign_id in foreign_ids {
        let id: Option<i64> = stmt.query_row([foreign_id], |row| row.get(0)).optional()?;
        if let Some(id) = id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}
