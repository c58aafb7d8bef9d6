//! Free-text notes kept in sidecar files.
//!
//! A note for file `P` lives next to it at `P.AInotes.txt`. Any file whose
//! name contains `.AInotes.` is treated as a note. Notes follow paths, not
//! databases: renaming a database file leaves its note behind.

use crate::db::ConnectionRegistry;
use crate::error::{DbError, DbResult};
use crate::models::Backing;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Suffix appended to a file path to form its sidecar note.
pub const NOTES_SUFFIX: &str = ".AInotes.txt";

const NOTES_MARKER: &str = ".AInotes";

/// Whether `path` names a note file.
pub fn is_note_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            name.contains(&format!("{NOTES_MARKER}.")) || name.ends_with(NOTES_MARKER)
        })
}

/// Sidecar note path for `path`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(NOTES_SUFFIX);
    PathBuf::from(name)
}

/// Result of a notes write.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WriteNotesOutcome {
    /// Note file that was written or removed.
    pub path: String,
    /// True when empty text removed the note.
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct NotesStore {
    registry: Arc<ConnectionRegistry>,
}

impl NotesStore {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Write, replace or (with empty text) delete a note.
    ///
    /// Exactly one of `file_path` and `database_id` must be given.
    pub async fn write_notes(
        &self,
        text: &str,
        file_path: Option<&Path>,
        database_id: Option<&str>,
    ) -> DbResult<WriteNotesOutcome> {
        let target = match (file_path, database_id) {
            (Some(path), None) if is_note_file(path) => path.to_path_buf(),
            (Some(path), None) => sidecar_path(path),
            (None, Some(id)) => self.database_note_path(id).await?,
            _ => {
                return Err(DbError::invalid_input(
                    "Provide exactly one of file_path or database_identifier",
                ));
            }
        };

        if text.is_empty() {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(DbError::not_found("Note", target.display().to_string()));
                }
                Err(e) => return Err(DbError::io(&target, e)),
            }
            info!(path = %target.display(), "Deleted note");
            return Ok(WriteNotesOutcome {
                path: target.display().to_string(),
                deleted: true,
            });
        }

        tokio::fs::write(&target, text)
            .await
            .map_err(|e| DbError::io(&target, e))?;
        info!(path = %target.display(), bytes = text.len(), "Wrote note");

        Ok(WriteNotesOutcome {
            path: target.display().to_string(),
            deleted: false,
        })
    }

    /// Read notes for one file or for a whole directory.
    ///
    /// Exactly one of `file_path` and `directory` must be given. Keys of the
    /// returned map are note file paths.
    pub async fn read_notes(
        &self,
        file_path: Option<&Path>,
        directory: Option<&Path>,
    ) -> DbResult<BTreeMap<String, String>> {
        match (file_path, directory) {
            (Some(path), None) if is_note_file(path) => {
                let text = read_note(path).await?;
                Ok(BTreeMap::from([(path.display().to_string(), text)]))
            }
            (Some(path), None) => read_sidecars(path).await,
            (None, Some(dir)) => read_directory(dir).await,
            _ => Err(DbError::invalid_input(
                "Provide exactly one of file_path or directory",
            )),
        }
    }

    /// Sidecar notes of a database file, used when connecting with notes.
    pub async fn notes_for_database(&self, path: &Path) -> DbResult<BTreeMap<String, String>> {
        match read_sidecars(path).await {
            Err(DbError::NotFound { .. }) => Ok(BTreeMap::new()),
            other => other,
        }
    }

    async fn database_note_path(&self, id: &str) -> DbResult<PathBuf> {
        let handle = self.registry.resolve(id).await?;
        match handle.backing() {
            Backing::File(path) => Ok(sidecar_path(path)),
            Backing::InMemory => Err(DbError::not_supported(
                "write_notes",
                format!("Database '{}' is in-memory and has no file to attach notes to", id),
            )),
        }
    }
}

async fn read_note(path: &Path) -> DbResult<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => DbError::not_found("Note", path.display().to_string()),
        _ => DbError::io(path, e),
    })
}

/// All `<file>.AInotes*` notes next to `path`.
async fn read_sidecars(path: &Path) -> DbResult<BTreeMap<String, String>> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Err(DbError::invalid_input(format!(
            "'{}' does not name a file",
            path.display()
        )));
    };
    let prefix = format!("{file_name}{NOTES_MARKER}");
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let notes = collect_notes(parent, |name| name.starts_with(&prefix))
        .await
        .map_err(|e| match e {
            DbError::NotFound { .. } => {
                DbError::not_found("Note", sidecar_path(path).display().to_string())
            }
            other => other,
        })?;

    if notes.is_empty() {
        return Err(DbError::not_found(
            "Note",
            sidecar_path(path).display().to_string(),
        ));
    }
    Ok(notes)
}

async fn read_directory(dir: &Path) -> DbResult<BTreeMap<String, String>> {
    collect_notes(dir, |_| true).await
}

/// Read note files directly inside `dir` whose names pass `filter`.
async fn collect_notes<F>(dir: &Path, filter: F) -> DbResult<BTreeMap<String, String>>
where
    F: Fn(&str) -> bool,
{
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => {
            DbError::not_found("Directory", dir.display().to_string())
        }
        _ => DbError::io(dir, e),
    })?;

    let mut notes = BTreeMap::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| DbError::io(dir, e))? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_note_file(&path) || !filter(name) {
            continue;
        }
        let file_type = entry.file_type().await.map_err(|e| DbError::io(&path, e))?;
        if !file_type.is_file() {
            continue;
        }
        let text = read_note(&path).await?;
        notes.insert(path.display().to_string(), text);
    }

    debug!(dir = %dir.display(), count = notes.len(), "Collected notes");
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_naming() {
        assert_eq!(
            sidecar_path(Path::new("/data/sales.db")),
            PathBuf::from("/data/sales.db.AInotes.txt")
        );
        assert!(is_note_file(Path::new("/data/sales.db.AInotes.txt")));
        assert!(is_note_file(Path::new("/data/sales.db.AInotes.md")));
        assert!(!is_note_file(Path::new("/data/sales.db")));
        assert!(!is_note_file(Path::new("/data/AInotes.txt")));
    }

    #[tokio::test]
    async fn test_write_requires_exactly_one_target() {
        let store = NotesStore::new(Arc::new(ConnectionRegistry::new()));
        let err = store.write_notes("x", None, None).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));

        let err = store
            .write_notes("x", Some(Path::new("a.db")), Some("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_write_for_unknown_database() {
        let store = NotesStore::new(Arc::new(ConnectionRegistry::new()));
        let err = store.write_notes("x", None, Some("ghost")).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_write_and_read_file_note() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("report.csv");
        let store = NotesStore::new(Arc::new(ConnectionRegistry::new()));

        let outcome = store
            .write_notes("quarterly numbers", Some(&data), None)
            .await
            .unwrap();
        assert!(!outcome.deleted);
        assert!(outcome.path.ends_with("report.csv.AInotes.txt"));

        let notes = store.read_notes(Some(&data), None).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes.values().next().unwrap(), "quarterly numbers");
    }

    #[tokio::test]
    async fn test_read_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = NotesStore::new(Arc::new(ConnectionRegistry::new()));
        let err = store
            .read_notes(None, Some(&dir.path().join("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
