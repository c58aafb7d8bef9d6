//! Notes tools.

use crate::error::DbResult;
use crate::notes::{NotesStore, WriteNotesOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadNotesInput {
    /// A file whose sidecar notes to read, or a note file itself
    #[serde(default)]
    pub file_path: Option<String>,
    /// A directory whose note files to read (not recursive)
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReadNotesOutput {
    /// Note text keyed by note file path
    pub notes: BTreeMap<String, String>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteNotesInput {
    /// Note text. Empty text deletes the note.
    pub text: String,
    /// File to attach the note to
    #[serde(default)]
    pub file_path: Option<String>,
    /// Identifier of a file-backed database to attach the note to
    #[serde(default)]
    pub database_identifier: Option<String>,
}

pub struct NotesToolHandler {
    store: NotesStore,
}

impl NotesToolHandler {
    pub fn new(store: NotesStore) -> Self {
        Self { store }
    }

    pub async fn read_notes(&self, input: ReadNotesInput) -> DbResult<ReadNotesOutput> {
        let notes = self
            .store
            .read_notes(
                input.file_path.as_deref().map(Path::new),
                input.directory.as_deref().map(Path::new),
            )
            .await?;
        let count = notes.len();
        Ok(ReadNotesOutput { notes, count })
    }

    pub async fn write_notes(&self, input: WriteNotesInput) -> DbResult<WriteNotesOutcome> {
        self.store
            .write_notes(
                &input.text,
                input.file_path.as_deref().map(Path::new),
                input.database_identifier.as_deref(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_notes_input() {
        let input: WriteNotesInput =
            serde_json::from_str(r#"{"text": "", "database_identifier": "sales"}"#).unwrap();
        assert!(input.text.is_empty());
        assert!(input.file_path.is_none());
        assert_eq!(input.database_identifier.as_deref(), Some("sales"));
    }
}
