//! Registry of open database handles.
//!
//! The registry is the single owner of every `DatabaseHandle` and maps a
//! caller-chosen identifier to exactly one open database. Creating a handle
//! (opening a file or an in-memory database) happens outside the lock; the
//! map is re-checked before insertion so that concurrent registrations of the
//! same identifier resolve to exactly one winner.

use crate::db::handle::DatabaseHandle;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseSummary;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default time to wait for the database connection to become available.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Database file copied into place by `create` instead of an empty file.
    pub template: Option<PathBuf>,
    pub acquire_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            template: None,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    handles: Arc<RwLock<HashMap<String, DatabaseHandle>>>,
    options: RegistryOptions,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            handles: Arc::new(RwLock::new(HashMap::new())),
            options,
        }
    }

    /// Identifiers of all open databases, sorted.
    pub async fn list(&self) -> Vec<String> {
        let handles = self.handles.read().await;
        let mut ids: Vec<String> = handles.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Summaries of all open databases, sorted by identifier.
    pub async fn list_detail(&self) -> Vec<DatabaseSummary> {
        let handles = self.handles.read().await;
        let mut summaries: Vec<DatabaseSummary> =
            handles.values().map(DatabaseHandle::summary).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.handles.read().await.contains_key(id)
    }

    pub async fn count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Create a new database file at `path` and register it under `id`.
    ///
    /// Fails with `AlreadyExists` if the identifier is taken or the file is
    /// already present; an existing file is never touched. If the new file
    /// cannot be opened it is removed again.
    pub async fn create(&self, id: &str, path: &Path) -> DbResult<DatabaseSummary> {
        self.ensure_vacant(id).await?;

        info!(
            id = %id,
            path = %path.display(),
            template = ?self.options.template,
            "Creating database"
        );

        self.provision(path).await?;

        let handle =
            match DatabaseHandle::open_file(id, path, self.options.acquire_timeout).await {
                Ok(handle) => handle,
                Err(e) => {
                    remove_provisioned(path).await;
                    return Err(e);
                }
            };

        match self.register(handle).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                remove_provisioned(path).await;
                Err(e)
            }
        }
    }

    /// Open an existing database file, or a fresh in-memory database when
    /// `path` is `None`, and register it under `id`.
    pub async fn connect(&self, id: &str, path: Option<&Path>) -> DbResult<DatabaseSummary> {
        self.ensure_vacant(id).await?;

        let handle = match path {
            Some(path) => {
                info!(id = %id, path = %path.display(), "Connecting to database file");
                match tokio::fs::metadata(path).await {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => {
                        return Err(DbError::invalid_input(format!(
                            "'{}' is not a regular file",
                            path.display()
                        )));
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        return Err(DbError::file_not_found(path.display().to_string()));
                    }
                    Err(e) => return Err(DbError::io(path, e)),
                }
                DatabaseHandle::open_file(id, path, self.options.acquire_timeout).await?
            }
            None => {
                info!(id = %id, "Opening in-memory database");
                DatabaseHandle::open_in_memory(id, self.options.acquire_timeout).await?
            }
        };

        self.register(handle).await
    }

    /// Close a database and forget its identifier.
    ///
    /// The file of a file-backed database is left in place; an in-memory
    /// database is discarded.
    pub async fn disconnect(&self, id: &str) -> DbResult<()> {
        let handle = {
            let mut handles = self.handles.write().await;
            handles.remove(id)
        }
        .ok_or_else(|| DbError::database_not_found(id))?;

        handle.close().await;
        info!(id = %id, backing = %handle.backing(), "Disconnected");
        Ok(())
    }

    /// Look up the handle registered under `id`.
    pub async fn resolve(&self, id: &str) -> DbResult<DatabaseHandle> {
        let handles = self.handles.read().await;
        handles
            .get(id)
            .cloned()
            .ok_or_else(|| DbError::database_not_found(id))
    }

    /// Close every open database.
    pub async fn close_all(&self) {
        let drained: Vec<(String, DatabaseHandle)> = {
            let mut handles = self.handles.write().await;
            handles.drain().collect()
        };

        for (id, handle) in drained {
            info!(id = %id, "Closing database");
            handle.close().await;
        }
        info!("All databases closed");
    }

    async fn ensure_vacant(&self, id: &str) -> DbResult<()> {
        let handles = self.handles.read().await;
        if handles.contains_key(id) {
            return Err(DbError::already_exists("Database", id));
        }
        Ok(())
    }

    /// Insert a freshly opened handle, re-checking the identifier under the
    /// write lock. The losing handle of a concurrent registration is closed.
    async fn register(&self, handle: DatabaseHandle) -> DbResult<DatabaseSummary> {
        let id = handle.id().to_string();

        let duplicate = {
            let mut handles = self.handles.write().await;
            if handles.contains_key(&id) {
                handle
            } else {
                let summary = handle.summary();
                handles.insert(id.clone(), handle);
                info!(id = %id, backing = ?summary.backing, "Connected successfully");
                return Ok(summary);
            }
        };

        warn!(id = %id, "Concurrent registration detected, closing duplicate");
        duplicate.close().await;
        Err(DbError::already_exists("Database", id))
    }

    /// Create the file for a new database, copying the template if configured.
    async fn provision(&self, path: &Path) -> DbResult<()> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DbError::already_exists("File", path.display().to_string()));
            }
            Err(e) => return Err(DbError::io(path, e)),
        };

        let Some(template) = &self.options.template else {
            return Ok(());
        };

        debug!(template = %template.display(), path = %path.display(), "Copying template");
        let copied = async {
            let mut source = tokio::fs::File::open(template)
                .await
                .map_err(|e| DbError::io(template, e))?;
            tokio::io::copy(&mut source, &mut file)
                .await
                .map_err(|e| DbError::io(path, e))?;
            file.flush().await.map_err(|e| DbError::io(path, e))
        }
        .await;

        if copied.is_err() {
            drop(file);
            remove_provisioned(path).await;
        }
        copied
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn remove_provisioned(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove database file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = ConnectionRegistry::new();
        assert!(registry.list().await.is_empty());
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_memory_connect_and_disconnect() {
        let registry = ConnectionRegistry::new();
        let summary = registry.connect("scratch", None).await.unwrap();
        assert_eq!(summary.id, "scratch");
        assert!(summary.path.is_none());
        assert!(registry.exists("scratch").await);

        registry.disconnect("scratch").await.unwrap();
        assert!(!registry.exists("scratch").await);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = ConnectionRegistry::new();
        registry.connect("dup", None).await.unwrap();
        let err = registry.connect("dup", None).await.unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists { .. }));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_id() {
        let registry = ConnectionRegistry::new();
        let err = registry.disconnect("ghost").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_unknown_id() {
        let registry = ConnectionRegistry::new();
        let err = registry.resolve("ghost").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let registry = ConnectionRegistry::new();
        registry.connect("b", None).await.unwrap();
        registry.connect("a", None).await.unwrap();
        assert_eq!(registry.list().await, vec!["a", "b"]);
        let detail = registry.list_detail().await;
        assert_eq!(detail[0].id, "a");
        registry.close_all().await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_close_all_leaves_registry_usable() {
        let registry = Arc::new(ConnectionRegistry::new());
        registry.connect("a", None).await.unwrap();
        registry.connect("b", None).await.unwrap();
        let held = registry.resolve("a").await.unwrap();

        let closing = tokio::spawn({
            let registry = registry.clone();
            async move { registry.close_all().await }
        });
        // Lookups must not wait on the pools shutting down
        let lookup = tokio::time::timeout(Duration::from_secs(5), registry.list()).await;
        assert!(lookup.is_ok());
        closing.await.unwrap();

        assert!(registry.list().await.is_empty());
        assert!(matches!(
            registry.resolve("a").await.unwrap_err(),
            DbError::NotFound { .. }
        ));
        assert!(held.execute_update("SELECT 1", &[]).await.is_err());

        registry.connect("a", None).await.unwrap();
        assert_eq!(registry.list().await, vec!["a"]);
        registry.close_all().await;
    }
}
