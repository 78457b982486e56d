//! Script file persistence.
//!
//! The editor text is written to one fixed path before every launch, fully
//! replacing whatever the previous run left there.

use crate::error::RunError;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ScriptStore {
    path: PathBuf,
}

impl ScriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write `source` to the script path, creating missing parent directories.
    pub async fn persist(&self, source: &str) -> Result<(), RunError> {
        let to_err = |source| RunError::ScriptWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(to_err)?;
            }
        }
        tokio::fs::write(&self.path, source).await.map_err(to_err)?;
        tracing::debug!(path = %self.path.display(), bytes = source.len(), "script persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src/script_files/script.kts");
        let store = ScriptStore::new(&path);

        store.persist("println(1)").await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "println(1)");
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.kts");
        let store = ScriptStore::new(&path);

        store.persist("a much longer first script").await.unwrap();
        store.persist("short").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
    }

    #[tokio::test]
    async fn test_persist_into_directory_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScriptStore::new(dir.path());

        let err = store.persist("x").await.unwrap_err();
        assert!(matches!(err, RunError::ScriptWrite { .. }));
    }
}
