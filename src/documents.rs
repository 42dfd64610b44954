//! Upload directory and the in-memory registry of uploaded documents.
//!
//! The registry lives only as long as the process. Files already present in the upload
//! directory at startup are still summarized by `/chat` but have no id.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors raised by the upload store.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The supplied filename is empty once directory components are removed.
    #[error("invalid filename '{0}'")]
    InvalidFilename(String),
    /// No document is registered under the id.
    #[error("document {0} not found")]
    NotFound(Uuid),
    /// The document is registered but its file no longer exists.
    #[error("file for document {0} is missing")]
    FileMissing(Uuid),
    /// Reading or writing the upload directory failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Metadata for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    /// Identifier handed back to the client.
    pub id: Uuid,
    /// Base name the file was saved under.
    pub filename: String,
    /// Upload time (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    /// Size of the saved file.
    pub size_bytes: u64,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<Uuid, Entry>,
    next_sequence: u64,
}

struct Entry {
    document: StoredDocument,
    sequence: u64,
}

/// Owns the upload directory and the id → document registry.
pub struct UploadStore {
    root: PathBuf,
    registry: RwLock<Registry>,
}

impl UploadStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| DocumentError::Io {
                path: root.clone(),
                source,
            })?;
        tracing::info!(root = %root.display(), "Upload directory ready");
        Ok(Self {
            root,
            registry: RwLock::new(Registry::default()),
        })
    }

    /// Upload directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save `bytes` under the base name of `filename` and register it with a fresh id.
    ///
    /// An existing file of the same name is overwritten and its registry entry replaced. The
    /// bytes land in a hidden `.<name>.part` file first and are renamed into place, so readers
    /// of the upload directory never see a partially written PDF.
    pub async fn save(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredDocument, DocumentError> {
        let name = base_name(filename)
            .ok_or_else(|| DocumentError::InvalidFilename(filename.to_string()))?;
        let path = self.root.join(&name);
        let partial = self.root.join(format!(".{name}.part"));

        let mut registry = self.registry.write().await;
        let written = match tokio::fs::write(&partial, bytes).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(error) => Err(error),
        };
        if let Err(source) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DocumentError::Io { path, source });
        }

        let replaced: Vec<Uuid> = registry
            .entries
            .iter()
            .filter(|(_, entry)| entry.document.filename == name)
            .map(|(id, _)| *id)
            .collect();
        for id in replaced {
            registry.entries.remove(&id);
            tracing::debug!(%id, filename = %name, "Replaced document with same filename");
        }

        let document = StoredDocument {
            id: Uuid::new_v4(),
            filename: name,
            uploaded_at: OffsetDateTime::now_utc(),
            size_bytes: bytes.len() as u64,
        };
        let sequence = registry.next_sequence;
        registry.next_sequence += 1;
        registry.entries.insert(
            document.id,
            Entry {
                document: document.clone(),
                sequence,
            },
        );
        tracing::info!(
            id = %document.id,
            filename = %document.filename,
            size = document.size_bytes,
            "Document stored"
        );
        Ok(document)
    }

    /// Look up a registered document.
    pub async fn get(&self, id: Uuid) -> Option<StoredDocument> {
        self.registry
            .read()
            .await
            .entries
            .get(&id)
            .map(|entry| entry.document.clone())
    }

    /// Resolve a document to its file, dropping the entry if the file has vanished.
    pub async fn locate(&self, id: Uuid) -> Result<(StoredDocument, PathBuf), DocumentError> {
        let document = self.get(id).await.ok_or(DocumentError::NotFound(id))?;
        let path = self.root.join(&document.filename);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok((document, path));
        }

        let mut registry = self.registry.write().await;
        registry.entries.remove(&id);
        tracing::warn!(%id, path = %path.display(), "Dropping registry entry for missing file");
        Err(DocumentError::FileMissing(id))
    }

    /// Delete a document's file and registry entry.
    ///
    /// The write lock is held across the file removal so a concurrent delete of the same id
    /// observes [`DocumentError::NotFound`].
    pub async fn delete(&self, id: Uuid) -> Result<StoredDocument, DocumentError> {
        let mut registry = self.registry.write().await;
        let filename = registry
            .entries
            .get(&id)
            .map(|entry| entry.document.filename.clone())
            .ok_or(DocumentError::NotFound(id))?;
        let path = self.root.join(&filename);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                registry.entries.remove(&id);
                tracing::warn!(
                    %id,
                    path = %path.display(),
                    "Dropping registry entry for missing file"
                );
                return Err(DocumentError::FileMissing(id));
            }
            Err(source) => return Err(DocumentError::Io { path, source }),
        }

        let entry = registry
            .entries
            .remove(&id)
            .ok_or(DocumentError::NotFound(id))?;
        tracing::info!(%id, filename = %filename, "Document deleted");
        Ok(entry.document)
    }

    /// Registered documents in upload order.
    pub async fn list(&self) -> Vec<StoredDocument> {
        let registry = self.registry.read().await;
        let mut entries: Vec<&Entry> = registry.entries.values().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
            .into_iter()
            .map(|entry| entry.document.clone())
            .collect()
    }
}

/// Last path component of a client-supplied filename, accepting both separators.
fn base_name(filename: &str) -> Option<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}
