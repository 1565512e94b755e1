//! Per-conversation transcript store.
//!
//! One file per (workspace, channel) at `<root>/<workspace>/<channel>/messages.txt`.
//! Records are prepended, so the file always reads newest-first. Writes to the same
//! key are serialized; each write lands via a temp file and rename.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const TRANSCRIPT_FILE: &str = "messages.txt";

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("workspace and channel identifiers are required")]
    MissingIdentifier,
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("transcript not found")]
    NotFound,
    #[error("transcript io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TranscriptError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        TranscriptError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Which side of the exchange an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One immutable transcript line with its receipt time.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub recorded_at: DateTime<Utc>,
    pub direction: Direction,
    pub rendered_line: String,
}

impl TranscriptEntry {
    /// Line for a message received from `author` at `received_at`.
    pub fn inbound(author: &str, text: &str, received_at: DateTime<Utc>) -> Self {
        Self {
            recorded_at: received_at,
            direction: Direction::Inbound,
            rendered_line: format!("User: {}, Message: \"{}\"", author, text),
        }
    }

    /// Line for a reply the bot delivered.
    pub fn outbound(reply: &str) -> Self {
        Self {
            recorded_at: Utc::now(),
            direction: Direction::Outbound,
            rendered_line: format!("Bot Response: {}", reply),
        }
    }

    /// `[2024-05-01T12:00:00.000Z] line\n`
    pub fn record(&self) -> String {
        format!(
            "[{}] {}\n",
            self.recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.rendered_line
        )
    }
}

/// Composite transcript key.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct TranscriptKey {
    workspace_id: String,
    channel_id: String,
}

fn validate_identifier(id: &str) -> Result<(), TranscriptError> {
    if id.is_empty() {
        return Err(TranscriptError::MissingIdentifier);
    }
    if id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(TranscriptError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}

/// File-backed transcript store. Owns all on-disk transcript state.
///
/// A key's lock lives in `locks` only while some append holds or awaits it.
pub struct TranscriptStore {
    root: PathBuf,
    locks: Mutex<HashMap<TranscriptKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl TranscriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the transcript file for a key, after validating both identifiers.
    pub fn transcript_path(
        &self,
        workspace_id: &str,
        channel_id: &str,
    ) -> Result<PathBuf, TranscriptError> {
        validate_identifier(workspace_id)?;
        validate_identifier(channel_id)?;
        Ok(self
            .root
            .join(workspace_id)
            .join(channel_id)
            .join(TRANSCRIPT_FILE))
    }

    fn key_lock(&self, key: &TranscriptKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drop the key's lock entry when no other append holds a handle to it.
    fn release_key_lock(&self, key: &TranscriptKey, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        // One handle in the map, one held by the caller.
        if Arc::strong_count(lock) <= 2 {
            locks.remove(key);
        }
    }

    /// Prepend `entry` to the transcript for (workspace_id, channel_id), creating the
    /// directory and file on first write. Returns the transcript path.
    pub async fn append(
        &self,
        workspace_id: &str,
        channel_id: &str,
        entry: &TranscriptEntry,
    ) -> Result<PathBuf, TranscriptError> {
        let path = self.transcript_path(workspace_id, channel_id)?;
        let key = TranscriptKey {
            workspace_id: workspace_id.to_string(),
            channel_id: channel_id.to_string(),
        };
        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            prepend_record(&path, entry).await
        };
        self.release_key_lock(&key, &lock);
        result.map(|()| path)
    }

    /// Raw transcript content (newest-first), or `NotFound` when nothing was ever written.
    pub async fn read(
        &self,
        workspace_id: &str,
        channel_id: &str,
    ) -> Result<Vec<u8>, TranscriptError> {
        let path = self.transcript_path(workspace_id, channel_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TranscriptError::NotFound),
            Err(e) => Err(TranscriptError::io(&path, e)),
        }
    }
}

async fn prepend_record(path: &Path, entry: &TranscriptEntry) -> Result<(), TranscriptError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| TranscriptError::io(dir, e))?;
    }
    let previous = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(TranscriptError::io(path, e)),
    };
    let record = entry.record();
    let mut updated = Vec::with_capacity(record.len() + previous.len());
    updated.extend_from_slice(record.as_bytes());
    updated.extend_from_slice(&previous);

    let tmp = path.with_file_name(format!(".{}.{}.tmp", TRANSCRIPT_FILE, uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&tmp, &updated).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(TranscriptError::io(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(TranscriptError::io(path, e));
    }
    Ok(())
}
