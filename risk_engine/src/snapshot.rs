//! Persisting snapshots.
//!
//! A snapshot is always written whole: it is serialized into a temporary file
//! in the destination directory which then replaces the target, so readers see
//! either the previous snapshot or the new one, never a partial file.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use snafu::{Backtrace, ResultExt, Snafu};
use tempfile::NamedTempFile;

use crate::report::Snapshot;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SnapshotError {
    /// The snapshot could not be converted to JSON.
    #[snafu(display("Failed to serialize snapshot: {source}"))]
    Serialize {
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// An existing snapshot file is not valid snapshot JSON.
    #[snafu(display("Failed to parse snapshot {}: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The finished temporary file could not replace the target.
    #[snafu(display("Failed to replace {}: {source}", path.display()))]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
        backtrace: Backtrace,
    },

    /// The blocking write task panicked or was cancelled.
    #[snafu(display("Snapshot write task failed: {source}"))]
    Join {
        source: tokio::task::JoinError,
        backtrace: Backtrace,
    },
}

#[async_trait]
pub trait SnapshotSink {
    /// What a successful write reports back, e.g. the path written.
    type Output: Send;

    /// Writes the complete snapshot, replacing whatever the sink held before.
    async fn write(&self, snapshot: &Snapshot) -> Result<Self::Output, SnapshotError>;
}

/// Pretty-printed JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking write; see the module docs for the replacement guarantee.
    pub fn write_now(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).context(IoSnafu { path: dir })?;

        let mut tmp = NamedTempFile::new_in(dir).context(IoSnafu { path: dir })?;
        serde_json::to_writer_pretty(&mut tmp, snapshot).context(SerializeSnafu)?;
        tmp.write_all(b"\n")
            .and_then(|()| tmp.as_file().sync_all())
            .context(IoSnafu { path: tmp.path() })?;
        tmp.persist(&self.path).context(PersistSnafu {
            path: self.path.clone(),
        })?;

        Ok(self.path.clone())
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    type Output = PathBuf;

    async fn write(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        let sink = self.clone();
        let snapshot = snapshot.clone();
        tokio::task::spawn_blocking(move || sink.write_now(&snapshot))
            .await
            .context(JoinSnafu)?
    }
}

/// Reads the snapshot at `path`; `Ok(None)` when no file exists yet.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(IoSnafu { path }),
    };
    let snapshot = serde_json::from_str(&text).context(ParseSnafu { path })?;
    Ok(Some(snapshot))
}
