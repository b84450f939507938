use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{MarkingError, Result};
use crate::rubric::RubricLine;

/// Destination the full rubric is flushed to after every correction.
#[async_trait]
pub trait RubricSink: Send + Sync {
    /// Replace whatever the sink holds with `lines`.
    async fn persist(&self, lines: &[RubricLine]) -> Result<()>;
}

/// Render the rubric in its on-disk form: one line per question, each
/// terminated by a newline.
pub fn render(lines: &[RubricLine]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_str());
        out.push('\n');
    }
    out
}

/// Writes the rubric to a file, overwriting previous content.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RubricSink for FileSink {
    async fn persist(&self, lines: &[RubricLine]) -> Result<()> {
        tokio::fs::write(&self.path, render(lines))
            .await
            .map_err(|source| MarkingError::Persist {
                path: self.path.clone(),
                source,
            })
    }
}

/// Keeps every flushed rubric in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Mutex<Vec<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Vec<String>> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn latest(&self) -> Option<Vec<String>> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl RubricSink for MemorySink {
    async fn persist(&self, lines: &[RubricLine]) -> Result<()> {
        let snapshot = lines.iter().map(|l| l.to_string()).collect();
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot);
        Ok(())
    }
}
