use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{MarkingError, Result};
use crate::rubric::{RubricLine, RubricSink};
use crate::sync::{ReadGuard, ReaderPreferringLock, WriteGuard};

/// Shared view of the rubric held for the length of a read section.
pub type RubricReadGuard<'a> = ReadGuard<'a, Vec<RubricLine>>;

/// Result of asking for a rubric line to be corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    /// The line was malformed or out of bounds; nothing changed.
    Unchanged,
    /// The criterion moved one step. `persisted` is false when flushing to
    /// the sink failed; the in-memory change stands either way.
    Corrected {
        before: char,
        after: char,
        persisted: bool,
    },
}

/// The grading rubric shared by every marker.
///
/// Reads and writes follow the reader-preferring protocol of
/// [`ReaderPreferringLock`]. Lines can only be changed through a
/// [`RubricWriter`], which exists only inside a write section.
pub struct RubricStore {
    lines: ReaderPreferringLock<Vec<RubricLine>>,
    question_count: usize,
    sink: Arc<dyn RubricSink>,
}

impl RubricStore {
    pub fn new(lines: Vec<RubricLine>, sink: Arc<dyn RubricSink>) -> Self {
        Self {
            question_count: lines.len(),
            lines: ReaderPreferringLock::new(lines),
            sink,
        }
    }

    /// Rubric starting at `1, A` and counting up, one line per question.
    pub fn with_defaults(question_count: usize, sink: Arc<dyn RubricSink>) -> Self {
        Self::new(RubricLine::defaults(question_count), sink)
    }

    /// Read an initial rubric from `path`. It must hold exactly one line per
    /// question. Lines that do not parse are kept as-is and will never be
    /// corrected.
    pub async fn load(
        path: impl AsRef<Path>,
        question_count: usize,
        sink: Arc<dyn RubricSink>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let lines: Vec<RubricLine> = contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(RubricLine::from_text)
            .collect();

        if lines.len() != question_count {
            return Err(MarkingError::InvalidRubric(format!(
                "{} has {} lines, expected one per question ({})",
                path.display(),
                lines.len(),
                question_count
            )));
        }
        for (index, line) in lines.iter().enumerate() {
            if line.criterion().is_none() {
                tracing::warn!(
                    question = index + 1,
                    line = %line,
                    "Malformed rubric line loaded"
                );
            }
        }
        Ok(Self::new(lines, sink))
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Enter a read section; it ends when the guard is dropped.
    pub async fn begin_read(&self) -> RubricReadGuard<'_> {
        self.lines.read().await
    }

    /// Enter a write section; it ends when the writer is dropped.
    pub async fn begin_write(&self) -> RubricWriter<'_> {
        RubricWriter {
            lines: self.lines.write().await,
            sink: self.sink.as_ref(),
        }
    }

    /// Flush the current rubric to the sink under a read section.
    pub async fn flush(&self) -> Result<()> {
        let lines = self.begin_read().await;
        self.sink.persist(&lines).await
    }

    /// Copy of every line's text.
    pub async fn snapshot(&self) -> Vec<String> {
        self.begin_read()
            .await
            .iter()
            .map(|l| l.to_string())
            .collect()
    }
}

impl std::fmt::Debug for RubricStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RubricStore")
            .field("question_count", &self.question_count)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the rubric for the length of a write section.
pub struct RubricWriter<'a> {
    lines: WriteGuard<'a, Vec<RubricLine>>,
    sink: &'a dyn RubricSink,
}

impl RubricWriter<'_> {
    pub fn lines(&self) -> &[RubricLine] {
        &self.lines
    }

    /// Advance the criterion of question `question_index` (zero-based) by one
    /// step, then flush the whole rubric to the sink.
    pub async fn correct_line(
        &mut self,
        question_index: usize,
        marker_id: usize,
    ) -> CorrectionOutcome {
        let Some(line) = self.lines.get_mut(question_index) else {
            tracing::warn!(
                marker_id,
                question = question_index + 1,
                "No rubric line for question"
            );
            return CorrectionOutcome::Unchanged;
        };
        let Some((before, after)) = line.advance_criterion() else {
            tracing::warn!(
                marker_id,
                question = question_index + 1,
                line = %line,
                "Malformed rubric line, skipping correction"
            );
            return CorrectionOutcome::Unchanged;
        };

        tracing::info!(
            marker_id,
            question = question_index + 1,
            %before,
            %after,
            "Corrected rubric"
        );

        let persisted = match self.sink.persist(&self.lines).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(marker_id, error = %e, "Failed to persist rubric");
                false
            }
        };

        CorrectionOutcome::Corrected {
            before,
            after,
            persisted,
        }
    }
}
