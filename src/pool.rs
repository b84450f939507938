use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::MarkingConfig;
use crate::error::{MarkingError, Result};
use crate::exam::{ExamSession, QuestionStatus, FIRST_SUBMISSION};
use crate::marker::{Marker, MarkerStats};
use crate::rubric::{FileSink, RubricSink, RubricStore};

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_submission: u32,
    pub exams_completed: u32,
    /// Whether the run stopped on the terminal submission rather than on shutdown.
    pub reached_terminal: bool,
    pub final_statuses: Vec<QuestionStatus>,
    pub rubric: Vec<String>,
    pub markers: Vec<MarkerStats>,
}

impl RunReport {
    pub fn total_claims(&self) -> u64 {
        self.markers.iter().map(|m| m.claims).sum()
    }

    pub fn total_corrections(&self) -> u64 {
        self.markers.iter().map(|m| m.corrections).sum()
    }

    pub fn total_advancements(&self) -> u64 {
        self.markers.iter().map(|m| m.advancements).sum()
    }
}

/// Owns the shared rubric and exam session and runs a fixed set of markers
/// over them until the terminal submission is reached.
pub struct MarkingPool {
    config: MarkingConfig,
    rubric: Arc<RubricStore>,
    session: Arc<ExamSession>,
}

impl MarkingPool {
    /// Pool with the default rubric, flushed to `config.rubric_path`.
    pub fn new(config: MarkingConfig) -> Result<Self> {
        let sink: Arc<dyn RubricSink> = Arc::new(FileSink::new(config.rubric_path.clone()));
        let rubric = RubricStore::with_defaults(config.question_count, sink);
        Self::with_rubric(config, rubric)
    }

    /// Pool over an already constructed rubric, e.g. one loaded from a file
    /// or backed by a custom sink.
    pub fn with_rubric(config: MarkingConfig, rubric: RubricStore) -> Result<Self> {
        config.validate()?;
        if rubric.question_count() != config.question_count {
            return Err(MarkingError::InvalidRubric(format!(
                "rubric has {} lines for {} questions",
                rubric.question_count(),
                config.question_count
            )));
        }
        let session = ExamSession::new(config.question_count, config.terminal_submission);
        Ok(Self {
            config,
            rubric: Arc::new(rubric),
            session: Arc::new(session),
        })
    }

    pub fn rubric(&self) -> Arc<RubricStore> {
        self.rubric.clone()
    }

    pub fn session(&self) -> Arc<ExamSession> {
        self.session.clone()
    }

    /// Run every marker to completion.
    ///
    /// 1. Flushes the initial rubric to the sink
    /// 2. Spawns one task per marker, all sharing the rubric and session
    /// 3. Waits for every marker to stop
    ///
    /// Cancelling `shutdown` makes markers stop at the start of their next
    /// pass; grading already under way is finished first. Dropping the
    /// returned future instead aborts every marker at its next await point,
    /// which can leave a question `Claimed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial rubric cannot be persisted, or if a
    /// marker task panics. A marker panic means the claim protocol was
    /// violated, so the remaining markers are cancelled before returning.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<RunReport> {
        let started_at = Utc::now();
        self.rubric.flush().await?;

        tracing::info!(
            markers = self.config.marker_count,
            questions = self.config.question_count,
            terminal_submission = self.config.terminal_submission,
            "Starting marking"
        );

        let markers_token = shutdown.child_token();
        // Markers live in the set, so dropping this future aborts all of them.
        let mut tasks = JoinSet::new();
        let mut marker_ids = HashMap::with_capacity(self.config.marker_count);
        for marker_id in 1..=self.config.marker_count {
            let marker = Marker::new(
                marker_id,
                self.rubric.clone(),
                self.session.clone(),
                &self.config,
                markers_token.clone(),
            );
            let handle = tasks.spawn(marker.run());
            marker_ids.insert(handle.id(), marker_id);
        }

        let mut markers = Vec::with_capacity(self.config.marker_count);
        let mut failure = None;
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, stats)) => markers.push(stats),
                Err(e) => {
                    let marker_id = marker_ids.get(&e.id()).copied().unwrap_or_default();
                    tracing::error!(marker_id, error = %e, "Marker task failed");
                    markers_token.cancel();
                    failure.get_or_insert(MarkingError::MarkerFailed {
                        marker_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }
        markers.sort_by_key(|m| m.marker_id);

        let final_submission = self.session.submission_id();
        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            final_submission,
            exams_completed: final_submission.saturating_sub(FIRST_SUBMISSION),
            reached_terminal: self.session.is_terminal(),
            final_statuses: self.session.statuses().await,
            rubric: self.rubric.snapshot().await,
            markers,
        };

        tracing::info!(
            final_submission,
            exams_completed = report.exams_completed,
            claims = report.total_claims(),
            corrections = report.total_corrections(),
            "All markers finished"
        );
        Ok(report)
    }
}
