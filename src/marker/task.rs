use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::MarkingConfig;
use crate::exam::{Advance, ClaimTicket, ExamSession};
use crate::marker::Pacer;
use crate::rubric::{CorrectionOutcome, RubricStore};

/// Where a marker is in its pass over the current exam.
#[derive(Debug)]
pub enum MarkerState {
    Starting,
    /// Reading rubric line `question`; past the last line the review is over.
    ReviewingRubric { question: usize },
    AttemptingCorrection { question: usize },
    ClaimingQuestion,
    Grading(ClaimTicket),
    CheckingAdvance { claimed: bool },
    Idle,
    Terminated,
}

impl MarkerState {
    pub fn name(&self) -> &'static str {
        match self {
            MarkerState::Starting => "starting",
            MarkerState::ReviewingRubric { .. } => "reviewing_rubric",
            MarkerState::AttemptingCorrection { .. } => "attempting_correction",
            MarkerState::ClaimingQuestion => "claiming_question",
            MarkerState::Grading(_) => "grading",
            MarkerState::CheckingAdvance { .. } => "checking_advance",
            MarkerState::Idle => "idle",
            MarkerState::Terminated => "terminated",
        }
    }
}

/// Counters for one marker over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkerStats {
    pub marker_id: usize,
    /// Full passes started (rubric review through advance check).
    pub passes: u64,
    pub claims: u64,
    pub corrections: u64,
    pub persist_failures: u64,
    pub advancements: u64,
}

/// One marker: reviews the rubric, grades one question per pass, and moves
/// the session on when it finds the exam fully graded.
///
/// Markers never talk to each other. They only meet in the shared
/// [`RubricStore`] and [`ExamSession`].
pub struct Marker {
    id: usize,
    rubric: Arc<RubricStore>,
    session: Arc<ExamSession>,
    pacer: Pacer,
    correction_probability: f64,
    rng: StdRng,
    shutdown: CancellationToken,
    stats: MarkerStats,
}

impl Marker {
    pub fn new(
        id: usize,
        rubric: Arc<RubricStore>,
        session: Arc<ExamSession>,
        config: &MarkingConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => StdRng::from_entropy(),
        };
        Self {
            id,
            rubric,
            session,
            pacer: Pacer::new(config.delays.clone()),
            correction_probability: config.correction_probability,
            rng,
            shutdown,
            stats: MarkerStats {
                marker_id: id,
                ..MarkerStats::default()
            },
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run until the session reaches its terminal submission or shutdown is
    /// requested, then return this marker's counters.
    pub async fn run(mut self) -> MarkerStats {
        let mut state = MarkerState::Starting;
        loop {
            tracing::trace!(marker_id = self.id, state = state.name(), "Marker state");
            state = match state {
                MarkerState::Terminated => break,
                current => self.step(current).await,
            };
        }
        self.stats
    }

    async fn step(&mut self, state: MarkerState) -> MarkerState {
        match state {
            MarkerState::Starting => {
                tracing::info!(marker_id = self.id, "Marker started");
                MarkerState::ReviewingRubric { question: 0 }
            }
            MarkerState::ReviewingRubric { question: 0 } if self.should_stop() => {
                MarkerState::Terminated
            }
            MarkerState::ReviewingRubric { question } => self.review_line(question).await,
            MarkerState::AttemptingCorrection { question } => {
                self.correct_line(question).await;
                MarkerState::ReviewingRubric {
                    question: question + 1,
                }
            }
            MarkerState::ClaimingQuestion => match self.claim_next().await {
                Some(ticket) => MarkerState::Grading(ticket),
                None => MarkerState::CheckingAdvance { claimed: false },
            },
            MarkerState::Grading(ticket) => {
                self.grade(ticket).await;
                MarkerState::CheckingAdvance { claimed: true }
            }
            MarkerState::CheckingAdvance { claimed } => {
                self.check_advance().await;
                if claimed {
                    MarkerState::ReviewingRubric { question: 0 }
                } else {
                    MarkerState::Idle
                }
            }
            MarkerState::Idle => {
                tokio::select! {
                    _ = tokio::time::sleep(self.pacer.idle_interval()) => {}
                    _ = self.shutdown.cancelled() => {}
                }
                MarkerState::ReviewingRubric { question: 0 }
            }
            MarkerState::Terminated => MarkerState::Terminated,
        }
    }

    fn should_stop(&self) -> bool {
        if self.session.is_terminal() {
            tracing::info!(
                marker_id = self.id,
                submission_id = self.session.submission_id(),
                "Terminal submission reached, stopping"
            );
            return true;
        }
        if self.shutdown.is_cancelled() {
            tracing::info!(marker_id = self.id, "Shutdown requested, stopping");
            return true;
        }
        false
    }

    async fn review_line(&mut self, question: usize) -> MarkerState {
        if question == 0 {
            self.stats.passes += 1;
            tracing::info!(
                marker_id = self.id,
                submission_id = self.session.submission_id(),
                "Reviewing rubric"
            );
        }
        if question >= self.rubric.question_count() {
            return MarkerState::ClaimingQuestion;
        }

        {
            let lines = self.rubric.begin_read().await;
            if let Some(line) = lines.get(question) {
                tracing::debug!(
                    marker_id = self.id,
                    question = question + 1,
                    line = %line,
                    "Reading rubric line"
                );
            }
            self.pacer.review(&mut self.rng).await;
        }

        if self.rng.gen_bool(self.correction_probability) {
            MarkerState::AttemptingCorrection { question }
        } else {
            MarkerState::ReviewingRubric {
                question: question + 1,
            }
        }
    }

    async fn correct_line(&mut self, question: usize) {
        let outcome = {
            let mut writer = self.rubric.begin_write().await;
            tracing::debug!(
                marker_id = self.id,
                question = question + 1,
                "Writing rubric correction"
            );
            writer.correct_line(question, self.id).await
        };
        if let CorrectionOutcome::Corrected { persisted, .. } = outcome {
            self.stats.corrections += 1;
            if !persisted {
                self.stats.persist_failures += 1;
            }
        }
    }

    /// Claim the first unclaimed question, at most one per pass.
    async fn claim_next(&mut self) -> Option<ClaimTicket> {
        for question in 0..self.session.question_count() {
            if let Some(ticket) = self.session.try_claim(question).await {
                self.stats.claims += 1;
                tracing::info!(
                    marker_id = self.id,
                    submission_id = ticket.submission_id(),
                    question = question + 1,
                    "Marking question"
                );
                return Some(ticket);
            }
        }
        None
    }

    async fn grade(&mut self, ticket: ClaimTicket) {
        self.pacer.grade(&mut self.rng).await;
        let question = ticket.question();
        let submission_id = ticket.submission_id();
        self.session.complete(ticket).await;
        tracing::info!(
            marker_id = self.id,
            submission_id,
            question = question + 1,
            "Completed marking question"
        );
    }

    async fn check_advance(&mut self) {
        if let Advance::Advanced { from, to } = self.session.advance_if_complete().await {
            self.stats.advancements += 1;
            tracing::info!(
                marker_id = self.id,
                from,
                to,
                "All questions marked, loading next exam"
            );
        }
    }
}
