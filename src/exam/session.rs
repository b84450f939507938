use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::sync::LockArray;

/// First submission every session starts on.
pub const FIRST_SUBMISSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionStatus {
    Unclaimed,
    Claimed,
    Graded,
}

impl std::fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionStatus::Unclaimed => write!(f, "unclaimed"),
            QuestionStatus::Claimed => write!(f, "claimed"),
            QuestionStatus::Graded => write!(f, "graded"),
        }
    }
}

/// Proof that the holder claimed one question of one submission.
///
/// Only [`ExamSession::try_claim`] hands these out and
/// [`ExamSession::complete`] consumes them, so a question can only be
/// completed once, by the marker that claimed it.
#[derive(Debug)]
#[must_use = "a claimed question must be completed"]
pub struct ClaimTicket {
    question: usize,
    submission_id: u32,
}

impl ClaimTicket {
    /// Zero-based question index.
    pub fn question(&self) -> usize {
        self.question
    }

    pub fn submission_id(&self) -> u32 {
        self.submission_id
    }
}

/// What [`ExamSession::advance_if_complete`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// This caller moved the session from `from` to `to`.
    Advanced { from: u32, to: u32 },
    /// Not every question was graded, or another caller advanced first.
    NotReady,
}

/// The submission currently being graded.
///
/// Each question has its own lock for claim and complete. Moving to the next
/// submission takes a separate session-wide lock and re-checks, under that
/// lock, that every question is graded, so each submission is advanced past
/// exactly once.
///
/// `submission_id` only grows and stops at the terminal sentinel. Once it is
/// terminal no more questions can be claimed.
#[derive(Debug)]
pub struct ExamSession {
    submission_id: AtomicU32,
    terminal_submission: u32,
    questions: LockArray<QuestionStatus>,
    advance_lock: Mutex<()>,
}

impl ExamSession {
    pub fn new(question_count: usize, terminal_submission: u32) -> Self {
        Self {
            submission_id: AtomicU32::new(FIRST_SUBMISSION.min(terminal_submission)),
            terminal_submission,
            questions: LockArray::from_fn(question_count, |_| QuestionStatus::Unclaimed),
            advance_lock: Mutex::new(()),
        }
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn submission_id(&self) -> u32 {
        self.submission_id.load(Ordering::Acquire)
    }

    pub fn terminal_submission(&self) -> u32 {
        self.terminal_submission
    }

    pub fn is_terminal(&self) -> bool {
        self.submission_id() == self.terminal_submission
    }

    /// Claim `question` if nobody else has. Losing the race, an out-of-range
    /// index, or a terminal session all return `None` without changing state.
    pub async fn try_claim(&self, question: usize) -> Option<ClaimTicket> {
        let mut status = self.questions.lock(question).await?;
        if *status != QuestionStatus::Unclaimed || self.is_terminal() {
            return None;
        }
        *status = QuestionStatus::Claimed;
        Some(ClaimTicket {
            question,
            submission_id: self.submission_id(),
        })
    }

    /// Mark a claimed question as graded.
    ///
    /// # Panics
    ///
    /// Panics if the question is not currently `Claimed` or the session has
    /// moved past the ticket's submission. Either means the claim protocol
    /// itself is broken.
    pub async fn complete(&self, ticket: ClaimTicket) {
        let mut status = self
            .questions
            .lock(ticket.question)
            .await
            .expect("claim tickets only reference existing questions");
        assert_eq!(
            *status,
            QuestionStatus::Claimed,
            "question {} of submission {} completed while {}",
            ticket.question + 1,
            ticket.submission_id,
            *status
        );
        assert_eq!(
            self.submission_id(),
            ticket.submission_id,
            "submission advanced while question {} was still claimed",
            ticket.question + 1
        );
        *status = QuestionStatus::Graded;
    }

    /// Advisory check that every question is graded. Each question is
    /// read under its own lock, one after another, so the answer can be
    /// stale by the time it is returned.
    pub async fn all_graded(&self) -> bool {
        for question in 0..self.questions.len() {
            match self.questions.lock(question).await {
                Some(status) if *status == QuestionStatus::Graded => {}
                _ => return false,
            }
        }
        true
    }

    /// Move to the next submission if every question is graded.
    ///
    /// The cheap [`all_graded`](Self::all_graded) pre-check only filters out
    /// the common case; the decision is made after taking the session lock
    /// and re-checking every question while holding all question locks.
    /// Advancing into the terminal sentinel leaves the statuses of the
    /// final submission in place, since nothing may be claimed afterwards.
    pub async fn advance_if_complete(&self) -> Advance {
        if !self.all_graded().await {
            return Advance::NotReady;
        }

        let _session = self.advance_lock.lock().await;
        let mut statuses = self.questions.lock_all().await;
        if statuses.iter().any(|s| **s != QuestionStatus::Graded) {
            return Advance::NotReady;
        }

        let from = self.submission_id();
        if from >= self.terminal_submission {
            return Advance::NotReady;
        }
        let to = from + 1;
        self.submission_id.store(to, Ordering::Release);
        if to < self.terminal_submission {
            for status in statuses.iter_mut() {
                **status = QuestionStatus::Unclaimed;
            }
        }
        Advance::Advanced { from, to }
    }

    /// Status of every question, in question order.
    pub async fn statuses(&self) -> Vec<QuestionStatus> {
        self.questions.snapshot().await
    }
}
