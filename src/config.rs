use std::ops::RangeInclusive;
use std::path::PathBuf;

use crate::error::{MarkingError, Result};

/// Fewest markers a pool is allowed to run with.
pub const MIN_MARKERS: usize = 2;

/// Bounds for the simulated work each marker performs.
///
/// Every delay is drawn uniformly from its millisecond range. None of these
/// waits ever happen while a rubric or question lock is held.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayConfig {
    /// Time spent reading a single rubric line
    pub review_ms: RangeInclusive<u64>,
    /// Time spent grading one claimed question
    pub grade_ms: RangeInclusive<u64>,
    /// Pause before retrying when a pass found nothing to claim
    pub idle_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            review_ms: 500..=1000,
            grade_ms: 1000..=2000,
            idle_ms: 100,
        }
    }
}

impl DelayConfig {
    /// No simulated work at all. Idle still waits a millisecond so markers
    /// with nothing to claim do not spin.
    pub fn instant() -> Self {
        Self {
            review_ms: 0..=0,
            grade_ms: 0..=0,
            idle_ms: 1,
        }
    }

    /// Multiply every bound by `factor`, e.g. `0.01` for a quick demo run.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor.max(0.0)).round() as u64;
        Self {
            review_ms: scale(*self.review_ms.start())..=scale(*self.review_ms.end()),
            grade_ms: scale(*self.grade_ms.start())..=scale(*self.grade_ms.end()),
            idle_ms: scale(self.idle_ms).max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkingConfig {
    pub marker_count: usize,
    pub question_count: usize,
    /// Submission id at which marking stops. Reaching it is the only
    /// termination condition for markers.
    pub terminal_submission: u32,
    /// Chance, per rubric line per pass, that a marker decides to correct it.
    pub correction_probability: f64,
    pub rubric_path: PathBuf,
    pub delays: DelayConfig,
    /// Seed for reproducible marker decisions. Each marker derives its own
    /// stream from it.
    pub seed: Option<u64>,
}

impl Default for MarkingConfig {
    fn default() -> Self {
        Self {
            marker_count: MIN_MARKERS,
            question_count: 5,
            terminal_submission: 9999,
            correction_probability: 0.20,
            rubric_path: PathBuf::from("rubric.txt"),
            delays: DelayConfig::default(),
            seed: None,
        }
    }
}

impl MarkingConfig {
    pub fn with_markers(mut self, marker_count: usize) -> Self {
        self.marker_count = marker_count;
        self
    }

    pub fn with_questions(mut self, question_count: usize) -> Self {
        self.question_count = question_count;
        self
    }

    pub fn with_terminal_submission(mut self, terminal_submission: u32) -> Self {
        self.terminal_submission = terminal_submission;
        self
    }

    pub fn with_correction_probability(mut self, probability: f64) -> Self {
        self.correction_probability = probability;
        self
    }

    pub fn with_delays(mut self, delays: DelayConfig) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check that the configuration describes a runnable pool.
    pub fn validate(&self) -> Result<()> {
        if self.marker_count < MIN_MARKERS {
            return Err(MarkingError::InvalidConfig(format!(
                "at least {} markers are required, got {}",
                MIN_MARKERS, self.marker_count
            )));
        }
        if self.question_count == 0 {
            return Err(MarkingError::InvalidConfig(
                "an exam needs at least one question".to_string(),
            ));
        }
        if self.terminal_submission == 0 {
            return Err(MarkingError::InvalidConfig(
                "terminal submission must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.correction_probability) {
            return Err(MarkingError::InvalidConfig(format!(
                "correction probability must be within [0, 1], got {}",
                self.correction_probability
            )));
        }
        for (name, range) in [
            ("review", &self.delays.review_ms),
            ("grade", &self.delays.grade_ms),
        ] {
            if range.start() > range.end() {
                return Err(MarkingError::InvalidConfig(format!(
                    "{} delay range is empty: {}..={}",
                    name,
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }
}
