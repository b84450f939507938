//! The shared grading rubric.
//!
//! - [`RubricLine`]: one `"<question>, <criterion>"` entry and its one-step correction
//! - [`RubricStore`]: the lines behind a reader-preferring lock
//! - [`RubricSink`]: where the rubric is flushed after each correction

pub mod line;
pub mod sink;
pub mod store;

pub use line::RubricLine;
pub use sink::{FileSink, MemorySink, RubricSink};
pub use store::{CorrectionOutcome, RubricReadGuard, RubricStore, RubricWriter};
