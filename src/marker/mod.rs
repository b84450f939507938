//! Markers: the concurrent workers that grade exams.
//!
//! Each [`Marker`] runs the same loop independently:
//!
//! 1. Stop if the session has reached its terminal submission
//! 2. Read every rubric line, correcting some of them at random
//! 3. Claim and grade at most one unclaimed question
//! 4. Advance the session if the exam is fully graded
//! 5. Idle briefly if nothing could be claimed, then repeat
//!
//! There is no scheduler. Who grades what, and who advances each exam, falls
//! out of the locks in [`RubricStore`](crate::rubric::RubricStore) and
//! [`ExamSession`](crate::exam::ExamSession).
//!
//! The [`Pacer`] simulates how long reading and grading take. Grading time is
//! always spent outside every lock.

pub mod pacer;
pub mod task;

pub use pacer::Pacer;
pub use task::{Marker, MarkerState, MarkerStats};
