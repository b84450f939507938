//! Locking protocols shared by the rubric and the exam session.
//!
//! - [`ReaderPreferringLock`]: many concurrent readers or one writer, never
//!   both. Readers that arrive while a read group is active join it, so a
//!   waiting writer can starve under sustained read load.
//! - [`LockArray`]: a fixed set of independently locked items, used to give
//!   each exam question its own lock.

pub mod rw;
pub mod slots;

pub use rw::{ReadGuard, ReaderPreferringLock, WriteGuard};
pub use slots::LockArray;
