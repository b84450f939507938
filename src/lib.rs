pub mod config;
pub mod error;
pub mod exam;
pub mod marker;
pub mod pool;
pub mod rubric;
pub mod shutdown;
pub mod sync;
