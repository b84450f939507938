pub mod session;

pub use session::{Advance, ClaimTicket, ExamSession, QuestionStatus, FIRST_SUBMISSION};
