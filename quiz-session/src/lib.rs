//! Quiz Session Core
//!
//! ## Current API
//!
//! - Question records shared between the quiz service and the session
//! - In-browser quiz session state machine (pool, sampling, scoring)
//! - Render commands for an external display layer
//!
pub mod record;
pub mod session;

pub use record::QuestionRecord;
pub use session::{AnswerOutcome, CountRange, Phase, QuizSession, Renderer, Screen, SessionError};
