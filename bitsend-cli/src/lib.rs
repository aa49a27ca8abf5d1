//! BitSend command-line front end
//!
//! - `cli`: Argument parsing
//! - `prompt`: Answer sources (terminal or scripted)
//! - `session`: The interactive payment flow

pub mod cli;
pub mod prompt;
pub mod session;

pub use prompt::{AnswerSource, ScriptedAnswers, StdinAnswers};
pub use session::{run_session, SessionError, SessionOutcome};
