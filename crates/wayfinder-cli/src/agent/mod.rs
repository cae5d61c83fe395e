//! ReAct agent for computer navigation
//!
//! Interleaves model thoughts, single actions and observations until the
//! model answers or the step budget runs out.

mod agent_loop;
mod prompt;
mod state;

pub use agent_loop::ReactController;
pub use prompt::PromptBuilder;
pub use state::{AgentConfig, TaskOutcome, TaskReport, Turn, FAILURE_MESSAGE};
