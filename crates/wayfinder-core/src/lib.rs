//! wayfinder-core: Shared library for the wayfinder navigation agent
//!
//! Provides:
//! - Configuration loading (wayfinder.toml)
//! - OpenAI-compatible chat completion client
//! - Navigation state with back/forward/up history
//! - Local program execution

pub mod completion;
pub mod config;
pub mod error;
pub mod navigation;
pub mod process;

pub use completion::{
    ChatMessage, ChatRequest, ChatResponse, CompletionClient, OpenAiClient, Role, ScriptedClient,
};
pub use config::Config;
pub use error::CompletionError;
pub use navigation::{NavigationState, PathFlavor};
pub use process::{run_program, ProgramRun};
