//! Capabilities the agent can invoke against a computer
//!
//! The capability table is static: every action name, its argument
//! signature and its description live in [`CAPABILITIES`], and the prompt is
//! rendered from the same table the dispatcher matches on.

pub mod dispatcher;
pub mod grammar;
pub mod security;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wayfinder_core::NavigationState;

pub use dispatcher::{dispatch, Observation};
pub use grammar::{ParsedAction, ReplyParts};

/// A directory found by `find_directory`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMatch {
    pub name: String,
    pub path: String,
    pub date_modified: String,
}

/// The collaborator the agent acts upon.
///
/// Ordinary failures (bad path, empty history, not a program) are reported
/// through the return value. `Err` is reserved for the computer itself being
/// unusable; the dispatcher turns it into an observation.
#[async_trait]
pub trait Computer: Send {
    /// Navigate to `path`; false if it is not an existing directory
    fn change_directory(&mut self, path: &str) -> Result<bool>;

    /// Navigate to the parent; false at a root
    fn go_up(&mut self) -> Result<bool>;

    fn go_back(&mut self) -> Result<bool>;

    fn go_forward(&mut self) -> Result<bool>;

    fn current_directory(&self) -> Result<String>;

    /// Names of the immediate children of the current directory
    fn list_directory(&self) -> Result<Vec<String>>;

    fn find_directory(&self, query: &str) -> Result<Vec<DirectoryMatch>>;

    /// Run a program; the returned text is shown to the model
    async fn run_application(
        &mut self,
        path: &str,
        kwargs: &BTreeMap<String, String>,
    ) -> Result<String> {
        let _ = kwargs;
        Ok(format!("{} is not a valid program.", path))
    }

    fn navigation(&self) -> &NavigationState;
}

/// One entry of the capability table
#[derive(Debug, Clone, Copy)]
pub struct CapabilitySpec {
    pub name: &'static str,
    /// Argument signature shown to the model, e.g. `(search_value: str)`
    pub signature: &'static str,
    pub summary: &'static [&'static str],
    /// Named argument keys accepted in block form, primary first
    pub argument_keys: &'static [&'static str],
    pub terminal: bool,
}

pub const CAPABILITIES: &[CapabilitySpec] = &[
    CapabilitySpec {
        name: "find_directory",
        signature: "(search_value: str)",
        summary: &["Searches globally for directories containing the given search value"],
        argument_keys: &["search_value"],
        terminal: false,
    },
    CapabilitySpec {
        name: "change_directory",
        signature: "(folder_path: str)",
        summary: &[
            "Changes current directory to specified folder path",
            "Returns new directory path if successful",
        ],
        argument_keys: &["folder_path"],
        terminal: false,
    },
    CapabilitySpec {
        name: "go_up",
        signature: "",
        summary: &["Moves up one directory level", "Returns new directory path if successful"],
        argument_keys: &[],
        terminal: false,
    },
    CapabilitySpec {
        name: "go_back",
        signature: "",
        summary: &["Moves to previously visited directory in navigation history"],
        argument_keys: &[],
        terminal: false,
    },
    CapabilitySpec {
        name: "go_forward",
        signature: "",
        summary: &["Moves to next directory in navigation history, if available"],
        argument_keys: &[],
        terminal: false,
    },
    CapabilitySpec {
        name: "current_directory",
        signature: "",
        summary: &["Gets current directory path"],
        argument_keys: &[],
        terminal: false,
    },
    CapabilitySpec {
        name: "list_directory",
        signature: "",
        summary: &["Lists all files and folders in current directory", "Takes no arguments"],
        argument_keys: &[],
        terminal: false,
    },
    CapabilitySpec {
        name: "run_application",
        signature: "(application_path: str, **kwargs)",
        summary: &["Runs specified application with optional keyword arguments"],
        argument_keys: &["application_path", "application", "arguments"],
        terminal: false,
    },
    CapabilitySpec {
        name: "answer",
        signature: "(response: str)",
        summary: &["Provides final answer to user's task"],
        argument_keys: &["response"],
        terminal: true,
    },
];

/// Numbered capability list for the prompt
pub fn describe_capabilities() -> String {
    CAPABILITIES
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let mut entry = format!("{}. {}{}", i + 1, c.name, c.signature);
            for line in c.summary {
                entry.push_str("\n   - ");
                entry.push_str(line);
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A recognized action with its argument payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FindDirectory { search_value: String },
    ChangeDirectory { folder_path: String },
    GoUp,
    GoBack,
    GoForward,
    CurrentDirectory,
    ListDirectory,
    /// Raw argument string: a quoted or bare program path plus trailing arguments
    RunApplication { command: String },
    Answer { response: String },
    Unknown { name: String },
}

impl Action {
    /// Map a parsed action onto the capability table
    pub fn from_parsed(parsed: &ParsedAction) -> Self {
        match parsed.name.as_str() {
            "find_directory" => Action::FindDirectory {
                search_value: parsed.argument(&["search_value"]),
            },
            "change_directory" => Action::ChangeDirectory {
                folder_path: parsed.argument(&["folder_path"]),
            },
            "go_up" => Action::GoUp,
            "go_back" => Action::GoBack,
            "go_forward" => Action::GoForward,
            "current_directory" => Action::CurrentDirectory,
            "list_directory" => Action::ListDirectory,
            "run_application" => Action::RunApplication {
                command: run_command(parsed),
            },
            "answer" => Action::Answer {
                response: parsed.argument(&["response"]),
            },
            other => Action::Unknown {
                name: other.to_string(),
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Action::FindDirectory { .. } => "find_directory",
            Action::ChangeDirectory { .. } => "change_directory",
            Action::GoUp => "go_up",
            Action::GoBack => "go_back",
            Action::GoForward => "go_forward",
            Action::CurrentDirectory => "current_directory",
            Action::ListDirectory => "list_directory",
            Action::RunApplication { .. } => "run_application",
            Action::Answer { .. } => "answer",
            Action::Unknown { name } => name,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Answer { .. })
    }
}

/// Block form may split the path and its arguments into separate keys
fn run_command(parsed: &ParsedAction) -> String {
    let path = parsed.named(&["application_path", "application"]);
    match path {
        Some(path) => {
            let path = if path.contains(' ') && !path.starts_with('"') {
                format!("\"{}\"", path)
            } else {
                path.to_string()
            };
            match parsed.named(&["arguments"]) {
                Some(args) => format!("{} {}", path, args),
                None => path,
            }
        }
        None => parsed.argument(&[]),
    }
}
