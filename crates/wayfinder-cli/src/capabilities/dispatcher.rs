//! Action dispatch against a [`Computer`]

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{Action, Computer, DirectoryMatch};

/// Prefix of the result a powered-off computer returns
pub const OFF_SENTINEL: &str = "Computer is off";
/// Suffix of the result for a path that is not a program
pub const NOT_A_PROGRAM_SENTINEL: &str = "is not a valid program.";

/// Text fed back to the model after an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub text: String,
    /// The action was a final answer; `text` is the task result
    pub terminal: bool,
}

impl Observation {
    fn step(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminal: false,
        }
    }
}

/// Execute `action`. Never fails: collaborator errors become observations.
pub async fn dispatch<C: Computer + ?Sized>(computer: &mut C, action: &Action) -> Observation {
    if let Action::Answer { response } = action {
        return Observation {
            text: response.clone(),
            terminal: true,
        };
    }

    match run(computer, action).await {
        Ok(text) => Observation::step(text),
        Err(e) => {
            warn!(action = action.name(), error = %e, "Capability failed");
            Observation::step(format!("Capability error: {:#}", e))
        }
    }
}

async fn run<C: Computer + ?Sized>(computer: &mut C, action: &Action) -> Result<String> {
    let text = match action {
        Action::FindDirectory { search_value } => {
            if search_value.trim().is_empty() {
                return Ok("No search value provided".to_string());
            }
            let matches = computer.find_directory(search_value)?;
            debug!(query = %search_value, found = matches.len(), "find_directory");
            format_matches(search_value, &matches)
        }
        Action::ChangeDirectory { folder_path } => {
            if folder_path.trim().is_empty() {
                return Ok("No folder path provided.".to_string());
            }
            if computer.change_directory(folder_path)? {
                format!(
                    "Successfully changed the current directory to {}",
                    computer.current_directory()?
                )
            } else {
                "Failed to move to folder, is the path correct?".to_string()
            }
        }
        Action::GoUp => {
            if computer.go_up()? {
                format!(
                    "Successfully moved up one directory level, current directory: {}.",
                    computer.current_directory()?
                )
            } else {
                "Failed to move up, are you already at the root?".to_string()
            }
        }
        Action::GoBack => {
            if computer.go_back()? {
                format!(
                    "Successfully navigated back to the previous directory, current directory: {}.",
                    computer.current_directory()?
                )
            } else {
                "Failed to navigate back, you might already be at the start of the history.".to_string()
            }
        }
        Action::GoForward => {
            if computer.go_forward()? {
                format!(
                    "Successfully navigated forward to the next directory, current directory: {}.",
                    computer.current_directory()?
                )
            } else {
                "Failed to navigate forward, you might already be at the end of the history.".to_string()
            }
        }
        Action::CurrentDirectory => format!("Current directory: {}", computer.current_directory()?),
        Action::ListDirectory => {
            let current = computer.current_directory()?;
            let entries = computer.list_directory()?;
            let contents = if entries.is_empty() {
                "The current directory is empty.".to_string()
            } else {
                entries
                    .iter()
                    .map(|e| format!("- {}", e))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            format!(
                "Current directory: {}\nContents of the current directory:\n{}",
                current, contents
            )
        }
        Action::RunApplication { command } => run_application(computer, command).await?,
        Action::Answer { response } => response.clone(),
        Action::Unknown { name } => {
            warn!(action = %name, "Unknown action");
            format!("Unknown action: {}", name)
        }
    };
    Ok(text)
}

fn format_matches(query: &str, matches: &[DirectoryMatch]) -> String {
    if matches.is_empty() {
        return format!("No directories found containing '{}'", query);
    }

    let mut text = format!("Found {} directories containing '{}':\n", matches.len(), query);
    for m in matches {
        text.push_str(&format!(
            "- {} (Path: {}, Modified: {})\n",
            m.name, m.path, m.date_modified
        ));
    }
    text
}

/// Split `"quoted path" rest` or `path rest`; None on an unterminated quote
pub fn split_command(command: &str) -> Option<(&str, &str)> {
    let command = command.trim();
    if let Some(quoted) = command.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some((&quoted[..end], quoted[end + 1..].trim()));
    }

    match command.split_once(' ') {
        Some((path, rest)) => Some((path, rest.trim())),
        None => Some((command, "")),
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

async fn run_application<C: Computer + ?Sized>(computer: &mut C, command: &str) -> Result<String> {
    if command.trim().is_empty() {
        return Ok("No application path provided.".to_string());
    }

    let Some((path, rest)) = split_command(command) else {
        return Ok(failure("", "Invalid application path format"));
    };

    let mut kwargs = BTreeMap::new();
    if !rest.is_empty() {
        kwargs.insert("arguments".to_string(), rest.to_string());
    }

    let result = computer.run_application(path, &kwargs).await?;
    if result.starts_with(OFF_SENTINEL) || result.ends_with(NOT_A_PROGRAM_SENTINEL) {
        debug!(path, "run_application failed");
        Ok(failure(base_name(path), &result))
    } else {
        Ok(format!("Output: {}", result))
    }
}

fn failure(app_name: &str, reason: &str) -> String {
    format!("Failed to run the application '{}'. Reason: {}", app_name, reason)
}
