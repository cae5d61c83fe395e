//! Confirmation before running local programs

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::progress::Activity;

/// Check if stdin is connected to a terminal
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Decides whether a program may be started
pub trait ProgramApproval: Send + Sync {
    fn approve(&self, program: &Path, args: &[String]) -> bool;
}

/// Asks on the terminal; denies when stdin is not a TTY
pub struct TerminalApproval {
    pub auto_approve: bool,
    activity: Activity,
}

impl TerminalApproval {
    pub fn new() -> Self {
        Self {
            auto_approve: false,
            activity: Activity::new(),
        }
    }

    pub fn auto() -> Self {
        Self {
            auto_approve: true,
            activity: Activity::new(),
        }
    }

    /// Pause this spinner while asking
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activity = activity;
        self
    }

    /// Prompt and read the answer from `input`, with the spinner suspended
    fn confirm_with<R: BufRead>(&self, program: &Path, args: &[String], input: &mut R) -> bool {
        self.activity.suspend(|| {
            println!();
            println!("\x1b[91m[run]\x1b[0m \x1b[1m{}\x1b[0m {}", program.display(), args.join(" "));
            print!("Allow this program to run? [y/N] ");
            if io::stdout().flush().is_err() {
                return false;
            }

            let mut answer = String::new();
            if input.read_line(&mut answer).is_err() {
                debug!("Failed to read confirmation, denying");
                return false;
            }

            let approved = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
            debug!(program = %program.display(), approved, "User confirmation response");
            approved
        })
    }
}

impl Default for TerminalApproval {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramApproval for TerminalApproval {
    fn approve(&self, program: &Path, args: &[String]) -> bool {
        if self.auto_approve {
            debug!(program = %program.display(), "Auto-approving program");
            return true;
        }

        if !is_interactive() {
            warn!(
                program = %program.display(),
                "Non-interactive mode: denying program that requires confirmation"
            );
            self.activity.suspend(|| {
                eprintln!(
                    "\x1b[93m[Warning]\x1b[0m Non-interactive mode: running '{}' requires confirmation but stdin is not a TTY.",
                    program.display()
                );
                eprintln!("Use --yes to allow programs in non-interactive mode.");
            });
            return false;
        }

        self.confirm_with(program, args, &mut io::stdin().lock())
    }
}

/// Always approves
#[cfg(test)]
pub struct AutoApprove;

#[cfg(test)]
impl ProgramApproval for AutoApprove {
    fn approve(&self, _program: &Path, _args: &[String]) -> bool {
        true
    }
}

/// Always denies
#[cfg(test)]
pub struct AutoDeny;

#[cfg(test)]
impl ProgramApproval for AutoDeny {
    fn approve(&self, _program: &Path, _args: &[String]) -> bool {
        false
    }
}
