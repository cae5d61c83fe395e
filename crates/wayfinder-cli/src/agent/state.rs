//! Agent state: configuration, turns and the scratchpad

use serde::Serialize;

/// Returned when the step budget runs out
pub const FAILURE_MESSAGE: &str = "Failed to complete the task.";

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Step ceiling per task
    pub max_actions: usize,
    /// Echo thoughts, actions and observations to stdout
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_actions: 10,
            verbose: false,
        }
    }
}

impl AgentConfig {
    pub fn from_settings(settings: &wayfinder_core::config::AgentSettings) -> Self {
        Self {
            max_actions: settings.max_actions,
            verbose: settings.verbose,
        }
    }

    pub fn with_max_actions(mut self, max: usize) -> Self {
        self.max_actions = max;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// One thought/action/observation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub step_index: usize,
    pub thought: String,
    pub action_text: String,
    pub observation: String,
    pub is_terminal: bool,
}

/// Turns of the current task, in arrival order
#[derive(Debug, Clone, Default)]
pub struct Scratchpad {
    turns: Vec<Turn>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Transcript as folded into the prompt. The terminal turn has no observation line.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for turn in &self.turns {
            let i = turn.step_index;
            text.push_str(&format!(
                "\nThought {}: {}\nAction {}: {}",
                i, turn.thought, i, turn.action_text
            ));
            if !turn.is_terminal {
                text.push_str(&format!("\nObservation {}: {}", i, turn.observation));
            }
        }
        text
    }
}

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Answered(String),
    BudgetExhausted,
}

/// Result of one `run_task` call
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub outcome: TaskOutcome,
    /// Completion requests made
    pub steps: usize,
    pub turns: Vec<Turn>,
}

impl TaskReport {
    /// The answer, or the fixed failure message
    pub fn message(&self) -> &str {
        match &self.outcome {
            TaskOutcome::Answered(answer) => answer,
            TaskOutcome::BudgetExhausted => FAILURE_MESSAGE,
        }
    }

    pub fn answered(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Answered(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(i: usize, action: &str, observation: &str, terminal: bool) -> Turn {
        Turn {
            step_index: i,
            thought: format!("thinking {}", i),
            action_text: action.to_string(),
            observation: observation.to_string(),
            is_terminal: terminal,
        }
    }

    #[test]
    fn test_empty_scratchpad_renders_nothing() {
        assert_eq!(Scratchpad::new().render(), "");
    }

    #[test]
    fn test_render_scratchpad() {
        let mut pad = Scratchpad::new();
        pad.push(turn(1, "go_up", "Failed to move up, are you already at the root?", false));
        pad.push(turn(2, "answer § at root", "at root", true));

        assert_eq!(
            pad.render(),
            "\nThought 1: thinking 1\nAction 1: go_up\nObservation 1: Failed to move up, are you already at the root?\
             \nThought 2: thinking 2\nAction 2: answer § at root"
        );
        assert_eq!(pad.turns().len(), 2);
    }

    #[test]
    fn test_report_message() {
        let report = TaskReport {
            outcome: TaskOutcome::BudgetExhausted,
            steps: 10,
            turns: Vec::new(),
        };
        assert_eq!(report.message(), FAILURE_MESSAGE);
        assert!(!report.answered());

        let report = TaskReport {
            outcome: TaskOutcome::Answered("done".to_string()),
            steps: 1,
            turns: Vec::new(),
        };
        assert_eq!(report.message(), "done");
    }

    #[test]
    fn test_config_builders() {
        let config = AgentConfig::default().with_max_actions(3).with_verbose(true);
        assert_eq!(config.max_actions, 3);
        assert!(config.verbose);
    }
}
