//! The ReAct loop: prompt, complete, parse, dispatch, observe

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use wayfinder_core::{ChatMessage, CompletionClient};

use crate::capabilities::grammar::{self, CORRECTIVE_FEEDBACK};
use crate::capabilities::{dispatch, Action, Computer};

use super::prompt::PromptBuilder;
use super::state::{AgentConfig, Scratchpad, TaskOutcome, TaskReport, Turn};

// ANSI colors
const BLUE: &str = "\x1b[94m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Drives one computer through thought/action/observation steps.
///
/// The computer (and its navigation state) lives as long as the controller;
/// the scratchpad is reset at the start of every task.
pub struct ReactController<C: Computer> {
    client: Arc<dyn CompletionClient>,
    computer: C,
    config: AgentConfig,
    prompt: PromptBuilder,
    initial_prompt: Option<String>,
    scratchpad: Scratchpad,
    total_actions: usize,
}

impl<C: Computer> ReactController<C> {
    pub fn new(client: Arc<dyn CompletionClient>, computer: C, config: AgentConfig) -> Self {
        Self {
            client,
            computer,
            config,
            prompt: PromptBuilder::new(),
            initial_prompt: None,
            scratchpad: Scratchpad::new(),
            total_actions: 0,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    /// Run a task and return the answer, or the fixed failure message
    pub async fn process_query(&mut self, task: &str) -> Result<String> {
        let report = self.run_task(task).await?;
        Ok(report.message().to_string())
    }

    /// Run a task to a terminal answer or until the step budget is spent.
    ///
    /// Only a completion transport failure returns `Err`; it carries a
    /// [`wayfinder_core::CompletionError`] in its chain.
    #[instrument(skip(self, task), fields(task_len = task.len(), max_actions = self.config.max_actions))]
    pub async fn run_task(&mut self, task: &str) -> Result<TaskReport> {
        info!(model = self.client.model(), "Starting task");
        self.scratchpad = Scratchpad::new();
        self.total_actions = 0;

        for step in 1..=self.config.max_actions {
            let prompt = self.prompt.render(task, &self.scratchpad.render(), step);
            if self.initial_prompt.is_none() {
                self.initial_prompt = Some(prompt.clone());
            }

            debug!(step, prompt_len = prompt.len(), "Requesting completion");
            self.total_actions = step;
            let reply = self
                .client
                .complete(&[ChatMessage::user(prompt)])
                .await
                .with_context(|| format!("Completion request failed at step {}", step))?;

            let turn = self.step(step, &reply).await;
            self.echo(&turn);

            if turn.is_terminal {
                info!(steps = step, "Task answered");
                let answer = turn.observation.clone();
                self.scratchpad.push(turn);
                return Ok(self.report(TaskOutcome::Answered(answer)));
            }
            self.scratchpad.push(turn);
        }

        warn!(max_actions = self.config.max_actions, "Step budget exhausted");
        Ok(self.report(TaskOutcome::BudgetExhausted))
    }

    /// Parse one reply and dispatch it
    async fn step(&mut self, step: usize, reply: &str) -> Turn {
        match grammar::resolve(reply) {
            Ok(resolved) => {
                let action = Action::from_parsed(&resolved.action);
                let observation = dispatch(&mut self.computer, &action).await;
                debug!(
                    step,
                    action = action.name(),
                    terminal = observation.terminal,
                    "Dispatched action"
                );
                Turn {
                    step_index: step,
                    thought: resolved.thought,
                    action_text: resolved.action_text,
                    observation: observation.text,
                    is_terminal: observation.terminal,
                }
            }
            Err(e) => {
                warn!(step, error = %e, reply_len = reply.len(), "Reply has no usable action");
                let parts = grammar::parse_reply(reply);
                Turn {
                    step_index: step,
                    thought: parts.thought,
                    action_text: parts.action,
                    observation: CORRECTIVE_FEEDBACK.to_string(),
                    is_terminal: false,
                }
            }
        }
    }

    fn echo(&self, turn: &Turn) {
        if !self.config.verbose {
            return;
        }
        let i = turn.step_index;
        println!("{}Thought {}:{} {}", BLUE, i, RESET, turn.thought);
        println!("{}Action {}:{} {}", CYAN, i, RESET, turn.action_text);
        if turn.is_terminal {
            println!("{}Answer:{} {}", YELLOW, RESET, turn.observation);
        } else {
            println!("{}Observation {}: {}{}", DIM, i, turn.observation, RESET);
        }
    }

    fn report(&self, outcome: TaskOutcome) -> TaskReport {
        TaskReport {
            outcome,
            steps: self.total_actions,
            turns: self.scratchpad.turns().to_vec(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The first prompt ever rendered by this controller
    pub fn initial_prompt(&self) -> Option<&str> {
        self.initial_prompt.as_deref()
    }

    /// Scratchpad of the current or last task
    pub fn scratchpad_text(&self) -> String {
        self.scratchpad.render()
    }

    pub fn turns(&self) -> &[Turn] {
        self.scratchpad.turns()
    }

    /// Completion requests made by the current or last task
    pub fn total_actions(&self) -> usize {
        self.total_actions
    }

    pub fn computer(&self) -> &C {
        &self.computer
    }

    pub fn computer_mut(&mut self) -> &mut C {
        &mut self.computer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::FAILURE_MESSAGE;
    use crate::computer::SimulatedComputer;
    use wayfinder_core::{CompletionError, ScriptedClient};

    fn hello_computer() -> SimulatedComputer {
        SimulatedComputer::new()
            .with_folder("C:\\hello", "2024-02-20")
            .with_file("C:\\hello\\world.txt", "2024-02-20")
    }

    fn controller(
        replies: &[&str],
        max_actions: usize,
    ) -> (Arc<ScriptedClient>, ReactController<SimulatedComputer>) {
        let client = Arc::new(ScriptedClient::new(replies.iter().copied()));
        let controller = ReactController::new(
            client.clone(),
            hello_computer(),
            AgentConfig::default().with_max_actions(max_actions),
        );
        (client, controller)
    }

    #[tokio::test]
    async fn test_go_to_hello_folder() {
        let (client, mut agent) = controller(
            &[
                "Thought: I should search for it.\nAction: find_directory § hello",
                "Thought: Found it.\nAction: change_directory § C:\\hello",
                "Thought: Done.\nAction: answer § done",
            ],
            10,
        );

        let answer = agent.process_query("go to the hello folder").await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(agent.computer().navigation().current(), "C:\\hello");
        assert_eq!(agent.total_actions(), 3);

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_eq!(request.len(), 1);
            assert_eq!(request[0].role, wayfinder_core::Role::User);
        }
        assert!(requests[1][0].content.contains(
            "Observation 1: Found 1 directories containing 'hello':\n- hello (Path: C:\\hello, Modified: 2024-02-20)"
        ));
        assert!(requests[2][0]
            .content
            .ends_with("What's your thought 3 and action 3?"));
        assert_eq!(agent.initial_prompt(), Some(requests[0][0].content.as_str()));
    }

    #[tokio::test]
    async fn test_go_up_at_root_then_answer() {
        let (_, mut agent) = controller(
            &[
                "Thought: Go up.\nAction: go_up",
                "Thought: Already at the root.\nAction: answer § I am already at C:\\",
            ],
            10,
        );

        let report = agent.run_task("go up one directory").await.unwrap();
        assert_eq!(report.message(), "I am already at C:\\");
        assert_eq!(report.steps, 2);
        assert_eq!(
            report.turns[0].observation,
            "Failed to move up, are you already at the root?"
        );
        assert_eq!(agent.computer().navigation().current(), "C:\\");
    }

    #[tokio::test]
    async fn test_budget_exhausted_on_empty_replies() {
        let (client, mut agent) = controller(&[], 4);
        let report = agent.run_task("anything").await.unwrap();

        assert_eq!(report.outcome, TaskOutcome::BudgetExhausted);
        assert_eq!(report.message(), FAILURE_MESSAGE);
        assert_eq!(report.steps, 4);
        assert_eq!(client.requests().len(), 4);
        assert!(report
            .turns
            .iter()
            .all(|t| t.observation == CORRECTIVE_FEEDBACK && !t.is_terminal));
    }

    #[tokio::test]
    async fn test_malformed_reply_gets_corrective_feedback() {
        let (client, mut agent) = controller(
            &["I think I will just wing it.", "Thought: ok\nAction: answer § fine"],
            10,
        );

        assert_eq!(agent.process_query("task").await.unwrap(), "fine");
        let second = &client.requests()[1][0].content;
        assert!(second.contains(&format!("Observation 1: {}", CORRECTIVE_FEEDBACK)));
    }

    #[tokio::test]
    async fn test_unknown_action_continues() {
        let (_, mut agent) = controller(
            &[
                "Thought: teleport\nAction: teleport § C:\\hello",
                "Thought: fine, walk\nAction: change_directory § C:\\hello",
                "Thought: done\nAction: answer § arrived",
            ],
            10,
        );

        let report = agent.run_task("go to hello").await.unwrap();
        assert_eq!(report.message(), "arrived");
        assert_eq!(report.turns[0].observation, "Unknown action: teleport");
        assert_eq!(report.steps, 3);
    }

    #[tokio::test]
    async fn test_block_form_reply() {
        let (_, mut agent) = controller(
            &[
                "function§ change_directory\nfolder_path§ C:\\hello",
                "function§ answer\nresponse§ in hello",
            ],
            10,
        );

        assert_eq!(agent.process_query("go to hello").await.unwrap(), "in hello");
        assert_eq!(agent.computer().navigation().current(), "C:\\hello");
        assert_eq!(agent.turns()[0].action_text, "change_directory § C:\\hello");
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let client = Arc::new(
            ScriptedClient::new(["Thought: look\nAction: list_directory"]).failing_when_exhausted(),
        );
        let mut agent = ReactController::new(client, hello_computer(), AgentConfig::default());

        let err = agent.process_query("list things").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompletionError>(),
            Some(CompletionError::Unavailable(_))
        ));
        assert_eq!(agent.total_actions(), 2);
    }

    #[tokio::test]
    async fn test_scratchpad_resets_but_navigation_persists() {
        let (_, mut agent) = controller(
            &[
                "Thought: go\nAction: change_directory § C:\\hello",
                "Thought: done\nAction: answer § one",
                "Thought: where am I\nAction: current_directory",
                "Thought: done\nAction: answer § two",
            ],
            10,
        );

        agent.process_query("first").await.unwrap();
        let first_prompt = agent.initial_prompt().map(str::to_string);

        let report = agent.run_task("second").await.unwrap();
        assert_eq!(report.turns.len(), 2);
        assert_eq!(report.turns[0].observation, "Current directory: C:\\hello");
        assert!(agent.scratchpad_text().starts_with("\nThought 1: where am I"));
        assert_eq!(agent.initial_prompt().map(str::to_string), first_prompt);
    }
}
