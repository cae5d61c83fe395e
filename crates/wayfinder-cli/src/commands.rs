//! CLI commands implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use wayfinder_core::{CompletionClient, Config, OpenAiClient};

use crate::agent::{AgentConfig, PromptBuilder, ReactController, Turn};
use crate::bench::{self, Benchmark};
use crate::capabilities::security::TerminalApproval;
use crate::capabilities::Computer;
use crate::computer::LocalComputer;
use crate::progress::Activity;

// ANSI color codes
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

fn print_status(ok: bool, msg: &str) {
    let icon = if ok {
        format!("{}✓{}", GREEN, RESET)
    } else {
        format!("{}✗{}", RED, RESET)
    };
    println!("  {} {}", icon, msg);
}

fn build_client(config: &Config) -> Result<Arc<dyn CompletionClient>> {
    if config.endpoint.api_key.is_none() && config.endpoint.base_url.contains("api.openai.com") {
        warn!("No API key configured for api.openai.com");
        eprintln!(
            "{}Warning:{} no API key set. Use WAYFINDER_API_KEY, OPENAI_API_KEY or [endpoint].api_key.",
            YELLOW, RESET
        );
    }
    let client = OpenAiClient::new(&config.endpoint)?;
    Ok(Arc::new(client))
}

/// The returned spinner handle is the one program confirmation suspends
fn build_agent(
    config: &Config,
    start: Option<PathBuf>,
    yes: bool,
) -> Result<(ReactController<LocalComputer>, Activity)> {
    let start = match start {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let activity = Activity::new();
    let approval = if yes || !config.programs.confirm {
        TerminalApproval::auto()
    } else {
        TerminalApproval::new()
    }
    .with_activity(activity.clone());

    let computer = LocalComputer::new(&start, config, Box::new(approval))?;
    let client = build_client(config)?;
    let agent = ReactController::new(client, computer, AgentConfig::from_settings(&config.agent));
    Ok((agent, activity))
}

#[derive(Debug, Serialize)]
struct AskOutput<'a> {
    answer: &'a str,
    answered: bool,
    steps: usize,
    current_directory: &'a str,
    turns: &'a [Turn],
}

/// Run one task against the local filesystem
pub async fn ask(
    config: &Config,
    task: &str,
    start: Option<PathBuf>,
    yes: bool,
    show_scratchpad: bool,
    json: bool,
) -> Result<()> {
    if task.trim().is_empty() {
        anyhow::bail!("No task provided");
    }

    let (mut agent, activity) = build_agent(config, start, yes)?;

    activity.start("Working...", agent.config().verbose || json);
    let result = agent.run_task(task).await;
    activity.finish();
    let report = result?;

    let current = agent.computer().navigation().current().to_string();

    if json {
        let output = AskOutput {
            answer: report.message(),
            answered: report.answered(),
            steps: report.steps,
            current_directory: &current,
            turns: &report.turns,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if show_scratchpad {
        println!("{}Scratchpad{}", BOLD, RESET);
        println!("{}", agent.scratchpad_text().trim_start());
        println!();
    }

    let color = if report.answered() { GREEN } else { YELLOW };
    println!("{}{}{}", color, report.message(), RESET);
    println!("{}[{} step(s), now in {}]{}", DIM, report.steps, current, RESET);
    Ok(())
}

/// Interactive session against the local filesystem
pub async fn chat(config: &Config, start: Option<PathBuf>, yes: bool) -> Result<()> {
    let (agent, activity) = build_agent(config, start, yes)?;
    crate::repl::run(agent, activity).await
}

/// Print the first prompt a task would send
pub fn prompt(task: &str) -> Result<()> {
    println!("{}", PromptBuilder::new().render(task, "", 1));
    Ok(())
}

/// Run the benchmark scenarios
pub async fn bench(config: &Config, runs: usize, out: &Path, only: &[String]) -> Result<()> {
    let cases: Vec<_> = bench::cases()
        .into_iter()
        .filter(|c| only.is_empty() || only.iter().any(|o| o.eq_ignore_ascii_case(c.name)))
        .collect();
    if cases.is_empty() {
        anyhow::bail!("No benchmark case matches {:?}", only);
    }

    let client = build_client(config)?;
    let agent_config = AgentConfig::from_settings(&config.agent).with_verbose(false);
    let benchmark = Benchmark::new(client, agent_config, runs, out)?;

    println!("{}Benchmark{}", BOLD, RESET);
    println!("  Model: {}", config.endpoint.model);
    println!("  Cases: {}", cases.len());
    println!("  Runs per case: {}", runs.max(1));
    println!();

    let report = benchmark.run(&cases).await?;

    println!();
    for case in &report.cases {
        println!(
            "  {}{}{} ({:.2}%) - {}",
            BLUE,
            case.case_name,
            RESET,
            case.success_rate(),
            case.description
        );
    }
    println!();
    println!("{}Overall score:{} {:.2}%", BOLD, RESET, report.score);
    println!("{}Results:{} {}", DIM, RESET, benchmark.dir().display());
    Ok(())
}

/// Check the completion endpoint answers
pub async fn health(config: &Config) -> Result<()> {
    let client = OpenAiClient::new(&config.endpoint)?;
    println!("{}Endpoint{}", BOLD, RESET);
    println!("  URL: {}", client.base_url());
    println!("  Model: {}", config.endpoint.model);

    if client.health_check().await? {
        print_status(true, "Endpoint is reachable");
        Ok(())
    } else {
        print_status(false, "Endpoint did not answer on /models");
        anyhow::bail!("Endpoint is not reachable")
    }
}

/// Write a default configuration file
pub fn config_init() -> Result<()> {
    match Config::create_default() {
        Ok(path) => {
            println!("{}Created:{} {}", GREEN, RESET, path.display());
            println!("\nEdit this file to point wayfinder at your completion endpoint.");
        }
        Err(e) => {
            if e.to_string().contains("already exists") {
                println!("{}", e);
            } else {
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Show the resolved configuration
pub fn config_show(config: &Config, source: Option<&Path>) -> Result<()> {
    println!("{}Configuration{}", BOLD, RESET);
    match source {
        Some(path) => println!("  Path: {}", path.display()),
        None => println!("  Path: (built-in defaults)"),
    }
    println!();
    println!("{}", config.to_display_toml()?);
    Ok(())
}
