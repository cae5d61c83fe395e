//! wayfinder: a ReAct agent that navigates a filesystem on your behalf
//!
//! Tasks are given in plain language; a chat completion endpoint decides which
//! capability (find, change directory, list, run a program, answer) to call next.

mod agent;
mod bench;
mod capabilities;
mod commands;
mod computer;
mod progress;
mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wayfinder_core::Config;

#[derive(Debug, Parser)]
#[command(name = "wayfinder")]
#[command(about = "Navigate your filesystem by telling an agent where to go", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (logs and every agent step)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to wayfinder.toml or the user config dir)
    #[arg(short, long, global = true, env = "WAYFINDER_CONFIG")]
    config: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat {
        /// Directory to start in
        #[arg(short, long)]
        start: Option<PathBuf>,

        /// Run programs without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Run one task (non-interactive)
    Ask {
        /// The task
        task: Vec<String>,

        /// Directory to start in
        #[arg(short, long)]
        start: Option<PathBuf>,

        /// Maximum number of steps
        #[arg(long)]
        max_actions: Option<usize>,

        /// Print the thought/action/observation transcript
        #[arg(long)]
        show_scratchpad: bool,

        /// Run programs without asking
        #[arg(short, long)]
        yes: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the first prompt a task would send
    Prompt {
        /// The task
        task: Vec<String>,
    },

    /// Run the simulated-computer benchmark
    Bench {
        /// Runs per case
        #[arg(short, long, default_value = "10")]
        runs: usize,

        /// Output directory
        #[arg(short, long, default_value = "benchmarks")]
        out: PathBuf,

        /// Only run these cases (e.g. Case001)
        #[arg(long = "case")]
        cases: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check the completion endpoint
    Health,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init,
    /// Show the resolved configuration
    Show,
}

fn load_config(cli: &Cli) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, source) =
        Config::load(cli.config.as_deref(), |key| std::env::var(key).ok())?;

    if let Some(model) = &cli.model {
        config.endpoint.model = model.clone();
    }
    if cli.verbose {
        config.agent.verbose = true;
    }
    Ok((config, source))
}

/// `RUST_LOG` wins when set and valid; otherwise `debug` with --verbose, `warn` without
fn log_filter(verbose: bool, rust_log: Option<String>) -> EnvFilter {
    let level = if verbose { "debug" } else { "warn" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = log_filter(cli.verbose, std::env::var("RUST_LOG").ok());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (mut config, source) = load_config(&cli)?;

    match cli.command {
        Some(Commands::Chat { start, yes }) => commands::chat(&config, start, yes).await,
        Some(Commands::Ask {
            task,
            start,
            max_actions,
            show_scratchpad,
            yes,
            json,
        }) => {
            if let Some(max) = max_actions {
                config.agent.max_actions = max;
            }
            let task_text = task.join(" ");
            commands::ask(&config, &task_text, start, yes, show_scratchpad, json).await
        }
        Some(Commands::Prompt { task }) => commands::prompt(&task.join(" ")),
        Some(Commands::Bench { runs, out, cases }) => {
            commands::bench(&config, runs, &out, &cases).await
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => commands::config_init(),
            ConfigAction::Show => commands::config_show(&config, source.as_deref()),
        },
        Some(Commands::Health) => commands::health(&config).await,
        None => {
            // Default to chat when no command specified
            commands::chat(&config, None, false).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults() {
        assert_eq!(log_filter(false, None).to_string(), "warn");
        assert_eq!(log_filter(true, None).to_string(), "debug");
        assert_eq!(log_filter(true, Some("  ".to_string())).to_string(), "debug");
    }

    #[test]
    fn test_log_filter_respects_rust_log() {
        let filter = log_filter(false, Some("wayfinder=trace".to_string()));
        assert_eq!(filter.to_string(), "wayfinder=trace");
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from([
            "wayfinder",
            "ask",
            "go",
            "to",
            "hello",
            "--max-actions",
            "4",
            "--yes",
        ]);
        match cli.command {
            Some(Commands::Ask {
                task,
                max_actions,
                yes,
                ..
            }) => {
                assert_eq!(task.join(" "), "go to hello");
                assert_eq!(max_actions, Some(4));
                assert!(yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
