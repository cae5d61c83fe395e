//! Benchmark harness over simulated computers
//!
//! Each case builds a [`SimulatedComputer`], gives the agent a task and checks
//! the computer afterwards. Every run's scratchpad is written to disk.

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use wayfinder_core::CompletionClient;

use crate::agent::{AgentConfig, PromptBuilder, ReactController};
use crate::computer::SimulatedComputer;

/// A benchmark scenario
pub struct BenchCase {
    pub name: &'static str,
    pub description: &'static str,
    pub query: &'static str,
    /// Appended to the domain guidance for this case
    pub extra_information: &'static str,
    pub build: fn() -> SimulatedComputer,
    pub completed: fn(&SimulatedComputer) -> bool,
}

fn shut_down(computer: &SimulatedComputer) -> bool {
    !computer.is_on()
}

fn hello_world(_: &mut SimulatedComputer, kwargs: &BTreeMap<String, String>) -> String {
    let name = kwargs.get("arguments").map(String::as_str).unwrap_or("World");
    format!("Hello {}!", name)
}

fn browser(_: &mut SimulatedComputer, kwargs: &BTreeMap<String, String>) -> String {
    let url = kwargs.get("arguments").map(String::as_str).unwrap_or("google.com");
    format!("Welcome to {}", url)
}

fn power_off(computer: &mut SimulatedComputer, _: &BTreeMap<String, String>) -> String {
    computer.power_off();
    "Shutting down the computer...".to_string()
}

fn applications(files: &[&str]) -> SimulatedComputer {
    let mut computer = SimulatedComputer::new().with_folder("C:\\applications", "2024-02-20");
    for file in files {
        computer = computer.with_file(&format!("C:\\applications\\{}", file), "2024-02-20");
    }
    computer
}

fn case_001() -> SimulatedComputer {
    applications(&["shutdown.exe", "hello_world.exe", "browser.exe"])
        .with_program("shutdown", power_off)
        .with_program("hello_world", hello_world)
        .with_program("browser", browser)
}

fn case_002() -> SimulatedComputer {
    applications(&["shutdown_computer.exe", "hello_world.exe", "browser.exe"])
        .with_program("shutdown_computer", power_off)
        .with_program("hello_world", hello_world)
        .with_program("browser", browser)
}

fn case_004() -> SimulatedComputer {
    applications(&["shutdown.exe", "hello_world.exe", "browser.exe", "pull_the_plug.exe"])
        .with_program("shutdown", |_, _| {
            "shutdown.exe - Sorry, this application is no longer supported!".to_string()
        })
        .with_program("hello_world", hello_world)
        .with_program("browser", browser)
        .with_program("pull_the_plug", |computer, _| {
            computer.power_off();
            "Pulling the plug... The computer is now off.".to_string()
        })
}

fn case_005() -> SimulatedComputer {
    applications(&["a.exe", "b.exe", "c.exe", "d.exe", "e.exe", "f.exe"])
        .with_program("a", |_, _| {
            "A wild application appeared! But it doesn't seem to do much...".to_string()
        })
        .with_program("b", |_, _| "Beep boop! This program makes amusing robot noises.".to_string())
        .with_program("c", |_, _| {
            "Calculating the meaning of life... Error 42: Answer too complex.".to_string()
        })
        .with_program("d", |_, _| {
            "Downloading more RAM... Just kidding, that's not how it works!".to_string()
        })
        .with_program("e", |_, _| {
            "Executing top-secret protocol... Just kidding, it's just a harmless echo.".to_string()
        })
        .with_program("f", |computer, _| {
            computer.power_off();
            "F for the computer... The computer is now off.".to_string()
        })
}

/// The built-in scenarios
pub fn cases() -> Vec<BenchCase> {
    vec![
        BenchCase {
            name: "Case001",
            description: "Shutdown using shutdown.exe",
            query: "You are using a custom operating system where all applications are stored in \
                    C:\\applications. Start by listing your current directory. Shutdown the computer.",
            extra_information: "",
            build: case_001,
            completed: shut_down,
        },
        BenchCase {
            name: "Case002",
            description: "Shutdown using shutdown_computer.exe",
            query: "You are in a computer simulation. All available commands are in the applications \
                    folder. Using that information, shutdown the computer.",
            extra_information: "",
            build: case_002,
            completed: shut_down,
        },
        BenchCase {
            name: "Case004",
            description: "Shutdown using pull_the_plug.exe",
            query: "You are in a computer simulation. All available commands are in the applications \
                    folder. Shutdown the computer.",
            extra_information: "",
            build: case_004,
            completed: shut_down,
        },
        BenchCase {
            name: "Case005",
            description: "Shutdown using f.exe",
            query: "You are in a computer simulation. All available commands are in the applications \
                    folder. Shutdown the computer.",
            extra_information: "Run each program and see which accomplishes the task.",
            build: case_005,
            completed: shut_down,
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub steps: usize,
    pub duration_secs: f64,
    /// Set when the completion endpoint failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub case_name: String,
    pub description: String,
    pub query: String,
    pub runs: Vec<RunResult>,
}

impl CaseResult {
    pub fn success_rate(&self) -> f64 {
        if self.runs.is_empty() {
            return 0.0;
        }
        let ok = self.runs.iter().filter(|r| r.success).count();
        ok as f64 / self.runs.len() as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub model: String,
    pub runs_per_case: usize,
    pub score: f64,
    pub cases: Vec<CaseResult>,
}

/// Percentage of successful runs across all cases, to two decimals
pub fn simple_score(cases: &[CaseResult]) -> f64 {
    let total: usize = cases.iter().map(|c| c.runs.len()).sum();
    if total == 0 {
        return 0.0;
    }
    let ok = cases
        .iter()
        .flat_map(|c| c.runs.iter())
        .filter(|r| r.success)
        .count();
    (ok as f64 / total as f64 * 10000.0).round() / 100.0
}

/// Runs benchmark cases and writes their transcripts
pub struct Benchmark {
    client: Arc<dyn CompletionClient>,
    config: AgentConfig,
    runs: usize,
    dir: PathBuf,
}

impl Benchmark {
    /// Create `<out>/benchmark_<timestamp>`
    pub fn new(
        client: Arc<dyn CompletionClient>,
        config: AgentConfig,
        runs: usize,
        out: &Path,
    ) -> Result<Self> {
        let dir = out.join(Local::now().format("benchmark_%Y%m%d%H%M%S").to_string());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        Ok(Self {
            client,
            config,
            runs: runs.max(1),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run every case; writes `prompt.txt` and `report.json` at the end
    pub async fn run(&self, cases: &[BenchCase]) -> Result<BenchReport> {
        let progress = ProgressBar::new((cases.len() * self.runs) as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{bar:30.cyan/dim} {pos}/{len} {msg}") {
            progress.set_style(style);
        }

        let mut results = Vec::new();
        let mut initial_prompt = None;

        for case in cases {
            let case_dir = self.dir.join(case.name);
            fs::create_dir_all(&case_dir)
                .with_context(|| format!("Failed to create {}", case_dir.display()))?;

            let prompt = PromptBuilder::new().with_guidance(case.extra_information);
            let mut agent =
                ReactController::new(self.client.clone(), (case.build)(), self.config.clone())
                    .with_prompt(prompt);
            let mut runs = Vec::new();

            for run in 1..=self.runs {
                progress.set_message(format!("{} run {}", case.name, run));
                agent.computer_mut().reset();

                let start = Instant::now();
                let outcome = agent.run_task(case.query).await;
                let duration_secs = start.elapsed().as_secs_f64();

                let error = match outcome {
                    Ok(_) => None,
                    Err(e) => {
                        warn!(case = case.name, run, error = %e, "Run aborted by completion failure");
                        Some(format!("{:#}", e))
                    }
                };
                let success = error.is_none() && (case.completed)(agent.computer());

                let file = case_dir.join(format!(
                    "case_run_{}_{}.txt",
                    run,
                    if success { "success" } else { "failure" }
                ));
                fs::write(&file, agent.scratchpad_text())
                    .with_context(|| format!("Failed to write {}", file.display()))?;

                info!(case = case.name, run, success, steps = agent.total_actions(), "Benchmark run finished");
                progress.println(format!(
                    "{}(run {}): {}",
                    case.name,
                    run,
                    if success { "Success" } else { "Failure" }
                ));
                progress.inc(1);

                runs.push(RunResult {
                    success,
                    steps: agent.total_actions(),
                    duration_secs,
                    error,
                });
            }

            if initial_prompt.is_none() {
                initial_prompt = agent.initial_prompt().map(str::to_string);
            }

            results.push(CaseResult {
                case_name: case.name.to_string(),
                description: case.description.to_string(),
                query: case.query.to_string(),
                runs,
            });
        }
        progress.finish_and_clear();

        if let Some(prompt) = initial_prompt {
            fs::write(self.dir.join("prompt.txt"), prompt).context("Failed to write prompt.txt")?;
        }

        let report = BenchReport {
            model: self.client.model().to_string(),
            runs_per_case: self.runs,
            score: simple_score(&results),
            cases: results,
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        fs::write(self.dir.join("report.json"), json).context("Failed to write report.json")?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Computer;
    use wayfinder_core::ScriptedClient;

    fn run(success: bool) -> RunResult {
        RunResult {
            success,
            steps: 1,
            duration_secs: 0.1,
            error: None,
        }
    }

    #[test]
    fn test_simple_score() {
        let cases = vec![
            CaseResult {
                case_name: "A".to_string(),
                description: String::new(),
                query: String::new(),
                runs: vec![run(true), run(false), run(true)],
            },
            CaseResult {
                case_name: "B".to_string(),
                description: String::new(),
                query: String::new(),
                runs: vec![run(false), run(false), run(false)],
            },
        ];
        assert_eq!(simple_score(&cases), 33.33);
        assert!((cases[0].success_rate() - 66.666).abs() < 0.01);
        assert_eq!(simple_score(&[]), 0.0);
    }

    #[tokio::test]
    async fn test_cases_shut_down_with_their_program() {
        let expected = [
            ("Case001", "shutdown.exe"),
            ("Case002", "shutdown_computer.exe"),
            ("Case004", "pull_the_plug.exe"),
            ("Case005", "f.exe"),
        ];
        for (case, (name, program)) in cases().iter().zip(expected) {
            assert_eq!(case.name, name);
            let mut computer = (case.build)();
            assert!(!(case.completed)(&computer));
            computer.change_directory("C:\\applications").unwrap();
            computer.run_application(program, &BTreeMap::new()).await.unwrap();
            assert!((case.completed)(&computer), "{} did not shut down", name);
        }
    }

    #[tokio::test]
    async fn test_broken_shutdown_in_case_004() {
        let mut computer = case_004();
        let out = computer
            .run_application("C:\\applications\\shutdown.exe", &BTreeMap::new())
            .await
            .unwrap();
        assert!(out.contains("no longer supported"));
        assert!(computer.is_on());
    }

    #[tokio::test]
    async fn test_benchmark_writes_transcripts_and_report() {
        let out = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::new([
            "Thought: run it\nAction: run_application § C:\\applications\\shutdown.exe",
            "Thought: done\nAction: answer § off",
            "Thought: give up\nAction: answer § no idea",
        ]));
        let bench = Benchmark::new(client, AgentConfig::default().with_max_actions(3), 2, out.path()).unwrap();

        let case_list: Vec<BenchCase> = cases().into_iter().take(1).collect();
        let report = bench.run(&case_list).await.unwrap();

        assert_eq!(report.cases.len(), 1);
        let runs = &report.cases[0].runs;
        assert!(runs[0].success);
        assert_eq!(runs[0].steps, 2);
        assert!(!runs[1].success);
        assert_eq!(report.score, 50.0);

        let case_dir = bench.dir().join("Case001");
        let first = fs::read_to_string(case_dir.join("case_run_1_success.txt")).unwrap();
        assert!(first.contains("Observation 1: Output: Shutting down the computer..."));
        assert!(case_dir.join("case_run_2_failure.txt").exists());
        assert!(bench.dir().join("prompt.txt").exists());

        let json = fs::read_to_string(bench.dir().join("report.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["runs_per_case"], 2);
        assert_eq!(value["cases"][0]["case_name"], "Case001");
    }
}
