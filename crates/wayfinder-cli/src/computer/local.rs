//! The real filesystem of this machine

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;
use wayfinder_core::{process, Config, NavigationState, PathFlavor, ProgramRun};

use crate::capabilities::security::ProgramApproval;
use crate::capabilities::{Computer, DirectoryMatch};

/// Filesystem-backed computer. Locations are canonical absolute paths.
pub struct LocalComputer {
    navigation: NavigationState,
    flavor: PathFlavor,
    roots: Vec<PathBuf>,
    max_depth: usize,
    max_results_per_root: usize,
    program_timeout: Duration,
    approval: Box<dyn ProgramApproval>,
}

impl LocalComputer {
    pub fn new(start: &Path, config: &Config, approval: Box<dyn ProgramApproval>) -> Result<Self> {
        let start = fs::canonicalize(start)
            .with_context(|| format!("Start directory {} does not exist", start.display()))?;
        if !start.is_dir() {
            anyhow::bail!("Start location {} is not a directory", start.display());
        }

        Ok(Self {
            navigation: NavigationState::new(display(&start), config.agent.history_limit),
            flavor: PathFlavor::native(),
            roots: config.search_roots(),
            max_depth: config.search.max_depth,
            max_results_per_root: config.search.max_results_per_root,
            program_timeout: Duration::from_secs(config.programs.timeout_secs),
            approval,
        })
    }

    /// Override the roots `find_directory` walks
    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = roots;
        self
    }

    /// Resolve `path` against the current directory
    fn resolve(&self, path: &str) -> PathBuf {
        let path = path.trim().trim_matches('"');
        let expanded = match path.strip_prefix('~') {
            Some(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                None => PathBuf::from(path),
            },
            None => PathBuf::from(path),
        };

        if expanded.is_absolute() {
            expanded
        } else {
            Path::new(self.navigation.current()).join(expanded)
        }
    }

    fn current_path(&self) -> &Path {
        Path::new(self.navigation.current())
    }
}

/// Location string for `path`; drops the `\\?\` prefix `canonicalize` adds to drive paths on Windows
fn display(path: &Path) -> String {
    let text = path.to_string_lossy();
    let drive = text
        .strip_prefix(r"\\?\")
        .filter(|rest| rest.as_bytes().get(1) == Some(&b':'));
    if let Some(rest) = drive {
        return rest.to_string();
    }
    text.into_owned()
}

fn modified_date(meta: &fs::Metadata) -> String {
    meta.modified()
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

#[async_trait]
impl Computer for LocalComputer {
    fn change_directory(&mut self, path: &str) -> Result<bool> {
        let target = self.resolve(path);
        let Ok(target) = fs::canonicalize(&target) else {
            debug!(path, "change_directory: no such path");
            return Ok(false);
        };
        if !target.is_dir() {
            return Ok(false);
        }
        self.navigation.navigate_to(display(&target));
        Ok(true)
    }

    fn go_up(&mut self) -> Result<bool> {
        Ok(self.navigation.go_up(self.flavor))
    }

    fn go_back(&mut self) -> Result<bool> {
        Ok(self.navigation.go_back())
    }

    fn go_forward(&mut self) -> Result<bool> {
        Ok(self.navigation.go_forward())
    }

    fn current_directory(&self) -> Result<String> {
        Ok(self.navigation.current().to_string())
    }

    fn list_directory(&self) -> Result<Vec<String>> {
        let dir = self.current_path();
        let mut names = fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn find_directory(&self, query: &str) -> Result<Vec<DirectoryMatch>> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();

        for root in &self.roots {
            let found = WalkDir::new(root)
                .min_depth(1)
                .max_depth(self.max_depth)
                .into_iter()
                .filter_entry(|e| !is_hidden(e))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir())
                .filter(|e| e.file_name().to_string_lossy().to_lowercase().contains(&needle))
                .take(self.max_results_per_root)
                .map(|e| DirectoryMatch {
                    name: e.file_name().to_string_lossy().into_owned(),
                    path: display(e.path()),
                    date_modified: e
                        .metadata()
                        .map(|m| modified_date(&m))
                        .unwrap_or_else(|_| "unknown".to_string()),
                });
            matches.extend(found);
        }

        debug!(query, roots = self.roots.len(), found = matches.len(), "find_directory");
        Ok(matches)
    }

    async fn run_application(
        &mut self,
        path: &str,
        kwargs: &BTreeMap<String, String>,
    ) -> Result<String> {
        let program = self.resolve(path);
        let args: Vec<String> = kwargs
            .get("arguments")
            .map(|a| a.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        if !process::is_executable(&program) {
            return Ok(format!("{} is not a valid program.", path));
        }

        if !self.approval.approve(&program, &args) {
            info!(program = %program.display(), "Program run declined");
            return Ok(format!("The user declined to run {}.", path));
        }

        info!(program = %program.display(), args = args.len(), "Running program");
        let run = process::run_program(&program, &args, self.program_timeout).await?;
        Ok(match run {
            ProgramRun::Completed { code, output } if output.is_empty() => match code {
                Some(code) => format!("(no output, exit code {})", code),
                None => "(no output, terminated by signal)".to_string(),
            },
            ProgramRun::Completed { output, .. } => output,
            ProgramRun::TimedOut { output } => format!(
                "{}\n(stopped after the {}s timeout)",
                output,
                self.program_timeout.as_secs()
            ),
            ProgramRun::NotRunnable => format!("{} is not a valid program.", path),
        })
    }

    fn navigation(&self) -> &NavigationState {
        &self.navigation
    }
}
