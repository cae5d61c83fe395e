//! Configuration management for wayfinder.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "wayfinder.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub programs: ProgramConfig,
}

/// Completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL including the API version, e.g. `https://api.openai.com/v1`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_endpoint_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Step ceiling for a single task
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
    /// Combined bound on back/forward history entries
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Directories `find_directory` walks; empty means the home directory
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_results")]
    pub max_results_per_root: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    #[serde(default = "default_program_timeout")]
    pub timeout_secs: u64,
    /// Ask on the terminal before running a program
    #[serde(default = "default_true")]
    pub confirm: bool,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_endpoint_timeout() -> u64 {
    60
}

fn default_max_actions() -> usize {
    10
}

fn default_history_limit() -> usize {
    100
}

fn default_max_depth() -> usize {
    6
}

fn default_max_results() -> usize {
    10
}

fn default_program_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_endpoint_timeout(),
            temperature: None,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            history_limit: default_history_limit(),
            verbose: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_depth: default_max_depth(),
            max_results_per_root: default_max_results(),
        }
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_program_timeout(),
            confirm: true,
        }
    }
}

impl Config {
    /// Resolve the configuration: `explicit` if given, else the first
    /// wayfinder.toml found, else the built-in defaults. Environment overrides
    /// are applied last through `lookup`. Also returns the file read, if any.
    pub fn load(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Option<PathBuf>)> {
        let source = explicit.map(Path::to_path_buf).or_else(Self::find_config_path);
        let mut config = match &source {
            Some(path) => Self::load_from(path)?,
            None => Self::default_minimal(),
        };
        config.apply_overrides(lookup);
        Ok((config, source))
    }

    /// Built-in defaults for when no configuration file exists
    pub fn default_minimal() -> Self {
        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find wayfinder.toml in the current directory or its parents, then the user config dir
    pub fn find_config_path() -> Option<PathBuf> {
        if let Ok(mut current) = std::env::current_dir() {
            for _ in 0..10 {
                let candidate = current.join(CONFIG_FILE);
                if candidate.exists() {
                    return Some(candidate);
                }
                if !current.pop() {
                    break;
                }
            }
        }

        Self::user_config_path().filter(|p| p.exists())
    }

    /// `<config dir>/wayfinder/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wayfinder").join("config.toml"))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let key = lookup("WAYFINDER_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.endpoint.api_key = Some(key);
        }
        if let Some(url) = lookup("WAYFINDER_BASE_URL").filter(|u| !u.is_empty()) {
            self.endpoint.base_url = url;
        }
        if let Some(model) = lookup("WAYFINDER_MODEL").filter(|m| !m.is_empty()) {
            self.endpoint.model = model;
        }
    }

    /// Search roots, falling back to the home directory
    pub fn search_roots(&self) -> Vec<PathBuf> {
        if !self.search.roots.is_empty() {
            return self.search.roots.clone();
        }
        dirs::home_dir().into_iter().collect()
    }

    /// Render for display with the API key masked
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if let Some(key) = shown.endpoint.api_key.as_mut() {
            *key = mask_key(key);
        }
        toml::to_string_pretty(&shown).context("Failed to serialize configuration")
    }

    /// Write a commented default configuration file to the user config dir
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let default_config = r#"# wayfinder configuration
# Also read from ./wayfinder.toml (searched upwards from the working directory)

[endpoint]
# OpenAI-compatible base URL, including the version segment
base_url = "https://api.openai.com/v1"
model = "gpt-3.5-turbo"
# api_key = "sk-..."   # or set WAYFINDER_API_KEY / OPENAI_API_KEY
timeout_secs = 60
# temperature = 0.2

[agent]
# Maximum thought/action steps per task
max_actions = 10
# Combined back/forward history entries kept
history_limit = 100
verbose = false

[search]
# Directories searched by find_directory (default: home directory)
# roots = ["/home/me", "/mnt/data"]
max_depth = 6
max_results_per_root = 10

[programs]
timeout_secs = 30
# Ask before running a program
confirm = true
"#;

        fs::write(&path, default_config)?;

        Ok(path)
    }
}

/// Keys shorter than this are hidden completely
const MIN_REVEAL_LEN: usize = 12;

fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len < MIN_REVEAL_LEN {
        return "********".to_string();
    }
    let tail: String = key.chars().skip(len - 4).collect();
    format!("****{}", tail)
}
