//! In-memory computer with Windows-style paths
//!
//! Used by the benchmark scenarios and the controller tests. Programs are
//! plain functions keyed by file stem, so `C:\applications\shutdown.exe`
//! runs whatever is registered under `shutdown`.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use wayfinder_core::{NavigationState, PathFlavor};

use crate::capabilities::{Computer, DirectoryMatch};

pub const ROOT: &str = "C:\\";

const MAX_MATCHES: usize = 10;
const HISTORY_LIMIT: usize = 100;

/// A program on the simulated computer
pub type Program = fn(&mut SimulatedComputer, &BTreeMap<String, String>) -> String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub date_modified: String,
}

#[derive(Clone)]
pub struct SimulatedComputer {
    entries: BTreeMap<String, Entry>,
    programs: HashMap<String, Program>,
    navigation: NavigationState,
    is_on: bool,
}

impl std::fmt::Debug for SimulatedComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedComputer")
            .field("entries", &self.entries.len())
            .field("programs", &self.programs.len())
            .field("current", &self.navigation.current())
            .field("is_on", &self.is_on)
            .finish()
    }
}

impl Default for SimulatedComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedComputer {
    /// A powered-on computer holding only `C:\`
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            ROOT.to_string(),
            Entry {
                kind: EntryKind::Folder,
                date_modified: "2024-02-20".to_string(),
            },
        );

        Self {
            entries,
            programs: HashMap::new(),
            navigation: NavigationState::new(ROOT, HISTORY_LIMIT),
            is_on: true,
        }
    }

    pub fn with_folder(mut self, path: &str, date_modified: &str) -> Self {
        self.insert(path, EntryKind::Folder, date_modified);
        self
    }

    pub fn with_file(mut self, path: &str, date_modified: &str) -> Self {
        self.insert(path, EntryKind::File, date_modified);
        self
    }

    /// Register the program run for files whose stem is `stem`
    pub fn with_program(mut self, stem: &str, program: Program) -> Self {
        self.programs.insert(stem.to_string(), program);
        self
    }

    fn insert(&mut self, path: &str, kind: EntryKind, date_modified: &str) {
        self.entries.insert(
            normalize(path),
            Entry {
                kind,
                date_modified: date_modified.to_string(),
            },
        );
    }

    /// Power on, back at `C:\` with empty history
    pub fn reset(&mut self) {
        self.is_on = true;
        self.navigation = NavigationState::new(ROOT, HISTORY_LIMIT);
    }

    pub fn power_off(&mut self) {
        self.is_on = false;
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    fn kind(&self, path: &str) -> Option<EntryKind> {
        self.entries.get(path).map(|e| e.kind)
    }

    fn is_folder(&self, path: &str) -> bool {
        self.kind(path) == Some(EntryKind::Folder)
    }

    fn is_file(&self, path: &str) -> bool {
        self.kind(path) == Some(EntryKind::File)
    }
}

/// Drop trailing separators, except on a drive root
fn normalize(path: &str) -> String {
    let path = path.trim();
    if PathFlavor::Windows.is_root(path) {
        return path.to_string();
    }
    let trimmed = path.trim_end_matches('\\');
    if trimmed.ends_with(':') {
        format!("{}\\", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl Computer for SimulatedComputer {
    fn change_directory(&mut self, path: &str) -> Result<bool> {
        let path = normalize(path);
        if !self.is_folder(&path) {
            return Ok(false);
        }
        self.navigation.navigate_to(path);
        Ok(true)
    }

    fn go_up(&mut self) -> Result<bool> {
        let parent = PathFlavor::Windows.parent(self.navigation.current());
        if !self.is_folder(&parent) {
            return Ok(false);
        }
        Ok(self.navigation.go_up(PathFlavor::Windows))
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
        let current = self.navigation.current();
        Ok(self
            .entries
            .keys()
            .filter(|path| path.as_str() != current)
            .filter(|path| PathFlavor::Windows.parent(path) == current)
            .map(|path| PathFlavor::Windows.file_name(path).to_string())
            .collect())
    }

    fn find_directory(&self, query: &str) -> Result<Vec<DirectoryMatch>> {
        let needle = query.to_lowercase();
        Ok(self
            .entries
            .iter()
            .filter(|(path, entry)| entry.kind == EntryKind::Folder && path.as_str() != ROOT)
            .filter_map(|(path, entry)| {
                let name = PathFlavor::Windows.file_name(path);
                name.to_lowercase().contains(&needle).then(|| DirectoryMatch {
                    name: name.to_string(),
                    path: path.clone(),
                    date_modified: entry.date_modified.clone(),
                })
            })
            .take(MAX_MATCHES)
            .collect())
    }

    async fn run_application(
        &mut self,
        path: &str,
        kwargs: &BTreeMap<String, String>,
    ) -> Result<String> {
        if !self.is_on {
            return Ok("Computer is off.".to_string());
        }

        let requested = normalize(path);
        let relative = PathFlavor::Windows.join(self.navigation.current(), &requested);
        let resolved = if self.is_file(&relative) {
            relative
        } else if self.is_file(&requested) {
            requested
        } else {
            return Ok(format!("{} is not a valid program.", path));
        };

        let stem = PathFlavor::Windows
            .file_name(&resolved)
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();

        match self.programs.get(&stem).copied() {
            Some(program) => Ok(program(self, kwargs)),
            None => Ok(format!("{} is not a valid program.", path)),
        }
    }

    fn navigation(&self) -> &NavigationState {
        &self.navigation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn computer() -> SimulatedComputer {
        SimulatedComputer::new()
            .with_folder("C:\\applications", "2024-02-20")
            .with_folder("C:\\Users\\me\\Applications Data", "2024-03-01")
            .with_file("C:\\applications\\hello_world.exe", "2024-02-20")
            .with_program("hello_world", |_, kwargs| {
                format!(
                    "Hello {}!",
                    kwargs.get("arguments").map(String::as_str).unwrap_or("World")
                )
            })
    }

    #[test]
    fn test_change_directory_requires_folder() {
        let mut c = computer();
        assert!(!c.change_directory("C:\\applications\\hello_world.exe").unwrap());
        assert!(!c.change_directory("C:\\missing").unwrap());
        assert!(c.change_directory("C:\\applications\\").unwrap());
        assert_eq!(c.current_directory().unwrap(), "C:\\applications");
    }

    #[test]
    fn test_change_to_current_succeeds_without_history() {
        let mut c = computer();
        assert!(c.change_directory("C:\\").unwrap());
        assert!(!c.navigation().can_go_back());
    }

    #[test]
    fn test_go_up_needs_existing_parent() {
        let mut c = computer();
        assert!(c.change_directory("C:\\Users\\me\\Applications Data").unwrap());
        // C:\Users\me was never created
        assert!(!c.go_up().unwrap());
        assert_eq!(c.current_directory().unwrap(), "C:\\Users\\me\\Applications Data");

        c.change_directory("C:\\applications").unwrap();
        assert!(c.go_up().unwrap());
        assert!(!c.go_up().unwrap());
    }

    #[test]
    fn test_find_directory_is_case_insensitive() {
        let c = computer();
        let found = c.find_directory("APPLICATIONS").unwrap();
        let paths: Vec<&str> = found.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, ["C:\\Users\\me\\Applications Data", "C:\\applications"]);
        assert!(c.find_directory("C:").unwrap().is_empty());
    }

    #[test]
    fn test_list_directory() {
        let mut c = computer();
        assert_eq!(c.list_directory().unwrap(), ["applications"]);
        c.change_directory("C:\\applications").unwrap();
        assert_eq!(c.list_directory().unwrap(), ["hello_world.exe"]);
    }

    #[tokio::test]
    async fn test_run_application_relative_and_absolute() {
        let mut c = computer();
        let mut kwargs = BTreeMap::new();
        assert_eq!(
            c.run_application("C:\\applications\\hello_world.exe", &kwargs).await.unwrap(),
            "Hello World!"
        );

        c.change_directory("C:\\applications").unwrap();
        kwargs.insert("arguments".to_string(), "Ada".to_string());
        assert_eq!(c.run_application("hello_world.exe", &kwargs).await.unwrap(), "Hello Ada!");

        assert_eq!(
            c.run_application("C:\\applications", &kwargs).await.unwrap(),
            "C:\\applications is not a valid program."
        );
    }

    #[tokio::test]
    async fn test_power_and_reset() {
        let mut c = computer();
        c.change_directory("C:\\applications").unwrap();
        c.power_off();
        assert_eq!(
            c.run_application("hello_world.exe", &BTreeMap::new()).await.unwrap(),
            "Computer is off."
        );

        c.reset();
        assert!(c.is_on());
        assert_eq!(c.current_directory().unwrap(), ROOT);
        assert!(!c.navigation().can_go_back());
    }
}
