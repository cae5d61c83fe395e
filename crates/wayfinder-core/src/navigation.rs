//! Current location plus back/forward history
//!
//! Locations are opaque strings. The only structure the state relies on is the
//! parent relation supplied by a [`PathFlavor`].

use serde::{Deserialize, Serialize};

/// Path semantics used to compute parents and detect roots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathFlavor {
    /// Drive roots such as `C:\`, `\` separators
    Windows,
    /// Single `/` root, `/` separators
    Unix,
}

impl PathFlavor {
    /// Flavor of the host operating system
    pub fn native() -> Self {
        if cfg!(windows) {
            PathFlavor::Windows
        } else {
            PathFlavor::Unix
        }
    }

    pub fn separator(self) -> char {
        match self {
            PathFlavor::Windows => '\\',
            PathFlavor::Unix => '/',
        }
    }

    pub fn is_root(self, location: &str) -> bool {
        match self {
            PathFlavor::Windows => is_windows_root(split_verbatim(location).1),
            PathFlavor::Unix => location == "/",
        }
    }

    /// Parent of `location`; a root (or a bare name) is its own parent
    pub fn parent(self, location: &str) -> String {
        if self.is_root(location) {
            return location.to_string();
        }

        let sep = self.separator();
        let (prefix, path) = match self {
            PathFlavor::Windows => split_verbatim(location),
            PathFlavor::Unix => ("", location),
        };
        let trimmed = path.trim_end_matches(sep);
        let Some(idx) = trimmed.rfind(sep) else {
            return location.to_string();
        };

        let head = &trimmed[..idx];
        let parent = match self {
            PathFlavor::Windows if head.ends_with(':') => format!("{}\\", head),
            PathFlavor::Windows if head.is_empty() => "\\".to_string(),
            PathFlavor::Unix if head.is_empty() => "/".to_string(),
            _ => head.to_string(),
        };
        format!("{}{}", prefix, parent)
    }

    pub fn join(self, base: &str, name: &str) -> String {
        let sep = self.separator();
        format!("{}{}{}", base.trim_end_matches(sep), sep, name)
    }

    /// Last component of `location`
    pub fn file_name(self, location: &str) -> &str {
        let sep = self.separator();
        let trimmed = location.trim_end_matches(sep);
        trimmed.rsplit(sep).next().unwrap_or(trimmed)
    }
}

/// Extended-length prefix produced by `canonicalize` on Windows
const VERBATIM_PREFIX: &str = r"\\?\";

/// Split `\\?\C:\dir` into the verbatim prefix and the plain path
fn split_verbatim(location: &str) -> (&str, &str) {
    match location.strip_prefix(VERBATIM_PREFIX) {
        Some(rest) => (VERBATIM_PREFIX, rest),
        None => ("", location),
    }
}

/// `\`, a drive root like `C:\`, or an empty remainder after the verbatim prefix
fn is_windows_root(path: &str) -> bool {
    path.is_empty()
        || path == "\\"
        || (path.ends_with(":\\") && !path[..path.len() - 2].contains('\\'))
}

/// Navigation state: the current location and two history stacks.
///
/// `backward.len() + forward.len()` never exceeds `history_limit`. Back and
/// forward only move entries between the stacks, so only [`navigate_to`]
/// ever has to drop (the oldest backward entry), and `go_back` followed by
/// `go_forward` always restores both stacks exactly.
///
/// [`navigate_to`]: NavigationState::navigate_to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    current: String,
    backward: Vec<String>,
    forward: Vec<String>,
    history_limit: usize,
}

impl NavigationState {
    pub fn new(start: impl Into<String>, history_limit: usize) -> Self {
        Self {
            current: start.into(),
            backward: Vec::new(),
            forward: Vec::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Previously visited locations, most recent last
    pub fn backward(&self) -> &[String] {
        &self.backward
    }

    /// Locations undone by `go_back`, most recent last
    pub fn forward(&self) -> &[String] {
        &self.forward
    }

    pub fn can_go_back(&self) -> bool {
        !self.backward.is_empty()
    }

    /// Move to `location`. Returns false (and changes nothing) when already there.
    pub fn navigate_to(&mut self, location: impl Into<String>) -> bool {
        let location = location.into();
        if location == self.current {
            return false;
        }

        let previous = std::mem::replace(&mut self.current, location);
        self.backward.push(previous);
        self.forward.clear();
        if self.backward.len() > self.history_limit {
            self.backward.remove(0);
        }
        true
    }

    pub fn go_back(&mut self) -> bool {
        match self.backward.pop() {
            Some(previous) => {
                let left = std::mem::replace(&mut self.current, previous);
                self.forward.push(left);
                true
            }
            None => false,
        }
    }

    pub fn go_forward(&mut self) -> bool {
        match self.forward.pop() {
            Some(next) => {
                let left = std::mem::replace(&mut self.current, next);
                self.backward.push(left);
                true
            }
            None => false,
        }
    }

    /// Navigate to the parent of the current location; fails at a root
    pub fn go_up(&mut self, flavor: PathFlavor) -> bool {
        let parent = flavor.parent(&self.current);
        if parent == self.current {
            return false;
        }
        self.navigate_to(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visited(state: &mut NavigationState, paths: &[&str]) {
        for p in paths {
            state.navigate_to(*p);
        }
    }

    #[test]
    fn test_windows_parent() {
        let w = PathFlavor::Windows;
        assert_eq!(w.parent("C:\\woop\\bla"), "C:\\woop");
        assert_eq!(w.parent("C:\\hello"), "C:\\");
        assert_eq!(w.parent("C:\\hello\\"), "C:\\");
        assert_eq!(w.parent("C:\\"), "C:\\");
        assert!(w.is_root("D:\\"));
        assert!(!w.is_root("C:\\hello"));
    }

    #[test]
    fn test_windows_verbatim_paths() {
        let w = PathFlavor::Windows;
        assert!(w.is_root(r"\\?\C:\"));
        assert_eq!(w.parent(r"\\?\C:\"), r"\\?\C:\");
        assert_eq!(w.parent(r"\\?\C:\Users"), r"\\?\C:\");
        assert_eq!(w.parent(r"\\?\C:\Users\ada"), r"\\?\C:\Users");
        assert!(!w.is_root(r"\\?\C:\Users"));
    }

    #[test]
    fn test_go_up_at_verbatim_drive_root_fails() {
        let mut state = NavigationState::new(r"\\?\C:\Users", 10);
        assert!(state.go_up(PathFlavor::Windows));
        assert_eq!(state.current(), r"\\?\C:\");

        assert!(!state.go_up(PathFlavor::Windows));
        assert_eq!(state.current(), r"\\?\C:\");
        assert_eq!(state.backward(), [r"\\?\C:\Users"]);
    }

    #[test]
    fn test_unix_parent() {
        let u = PathFlavor::Unix;
        assert_eq!(u.parent("/home/user"), "/home");
        assert_eq!(u.parent("/home"), "/");
        assert_eq!(u.parent("/home/user/"), "/home");
        assert_eq!(u.parent("/"), "/");
        assert!(u.is_root("/"));
    }

    #[test]
    fn test_join_and_file_name() {
        assert_eq!(PathFlavor::Windows.join("C:\\", "hello"), "C:\\hello");
        assert_eq!(PathFlavor::Windows.join("C:\\hello", "world.txt"), "C:\\hello\\world.txt");
        assert_eq!(PathFlavor::Unix.join("/", "tmp"), "/tmp");
        assert_eq!(PathFlavor::Windows.file_name("C:\\applications\\f.exe"), "f.exe");
        assert_eq!(PathFlavor::Unix.file_name("/usr/bin/ls"), "ls");
    }

    #[test]
    fn test_navigate_to_pushes_and_clears_forward() {
        let mut state = NavigationState::new("C:\\", 100);
        visited(&mut state, &["C:\\a", "C:\\b"]);
        assert!(state.go_back());
        assert_eq!(state.forward(), ["C:\\b"]);

        assert!(state.navigate_to("C:\\c"));
        assert!(state.forward().is_empty());
        assert_eq!(state.backward(), ["C:\\", "C:\\a"]);
        assert_eq!(state.current(), "C:\\c");
    }

    #[test]
    fn test_navigate_to_current_is_noop() {
        let mut state = NavigationState::new("C:\\", 100);
        visited(&mut state, &["C:\\a", "C:\\b"]);
        state.go_back();
        let before = state.clone();

        assert!(!state.navigate_to("C:\\a"));
        assert_eq!(state, before);
    }

    #[test]
    fn test_back_then_forward_round_trip() {
        let mut state = NavigationState::new("/", 100);
        visited(&mut state, &["/a", "/a/b", "/c", "/d"]);
        state.go_back();
        state.go_back();

        let before = state.clone();
        assert!(state.go_back());
        assert!(state.go_forward());
        assert_eq!(state, before);
    }

    #[test]
    fn test_round_trip_at_history_limit() {
        let mut state = NavigationState::new("/", 3);
        visited(&mut state, &["/a", "/b", "/c", "/d", "/e"]);
        assert_eq!(state.backward(), ["/b", "/c", "/d"]);

        state.go_back();
        state.go_back();
        state.go_back();
        assert!(!state.can_go_back());
        assert_eq!(state.forward().len(), 3);

        let before = state.clone();
        assert!(state.go_forward());
        assert!(state.go_back());
        assert_eq!(state, before);
    }

    #[test]
    fn test_back_and_forward_fail_on_empty_stacks() {
        let mut state = NavigationState::new("/", 10);
        assert!(!state.go_back());
        assert!(!state.go_forward());
        assert_eq!(state.current(), "/");
    }

    #[test]
    fn test_go_up_records_history() {
        let mut state = NavigationState::new("C:\\woop\\bla", 10);
        assert!(state.go_up(PathFlavor::Windows));
        assert_eq!(state.current(), "C:\\woop");
        assert!(state.go_back());
        assert_eq!(state.current(), "C:\\woop\\bla");
    }

    #[test]
    fn test_go_up_at_root_fails() {
        let mut state = NavigationState::new("C:\\", 10);
        assert!(!state.go_up(PathFlavor::Windows));
        assert_eq!(state.current(), "C:\\");
        assert!(!state.can_go_back());

        let mut state = NavigationState::new("/", 10);
        assert!(!state.go_up(PathFlavor::Unix));
    }
}
