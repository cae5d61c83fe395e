//! Task spinner shared with code that needs the terminal mid-task
//!
//! The spinner is started and finished around a task by the command that runs
//! it. Anything that prompts on the terminal while the task runs (program
//! confirmation) goes through [`Activity::suspend`] so the redraw does not
//! overwrite the prompt.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Handle to the spinner of the running task, if any. Clones share the spinner.
#[derive(Clone, Default)]
pub struct Activity {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a spinner with `message`; `hidden` keeps it off screen (verbose or JSON output)
    pub fn start(&self, message: &str, hidden: bool) {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    /// Stop and clear the spinner
    pub fn finish(&self) {
        let bar = self.bar.lock().ok().and_then(|mut slot| slot.take());
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    }

    pub fn is_running(&self) -> bool {
        self.bar.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Run `f` with the spinner cleared from the terminal
    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // Cloned out so the lock is not held while `f` waits on stdin
        let bar = self.bar.lock().ok().and_then(|slot| slot.clone());
        match bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }
}
