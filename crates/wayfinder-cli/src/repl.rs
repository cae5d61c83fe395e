//! Interactive session
//!
//! Each input line is a task. The navigation state carries over from one task
//! to the next; the scratchpad does not.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use std::path::PathBuf;
use tracing::warn;

use crate::agent::ReactController;
use crate::capabilities::Computer;
use crate::computer::LocalComputer;
use crate::progress::Activity;

// ANSI colors
const GREEN: &str = "\x1b[92m";
const BLUE: &str = "\x1b[94m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// A parsed `/command`
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlashCommand {
    Help,
    Quit,
    Pwd,
    History,
    Scratchpad,
    Prompt,
    Unknown(String),
}

fn parse_slash(input: &str) -> SlashCommand {
    let cmd = input
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match cmd.as_str() {
        "/help" | "/h" | "/?" => SlashCommand::Help,
        "/exit" | "/quit" | "/q" => SlashCommand::Quit,
        "/pwd" => SlashCommand::Pwd,
        "/history" | "/hist" => SlashCommand::History,
        "/scratchpad" | "/pad" => SlashCommand::Scratchpad,
        "/prompt" => SlashCommand::Prompt,
        _ => SlashCommand::Unknown(cmd),
    }
}

fn history_path() -> Option<PathBuf> {
    let dir = dirs::data_dir()?.join("wayfinder");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join("history.txt"))
}

/// Run the interactive session
pub async fn run(mut agent: ReactController<LocalComputer>, activity: Activity) -> Result<()> {
    let history = history_path();
    let mut rl: Editor<(), DefaultHistory> = DefaultEditor::new()?;
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    print_welcome(&agent);

    loop {
        let prompt = format!("{}wayfinder>{} ", CYAN, RESET);

        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line.starts_with('/') {
                    if handle_slash_command(&agent, parse_slash(line)) {
                        break;
                    }
                    continue;
                }

                run_task(&mut agent, &activity, line).await;
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}^C{}", DIM, RESET);
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}Goodbye!{}", DIM, RESET);
                break;
            }
            Err(e) => {
                eprintln!("{}Error:{} {}", YELLOW, RESET, e);
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
    Ok(())
}

async fn run_task(agent: &mut ReactController<LocalComputer>, activity: &Activity, task: &str) {
    // Verbose mode echoes every step instead
    activity.start("Working...", agent.config().verbose);
    let result = agent.run_task(task).await;
    activity.finish();

    match result {
        Ok(report) => {
            let color = if report.answered() { GREEN } else { YELLOW };
            println!("{}{}{}", color, report.message(), RESET);
            println!(
                "{}[{} step(s), now in {}]{}",
                DIM,
                report.steps,
                agent.computer().navigation().current(),
                RESET
            );
        }
        Err(e) => {
            warn!(error = %e, "Task aborted");
            eprintln!("{}Error:{} {:#}", YELLOW, RESET, e);
        }
    }
}

/// Returns true when the session should end
fn handle_slash_command(agent: &ReactController<LocalComputer>, command: SlashCommand) -> bool {
    match command {
        SlashCommand::Help => print_help(),
        SlashCommand::Quit => {
            println!("{}Goodbye!{}", DIM, RESET);
            return true;
        }
        SlashCommand::Pwd => println!("{}", agent.computer().navigation().current()),
        SlashCommand::History => {
            let nav = agent.computer().navigation();
            println!("{}Back:{}", BOLD, RESET);
            for loc in nav.backward().iter().rev() {
                println!("  {}", loc);
            }
            println!("{}Current:{} {}", BOLD, RESET, nav.current());
            println!("{}Forward:{}", BOLD, RESET);
            for loc in nav.forward().iter().rev() {
                println!("  {}", loc);
            }
        }
        SlashCommand::Scratchpad => {
            let text = agent.scratchpad_text();
            if text.is_empty() {
                println!("No task run yet");
            } else {
                println!("{}", text.trim_start());
            }
        }
        SlashCommand::Prompt => match agent.initial_prompt() {
            Some(prompt) => println!("{}", prompt),
            None => println!("No prompt sent yet"),
        },
        SlashCommand::Unknown(cmd) => {
            println!("{}Unknown command:{} {}", YELLOW, RESET, cmd);
            println!("Type {}/help{} for available commands", CYAN, RESET);
        }
    }
    false
}

fn print_welcome<C: Computer>(agent: &ReactController<C>) {
    println!();
    println!("{}wayfinder{} - tell me where to go", BOLD, RESET);
    println!(
        "{}Starting in:{} {}{}{}",
        DIM,
        RESET,
        BLUE,
        agent.computer().navigation().current(),
        RESET
    );
    println!("Type {}/help{} for commands", CYAN, RESET);
    println!();
}

fn print_help() {
    println!();
    println!("{}Commands:{}", BOLD, RESET);
    println!("  {}/help{}, /h, /?      Show this help", CYAN, RESET);
    println!("  {}/pwd{}              Show the current directory", CYAN, RESET);
    println!("  {}/history{}          Show back/forward history", CYAN, RESET);
    println!("  {}/scratchpad{}       Show the last task's transcript", CYAN, RESET);
    println!("  {}/prompt{}           Show the first prompt sent", CYAN, RESET);
    println!("  {}/quit{}, /q         Exit", CYAN, RESET);
    println!();
    println!("Anything else is run as a task.");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash() {
        assert_eq!(parse_slash("/help"), SlashCommand::Help);
        assert_eq!(parse_slash("/Q"), SlashCommand::Quit);
        assert_eq!(parse_slash("/pwd now"), SlashCommand::Pwd);
        assert_eq!(parse_slash("/pad"), SlashCommand::Scratchpad);
        assert_eq!(parse_slash("/hist"), SlashCommand::History);
        assert_eq!(parse_slash("/prompt"), SlashCommand::Prompt);
        assert_eq!(
            parse_slash("/teleport x"),
            SlashCommand::Unknown("/teleport".to_string())
        );
    }
}
