//! Action grammar: `function_name § argument` lines and `key§ value` blocks
//!
//! Every parser here is total. Lines without a delimiter are skipped, and the
//! only failure surfaced is "no action found", which the controller turns
//! into corrective feedback.

use std::collections::BTreeMap;
use thiserror::Error;

/// Field delimiter
pub const DELIMITER: char = '§';

/// Observation fed back when a reply carries no usable action
pub const CORRECTIVE_FEEDBACK: &str = "You did not provide an action, please try again. \
Remember to answer with one Thought line and one Action line, formatted as \
`Action: function_name § argument`, or as a block with `function§ function_name` \
on its own line followed by `argument_name§ value` lines.";

/// Key that names the function in block form
const FUNCTION_KEY: &str = "function";
/// Key holding the single positional argument of line form
const POSITIONAL_KEY: &str = "argument";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("reply contains no action")]
    NoAction,
    #[error("action block has no function line")]
    MissingFunction,
}

/// A parsed `{name, arguments}` pair
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedAction {
    pub name: String,
    pub arguments: BTreeMap<String, String>,
}

impl ParsedAction {
    /// Build from a block mapping; requires a non-empty `function` entry
    pub fn from_block(mut map: BTreeMap<String, String>) -> Result<Self, GrammarError> {
        let name = map
            .remove(FUNCTION_KEY)
            .filter(|f| !f.is_empty())
            .ok_or(GrammarError::MissingFunction)?;
        Ok(Self { name, arguments: map })
    }

    /// First non-empty value among `keys`
    pub fn named(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.arguments.get(*k))
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }

    /// Named argument, falling back to the positional one, else empty
    pub fn argument(&self, keys: &[&str]) -> String {
        self.named(keys)
            .or_else(|| self.named(&[POSITIONAL_KEY]))
            .unwrap_or_default()
            .to_string()
    }

    /// Render back into the one-line form, for the scratchpad
    pub fn to_line(&self) -> String {
        let args: Vec<&str> = self
            .arguments
            .values()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .collect();
        if args.is_empty() {
            self.name.clone()
        } else {
            format!("{} {} {}", self.name, DELIMITER, args.join(" "))
        }
    }
}

/// Thought and action lines pulled out of a reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplyParts {
    pub thought: String,
    pub action: String,
}

/// A reply resolved to one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub thought: String,
    /// Action text as recorded in the scratchpad
    pub action_text: String,
    pub action: ParsedAction,
}

fn strip_backticks(text: &str) -> String {
    text.replace('`', "")
}

/// Parse a single action line. Never fails; an empty line gives an empty name.
pub fn parse_action_line(text: &str) -> ParsedAction {
    let cleaned = strip_backticks(text);
    let line = cleaned
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    match line.split_once(DELIMITER) {
        Some((name, arg)) => {
            let mut arguments = BTreeMap::new();
            let arg = arg.trim();
            if !arg.is_empty() {
                arguments.insert(POSITIONAL_KEY.to_string(), arg.to_string());
            }
            ParsedAction {
                name: name.trim().to_string(),
                arguments,
            }
        }
        None => ParsedAction {
            name: line.to_string(),
            arguments: BTreeMap::new(),
        },
    }
}

/// Collect every `key§ value` line; lines without the delimiter are skipped
pub fn parse_block_map(text: &str) -> BTreeMap<String, String> {
    let cleaned = strip_backticks(text);
    let mut map = BTreeMap::new();
    for line in cleaned.lines() {
        let Some((key, value)) = line.split_once(DELIMITER) else {
            continue;
        };
        // `Action: function§ x` keeps only `function`
        let key = key.rsplit(':').next().unwrap_or(key).trim();
        if key.is_empty() {
            continue;
        }
        map.entry(key.to_string())
            .or_insert_with(|| value.trim().to_string());
    }
    map
}

/// Parse a multi-line block into an action
pub fn parse_action_block(text: &str) -> Result<ParsedAction, GrammarError> {
    ParsedAction::from_block(parse_block_map(text))
}

/// Text after the label of a `Thought ...:` / `Action ...:` line
fn labelled_text<'a>(line: &'a str, label: &str) -> &'a str {
    match line.split_once(':') {
        Some((_, rest)) => rest.trim(),
        None => line[label.len()..].trim(),
    }
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Pull the first thought line and the first action line out of a reply
pub fn parse_reply(reply: &str) -> ReplyParts {
    let mut parts = ReplyParts::default();
    let mut seen_thought = false;
    let mut seen_action = false;

    for line in reply.lines().map(str::trim) {
        if !seen_thought && starts_with_ignore_case(line, "thought") {
            parts.thought = labelled_text(line, "thought").to_string();
            seen_thought = true;
        } else if !seen_action && starts_with_ignore_case(line, "action") {
            parts.action = strip_backticks(labelled_text(line, "action")).trim().to_string();
            seen_action = true;
        }
    }
    parts
}

/// Resolve a whole reply to an action: the `Action:` line if present, else a block
pub fn resolve(reply: &str) -> Result<Resolved, GrammarError> {
    let parts = parse_reply(reply);

    if !parts.action.is_empty() {
        let parsed = parse_action_line(&parts.action);
        // `Action: function§ name` followed by argument lines
        if parsed.name == FUNCTION_KEY {
            let action = parse_action_block(reply)?;
            return Ok(Resolved {
                thought: parts.thought,
                action_text: action.to_line(),
                action,
            });
        }
        if !parsed.name.is_empty() {
            return Ok(Resolved {
                thought: parts.thought,
                action_text: parts.action,
                action: parsed,
            });
        }
    }

    match parse_action_block(reply) {
        Ok(action) => Ok(Resolved {
            thought: parts.thought,
            action_text: action.to_line(),
            action,
        }),
        Err(GrammarError::MissingFunction) => Err(GrammarError::NoAction),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_line_unary() {
        let parsed = parse_action_line("change_directory § C:\\hello");
        assert_eq!(parsed.name, "change_directory");
        assert_eq!(parsed.argument(&["folder_path"]), "C:\\hello");
    }

    #[test]
    fn test_parse_action_line_splits_on_first_delimiter() {
        let parsed = parse_action_line("answer § use § carefully");
        assert_eq!(parsed.name, "answer");
        assert_eq!(parsed.argument(&[]), "use § carefully");
    }

    #[test]
    fn test_parse_action_line_without_delimiter() {
        let parsed = parse_action_line("  go_up  ");
        assert_eq!(parsed.name, "go_up");
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn test_parse_action_line_strips_backticks() {
        let parsed = parse_action_line("`find_directory § hello`");
        assert_eq!(parsed.name, "find_directory");
        assert_eq!(parsed.argument(&[]), "hello");
    }

    #[test]
    fn test_parse_block() {
        let block = "Sure, here goes\nfunction§ find_directory\nsearch_value§ documents\nnoise line";
        let parsed = parse_action_block(block).unwrap();
        assert_eq!(parsed.name, "find_directory");
        assert_eq!(parsed.named(&["search_value"]), Some("documents"));
    }

    #[test]
    fn test_parse_block_without_function() {
        assert_eq!(
            parse_action_block("search_value§ documents"),
            Err(GrammarError::MissingFunction)
        );
        assert_eq!(parse_action_block("function§   "), Err(GrammarError::MissingFunction));
    }

    #[test]
    fn test_parsers_are_total() {
        let inputs = [
            "",
            "§",
            "§§§",
            "\n\n\n",
            "function§",
            "Action:",
            "action",
            "Thought",
            "ÄÖÜ § ß",
            "``````",
            "a§b\nc§d§e\n§f",
        ];
        for input in inputs {
            let _ = parse_action_line(input);
            let _ = parse_block_map(input);
            let _ = parse_action_block(input);
            let _ = parse_reply(input);
            let _ = resolve(input);
        }
        assert_eq!(parse_action_line("").name, "");
        assert!(parse_block_map("no delimiter here").is_empty());
    }

    #[test]
    fn test_parse_reply() {
        let reply = "Thought 2: I found it.\nAction 2: `change_directory § C:\\hello`\nAction 3: go_up";
        let parts = parse_reply(reply);
        assert_eq!(parts.thought, "I found it.");
        assert_eq!(parts.action, "change_directory § C:\\hello");
    }

    #[test]
    fn test_parse_reply_case_insensitive_and_without_colon() {
        let parts = parse_reply("THOUGHT: up we go\naction go_up");
        assert_eq!(parts.thought, "up we go");
        assert_eq!(parts.action, "go_up");
    }

    #[test]
    fn test_resolve_prefers_action_line() {
        let resolved = resolve("Thought: search\nAction: find_directory § hello").unwrap();
        assert_eq!(resolved.thought, "search");
        assert_eq!(resolved.action_text, "find_directory § hello");
        assert_eq!(resolved.action.name, "find_directory");
    }

    #[test]
    fn test_resolve_falls_back_to_block() {
        let resolved = resolve("function§ answer\nresponse§ all done").unwrap();
        assert_eq!(resolved.action.name, "answer");
        assert_eq!(resolved.action.named(&["response"]), Some("all done"));
        assert_eq!(resolved.action_text, "answer § all done");
    }

    #[test]
    fn test_resolve_action_line_opening_a_block() {
        let reply = "Thought: look\nAction: function§ find_directory\nsearch_value§ music";
        let resolved = resolve(reply).unwrap();
        assert_eq!(resolved.action.name, "find_directory");
        assert_eq!(resolved.action.named(&["search_value"]), Some("music"));
    }

    #[test]
    fn test_resolve_without_action() {
        assert_eq!(resolve(""), Err(GrammarError::NoAction));
        assert_eq!(resolve("Thought: hmm, not sure"), Err(GrammarError::NoAction));
        assert_eq!(resolve("Action: ``"), Err(GrammarError::NoAction));
    }
}
