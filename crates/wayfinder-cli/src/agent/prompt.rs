//! Prompt assembly
//!
//! The prompt is built from immutable segments: instructions, the capability
//! list, domain guidance and worked examples. Only the task, the scratchpad
//! and the step cue change between requests.

use crate::capabilities::describe_capabilities;

const INSTRUCTIONS: &str = "SYSTEM PROMPT: You are an AI assistant that excels at solving problems \
step-by-step using available functions. Your task is to analyze the current situation and determine \
the next best action to take.

Given the user's task, you will provide a single Thought and Action. After each Action, you will \
receive an Observation, which you should use to inform your next step.";

const DOMAIN_GUIDANCE: &str = "You are able to perform various actions on the user's computer.
You can search for directories, change the current directory, go up and down directories,
list the contents of a directory, run applications, and provide a final answer to the user's task.";

const EXAMPLES: &str = r#"### Example 1: Navigate to "hello" folder

Task: Go to the folder "hello"
Thought 1: In order to go to the folder "hello", I need to first check if it exists in the current directory.
Action 1: list_directory
Observation 1: Current directory: C:\current_user
Contents of the current directory:
- image
- documents
- downloads
Thought 2: The folder "hello" is not in the current directory, I therefore need to search for it, and then change the current directory to it.
Action 2: find_directory § hello
Observation 2: Found 1 directories containing 'hello':
- hello (Path: C:\hello, Modified: 2024-02-20)
Thought 3: I have found the folder "hello", now I need to change the current directory to it.
Action 3: change_directory § C:\hello
Observation 3: Successfully changed the current directory to C:\hello
Thought 4: I have successfully reached the folder "hello", I can now report this to the user.
Action 4: answer § I have changed the current directory to the folder "hello"

### Example 2: Navigate Up Directory

Task: Go up one directory
Thought 1: In order to go up one directory, I need to use the go_up function.
Action 1: go_up
Observation 1: Successfully moved up one directory level, current directory: C:\.
Thought 2: I have successfully gone up one directory level, I can now report this to the user.
Action 2: answer § I have gone up one directory to C:\.

### Example 3: Run a program

Task: Say hello to Ada
Thought 1: There might be a program for greetings in the applications folder, I should look at its contents.
Action 1: change_directory § C:\applications
Observation 1: Successfully changed the current directory to C:\applications
Thought 2: Now I need to see which programs are available.
Action 2: list_directory
Observation 2: Current directory: C:\applications
Contents of the current directory:
- hello_world.exe
Thought 3: hello_world.exe looks right, I will run it with the name as argument.
Action 3: run_application § hello_world.exe Ada
Observation 3: Output: Hello Ada!
Thought 4: The program greeted Ada, the task is done.
Action 4: answer § I ran hello_world.exe, which said "Hello Ada!""#;

const FORMAT: &str = "Provide only one thought and one action, following this format:
Thought: [Your reasoning about the current situation and what to do next]
Action: function_name § argument (if applicable)";

/// Renders the text sent to the completion endpoint
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instructions: &'static str,
    capabilities: String,
    guidance: String,
    examples: &'static str,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            instructions: INSTRUCTIONS,
            capabilities: describe_capabilities(),
            guidance: DOMAIN_GUIDANCE.to_string(),
            examples: EXAMPLES,
        }
    }

    /// Append extra domain guidance, e.g. hints for a benchmark scenario
    pub fn with_guidance(mut self, extra: &str) -> Self {
        let extra = extra.trim();
        if !extra.is_empty() {
            self.guidance.push('\n');
            self.guidance.push_str(extra);
        }
        self
    }

    /// Full prompt for `step` given the scratchpad rendered so far
    pub fn render(&self, task: &str, scratchpad: &str, step: usize) -> String {
        format!(
            "{instructions}\n\nAvailable functions:\n{capabilities}\n\n{guidance}\n\n\
             Here are some examples:\n{examples}\n(END OF EXAMPLES)\n\n{format}\n\n\
             Task: {task}{scratchpad}\n\nWhat's your thought {step} and action {step}?",
            instructions = self.instructions,
            guidance = self.guidance,
            capabilities = self.capabilities,
            examples = self.examples,
            format = FORMAT,
            task = task.trim(),
            scratchpad = scratchpad,
            step = step,
        )
    }
}
