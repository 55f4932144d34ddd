//! Built-in REPL commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`]. The registry handles dispatch, alias resolution,
//! and help generation. Anything after the command word is passed through
//! as `args`.

mod label;
mod quit;
mod stats;
mod targets;
mod use_targets;

use async_trait::async_trait;
use std::sync::Arc;

use crate::report::BatchReport;

/// Session state available to commands during execution.
pub struct SessionInfo<'a> {
    /// `(name, kind)` for every configured target, sorted by name.
    pub targets: &'a [(String, String)],
    /// Targets the next prompt fans out to.
    pub selected: &'a [String],
    pub label: &'a str,
    pub mock_mode: bool,
    pub last_batch: Option<&'a BatchReport>,
}

/// A state change the REPL needs to apply after a command runs.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// New target selection.
    Selection(Vec<String>),
    /// New request label.
    Label(String),
}

/// What the REPL should do after a command runs.
pub enum CommandResult {
    /// Not a command; send the input as a prompt.
    NotACommand,
    /// Command handled, continue the REPL loop.
    Handled,
    /// Command produced a state change the REPL must apply.
    StateChanged(StateChange),
    /// Exit the REPL.
    Quit,
}

/// A REPL command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/targets"`.
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult;
}

pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

const HELP: &str = "/help";
const HELP_ALIASES: &[&str] = &["/h", "/?"];

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(targets::TargetsCommand),
            Arc::new(use_targets::UseCommand),
            Arc::new(label::LabelCommand),
            Arc::new(stats::StatsCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    /// Dispatch input to a matching command, or return `NotACommand`.
    pub async fn dispatch(&self, input: &str, info: &SessionInfo<'_>) -> CommandResult {
        let input = input.trim();
        let (word, args) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        // /help needs the registry itself
        if word == HELP || HELP_ALIASES.contains(&word) {
            print!("{}", self.help_text());
            return CommandResult::Handled;
        }

        for command in &self.commands {
            if word == command.name() || command.aliases().contains(&word) {
                return command.execute(args, info).await;
            }
        }

        if word.starts_with('/') {
            println!("unknown command: {word}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    pub fn help_text(&self) -> String {
        let mut entries: Vec<(String, &str)> =
            vec![(format_label(HELP, HELP_ALIASES), "show this help")];
        entries.extend(
            self.commands
                .iter()
                .map(|c| (format_label(c.name(), c.aliases()), c.description())),
        );

        let max_width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        let mut out = String::new();
        for (label, desc) in &entries {
            out.push_str(&format!("  {label:<max_width$}  {desc}\n"));
        }
        out.push_str("\n  anything else is sent as a prompt to the selected targets\n");
        out
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, aliases: &[&str]) -> String {
    if aliases.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, aliases.join(", "))
    }
}

/// Split `a, b c` into names, dropping empties.
pub(crate) fn split_names(args: &str) -> Vec<String> {
    args.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
