use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, StateChange, split_names};

pub struct UseCommand;

#[async_trait]
impl Command for UseCommand {
    fn name(&self) -> &str {
        "/use"
    }

    fn description(&self) -> &str {
        "select targets: /use a,b (or /use all)"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let names = if args == "all" {
            info.targets.iter().map(|(n, _)| n.clone()).collect()
        } else {
            split_names(args)
        };

        if names.is_empty() {
            eprintln!("  ✗ usage: /use <target>[,<target>...] | all");
            return CommandResult::Handled;
        }

        // Unknown names are allowed; they come back as per-target errors.
        for name in &names {
            if !info.targets.iter().any(|(n, _)| n == name) {
                println!("  ! {name} is not configured");
            }
        }
        CommandResult::StateChanged(StateChange::Selection(names))
    }
}
