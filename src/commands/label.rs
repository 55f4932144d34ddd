use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, StateChange};

pub struct LabelCommand;

#[async_trait]
impl Command for LabelCommand {
    fn name(&self) -> &str {
        "/label"
    }

    fn description(&self) -> &str {
        "show or set the request label"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        if args.is_empty() {
            println!("  label: {}", info.label);
            return CommandResult::Handled;
        }
        CommandResult::StateChanged(StateChange::Label(args.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_info;

    #[tokio::test]
    async fn no_args_shows_current() {
        assert!(matches!(
            LabelCommand.execute("", &test_info()).await,
            CommandResult::Handled
        ));
    }

    #[tokio::test]
    async fn sets_label() {
        match LabelCommand.execute("nightly check", &test_info()).await {
            CommandResult::StateChanged(change) => {
                assert_eq!(change, StateChange::Label("nightly check".to_string()));
            }
            _ => panic!("expected label change"),
        }
    }
}
