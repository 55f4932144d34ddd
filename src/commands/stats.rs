use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::report::format_performance;

pub struct StatsCommand;

#[async_trait]
impl Command for StatsCommand {
    fn name(&self) -> &str {
        "/stats"
    }

    fn description(&self) -> &str {
        "errors and timing of the last batch"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        match info.last_batch {
            None => println!("  no batch has run yet"),
            Some(batch) => {
                println!("  label:  {}", batch.label);
                println!("  errors: {}", batch.errors);
                println!("  timing: {}", format_performance(&batch.performance));
            }
        }
        CommandResult::Handled
    }
}
