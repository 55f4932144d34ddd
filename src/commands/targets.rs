use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct TargetsCommand;

#[async_trait]
impl Command for TargetsCommand {
    fn name(&self) -> &str {
        "/targets"
    }

    fn aliases(&self) -> &[&str] {
        &["/t"]
    }

    fn description(&self) -> &str {
        "list configured targets (* = selected)"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        print!("{}", render(info));
        CommandResult::Handled
    }
}

fn render(info: &SessionInfo<'_>) -> String {
    if info.targets.is_empty() {
        return "  no targets configured\n".to_string();
    }
    let width = info.targets.iter().map(|(n, _)| n.len()).max().unwrap_or(0);

    let mut out = String::new();
    if info.mock_mode {
        out.push_str("  mock mode: every target is a stub\n");
    }
    for (name, kind) in info.targets {
        let marker = if info.selected.contains(name) { '*' } else { ' ' };
        out.push_str(&format!("  {marker} {name:<width$}  {kind}\n"));
    }
    out
}
