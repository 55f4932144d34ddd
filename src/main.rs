use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use promptcast::banner::{BannerInfo, SessionStats, print_banner, print_session_summary};
use promptcast::commands::{CommandRegistry, CommandResult, SessionInfo, StateChange};
use promptcast::config::Config;
use promptcast::consts::{DEFAULT_REQUEST_LABEL, MOCK_ENV_VAR, default_config_path};
use promptcast::engine::result::ExecutionResult;
use promptcast::engine::{Engine, PromptExecutor};
use promptcast::events::{Event, EventBus};
use promptcast::logging;
use promptcast::report::{BatchReport, format_result, print_report};
use promptcast::spinner::Spinner;

#[derive(Parser)]
#[command(name = "promptcast", version, about = "One prompt, many backends.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: ~/.promptcast/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Replace every target with a deterministic stub
    #[arg(long, global = true, default_value_t = false)]
    mock: bool,

    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Targets selected when the REPL starts (default: all)
    #[arg(short = 't', long = "target", value_delimiter = ',')]
    targets: Vec<String>,
}

#[derive(Args)]
struct RequestArgs {
    /// Label attached to every result
    #[arg(short, long, default_value = DEFAULT_REQUEST_LABEL)]
    label: String,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    prompt: String,
}

#[derive(Subcommand)]
enum Command {
    /// Send a prompt to every named target concurrently
    Run {
        #[arg(short = 't', long = "target", value_delimiter = ',', required = true)]
        targets: Vec<String>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Send a prompt to one target
    Single {
        #[arg(short = 't', long = "target")]
        target: String,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Run every named target, keep the first success in the given order
    Fallback {
        #[arg(short = 't', long = "target", value_delimiter = ',', required = true)]
        targets: Vec<String>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// List configured targets
    Targets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let (config_path, mut config) = load_config(cli.config.as_deref())?;
    config.resolve_mock_mode(cli.mock, std::env::var(MOCK_ENV_VAR).ok().as_deref());

    let registry = config.build_registry()?;
    let events = Arc::new(EventBus::default());
    let executor =
        PromptExecutor::new(registry, config.executor_options()).with_events(Arc::clone(&events));

    match cli.command {
        Some(Command::Run { targets, request }) => {
            let results = with_progress(
                &events,
                executor.execute_parallel(&request.prompt, &targets, &request.label),
            )
            .await;
            let report = BatchReport::new(&request.label, results);
            if request.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Some(Command::Single { target, request }) => {
            let result = with_progress(
                &events,
                executor.execute_single(&request.prompt, &target, &request.label),
            )
            .await;
            print_result(&result, request.json)?;
        }
        Some(Command::Fallback { targets, request }) => {
            let result = with_progress(
                &events,
                executor.execute_with_fallback(&request.prompt, &targets, &request.label),
            )
            .await;
            print_result(&result, request.json)?;
            if !result.is_success() {
                anyhow::bail!("every target failed");
            }
        }
        Some(Command::Targets) => {
            let targets = executor.registry().describe();
            if targets.is_empty() {
                println!("no targets configured in {}", config_path.display());
            }
            for (name, kind) in targets {
                println!("{name}\t{kind}");
            }
        }
        None => repl(&executor, &events, &config_path, cli.targets).await?,
    }

    Ok(())
}

/// An explicit `--config` must exist; a missing default file means no targets.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(PathBuf, Config)> {
    if let Some(path) = explicit {
        return Ok((path.to_path_buf(), Config::load(path)?));
    }
    let path = default_config_path();
    if !path.exists() {
        warn!(path = %path.display(), "no config file, starting without targets");
        return Ok((path, Config::default()));
    }
    let config = Config::load(&path)?;
    Ok((path, config))
}

fn print_result(result: &ExecutionResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", format_result(result));
    }
    Ok(())
}

/// Drive `batch` to completion, showing a spinner fed by progress events
/// when stderr is a terminal.
async fn with_progress<F: Future>(events: &EventBus, batch: F) -> F::Output {
    if !io::stderr().is_terminal() {
        return batch.await;
    }

    let mut rx = events.subscribe();
    let spinner = Spinner::start("dispatching");
    // Only events from the batch started after subscribing count.
    let mut current: Option<u64> = None;
    let (mut done, mut total) = (0usize, 0usize);

    tokio::pin!(batch);
    let output = loop {
        tokio::select! {
            output = &mut batch => break output,
            event = rx.recv() => match event {
                Ok(Event::BatchStarted { batch: id, targets, .. }) if current.is_none() => {
                    current = Some(id);
                    total = targets.len();
                    spinner.update(format!("waiting on {total} targets"));
                }
                Ok(Event::TargetCompleted { batch: id, target, .. }) if current == Some(id) => {
                    done += 1;
                    spinner.update(format!("{done}/{total} done, last: {target}"));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut batch).await,
            },
        }
    };

    spinner.stop().await;
    output
}

async fn repl(
    executor: &PromptExecutor,
    events: &EventBus,
    config_path: &Path,
    initial: Vec<String>,
) -> anyhow::Result<()> {
    let targets = executor.registry().describe();
    let mut selected = if initial.is_empty() {
        executor.registry().names()
    } else {
        initial
    };
    let mut label = DEFAULT_REQUEST_LABEL.to_string();
    let mut last_batch: Option<BatchReport> = None;
    let mut stats = SessionStats::default();
    let commands = CommandRegistry::new();

    print_banner(&BannerInfo {
        config_path,
        target_count: targets.len(),
        selected: &selected,
        mock_mode: executor.mock_mode(),
    });

    // Async stdin so Ctrl+C is caught at the prompt too
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\npromptcast> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {e}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let info = SessionInfo {
            targets: &targets,
            selected: &selected,
            label: &label,
            mock_mode: executor.mock_mode(),
            last_batch: last_batch.as_ref(),
        };
        match commands.dispatch(input, &info).await {
            CommandResult::NotACommand => {}
            CommandResult::Handled => continue,
            CommandResult::Quit => break,
            CommandResult::StateChanged(StateChange::Selection(names)) => {
                println!("  selected: {}", names.join(", "));
                selected = names;
                continue;
            }
            CommandResult::StateChanged(StateChange::Label(new_label)) => {
                println!("  label: {new_label}");
                label = new_label;
                continue;
            }
        }

        if selected.is_empty() {
            println!("  no targets selected, see /use");
            continue;
        }

        // Ctrl+C during a batch cancels the batch, not the REPL
        tokio::select! {
            results = with_progress(events, executor.execute_parallel(input, &selected, &label)) => {
                let report = BatchReport::new(&label, results);
                print_report(&report);
                stats.record(report.results.len(), report.successful().len());
                last_batch = Some(report);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n\ninterrupted");
            }
        }
    }

    print_session_summary(stats);
    Ok(())
}
