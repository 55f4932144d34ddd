//! A minimal terminal spinner for feedback while a batch runs.

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Braille spinner frames.
const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const INTERVAL: Duration = Duration::from_millis(80);

/// A terminal spinner that runs in a background task.
///
/// Writes to stderr so `--json` output on stdout stays clean. The message
/// can be replaced while spinning, e.g. `"2/3 targets done"`.
pub struct Spinner {
    handle: JoinHandle<()>,
    // None means stop.
    message: watch::Sender<Option<String>>,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let (tx, mut rx) = watch::channel(Some(message.to_string()));

        let handle = tokio::spawn(async move {
            let mut i = 0;
            loop {
                let Some(message) = rx.borrow_and_update().clone() else {
                    break;
                };
                let frame = FRAMES[i % FRAMES.len()];
                eprint!("\x1b[2K\r{frame} {message}");
                let _ = std::io::stderr().flush();

                tokio::select! {
                    _ = tokio::time::sleep(INTERVAL) => {}
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                i += 1;
            }
            eprint!("\x1b[2K\r");
            let _ = std::io::stderr().flush();
        });

        Self {
            handle,
            message: tx,
        }
    }

    pub fn update(&self, message: impl Into<String>) {
        let _ = self.message.send(Some(message.into()));
    }

    /// Stop the spinner and clear its line.
    pub async fn stop(self) {
        let _ = self.message.send(None);
        let _ = self.handle.await;
    }
}
