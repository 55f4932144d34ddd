//! Diagnostics on stderr via `tracing`.

use tracing_subscriber::EnvFilter;

use crate::consts::LOG_ENV_VAR;

/// Default level for a given number of `-v` flags.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `PROMPTCAST_LOG` wins over `-v`.
/// Safe to call more than once; later calls are ignored.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(format!("promptcast={}", level_for(verbosity))));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(9), "trace");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(0);
        init(2);
    }
}
