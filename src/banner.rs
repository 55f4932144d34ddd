//! Startup banner and session summary display.

use std::path::Path;

use crate::consts::{AUTHOR, REPO};

/// Session configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub config_path: &'a Path,
    pub target_count: usize,
    pub selected: &'a [String],
    pub mock_mode: bool,
}

/// Totals across every batch of a REPL session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub batches: usize,
    pub results: usize,
    pub successes: usize,
}

impl SessionStats {
    pub fn record(&mut self, results: usize, successes: usize) {
        self.batches += 1;
        self.results += results;
        self.successes += successes;
    }
}

pub fn print_banner(info: &BannerInfo) {
    let selected = if info.selected.is_empty() {
        "none (use /use)".to_string()
    } else {
        info.selected.join(", ")
    };
    let mode = if info.mock_mode { "mock" } else { "live" };
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║          P R O M P T C A S T          ║
   ║     one prompt, many backends         ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   repo      {}
   config    {}
   targets   {} configured
   selected  {}
   mode      {}

   type /help for commands
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        REPO,
        info.config_path.display(),
        info.target_count,
        selected,
        mode,
    );
}

/// Print the session summary and farewell.
pub fn print_session_summary(stats: SessionStats) {
    if stats.batches > 0 {
        println!(
            "session: {} batches, {}/{} results succeeded",
            stats.batches, stats.successes, stats.results
        );
    }
    println!("goodbye.");
}
