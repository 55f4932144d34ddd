//! Rendering batch outcomes for the terminal.

use serde::Serialize;

use crate::consts::format_duration;
use crate::engine::aggregate::{
    PerformanceSummary, filter_successful, performance_summary, summarize_errors,
};
use crate::engine::result::{ExecutionResult, ExecutionStatus};

/// Everything worth showing about one completed batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub label: String,
    pub results: Vec<ExecutionResult>,
    pub errors: String,
    pub performance: PerformanceSummary,
}

impl BatchReport {
    pub fn new(label: &str, results: Vec<ExecutionResult>) -> Self {
        let errors = summarize_errors(&results);
        let performance = performance_summary(&results);
        Self {
            label: label.to_string(),
            results,
            errors,
            performance,
        }
    }

    pub fn successful(&self) -> Vec<&ExecutionResult> {
        filter_successful(&self.results)
    }
}

/// `[name] ✓ content (12ms)` or `[name] ✗ error`.
pub fn format_result(result: &ExecutionResult) -> String {
    let timing = result
        .elapsed()
        .map(|d| format!(" ({})", format_duration(d)))
        .unwrap_or_default();
    match (result.content(), result.error()) {
        (Some(content), _) => {
            let marker = if result.status() == ExecutionStatus::Mock {
                "✓ [mock]"
            } else {
                "✓"
            };
            format!("[{}] {marker} {}{timing}", result.target_name(), content.trim())
        }
        (None, Some(error)) => format!("[{}] ✗ {error}{timing}", result.target_name()),
        (None, None) => format!("[{}] ?{timing}", result.target_name()),
    }
}

pub fn format_performance(summary: &PerformanceSummary) -> String {
    format!(
        "{}/{} succeeded · total {} · fastest {} · slowest {} · avg {}",
        summary.successful_count,
        summary.total_count,
        format_duration(summary.total_time),
        format_duration(summary.fastest),
        format_duration(summary.slowest),
        format_duration(summary.average),
    )
}

pub fn print_report(report: &BatchReport) {
    for result in &report.results {
        println!("  {}", format_result(result));
    }
    println!();
    println!("  errors: {}", report.errors);
    println!("  timing: {}", format_performance(&report.performance));
}
