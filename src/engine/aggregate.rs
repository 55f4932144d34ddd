//! Post-processing over a completed batch.

use serde::Serialize;
use std::time::Duration;

use super::result::{ExecutionResult, serialize_ms};

/// Returned by [`summarize_errors`] when nothing failed.
pub const NO_ERRORS: &str = "No errors";

/// Target name used when fallback selection has nothing to return.
pub const UNKNOWN_TARGET: &str = "unknown";

/// Timing over the successful results of one batch.
///
/// `total_time` is the slowest participant: the batch ran concurrently, so
/// its wall-clock cost is the maximum, not the sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceSummary {
    #[serde(rename = "total_time_ms", serialize_with = "serialize_ms")]
    pub total_time: Duration,
    #[serde(rename = "fastest_ms", serialize_with = "serialize_ms")]
    pub fastest: Duration,
    #[serde(rename = "slowest_ms", serialize_with = "serialize_ms")]
    pub slowest: Duration,
    #[serde(rename = "average_ms", serialize_with = "serialize_ms")]
    pub average: Duration,
    pub successful_count: usize,
    pub total_count: usize,
}

/// Results that actually produced content.
pub fn filter_successful(results: &[ExecutionResult]) -> Vec<&ExecutionResult> {
    results.iter().filter(|r| r.is_success()).collect()
}

/// `"a: x; b: y"` for every result with an error, or [`NO_ERRORS`].
pub fn summarize_errors(results: &[ExecutionResult]) -> String {
    let errors: Vec<String> = results
        .iter()
        .filter_map(|r| r.error().map(|e| format!("{}: {}", r.target_name(), e)))
        .collect();
    if errors.is_empty() {
        NO_ERRORS.to_string()
    } else {
        errors.join("; ")
    }
}

pub fn performance_summary(results: &[ExecutionResult]) -> PerformanceSummary {
    let successful = filter_successful(results);
    let times: Vec<Duration> = successful.iter().filter_map(|r| r.elapsed()).collect();

    let mut summary = PerformanceSummary {
        successful_count: successful.len(),
        total_count: results.len(),
        ..PerformanceSummary::default()
    };

    let (Some(&fastest), Some(&slowest)) = (times.iter().min(), times.iter().max()) else {
        return summary;
    };
    let total: Duration = times.iter().sum();

    summary.total_time = slowest;
    summary.fastest = fastest;
    summary.slowest = slowest;
    summary.average = total / times.len() as u32;
    summary
}

/// Pick the best available result by the caller's preference, not by speed.
///
/// Falls back to the result for the first preferred name, then to a
/// synthesized "No servers available" error.
pub fn select_first_success(
    results: &[ExecutionResult],
    preference_order: &[String],
) -> ExecutionResult {
    let winner = preference_order.iter().find_map(|name| {
        results
            .iter()
            .find(|r| r.target_name() == name && r.is_success())
    });
    if let Some(winner) = winner {
        return winner.clone();
    }

    let label = results
        .first()
        .map(|r| r.request_label().to_string())
        .unwrap_or_default();

    preference_order
        .first()
        .and_then(|first| results.iter().find(|r| r.target_name() == first))
        .cloned()
        .unwrap_or_else(|| {
            ExecutionResult::failed(&label, UNKNOWN_TARGET, "No servers available", None)
        })
}
