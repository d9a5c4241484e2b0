//! Ground-truth label timelines: validation and stop-time derivation.

use serde::{Deserialize, Serialize};

/// Action tokens a label file may carry. `[WAIT]` is label-only: the
/// decision policy's instruction set never offers it, and the two
/// vocabularies are deliberately kept separate.
pub const LABEL_ACTIONS: [&str; 5] = [
    "[FORWARD]",
    "[LEFT ROTATE]",
    "[RIGHT ROTATE]",
    "[STOP]",
    "[WAIT]",
];

/// One labeled action span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub action: String,
    pub time_range: [f64; 2],
}

/// Check that a label timeline is well-formed:
/// - every action token is recognized
/// - each span's end equals the next span's start (3-decimal rounding)
///
/// Returns stable error messages (empty on success).
pub fn validate_labels(entries: &[LabelEntry]) -> Vec<String> {
    let mut errors = Vec::new();

    if entries.is_empty() {
        errors.push("label file holds no entries".to_string());
        return errors;
    }

    for (index, entry) in entries.iter().enumerate() {
        if !LABEL_ACTIONS.contains(&entry.action.as_str()) {
            errors.push(format!(
                "entry {index}: unrecognized action '{}'",
                entry.action
            ));
        }
        if let Some(next) = entries.get(index + 1) {
            let end = round3(entry.time_range[1]);
            let next_start = round3(next.time_range[0]);
            if end != next_start {
                errors.push(format!(
                    "entries {index} and {} are not connected: {end} != {next_start}",
                    index + 1
                ));
            }
        }
    }

    errors
}

/// Start time of the labeled `[STOP]` span, the input to the run's time bound.
pub fn stop_start_time(entries: &[LabelEntry]) -> Option<f64> {
    entries
        .iter()
        .find(|entry| entry.action == "[STOP]")
        .map(|entry| entry.time_range[0])
}

/// Upper bound on the run clock: labeled stop time plus a safety margin of
/// whole ticks.
pub fn time_bound(stop_start: f64, tick_interval: f64, safety_margin_ticks: u32) -> f64 {
    stop_start + tick_interval * safety_margin_ticks as f64
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
