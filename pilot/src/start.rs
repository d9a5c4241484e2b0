//! Run bootstrap: label check, subtask-list generation, initial snapshot.

use std::error::Error as StdError;
use std::fmt;
use std::fs;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::label::{LabelEntry, validate_labels};
use crate::core::state_log::StateSnapshot;
use crate::io::config::PilotConfig;
use crate::io::generator::{GenerateRequest, SubtaskGenerator};
use crate::io::layout::{DatasetPaths, RunPaths};
use crate::io::state_store::DurableStateLog;
use crate::io::subtask_store::{extract_subtask_list, parse_subtask_list, write_subtask_list};
use crate::prompt::PromptComposer;

/// The generation boundary exhausted its retry bound without producing a
/// usable subtask list. The decision loop must not be started.
#[derive(Debug)]
pub struct GenerationExhausted {
    pub attempts: u32,
}

impl fmt::Display for GenerationExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no usable subtask list after {} generation attempts",
            self.attempts
        )
    }
}

impl StdError for GenerationExhausted {}

/// Outcome of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub subtask_count: usize,
    pub generation_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct DatasetInfo {
    instruction: String,
}

/// Load and validate the episode's label timeline.
pub fn check_label(dataset: &DatasetPaths) -> Result<Vec<LabelEntry>> {
    let contents = fs::read_to_string(&dataset.label_path)
        .with_context(|| format!("read labels {}", dataset.label_path.display()))?;
    let labels: Vec<LabelEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("parse labels {}", dataset.label_path.display()))?;
    let errors = validate_labels(&labels);
    if !errors.is_empty() {
        return Err(anyhow!(
            "label file {} is invalid: {}",
            dataset.label_path.display(),
            errors.join("; ")
        ));
    }
    Ok(labels)
}

/// Bootstrap one run: generate the canonical subtask list (bounded retry),
/// write it, and seed the all-pending snapshot at time zero.
///
/// Stale run outputs are removed first, so a restarted run begins clean.
pub fn start_run<G: SubtaskGenerator>(
    dataset: &DatasetPaths,
    run: &RunPaths,
    cfg: &PilotConfig,
    generator: &G,
) -> Result<StartOutcome> {
    let contents = fs::read_to_string(&dataset.info_path)
        .with_context(|| format!("read info {}", dataset.info_path.display()))?;
    let info: DatasetInfo = serde_json::from_str(&contents)
        .with_context(|| format!("parse info {}", dataset.info_path.display()))?;

    fs::create_dir_all(&run.dir)
        .with_context(|| format!("create run dir {}", run.dir.display()))?;
    for stale in [&run.state_log_path, &run.decisions_path] {
        if stale.exists() {
            fs::remove_file(stale).with_context(|| format!("remove stale {}", stale.display()))?;
        }
    }

    let composer = PromptComposer::new();
    let prompt = composer.compose_generation(&info.instruction)?;

    let retry_limit = cfg.generator.retry_limit;
    for attempt in 1..=retry_limit {
        let request = GenerateRequest {
            prompt: prompt.clone(),
            log_path: run.generator_log_path.clone(),
            timeout: cfg.generator_timeout(),
            output_limit_bytes: cfg.generator.output_limit_bytes,
        };
        let reply = match generator.generate(&request) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(attempt, retry_limit, err = %format!("{err:#}"), "generation attempt failed");
                continue;
            }
        };

        let Some(json) = extract_subtask_list(&reply) else {
            warn!(attempt, retry_limit, "reply carried no subtask_list tag");
            continue;
        };
        let subtasks = match parse_subtask_list(json) {
            Ok(subtasks) => subtasks,
            Err(err) => {
                warn!(attempt, retry_limit, err = %format!("{err:#}"), "generated list rejected");
                continue;
            }
        };

        write_subtask_list(&run.subtasks_path, &subtasks)?;
        DurableStateLog::create(&run.state_log_path, StateSnapshot::initial(&subtasks))?;
        info!(
            attempt,
            subtasks = subtasks.len(),
            "subtask list generated and initial state seeded"
        );
        return Ok(StartOutcome {
            subtask_count: subtasks.len(),
            generation_attempts: attempt,
        });
    }

    Err(GenerationExhausted {
        attempts: retry_limit,
    }
    .into())
}
