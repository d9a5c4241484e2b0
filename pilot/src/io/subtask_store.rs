//! Canonical subtask-list persistence with schema validation.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use regex::Regex;
use serde_json::Value;

use crate::core::subtask::{Subtask, validate_subtask_list};

const SUBTASK_LIST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/subtask_list/v1.schema.json"
));

static SUBTASK_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<subtask_list>\s*(\[.*?\])\s*</subtask_list>").unwrap());

/// Extract the JSON array inside a generator reply's `<subtask_list>` tag.
pub fn extract_subtask_list(reply: &str) -> Option<&str> {
    SUBTASK_LIST_RE
        .captures(reply)
        .map(|caps| caps.get(1).unwrap().as_str())
}

/// Parse and validate a subtask-list JSON document (schema + invariants).
pub fn parse_subtask_list(json_text: &str) -> Result<Vec<Subtask>> {
    let value: Value = serde_json::from_str(json_text).context("parse subtask list json")?;
    validate_schema(&value)?;
    let subtasks: Vec<Subtask> =
        serde_json::from_value(value).context("deserialize subtask list")?;
    let errors = validate_subtask_list(&subtasks);
    if !errors.is_empty() {
        return Err(anyhow!("subtask list invariants failed: {}", errors.join("; ")));
    }
    Ok(subtasks)
}

/// Load and validate the canonical subtask list from disk.
pub fn load_subtask_list(path: &Path) -> Result<Vec<Subtask>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read subtask list {}", path.display()))?;
    parse_subtask_list(&contents).with_context(|| format!("validate {}", path.display()))
}

/// Write the canonical subtask list with stable formatting.
pub fn write_subtask_list(path: &Path, subtasks: &[Subtask]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(subtasks)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write subtask list {}", path.display()))
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(SUBTASK_LIST_SCHEMA).context("parse bundled subtask schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {err}"))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "subtask list schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
