//! Run configuration stored in `pilot.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::time::DECISTEPS_PER_MINUTE;
use crate::core::types::{GridShape, RepresentationMode};

/// Pilot configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PilotConfig {
    /// Depth representation supplied to the policy.
    pub mode: RepresentationMode,

    /// Depth grid columns; must name a catalogue shape (16, 32 or 64).
    pub grid_cols: u32,

    /// Decisteps the clock advances per tick; must divide the minute grid.
    pub tick_decisteps: u8,

    /// Cumulative `[STOP]` emissions that terminate the run.
    pub stop_threshold: u32,

    /// Ticks past the labeled stop time before the time bound fires.
    pub safety_margin_ticks: u32,

    /// Depth estimation model whose output directory holds the artifacts.
    pub estimator: String,

    pub policy: PolicyConfig,
    pub generator: GeneratorConfig,
}

/// Decision-policy endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Base URL of the chat endpoint.
    pub endpoint: String,
    /// Vision-language model name.
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per tick before the run terminates as policy-unavailable.
    pub retry_limit: u32,
}

/// Subtask-list generator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Command that reads the generation prompt on stdin and prints the
    /// reply on stdout (e.g. `["ollama", "run", "deepseek-r1:32b"]`).
    pub command: Vec<String>,
    /// Per-invocation timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts before the run is abandoned without a usable list.
    pub retry_limit: u32,
    /// Truncate generator stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            mode: RepresentationMode::Matrix,
            grid_cols: 16,
            tick_decisteps: 2,
            stop_threshold: 3,
            safety_margin_ticks: 2,
            estimator: "depth_pro".to_string(),
            policy: PolicyConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5vl:32b".to_string(),
            timeout_secs: 120,
            retry_limit: 3,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "ollama".to_string(),
                "run".to_string(),
                "deepseek-r1:32b".to_string(),
            ],
            timeout_secs: 300,
            retry_limit: 3,
            output_limit_bytes: 100_000,
        }
    }
}

impl PilotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid_shape().is_none() {
            return Err(anyhow!(
                "grid_cols must be one of the catalogue widths 16, 32, 64 (got {})",
                self.grid_cols
            ));
        }
        if self.tick_decisteps == 0 || DECISTEPS_PER_MINUTE % self.tick_decisteps as u32 != 0 {
            return Err(anyhow!(
                "tick_decisteps must divide the minute grid (got {})",
                self.tick_decisteps
            ));
        }
        if self.stop_threshold == 0 {
            return Err(anyhow!("stop_threshold must be > 0"));
        }
        if self.estimator.trim().is_empty() {
            return Err(anyhow!("estimator must not be empty"));
        }
        if self.policy.endpoint.trim().is_empty() || self.policy.model.trim().is_empty() {
            return Err(anyhow!("policy endpoint and model must not be empty"));
        }
        if self.policy.timeout_secs == 0 {
            return Err(anyhow!("policy.timeout_secs must be > 0"));
        }
        if self.policy.retry_limit == 0 {
            return Err(anyhow!("policy.retry_limit must be > 0"));
        }
        if self.generator.command.is_empty() || self.generator.command[0].trim().is_empty() {
            return Err(anyhow!("generator.command must be a non-empty array"));
        }
        if self.generator.timeout_secs == 0 {
            return Err(anyhow!("generator.timeout_secs must be > 0"));
        }
        if self.generator.retry_limit == 0 {
            return Err(anyhow!("generator.retry_limit must be > 0"));
        }
        if self.generator.output_limit_bytes == 0 {
            return Err(anyhow!("generator.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Catalogue shape named by `grid_cols`.
    pub fn grid_shape(&self) -> Option<GridShape> {
        GridShape::from_cols(self.grid_cols)
    }

    /// Clock value one tick advances.
    pub fn tick_interval(&self) -> f64 {
        self.tick_decisteps as f64 / DECISTEPS_PER_MINUTE as f64
    }

    pub fn policy_timeout(&self) -> Duration {
        Duration::from_secs(self.policy.timeout_secs)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator.timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PilotConfig::default()`.
pub fn load_config(path: &Path) -> Result<PilotConfig> {
    if !path.exists() {
        let cfg = PilotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PilotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PilotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PilotConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pilot.toml");
        let cfg = PilotConfig {
            mode: RepresentationMode::Hybrid,
            grid_cols: 32,
            ..PilotConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn rejects_off_catalogue_grid() {
        let cfg = PilotConfig {
            grid_cols: 20,
            ..PilotConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_tick_that_does_not_divide_minute() {
        let cfg = PilotConfig {
            tick_decisteps: 3,
            ..PilotConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tick_interval_matches_decisteps() {
        let cfg = PilotConfig::default();
        assert_eq!(cfg.tick_interval(), 0.2);
    }
}
