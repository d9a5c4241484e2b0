//! Durable persistence for the state log and the decision log.
//!
//! Both files are append-only in meaning: the JSON array on disk is
//! rewritten wholesale on each append to normalize formatting, but existing
//! entries are never changed or removed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::state_log::{StateLog, StateSnapshot};
use crate::core::time::TimeKey;

/// One decision as extracted from the policy reply, persisted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub time: TimeKey,
    pub action: Option<String>,
    pub thought: Option<String>,
    #[serde(rename = "state")]
    pub state_text: Option<String>,
}

/// State log bound to its on-disk file.
#[derive(Debug)]
pub struct DurableStateLog {
    path: PathBuf,
    log: StateLog,
}

impl DurableStateLog {
    /// Seed a fresh log file holding only `initial`.
    pub fn create(path: &Path, initial: StateSnapshot) -> Result<Self> {
        let mut log = StateLog::new();
        log.append(initial).map_err(anyhow::Error::new)?;
        let durable = Self {
            path: path.to_path_buf(),
            log,
        };
        durable.persist()?;
        Ok(durable)
    }

    /// Load an existing log file, re-validating strict time ascension.
    pub fn open(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading state log");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read state log {}", path.display()))?;
        let snapshots: Vec<StateSnapshot> = serde_json::from_str(&contents)
            .with_context(|| format!("parse state log {}", path.display()))?;
        let log = StateLog::from_snapshots(snapshots)
            .map_err(|err| anyhow!("state log {} is corrupt: {err}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            log,
        })
    }

    pub fn log(&self) -> &StateLog {
        &self.log
    }

    /// Append a snapshot and persist the updated sequence.
    pub fn append(&mut self, snapshot: StateSnapshot) -> Result<()> {
        self.log.append(snapshot).map_err(anyhow::Error::new)?;
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut buf = serde_json::to_string_pretty(self.log.snapshots())?;
        buf.push('\n');
        fs::write(&self.path, buf)
            .with_context(|| format!("write state log {}", self.path.display()))
    }
}

/// Append one record to the decision log, creating the file if needed.
pub fn append_decision(path: &Path, record: &DecisionRecord) -> Result<()> {
    let mut records: Vec<DecisionRecord> = if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read decision log {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse decision log {}", path.display()))?
    } else {
        Vec::new()
    };
    records.push(record.clone());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(&records)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write decision log {}", path.display()))
}

/// Load the full decision log (empty when the file does not exist).
pub fn load_decisions(path: &Path) -> Result<Vec<DecisionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read decision log {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse decision log {}", path.display()))
}
