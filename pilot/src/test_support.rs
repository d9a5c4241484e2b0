//! Test-only helpers: scripted boundary impls and episode scaffolding.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::label::LabelEntry;
use crate::core::sampler::DepthBuffer;
use crate::core::subtask::Subtask;
use crate::core::time::TimeKey;
use crate::io::config::PilotConfig;
use crate::io::depth::DepthSource;
use crate::io::generator::{GenerateRequest, SubtaskGenerator};
use crate::io::layout::{DatasetPaths, EstimatorPaths, RunPaths};
use crate::io::policy::{PolicyClient, PolicyRequest};

/// One scripted boundary response.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

/// Policy client that returns queued replies without any network traffic.
pub struct ScriptedPolicy {
    replies: Mutex<VecDeque<ScriptedReply>>,
}

impl ScriptedPolicy {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    /// Queue the same reply text `count` times.
    pub fn repeating(reply: &str, count: usize) -> Self {
        Self::new(vec![ScriptedReply::Text(reply.to_string()); count])
    }
}

impl PolicyClient for ScriptedPolicy {
    fn decide(&self, _request: &PolicyRequest) -> Result<String> {
        let next = self.replies.lock().expect("lock").pop_front();
        match next {
            Some(ScriptedReply::Text(reply)) => Ok(reply),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted policy exhausted")),
        }
    }
}

/// Depth source that serves one in-memory buffer/map for every tick.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDepth {
    pub buffer: Option<DepthBuffer>,
    pub map: Option<PathBuf>,
}

impl DepthSource for ScriptedDepth {
    fn load_buffer(&self, _t: TimeKey) -> Result<Option<DepthBuffer>> {
        Ok(self.buffer.clone())
    }

    fn rendered_map(&self, _t: TimeKey) -> Result<Option<PathBuf>> {
        Ok(self.map.clone())
    }
}

/// Generator that returns queued replies without spawning processes.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ScriptedReply>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

impl SubtaskGenerator for ScriptedGenerator {
    fn generate(&self, _request: &GenerateRequest) -> Result<String> {
        let next = self.replies.lock().expect("lock").pop_front();
        match next {
            Some(ScriptedReply::Text(reply)) => Ok(reply),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted generator exhausted")),
        }
    }
}

/// A deterministic subtask record.
pub fn subtask(step: u32, description: &str, start: &str, end: &str) -> Subtask {
    Subtask {
        step,
        subtask: description.to_string(),
        start_condition: start.to_string(),
        end_condition: end.to_string(),
    }
}

/// Two-step list used across scenario tests.
pub fn sample_subtasks() -> Vec<Subtask> {
    vec![
        subtask(1, "walk along the path", "always", "yellow bench visible"),
        subtask(
            2,
            "Stop when the yellow bench is reached",
            "yellow bench visible",
            "yellow bench reached",
        ),
    ]
}

/// A policy reply in the tagged output format.
pub fn policy_reply(action: &str, state: &str) -> String {
    format!(
        "<thought> scripted reasoning </thought>\n<action> {action} </action>\n<state> {state} </state>"
    )
}

/// A generator reply wrapping `subtasks` in the expected tag.
pub fn generation_reply(subtasks: &[Subtask]) -> String {
    let json = serde_json::to_string_pretty(subtasks).expect("serialize subtasks");
    format!("<thought> scripted decomposition </thought>\n<subtask_list>\n{json}\n</subtask_list>")
}

/// A small buffer whose sampled grid is valid for every catalogue shape.
pub fn sample_buffer() -> DepthBuffer {
    DepthBuffer {
        width: 64,
        height: 36,
        values: (0..64 * 36).map(|i| (i % 50) as f64 / 10.0).collect(),
    }
}

/// Config tuned for tests: default cadence, scripted-friendly retry bounds.
pub fn test_config() -> PilotConfig {
    PilotConfig::default()
}

/// Temp-dir episode scaffold with the canonical directory layout.
pub struct TestRun {
    temp: TempDir,
    pub place: String,
    pub id: u32,
    pub exp: String,
}

impl TestRun {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
            place: "orchard".to_string(),
            id: 1,
            exp: "pilot-test".to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn dataset(&self) -> DatasetPaths {
        DatasetPaths::new(self.root(), &self.place, self.id)
    }

    pub fn run_paths(&self) -> RunPaths {
        RunPaths::new(self.root(), &self.exp, &self.place, self.id)
    }

    pub fn estimator_paths(&self, estimator: &str) -> EstimatorPaths {
        EstimatorPaths::new(self.root(), estimator, &self.place, self.id)
    }

    pub fn write_info(&self, instruction: &str) -> Result<()> {
        let dataset = self.dataset();
        fs::create_dir_all(&dataset.dir)?;
        fs::write(
            &dataset.info_path,
            serde_json::to_string_pretty(&serde_json::json!({ "instruction": instruction }))?,
        )?;
        Ok(())
    }

    pub fn write_labels(&self, labels: &[LabelEntry]) -> Result<()> {
        let dataset = self.dataset();
        fs::create_dir_all(&dataset.dir)?;
        fs::write(&dataset.label_path, serde_json::to_string_pretty(labels)?)?;
        Ok(())
    }

    /// Create dummy camera frames for `count` ticks starting at `0'0`.
    pub fn write_frames(&self, count: u32, tick_decisteps: u8) -> Result<()> {
        let dataset = self.dataset();
        fs::create_dir_all(&dataset.frames_dir)?;
        let mut t = TimeKey::zero();
        for _ in 0..count {
            fs::write(dataset.frame_path(t), b"jpeg")?;
            t = t.advanced(tick_decisteps);
        }
        Ok(())
    }

    /// Write a depth buffer artifact for `t` under the estimator layout.
    pub fn write_depth_buffer(
        &self,
        estimator: &str,
        t: TimeKey,
        buffer: &DepthBuffer,
    ) -> Result<()> {
        let paths = self.estimator_paths(estimator);
        fs::create_dir_all(&paths.output_dir)?;
        fs::write(paths.buffer_path(t), serde_json::to_string(buffer)?)?;
        Ok(())
    }

    /// Write a dummy rendered depth map for `t` under the estimator layout.
    pub fn write_depth_map(&self, estimator: &str, t: TimeKey) -> Result<()> {
        let paths = self.estimator_paths(estimator);
        fs::create_dir_all(&paths.output_dir)?;
        fs::write(paths.map_path(t), b"png")?;
        Ok(())
    }
}
