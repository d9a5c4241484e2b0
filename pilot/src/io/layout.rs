//! Canonical dataset, estimator, and run directory layout.

use std::path::{Path, PathBuf};

use crate::core::time::TimeKey;
use crate::core::types::RepresentationMode;

/// Inputs for one `(place, id)` episode under `dataset/`.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub dir: PathBuf,
    pub info_path: PathBuf,
    pub label_path: PathBuf,
    pub frames_dir: PathBuf,
}

impl DatasetPaths {
    pub fn new(root: &Path, place: &str, id: u32) -> Self {
        let dir = root.join("dataset").join(format!("{place}_{id}"));
        Self {
            info_path: dir.join("info.json"),
            label_path: dir.join("label.json"),
            frames_dir: dir.join("frames"),
            dir,
        }
    }

    /// Camera frame captured at `t`.
    pub fn frame_path(&self, t: TimeKey) -> PathBuf {
        self.frames_dir.join(format!("frame_{t}.jpg"))
    }
}

/// Depth artifacts produced by the estimation collaborator for one episode.
#[derive(Debug, Clone)]
pub struct EstimatorPaths {
    pub output_dir: PathBuf,
}

impl EstimatorPaths {
    pub fn new(root: &Path, estimator: &str, place: &str, id: u32) -> Self {
        Self {
            output_dir: root
                .join(estimator)
                .join("output")
                .join(format!("{place}_{id}")),
        }
    }

    /// Dense depth buffer for `t`.
    pub fn buffer_path(&self, t: TimeKey) -> PathBuf {
        self.output_dir.join(format!("frame_{t}.json"))
    }

    /// Rendered depth-map image for `t`.
    pub fn map_path(&self, t: TimeKey) -> PathBuf {
        self.output_dir.join(format!("frame_{t}.png"))
    }
}

/// Outputs of one run under `runs/<exp>/`.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub subtasks_path: PathBuf,
    pub state_log_path: PathBuf,
    pub decisions_path: PathBuf,
    pub generator_log_path: PathBuf,
}

impl RunPaths {
    pub fn new(root: &Path, exp: &str, place: &str, id: u32) -> Self {
        let dir = root.join("runs").join(exp).join(format!("{place}_{id}"));
        Self {
            subtasks_path: dir.join("subtasks.json"),
            state_log_path: dir.join("state_log.json"),
            decisions_path: dir.join("decisions.json"),
            generator_log_path: dir.join("generator.log"),
            dir,
        }
    }
}

/// Experiment name shared by all runs of one configuration.
pub fn experiment_name(mode: RepresentationMode, estimator: &str) -> String {
    format!("pilot-{mode}-{estimator}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_stable() {
        let dataset = DatasetPaths::new(Path::new("/data"), "orchard", 3);
        assert!(dataset.info_path.ends_with("dataset/orchard_3/info.json"));
        assert!(
            dataset
                .frame_path(TimeKey::new(1, 4))
                .ends_with("dataset/orchard_3/frames/frame_1'4.jpg")
        );

        let estimator = EstimatorPaths::new(Path::new("/data"), "depth_pro", "orchard", 3);
        assert!(
            estimator
                .buffer_path(TimeKey::zero())
                .ends_with("depth_pro/output/orchard_3/frame_0'0.json")
        );

        let run = RunPaths::new(Path::new("/data"), "pilot-matrix-depth_pro", "orchard", 3);
        assert!(
            run.state_log_path
                .ends_with("runs/pilot-matrix-depth_pro/orchard_3/state_log.json")
        );
    }

    #[test]
    fn experiment_name_is_mode_and_estimator() {
        assert_eq!(
            experiment_name(RepresentationMode::Hybrid, "depth_pro"),
            "pilot-hybrid-depth_pro"
        );
    }
}
