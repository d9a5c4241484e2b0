//! Per-tick observation assembly across representation modes.
//!
//! Each mode statically determines which artifacts the observation must
//! carry. A missing required artifact aborts the tick: the policy's prompt
//! format is mode-specific, and degrading silently would desynchronize the
//! instruction text from the delivered content.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::core::sampler::sample_grid;
use crate::core::time::TimeKey;
use crate::core::types::{GridShape, RepresentationMode};
use crate::io::depth::DepthSource;

/// Everything the policy sees for one tick, minus the subtask list.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub time: TimeKey,
    pub image_path: PathBuf,
    pub depth_grid: Option<Vec<Vec<f64>>>,
    pub depth_map_path: Option<PathBuf>,
    /// Native resolution of the sampled buffer, when a grid is present.
    pub buffer_dims: Option<(usize, usize)>,
}

/// A required artifact is missing for the configured mode. Fatal for the
/// tick, recoverable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepresentationUnavailable {
    pub mode: RepresentationMode,
    pub missing: &'static str,
    pub time: TimeKey,
}

impl fmt::Display for RepresentationUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode {} requires {} but none exists for {}",
            self.mode, self.missing, self.time
        )
    }
}

impl StdError for RepresentationUnavailable {}

/// Assemble the observation for `t`, failing when the upstream collaborators
/// have not produced what the mode demands.
pub fn build_observation<D: DepthSource>(
    mode: RepresentationMode,
    shape: GridShape,
    t: TimeKey,
    image_path: PathBuf,
    depth: &D,
) -> Result<Observation> {
    if !image_path.exists() {
        return Err(RepresentationUnavailable {
            mode,
            missing: "a camera frame",
            time: t,
        }
        .into());
    }

    let (depth_grid, buffer_dims) = if mode.wants_grid() {
        let buffer = depth.load_buffer(t)?.ok_or(RepresentationUnavailable {
            mode,
            missing: "a depth buffer",
            time: t,
        })?;
        let dims = (buffer.width, buffer.height);
        let grid = sample_grid(&buffer, shape);
        debug!(rows = grid.len(), "sampled depth grid");
        (Some(grid), Some(dims))
    } else {
        (None, None)
    };

    let depth_map_path = if mode.wants_map() {
        Some(
            depth
                .rendered_map(t)?
                .ok_or(RepresentationUnavailable {
                    mode,
                    missing: "a rendered depth map",
                    time: t,
                })?,
        )
    } else {
        None
    };

    Ok(Observation {
        time: t,
        image_path,
        depth_grid,
        depth_map_path,
        buffer_dims,
    })
}

impl Observation {
    /// Image references in the order the policy expects: camera frame first,
    /// rendered depth map second when present.
    pub fn image_refs(&self) -> Vec<PathBuf> {
        let mut refs = vec![self.image_path.clone()];
        if let Some(map) = &self.depth_map_path {
            refs.push(map.clone());
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::DepthBuffer;
    use std::fs;

    struct ScriptedDepth {
        buffer: Option<DepthBuffer>,
        map: Option<PathBuf>,
    }

    impl DepthSource for ScriptedDepth {
        fn load_buffer(&self, _t: TimeKey) -> Result<Option<DepthBuffer>> {
            Ok(self.buffer.clone())
        }

        fn rendered_map(&self, _t: TimeKey) -> Result<Option<PathBuf>> {
            Ok(self.map.clone())
        }
    }

    fn buffer() -> DepthBuffer {
        DepthBuffer {
            width: 16,
            height: 9,
            values: vec![1.0; 16 * 9],
        }
    }

    fn shape() -> GridShape {
        GridShape { cols: 16, rows: 9 }
    }

    fn touch_frame(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("frame_0'0.jpg");
        fs::write(&path, b"jpeg").expect("write frame");
        path
    }

    #[test]
    fn matrix_mode_samples_the_buffer() {
        let temp = tempfile::tempdir().expect("tempdir");
        let image = touch_frame(temp.path());
        let depth = ScriptedDepth {
            buffer: Some(buffer()),
            map: None,
        };

        let observation = build_observation(
            RepresentationMode::Matrix,
            shape(),
            TimeKey::zero(),
            image,
            &depth,
        )
        .expect("observation");

        assert!(observation.depth_grid.is_some());
        assert_eq!(observation.buffer_dims, Some((16, 9)));
        assert_eq!(observation.depth_map_path, None);
        assert_eq!(observation.image_refs().len(), 1);
    }

    #[test]
    fn hybrid_mode_requires_both_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let image = touch_frame(temp.path());
        let map = temp.path().join("frame_0'0.png");
        fs::write(&map, b"png").expect("write map");
        let depth = ScriptedDepth {
            buffer: Some(buffer()),
            map: Some(map.clone()),
        };

        let observation = build_observation(
            RepresentationMode::Hybrid,
            shape(),
            TimeKey::zero(),
            image,
            &depth,
        )
        .expect("observation");

        assert!(observation.depth_grid.is_some());
        assert_eq!(observation.depth_map_path, Some(map));
        assert_eq!(observation.image_refs().len(), 2);
    }

    #[test]
    fn missing_buffer_aborts_matrix_tick() {
        let temp = tempfile::tempdir().expect("tempdir");
        let image = touch_frame(temp.path());
        let depth = ScriptedDepth {
            buffer: None,
            map: None,
        };

        let err = build_observation(
            RepresentationMode::Matrix,
            shape(),
            TimeKey::zero(),
            image,
            &depth,
        )
        .expect_err("missing buffer");
        let unavailable = err
            .downcast_ref::<RepresentationUnavailable>()
            .expect("typed error");
        assert_eq!(unavailable.missing, "a depth buffer");
    }

    #[test]
    fn missing_map_aborts_map_tick() {
        let temp = tempfile::tempdir().expect("tempdir");
        let image = touch_frame(temp.path());
        let depth = ScriptedDepth {
            buffer: Some(buffer()),
            map: None,
        };

        let err = build_observation(
            RepresentationMode::Map,
            shape(),
            TimeKey::zero(),
            image,
            &depth,
        )
        .expect_err("missing map");
        assert!(err.downcast_ref::<RepresentationUnavailable>().is_some());
    }

    #[test]
    fn missing_camera_frame_aborts_every_mode() {
        let temp = tempfile::tempdir().expect("tempdir");
        let depth = ScriptedDepth {
            buffer: Some(buffer()),
            map: None,
        };

        let err = build_observation(
            RepresentationMode::Matrix,
            shape(),
            TimeKey::zero(),
            temp.path().join("missing.jpg"),
            &depth,
        )
        .expect_err("missing frame");
        let unavailable = err
            .downcast_ref::<RepresentationUnavailable>()
            .expect("typed error");
        assert_eq!(unavailable.missing, "a camera frame");
    }
}
