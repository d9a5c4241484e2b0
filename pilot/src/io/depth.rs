//! Depth artifact source for the estimation collaborator's output.
//!
//! The [`DepthSource`] trait decouples observation assembly from the
//! estimator's on-disk layout. Tests use scripted sources that return
//! in-memory buffers without touching the filesystem.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::sampler::DepthBuffer;
use crate::core::time::TimeKey;
use crate::io::layout::EstimatorPaths;

/// Access to per-tick depth artifacts. Either artifact may be absent; the
/// observation builder decides whether absence is fatal for the configured
/// representation mode.
pub trait DepthSource {
    /// Dense depth buffer for `t`, if the estimator produced one.
    fn load_buffer(&self, t: TimeKey) -> Result<Option<DepthBuffer>>;

    /// Rendered depth-map image for `t`, if the visualizer produced one.
    fn rendered_map(&self, t: TimeKey) -> Result<Option<PathBuf>>;
}

/// Depth source backed by an estimator output directory.
#[derive(Debug, Clone)]
pub struct EstimatorOutputDir {
    paths: EstimatorPaths,
}

impl EstimatorOutputDir {
    pub fn new(paths: EstimatorPaths) -> Self {
        Self { paths }
    }
}

impl DepthSource for EstimatorOutputDir {
    fn load_buffer(&self, t: TimeKey) -> Result<Option<DepthBuffer>> {
        let path = self.paths.buffer_path(t);
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "loading depth buffer");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("read depth buffer {}", path.display()))?;
        let buffer: DepthBuffer = serde_json::from_str(&contents)
            .with_context(|| format!("parse depth buffer {}", path.display()))?;
        let errors = buffer.validate();
        if !errors.is_empty() {
            return Err(anyhow!(
                "depth buffer {} is malformed: {}",
                path.display(),
                errors.join("; ")
            ));
        }
        Ok(Some(buffer))
    }

    fn rendered_map(&self, t: TimeKey) -> Result<Option<PathBuf>> {
        let path = self.paths.map_path(t);
        if path.exists() { Ok(Some(path)) } else { Ok(None) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn source(root: &Path) -> EstimatorOutputDir {
        EstimatorOutputDir::new(EstimatorPaths::new(root, "depth_pro", "orchard", 1))
    }

    #[test]
    fn absent_artifacts_are_none_not_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = source(temp.path());
        assert_eq!(source.load_buffer(TimeKey::zero()).expect("load"), None);
        assert_eq!(source.rendered_map(TimeKey::zero()).expect("map"), None);
    }

    #[test]
    fn loads_and_validates_buffer_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = source(temp.path());
        let path = source.paths.buffer_path(TimeKey::zero());
        fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        fs::write(&path, r#"{"width": 2, "height": 1, "values": [0.5, 1.5]}"#).expect("write");

        let buffer = source
            .load_buffer(TimeKey::zero())
            .expect("load")
            .expect("present");
        assert_eq!(buffer.width, 2);
        assert_eq!(buffer.values, vec![0.5, 1.5]);
    }

    #[test]
    fn malformed_buffer_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = source(temp.path());
        let path = source.paths.buffer_path(TimeKey::zero());
        fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        fs::write(&path, r#"{"width": 2, "height": 2, "values": [0.5]}"#).expect("write");

        let err = source.load_buffer(TimeKey::zero()).expect_err("malformed");
        assert!(err.to_string().contains("malformed"));
    }
}
