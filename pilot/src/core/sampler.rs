//! Center-of-cell downsampling of dense depth buffers.

use serde::{Deserialize, Serialize};

use crate::core::types::GridShape;

/// Dense per-pixel metric depth, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthBuffer {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
}

impl DepthBuffer {
    /// Check shape consistency. Returns stable error messages (empty on success).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.width == 0 || self.height == 0 {
            errors.push(format!(
                "buffer dimensions must be positive (got {}x{})",
                self.width, self.height
            ));
        }
        if self.values.len() != self.width * self.height {
            errors.push(format!(
                "buffer holds {} values for a {}x{} shape",
                self.values.len(),
                self.width,
                self.height
            ));
        }
        errors
    }

    fn at(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x]
    }
}

/// Downsample `buffer` to roughly `shape` using center-of-cell sampling.
///
/// The sampling interval is derived from the width only and applied to both
/// axes, so the achieved row count matches `shape.rows` only when the buffer
/// aspect ratio matches the shape's. Deterministic: identical buffer and
/// shape produce identical output. When the grid is finer than the buffer
/// (interval < 1) the step clamps to one pixel and the output degenerates to
/// a near-dense copy.
pub fn sample_grid(buffer: &DepthBuffer, shape: GridShape) -> Vec<Vec<f64>> {
    let interval = buffer.width as f64 / shape.cols as f64;
    let step = (interval as usize).max(1);
    let start = (interval / 2.0) as usize;

    let mut rows = Vec::new();
    let mut y = start;
    while y < buffer.height {
        let mut row = Vec::new();
        let mut x = start;
        while x < buffer.width {
            row.push(round2(buffer.at(x, y)));
            x += step;
        }
        rows.push(row);
        y += step;
    }
    rows
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
