//! Shared deterministic types for the decision loop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which depth artifacts accompany the camera image in an observation.
///
/// The variant statically determines the required artifacts; the observation
/// builder enforces the requirement, and the prompt composer selects the
/// matching instruction text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationMode {
    /// Downsampled numeric depth grid only.
    Matrix,
    /// Rendered depth-map image only.
    Map,
    /// Both the grid and the rendered map.
    Hybrid,
}

impl RepresentationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matrix => "matrix",
            Self::Map => "map",
            Self::Hybrid => "hybrid",
        }
    }

    /// True when the mode supplies the numeric depth grid.
    pub fn wants_grid(self) -> bool {
        matches!(self, Self::Matrix | Self::Hybrid)
    }

    /// True when the mode supplies the rendered depth map.
    pub fn wants_map(self) -> bool {
        matches!(self, Self::Map | Self::Hybrid)
    }
}

impl fmt::Display for RepresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepresentationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matrix" => Ok(Self::Matrix),
            "map" => Ok(Self::Map),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unknown representation mode '{other}' (expected matrix, map or hybrid)"
            )),
        }
    }
}

/// Nominal downsampling shape for the depth grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub cols: u32,
    pub rows: u32,
}

/// Grid shapes the policy instruction set is written for.
pub const GRID_CATALOGUE: [GridShape; 3] = [
    GridShape { cols: 16, rows: 9 },
    GridShape { cols: 32, rows: 18 },
    GridShape { cols: 64, rows: 36 },
];

impl GridShape {
    /// Look up the catalogue shape with the given column count.
    pub fn from_cols(cols: u32) -> Option<Self> {
        GRID_CATALOGUE.iter().copied().find(|shape| shape.cols == cols)
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}
