use crate::error::PipelineError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionMode {
    /// Mesh photogrammetry (COLMAP / Meshroom)
    #[default]
    Meshroom,
    /// Gaussian splat training
    Splat,
    /// Neural radiance field training
    Nerf,
}

pub const SUPPORTED_MODES: [&str; 3] = ["meshroom", "splat", "nerf"];

impl ReconstructionMode {
    pub fn from(s: &str) -> Result<ReconstructionMode> {
        match s.to_lowercase().as_str() {
            "meshroom" => Ok(ReconstructionMode::Meshroom),
            "splat" => Ok(ReconstructionMode::Splat),
            "nerf" => Ok(ReconstructionMode::Nerf),
            _ => Err(PipelineError::validation("reconstruction mode", s, &SUPPORTED_MODES).into()),
        }
    }

    /// Volumetric trainers densify on their own, so only mesh mode runs local MVS.
    pub fn supports_dense(&self) -> bool {
        *self == ReconstructionMode::Meshroom
    }

    /// Laplacian variance floor below which a frame is dropped as blurry. Volumetric training
    /// tolerates soft frames much better than feature matching does.
    pub fn default_min_blur_score(&self) -> f64 {
        match self {
            ReconstructionMode::Meshroom => 5.0,
            ReconstructionMode::Splat | ReconstructionMode::Nerf => 2.0,
        }
    }

    /// Histogram correlation above which a frame counts as a duplicate of the last kept frame.
    pub fn default_duplicate_threshold(&self) -> f64 {
        match self {
            ReconstructionMode::Meshroom => 0.95,
            ReconstructionMode::Splat | ReconstructionMode::Nerf => 0.98,
        }
    }
}

impl fmt::Display for ReconstructionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconstructionMode::Meshroom => "meshroom",
            ReconstructionMode::Splat => "splat",
            ReconstructionMode::Nerf => "nerf",
        };
        write!(f, "{}", s)
    }
}
