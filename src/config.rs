use crate::mode::ReconstructionMode;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct FilterConfig {
    pub skip_ui: bool,
    pub skip_duplicates: bool,

    /// Fraction of the frame height, from the top, searched for UI overlays
    pub ui_region_fraction: f64,
    pub ui_edge_threshold: f64,
    pub ui_color_threshold: f64,
    pub canny_low: f32,
    pub canny_high: f32,

    /// Overrides the mode's blur floor when set
    pub min_blur_score: Option<f64>,

    /// Overrides the mode's duplicate threshold when set
    pub duplicate_threshold: Option<f64>,

    /// Frames are downscaled to this square size before histogram comparison
    pub histogram_size: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            skip_ui: true,
            skip_duplicates: true,
            ui_region_fraction: 0.2,
            ui_edge_threshold: 0.15,
            ui_color_threshold: 0.05,
            canny_low: 100.0,
            canny_high: 200.0,
            min_blur_score: None,
            duplicate_threshold: None,
            histogram_size: 256,
        }
    }
}

impl FilterConfig {
    pub fn min_blur_score_for(&self, mode: ReconstructionMode) -> f64 {
        self.min_blur_score
            .unwrap_or(mode.default_min_blur_score())
    }

    pub fn duplicate_threshold_for(&self, mode: ReconstructionMode) -> f64 {
        self.duplicate_threshold
            .unwrap_or(mode.default_duplicate_threshold())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct CropConfig {
    /// Grey level a pixel must exceed to count as content
    pub content_floor: u8,
    pub padding: f64,

    /// Overwrite frames in place. When false the cropped frames land in a sibling directory.
    pub in_place: bool,
}

impl Default for CropConfig {
    fn default() -> Self {
        CropConfig {
            content_floor: 3,
            padding: 0.10,
            in_place: true,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DetailConfig {
    pub content_floor: u8,
    pub min_content_pixels: usize,
    pub sample_count: usize,
}

impl Default for DetailConfig {
    fn default() -> Self {
        DetailConfig {
            content_floor: 10,
            min_content_pixels: 100,
            sample_count: 10,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Dense MVS below this much VRAM proceeds with a warning
    pub vram_floor_mb: u64,

    /// Batches smaller than this relax the fusion consistency constraint
    pub small_batch_frames: usize,
    pub fusion_check_num_images: u32,
    pub undistort_max_image_size: u32,

    /// Directory searched for a bundled COLMAP install. Defaults to the working directory.
    pub project_root: Option<PathBuf>,
    pub accelerator_probe_timeout_secs: u64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        ReconstructionConfig {
            vram_floor_mb: 3000,
            small_batch_frames: 200,
            fusion_check_num_images: 15,
            undistort_max_image_size: 1000,
            project_root: None,
            accelerator_probe_timeout_secs: 10,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct SegmentConfig {
    pub enabled: bool,
    pub model: String,
    pub command: String,
    pub background: [u8; 3],
    pub save_masks: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        SegmentConfig {
            enabled: true,
            model: "u2net".to_owned(),
            command: "rembg".to_owned(),
            background: [0, 0, 0],
            save_masks: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct PipelineConfig {
    /// A stage whose output directory holds more than this many frames is treated as done
    pub completion_count: usize,
    pub extract_every_n: u32,
    pub crop: bool,
    pub mask_artifacts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            completion_count: 100,
            extract_every_n: 5,
            crop: true,
            mask_artifacts: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct DreamscanConfig {
    pub filter: FilterConfig,
    pub crop: CropConfig,
    pub detail: DetailConfig,
    pub reconstruction: ReconstructionConfig,
    pub segment: SegmentConfig,
    pub pipeline: PipelineConfig,
}

pub fn load_config(file_path: &Path) -> Result<DreamscanConfig> {
    if !file_path.exists() {
        Err(anyhow!("File not found: {:?}", file_path))
    } else {
        let t = std::fs::read_to_string(file_path)?;
        Ok(toml::from_str(&t)?)
    }
}

/// Loads the config file when one is given, otherwise returns the defaults.
pub fn load_or_default(file_path: &Option<PathBuf>) -> Result<DreamscanConfig> {
    if let Some(p) = file_path {
        info!("Loading configuration from {:?}", p);
        load_config(p)
    } else {
        Ok(DreamscanConfig::default())
    }
}
