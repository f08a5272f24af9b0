use crate::config::DetailConfig;
use crate::frame::{list_frames, Frame};
use crate::sharpness;
use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const HIGH_DETAIL_VARIANCE: f64 = 15.0;
pub const MEDIUM_DETAIL_VARIANCE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl DetailLevel {
    pub fn classify(avg_variance: f64) -> DetailLevel {
        if avg_variance >= HIGH_DETAIL_VARIANCE {
            DetailLevel::High
        } else if avg_variance >= MEDIUM_DETAIL_VARIANCE {
            DetailLevel::Medium
        } else {
            DetailLevel::Low
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DetailLevel::High => "high",
            DetailLevel::Medium => "medium",
            DetailLevel::Low => "low",
            DetailLevel::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetailAssessment {
    pub avg_variance: f64,
    pub detail_level: DetailLevel,
    pub coverage_pct: f64,
    pub sample_count: usize,
}

impl DetailAssessment {
    pub fn unknown() -> Self {
        DetailAssessment {
            avg_variance: 0.0,
            detail_level: DetailLevel::Unknown,
            coverage_pct: 0.0,
            sample_count: 0,
        }
    }

    /// Builds an assessment from per-sample `(variance, coverage_pct)` measurements.
    pub fn from_samples(samples: &[(f64, f64)]) -> Self {
        if samples.is_empty() {
            return DetailAssessment::unknown();
        }
        let n = samples.len() as f64;
        let avg_variance = samples.iter().map(|(v, _)| v).sum::<f64>() / n;
        let coverage_pct = samples.iter().map(|(_, c)| c).sum::<f64>() / n;
        DetailAssessment {
            avg_variance,
            detail_level: DetailLevel::classify(avg_variance),
            coverage_pct,
            sample_count: samples.len(),
        }
    }
}

/// Picks `sample_count` frames evenly spaced across the sequence.
pub fn sample_frames(frames: &[Frame], sample_count: usize) -> Vec<Frame> {
    if sample_count == 0 {
        return vec![];
    }
    let step = (frames.len() / sample_count).max(1);
    frames
        .iter()
        .step_by(step)
        .take(sample_count)
        .cloned()
        .collect()
}

fn measure_sample(frame: &Frame, config: &DetailConfig) -> Option<(f64, f64)> {
    let gray = match image::open(&frame.path) {
        Ok(img) => img.to_luma8(),
        Err(why) => {
            warn!("Unable to read sample {:?}: {}", frame.path, why);
            return None;
        }
    };

    let mask = sharpness::content_mask(&gray, config.content_floor);
    let content_pixels = mask.iter().filter(|m| **m).count();
    if content_pixels < config.min_content_pixels || mask.is_empty() {
        return None;
    }

    let coverage = content_pixels as f64 / mask.len() as f64 * 100.0;
    let variance = sharpness::masked_laplacian_variance(&gray, &mask);
    Some((variance, coverage))
}

/// Classifies how sharp and how large the subject is across `frames_dir`. Sharpness is measured
/// only inside the content mask of each sample.
pub fn assess(frames_dir: &Path, config: &DetailConfig) -> Result<DetailAssessment> {
    let frames = list_frames(frames_dir)?;
    let samples = sample_frames(&frames, config.sample_count);

    let measurements = samples
        .par_iter()
        .filter_map(|f| measure_sample(f, config))
        .collect::<Vec<(f64, f64)>>();

    let assessment = DetailAssessment::from_samples(&measurements);
    info!(
        "Content: {} detail (variance: {:.2}, coverage: {:.1}%, {} valid samples)",
        assessment.detail_level,
        assessment.avg_variance,
        assessment.coverage_pct,
        assessment.sample_count
    );
    Ok(assessment)
}
