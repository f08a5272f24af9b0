use crate::config::FilterConfig;
use crate::frame::{list_frames, Frame};
use crate::histogram::HueSatHistogram;
use crate::mode::ReconstructionMode;
use crate::overlay;
use crate::sharpness;
use crate::stats::FilterStats;
use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "frames_manifest.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UiOverlay,
    Blur,
    Duplicate,
    ReadError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterVerdict {
    Kept,
    Dropped(DropReason),
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub frame: Frame,
    pub verdict: FilterVerdict,
    pub blur_score: Option<f64>,
}

/// The reference a candidate frame is compared against for duplicate detection: the most
/// recently *kept* frame, never the preceding raw frame. Threaded through the scan as a fold
/// accumulator.
#[derive(Debug, Clone)]
pub struct LastKept<S> {
    anchor: Option<S>,
}

impl<S> Default for LastKept<S> {
    fn default() -> Self {
        LastKept { anchor: None }
    }
}

impl<S> LastKept<S> {
    pub fn is_duplicate<F>(&self, candidate: &S, threshold: f64, similarity: F) -> bool
    where
        F: Fn(&S, &S) -> f64,
    {
        match &self.anchor {
            Some(anchor) => similarity(candidate, anchor) > threshold,
            None => false,
        }
    }

    pub fn keep(self, signature: S) -> Self {
        LastKept {
            anchor: Some(signature),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameFilter {
    pub config: FilterConfig,
    pub min_blur_score: f64,
    pub duplicate_threshold: f64,
}

impl FrameFilter {
    pub fn new(config: &FilterConfig, mode: ReconstructionMode) -> Self {
        FrameFilter {
            config: config.to_owned(),
            min_blur_score: config.min_blur_score_for(mode),
            duplicate_threshold: config.duplicate_threshold_for(mode),
        }
    }

    /// Applies the checks to one frame in order, stopping at the first that drops it. Kept
    /// frames return the histogram that becomes the next duplicate anchor.
    pub fn evaluate(
        &self,
        frame: &Frame,
        last_kept: &LastKept<HueSatHistogram>,
    ) -> (FilterVerdict, Option<f64>, Option<HueSatHistogram>) {
        let image = match image::open(&frame.path) {
            Ok(img) => img.to_rgb8(),
            Err(why) => {
                warn!("Unable to read frame {:?}: {}", frame.path, why);
                return (FilterVerdict::Dropped(DropReason::ReadError), None, None);
            }
        };

        if self.config.skip_ui && overlay::has_ui_overlay(&image, &self.config) {
            return (FilterVerdict::Dropped(DropReason::UiOverlay), None, None);
        }

        let gray = image::imageops::grayscale(&image);
        let blur_score = sharpness::laplacian_variance(&gray);
        if blur_score < self.min_blur_score {
            return (
                FilterVerdict::Dropped(DropReason::Blur),
                Some(blur_score),
                None,
            );
        }

        if !self.config.skip_duplicates {
            return (FilterVerdict::Kept, Some(blur_score), None);
        }

        let histogram = HueSatHistogram::from_image(&image, self.config.histogram_size);
        if last_kept.is_duplicate(&histogram, self.duplicate_threshold, |a, b| a.correlation(b)) {
            (
                FilterVerdict::Dropped(DropReason::Duplicate),
                Some(blur_score),
                None,
            )
        } else {
            (FilterVerdict::Kept, Some(blur_score), Some(histogram))
        }
    }
}

fn tally(stats: &mut FilterStats, verdict: FilterVerdict) {
    match verdict {
        FilterVerdict::Kept => stats.kept += 1,
        FilterVerdict::Dropped(DropReason::UiOverlay) => stats.ui_filtered += 1,
        FilterVerdict::Dropped(DropReason::Blur) => stats.blur_filtered += 1,
        FilterVerdict::Dropped(DropReason::Duplicate) => stats.duplicate_filtered += 1,
        FilterVerdict::Dropped(DropReason::ReadError) => stats.errors += 1,
    }
}

pub fn write_manifest(output_dir: &Path, stats: &FilterStats, kept: &[String]) -> Result<()> {
    let mut f = File::create(output_dir.join(MANIFEST_FILE_NAME))?;
    writeln!(f, "# Preprocessed frames for photogrammetry")?;
    writeln!(f, "# Total: {} frames", stats.kept)?;
    writeln!(f, "# UI filtered: {}", stats.ui_filtered)?;
    writeln!(f, "# Blur filtered: {}", stats.blur_filtered)?;
    writeln!(f, "# Duplicate filtered: {}", stats.duplicate_filtered)?;
    writeln!(f, "# Errors: {}", stats.errors)?;
    writeln!(f)?;
    for name in kept {
        writeln!(f, "{}", name)?;
    }
    Ok(())
}

/// Filters the frames of `input_dir` in sequence order, copying survivors into `output_dir`
/// and writing a manifest beside them. Unreadable frames are counted, never fatal.
pub fn filter_frames<F>(
    filter: &FrameFilter,
    input_dir: &Path,
    output_dir: &Path,
    on_frame_checked: F,
) -> Result<FilterStats>
where
    F: Fn(&FilterOutcome),
{
    let frames = list_frames(input_dir)?;
    std::fs::create_dir_all(output_dir)?;
    info!(
        "Filtering {} frames from {:?} (blur floor {}, duplicate threshold {})",
        frames.len(),
        input_dir,
        filter.min_blur_score,
        filter.duplicate_threshold
    );

    let stats = FilterStats {
        total: frames.len(),
        ..Default::default()
    };

    let (_, stats, kept) = frames.into_iter().try_fold(
        (LastKept::default(), stats, Vec::<String>::new()),
        |(last_kept, mut stats, mut kept), frame| -> Result<_> {
            let (verdict, blur_score, signature) = filter.evaluate(&frame, &last_kept);
            tally(&mut stats, verdict);

            let last_kept = if verdict == FilterVerdict::Kept {
                let name = frame.file_name();
                std::fs::copy(&frame.path, output_dir.join(&name))?;
                kept.push(name);
                match signature {
                    Some(s) => last_kept.keep(s),
                    None => last_kept,
                }
            } else {
                last_kept
            };

            on_frame_checked(&FilterOutcome {
                frame,
                verdict,
                blur_score,
            });
            Ok((last_kept, stats, kept))
        },
    )?;

    write_manifest(output_dir, &stats, &kept)?;
    info!("Kept {} of {} frames", stats.kept, stats.total);
    Ok(stats)
}
