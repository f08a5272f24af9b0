use crate::command::{run_checked, ToolCommand, ToolRunner};
use crate::config::DreamscanConfig;
use crate::crop::{self, CropReport};
use crate::error::PipelineError;
use crate::filter::{self, FrameFilter};
use crate::frame::count_frames;
use crate::mode::ReconstructionMode;
use crate::probe::{Availability, ProbeSource, ToolProbe};
use crate::reconstruct::{ReconstructOptions, ReconstructionOutcome, Reconstructor};
use crate::segment::{self, BackgroundSegmenter, LuminanceSegmenter, RembgSegmenter};
use crate::stats::{FilterStats, SegmentStats};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RAW_FRAMES_DIR: &str = "raw_frames";
pub const CLEAN_FRAMES_DIR: &str = "clean_frames";
pub const CROPPED_FRAMES_DIR: &str = "cropped_frames";
pub const MASKED_FRAMES_DIR: &str = "masked_frames";
pub const SEGMENTED_FRAMES_DIR: &str = "segmented_frames";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Filter,
    Crop,
    MaskArtifacts,
    Segment,
    Reconstruct,
    Done,
}

impl Stage {
    /// Overall progress, in percent, reported when the stage starts.
    pub fn progress(&self) -> u8 {
        match self {
            Stage::Extract => 10,
            Stage::Filter => 30,
            Stage::Crop => 40,
            Stage::MaskArtifacts => 45,
            Stage::Segment => 50,
            Stage::Reconstruct => 70,
            Stage::Done => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Ran,
    /// Output already looked complete and was reused untouched
    Reused,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub video: Option<PathBuf>,
    pub project_dir: PathBuf,
    pub mode: ReconstructionMode,
    pub reconstruct: bool,
    pub dense: bool,
    pub cloud: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageRecord>,
    pub filter_stats: Option<FilterStats>,
    pub crop: Option<CropReport>,
    pub segment_stats: Option<SegmentStats>,
    pub reconstruction: Option<ReconstructionOutcome>,

    /// Directory handed to reconstruction, or that would have been
    pub frames_dir: PathBuf,
}

impl PipelineReport {
    fn record(&mut self, stage: Stage, status: StageStatus, output_dir: Option<&Path>) {
        info!("Stage {:?}: {:?}", stage, status);
        self.stages.push(StageRecord {
            stage,
            status,
            output_dir: output_dir.map(|p| p.to_path_buf()),
        });
    }

    pub fn status_of(&self, stage: Stage) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.status)
    }
}

/// Runs the stages in order: extract, filter, crop, artifact masking, segment, reconstruct.
/// Each stage writes a directory of frames; a stage whose directory already holds more than
/// `completion_count` frames is skipped and its output reused.
///
/// One run per project directory at a time. Concurrent runs against the same directory race on
/// the destructive filter and crop writes.
pub struct Coordinator {
    runner: Arc<dyn ToolRunner>,
    config: DreamscanConfig,
    reconstructor: Reconstructor,
    segmenter: Option<Arc<dyn BackgroundSegmenter>>,
}

impl Coordinator {
    pub fn new(runner: Arc<dyn ToolRunner>, config: &DreamscanConfig) -> Self {
        Coordinator {
            runner: runner.clone(),
            config: config.clone(),
            reconstructor: Reconstructor::new(runner, config),
            segmenter: None,
        }
    }

    pub fn with_reconstructor(mut self, reconstructor: Reconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    pub fn with_segmenter(mut self, segmenter: Arc<dyn BackgroundSegmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn is_complete(&self, dir: &Path) -> bool {
        count_frames(dir) > self.config.pipeline.completion_count
    }

    pub async fn run<F>(&self, options: &PipelineOptions, on_stage: F) -> Result<PipelineReport>
    where
        F: Fn(Stage, u8) + Send + Sync,
    {
        let project = &options.project_dir;
        if self.config.segment.enabled {
            segment::validate_model(&self.config.segment.model)?;
        }
        std::fs::create_dir_all(project)?;
        let mut report = PipelineReport::default();

        // Extract
        on_stage(Stage::Extract, Stage::Extract.progress());
        let raw_dir = project.join(RAW_FRAMES_DIR);
        if self.is_complete(&raw_dir) {
            info!(
                "Found {} existing frames in {:?}, skipping extraction",
                count_frames(&raw_dir),
                raw_dir
            );
            report.record(Stage::Extract, StageStatus::Reused, Some(&raw_dir));
        } else if let Some(video) = &options.video {
            reset_stage_dir(&raw_dir)?;
            self.extract(video, &raw_dir).await?;
            report.record(Stage::Extract, StageStatus::Ran, Some(&raw_dir));
        } else if count_frames(&raw_dir) > 0 {
            info!("No video given, using the frames already in {:?}", raw_dir);
            report.record(Stage::Extract, StageStatus::Reused, Some(&raw_dir));
        } else {
            return Err(PipelineError::NoFrames(raw_dir).into());
        }

        // Filter
        on_stage(Stage::Filter, Stage::Filter.progress());
        let clean_dir = project.join(CLEAN_FRAMES_DIR);
        let filter_reused = self.is_complete(&clean_dir);
        if filter_reused {
            report.record(Stage::Filter, StageStatus::Reused, Some(&clean_dir));
        } else {
            reset_stage_dir(&clean_dir)?;
            let frame_filter = FrameFilter::new(&self.config.filter, options.mode);
            let stats = filter::filter_frames(&frame_filter, &raw_dir, &clean_dir, |_| {})?;
            report.filter_stats = Some(stats);
            report.record(Stage::Filter, StageStatus::Ran, Some(&clean_dir));
        }
        let mut current = clean_dir.clone();

        // Crop
        on_stage(Stage::Crop, Stage::Crop.progress());
        let crop_config = &self.config.crop;
        if !self.config.pipeline.crop {
            report.record(Stage::Crop, StageStatus::Disabled, None);
        } else if crop_config.in_place {
            // In-place crops leave no separate output to inspect; reused filter output was
            // already cropped by the run that produced it.
            if filter_reused {
                report.record(Stage::Crop, StageStatus::Reused, Some(&clean_dir));
            } else {
                report.crop = crop::crop_frames(&clean_dir, crop_config.content_floor, crop_config.padding, None)?;
                report.record(Stage::Crop, StageStatus::Ran, Some(&clean_dir));
            }
        } else {
            let cropped_dir = project.join(CROPPED_FRAMES_DIR);
            if self.is_complete(&cropped_dir) {
                report.record(Stage::Crop, StageStatus::Reused, Some(&cropped_dir));
                current = cropped_dir;
            } else {
                reset_stage_dir(&cropped_dir)?;
                report.crop = crop::crop_frames(
                    &clean_dir,
                    crop_config.content_floor,
                    crop_config.padding,
                    Some(&cropped_dir),
                )?;
                if report.crop.is_some() {
                    current = cropped_dir;
                }
                report.record(Stage::Crop, StageStatus::Ran, Some(&current));
            }
        }

        // Artifact masking
        on_stage(Stage::MaskArtifacts, Stage::MaskArtifacts.progress());
        if !self.config.pipeline.mask_artifacts {
            report.record(Stage::MaskArtifacts, StageStatus::Disabled, None);
        } else {
            let masked_dir = project.join(MASKED_FRAMES_DIR);
            if self.is_complete(&masked_dir) {
                report.record(Stage::MaskArtifacts, StageStatus::Reused, Some(&masked_dir));
            } else {
                reset_stage_dir(&masked_dir)?;
                crop::mask_artifacts(&current, &masked_dir, crop_config.content_floor)?;
                report.record(Stage::MaskArtifacts, StageStatus::Ran, Some(&masked_dir));
            }
            current = masked_dir;
        }

        // Segment
        on_stage(Stage::Segment, Stage::Segment.progress());
        if !self.config.segment.enabled {
            report.record(Stage::Segment, StageStatus::Disabled, None);
        } else {
            let seg_dir = project.join(SEGMENTED_FRAMES_DIR);
            if self.is_complete(&seg_dir) {
                report.record(Stage::Segment, StageStatus::Reused, Some(&seg_dir));
            } else {
                let segmenter = self.segmenter()?;
                reset_stage_dir(&seg_dir)?;
                let stats = segment::segment_frames(
                    segmenter.as_ref(),
                    &current,
                    &seg_dir,
                    self.config.segment.background,
                    self.config.segment.save_masks,
                    |_| {},
                )
                .await?;
                report.segment_stats = Some(stats);
                report.record(Stage::Segment, StageStatus::Ran, Some(&seg_dir));
            }
            current = seg_dir;
        }

        // Reconstruct
        on_stage(Stage::Reconstruct, Stage::Reconstruct.progress());
        if options.reconstruct {
            let outcome = self
                .reconstructor
                .reconstruct(
                    &current,
                    project,
                    &ReconstructOptions {
                        mode: options.mode,
                        dense: options.dense,
                        cloud: options.cloud,
                        accelerator: None,
                        frames_archive: None,
                    },
                )
                .await?;
            report.reconstruction = Some(outcome);
            report.record(Stage::Reconstruct, StageStatus::Ran, Some(&project.join("reconstruction")));
        } else {
            report.record(Stage::Reconstruct, StageStatus::Disabled, None);
        }

        report.frames_dir = current;
        on_stage(Stage::Done, Stage::Done.progress());
        Ok(report)
    }

    /// The injected segmenter, else `rembg` when installed, else the luminance fallback.
    fn segmenter(&self) -> Result<Arc<dyn BackgroundSegmenter>> {
        let model = segment::validate_model(&self.config.segment.model)?;
        if let Some(s) = &self.segmenter {
            return Ok(s.clone());
        }
        let command = &self.config.segment.command;
        let probe = ToolProbe::new(command, vec![ProbeSource::SearchPath(command.to_owned())]);
        match probe.probe() {
            Availability::Found(program) => Ok(Arc::new(RembgSegmenter::new(
                self.runner.clone(),
                &program,
                model,
            )?)),
            Availability::Missing => {
                warn!(
                    "{} not found, falling back to luminance segmentation (pip install rembg[cli] for model-based masks)",
                    command
                );
                Ok(Arc::new(LuminanceSegmenter {
                    floor: self.config.detail.content_floor,
                }))
            }
        }
    }

    async fn extract(&self, video: &Path, raw_dir: &Path) -> Result<()> {
        if !video.exists() {
            return Err(anyhow!("File not found: {:?}", video));
        }
        std::fs::create_dir_all(raw_dir)?;
        let every_n = self.config.pipeline.extract_every_n.max(1);
        info!("Extracting every {} frame(s) from {:?}", every_n, video);

        run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("extract", "ffmpeg")
                .args(["-hide_banner", "-loglevel", "error", "-y"])
                .arg("-i")
                .arg(video.to_string_lossy())
                .arg("-vf")
                .arg(format!("select=not(mod(n\\,{}))", every_n))
                .args(["-vsync", "vfr", "-start_number", "0"])
                .arg(raw_dir.join("frame_%06d.png").to_string_lossy()),
        )
        .await?;
        info!("Extracted {} frames", count_frames(raw_dir));
        Ok(())
    }
}

/// Drops whatever an earlier, incomplete run left in a stage directory so frames it kept cannot
/// leak into this run's output.
fn reset_stage_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        info!("Clearing partial stage output in {:?}", dir);
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
