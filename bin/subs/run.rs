use crate::subs::reconstruct::print_outcome;
use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use dreamscan::command::SystemRunner;
use dreamscan::config;
use dreamscan::mode::ReconstructionMode;
use dreamscan::pipeline::{Coordinator, PipelineOptions, Stage};
use std::path::PathBuf;
use std::sync::Arc;

pb_create!();

#[derive(Parser)]
#[command(author, version, about = "Run the full pipeline from capture video to reconstruction", long_about = None)]
pub struct Run {
    #[clap(long, short, help = "Capture video (optional when raw_frames/ is populated)")]
    input_video: Option<PathBuf>,

    #[clap(long, short, help = "Project directory")]
    project_dir: PathBuf,

    #[clap(long, short, help = "Reconstruction mode (meshroom, splat, nerf)")]
    mode: Option<String>,

    #[clap(long, short = 'n', help = "Extract every Nth video frame")]
    every_n: Option<u32>,

    #[clap(long, short, help = "Run dense reconstruction")]
    dense: bool,

    #[clap(long, help = "Print cloud instructions instead of reconstructing locally")]
    cloud: bool,

    #[clap(long, help = "Stop after frame preparation")]
    no_reconstruct: bool,

    #[clap(long, help = "Skip background segmentation")]
    no_segment: bool,

    #[clap(long, help = "Skip auto-cropping")]
    no_crop: bool,

    #[clap(long, short = 'M', help = "Black out background artifacts before segmentation")]
    mask_artifacts: bool,

    #[clap(long, short, help = "Write the pipeline report as JSON to this file")]
    report: Option<PathBuf>,

    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "Extracting Frames",
        Stage::Filter => "Filtering Frames",
        Stage::Crop => "Cropping Frames",
        Stage::MaskArtifacts => "Masking Artifacts",
        Stage::Segment => "Segmenting Frames",
        Stage::Reconstruct => "Reconstructing",
        Stage::Done => "Done",
    }
}

#[async_trait::async_trait]
impl RunnableSubcommand for Run {
    async fn run(&self) -> Result<()> {
        let mut config = config::load_or_default(&self.config)?;
        let mode = ReconstructionMode::from(&self.mode.to_owned().unwrap_or("meshroom".to_owned()))?;

        if let Some(n) = self.every_n {
            config.pipeline.extract_every_n = n;
        }
        if self.no_segment {
            config.segment.enabled = false;
        }
        if self.no_crop {
            config.pipeline.crop = false;
        }
        if self.mask_artifacts {
            config.pipeline.mask_artifacts = true;
        }

        let coordinator = Coordinator::new(Arc::new(SystemRunner), &config);

        pb_set_length!(100);
        let report = coordinator
            .run(
                &PipelineOptions {
                    video: self.input_video.to_owned(),
                    project_dir: self.project_dir.to_owned(),
                    mode,
                    reconstruct: !self.no_reconstruct,
                    dense: self.dense,
                    cloud: self.cloud,
                },
                |stage, percent| {
                    pb_set_prefix!(stage_label(stage));
                    pb_set_position!(percent);
                },
            )
            .await?;
        pb_done!();

        for record in report.stages.iter() {
            println!("{:<16} {:?}", format!("{:?}", record.stage), record.status);
        }
        if let Some(stats) = &report.filter_stats {
            stats.print_summary();
        }
        if let Some(outcome) = &report.reconstruction {
            print_outcome(outcome);
        }
        println!("Frames ready in {:?}", report.frames_dir);

        if let Some(path) = &self.report {
            std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        }
        Ok(())
    }
}
