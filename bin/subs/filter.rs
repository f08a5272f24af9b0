use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use dreamscan::config;
use dreamscan::filter::{filter_frames, FrameFilter};
use dreamscan::frame::count_frames;
use dreamscan::mode::ReconstructionMode;
use std::path::PathBuf;

pb_create!();

#[derive(Parser)]
#[command(author, version, about = "Drop overlay, blurry and duplicate frames", long_about = None)]
pub struct Filter {
    #[clap(long, short, help = "Input frames directory")]
    input_dir: PathBuf,

    #[clap(long, short, help = "Output frames directory")]
    output_dir: PathBuf,

    #[clap(long, short, help = "Reconstruction mode (meshroom, splat, nerf)")]
    mode: Option<String>,

    #[clap(long, short = 'b', help = "Minimum blur score (Laplacian variance)")]
    min_blur: Option<f64>,

    #[clap(long, short = 'd', help = "Duplicate histogram correlation threshold")]
    duplicate_threshold: Option<f64>,

    #[clap(long, help = "Keep frames with UI overlays")]
    keep_ui: bool,

    #[clap(long, help = "Keep near-duplicate frames")]
    keep_duplicates: bool,

    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RunnableSubcommand for Filter {
    async fn run(&self) -> Result<()> {
        let mut config = config::load_or_default(&self.config)?;
        let mode = ReconstructionMode::from(&self.mode.to_owned().unwrap_or("meshroom".to_owned()))?;

        if self.min_blur.is_some() {
            config.filter.min_blur_score = self.min_blur;
        }
        if self.duplicate_threshold.is_some() {
            config.filter.duplicate_threshold = self.duplicate_threshold;
        }
        if self.keep_ui {
            config.filter.skip_ui = false;
        }
        if self.keep_duplicates {
            config.filter.skip_duplicates = false;
        }

        let frame_filter = FrameFilter::new(&config.filter, mode);

        pb_set_prefix!("Filtering Frames");
        pb_set_length!(count_frames(&self.input_dir));
        let stats = filter_frames(&frame_filter, &self.input_dir, &self.output_dir, |_| {
            pb_inc!();
        })?;
        pb_done!();

        stats.print_summary();
        Ok(())
    }
}
