use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use dreamscan::command::SystemRunner;
use dreamscan::config;
use dreamscan::frame::count_frames;
use dreamscan::probe::{Availability, ProbeSource, ToolProbe};
use dreamscan::segment::{
    segment_frames, validate_model, BackgroundSegmenter, LuminanceSegmenter, RembgSegmenter,
};
use std::path::PathBuf;
use std::sync::Arc;

pb_create!();

#[derive(Parser)]
#[command(author, version, about = "Replace frame backgrounds with a solid color", long_about = None)]
pub struct Segment {
    #[clap(long, short, help = "Input frames directory")]
    input_dir: PathBuf,

    #[clap(long, short, help = "Output frames directory")]
    output_dir: PathBuf,

    #[clap(long, short, help = "Segmentation model (u2net, u2net_human_seg, isnet-general-use)")]
    model: Option<String>,

    #[clap(long, short, help = "Use the luminance segmenter even when rembg is installed")]
    luminance: bool,

    #[clap(long, short, help = "Also save the masks")]
    save_masks: bool,

    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RunnableSubcommand for Segment {
    async fn run(&self) -> Result<()> {
        let config = config::load_or_default(&self.config)?;
        let model = validate_model(self.model.as_deref().unwrap_or(&config.segment.model))?;

        let rembg = ToolProbe::new(
            &config.segment.command,
            vec![ProbeSource::SearchPath(config.segment.command.to_owned())],
        );
        let segmenter: Box<dyn BackgroundSegmenter> = match (self.luminance, rembg.probe()) {
            (false, Availability::Found(program)) => Box::new(RembgSegmenter::new(
                Arc::new(SystemRunner),
                &program,
                model,
            )?),
            _ => {
                if !self.luminance {
                    warn!("{} not found, using luminance segmentation", config.segment.command);
                }
                Box::new(LuminanceSegmenter {
                    floor: config.detail.content_floor,
                })
            }
        };

        pb_set_prefix!("Segmenting Frames");
        pb_set_length!(count_frames(&self.input_dir));
        let stats = segment_frames(
            segmenter.as_ref(),
            &self.input_dir,
            &self.output_dir,
            config.segment.background,
            self.save_masks || config.segment.save_masks,
            |_| {
                pb_inc!();
            },
        )
        .await?;
        pb_done!();

        println!(
            "Segmented {} of {} frames ({} errors)",
            stats.processed, stats.total, stats.errors
        );
        Ok(())
    }
}
