use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use dreamscan::config;
use dreamscan::crop::content_mask_preview;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Paint the content mask over a frame to tune the floor", long_about = None)]
pub struct ThreshTest {
    #[clap(long, short, help = "Input frame")]
    input_file: PathBuf,

    #[clap(long, short, help = "Output image")]
    output: PathBuf,

    #[clap(long, short, help = "Content grey level floor")]
    threshold: Option<u8>,

    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RunnableSubcommand for ThreshTest {
    async fn run(&self) -> Result<()> {
        let config = config::load_or_default(&self.config)?;
        let floor = self.threshold.unwrap_or(config.crop.content_floor);

        let frame = image::open(&self.input_file)?.to_rgb8();
        let result = content_mask_preview(&frame, floor);
        result.save(&self.output)?;

        info!("Wrote content preview at floor {} to {:?}", floor, self.output);
        Ok(())
    }
}
