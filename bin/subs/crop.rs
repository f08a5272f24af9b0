use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use dreamscan::config;
use dreamscan::crop;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Crop a frame set to the union of its content bounds", long_about = None)]
pub struct Crop {
    #[clap(long, short, help = "Input frames directory")]
    input_dir: PathBuf,

    #[clap(long, short, help = "Output directory (default: crop in place)")]
    output_dir: Option<PathBuf>,

    #[clap(long, short = 'f', help = "Content grey level floor")]
    floor: Option<u8>,

    #[clap(long, short, help = "Padding as a fraction of the content extent")]
    padding: Option<f64>,

    #[clap(long, short = 'M', help = "Black out background artifacts into this directory")]
    mask_dir: Option<PathBuf>,

    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RunnableSubcommand for Crop {
    async fn run(&self) -> Result<()> {
        let config = config::load_or_default(&self.config)?;
        let floor = self.floor.unwrap_or(config.crop.content_floor);
        let padding = self.padding.unwrap_or(config.crop.padding);

        match crop::crop_frames(&self.input_dir, floor, padding, self.output_dir.as_deref())? {
            Some(report) => {
                println!(
                    "Cropped {} frames: {}x{} -> {}x{} ({:.1}% smaller)",
                    report.frames_cropped,
                    report.original_width,
                    report.original_height,
                    report.cropped_width,
                    report.cropped_height,
                    report.reduction_pct
                );
            }
            None => println!("No content found, frames left as they were"),
        }

        if let Some(mask_dir) = &self.mask_dir {
            let source = self.output_dir.as_ref().unwrap_or(&self.input_dir);
            let n = crop::mask_artifacts(source, mask_dir, floor)?;
            println!("Masked {} frames into {:?}", n, mask_dir);
        }
        Ok(())
    }
}
