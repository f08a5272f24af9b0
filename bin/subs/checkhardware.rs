use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dreamscan::accel;
use dreamscan::command::SystemRunner;
use dreamscan::config;
use dreamscan::guidance;
use dreamscan::probe::{Availability, ToolProbe};
use std::path::PathBuf;

const LOCAL_DENSE_VRAM_MB: u64 = 4000;

#[derive(Parser)]
#[command(author, version, about = "Report the accelerator and reconstruction tools available", long_about = None)]
pub struct CheckHardware {
    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RunnableSubcommand for CheckHardware {
    async fn run(&self) -> Result<()> {
        let config = config::load_or_default(&self.config)?;

        let info = accel::probe(&SystemRunner, config.reconstruction.accelerator_probe_timeout_secs).await;
        if info.has_accelerator {
            println!("GPU:  {}", info.name);
            println!("VRAM: {}MB", info.vram_mb);
            if info.vram_mb >= LOCAL_DENSE_VRAM_MB {
                println!("{}", "Local dense reconstruction should be fine".green());
            } else {
                println!(
                    "{}",
                    "Under 4GB of VRAM: sparse runs locally, consider cloud for dense".yellow()
                );
            }
        } else {
            println!("{}", "No GPU detected, reconstruction will run on the CPU".yellow());
        }

        let project_root = match &config.reconstruction.project_root {
            Some(p) => p.to_owned(),
            None => std::env::current_dir()?,
        };
        match ToolProbe::colmap(&project_root).probe() {
            Availability::Found(p) => println!("COLMAP: {:?}", p),
            Availability::Missing => {
                println!("{}", "COLMAP: not found".red());
                println!("{}", guidance::install_guidance());
            }
        }
        match ToolProbe::meshroom().probe() {
            Availability::Found(p) => println!("Meshroom: {:?}", p),
            Availability::Missing => println!("Meshroom: not found (optional)"),
        }
        Ok(())
    }
}
