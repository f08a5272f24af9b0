use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use dreamscan::command::SystemRunner;
use dreamscan::config;
use dreamscan::mode::ReconstructionMode;
use dreamscan::reconstruct::{ReconstructOptions, ReconstructionOutcome, Reconstructor};
use std::path::PathBuf;
use std::sync::Arc;

pb_create_spinner!();

#[derive(Parser)]
#[command(author, version, about = "Reconstruct a curated frame set", long_about = None)]
pub struct Reconstruct {
    #[clap(long, short, help = "Curated frames directory")]
    frames_dir: PathBuf,

    #[clap(long, short, help = "Output directory")]
    output_dir: PathBuf,

    #[clap(long, short, help = "Reconstruction mode (meshroom, splat, nerf)")]
    mode: Option<String>,

    #[clap(long, short, help = "Run dense reconstruction after the sparse model")]
    dense: bool,

    #[clap(long, help = "Print cloud instructions instead of running locally")]
    cloud: bool,

    #[clap(long, short, help = "Frames archive to mention in cloud instructions")]
    archive: Option<PathBuf>,

    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RunnableSubcommand for Reconstruct {
    async fn run(&self) -> Result<()> {
        let config = config::load_or_default(&self.config)?;
        let mode = ReconstructionMode::from(&self.mode.to_owned().unwrap_or("meshroom".to_owned()))?;

        let reconstructor = Reconstructor::new(Arc::new(SystemRunner), &config);
        pb_set_prefix!("Reconstructing");
        let outcome = reconstructor
            .reconstruct(
                &self.frames_dir,
                &self.output_dir,
                &ReconstructOptions {
                    mode,
                    dense: self.dense,
                    cloud: self.cloud,
                    accelerator: None,
                    frames_archive: self.archive.to_owned(),
                },
            )
            .await?;
        pb_done!();

        print_outcome(&outcome);
        Ok(())
    }
}

pub fn print_outcome(outcome: &ReconstructionOutcome) {
    match outcome {
        ReconstructionOutcome::CloudGuidance { .. } | ReconstructionOutcome::NoLocalTool { .. } => {}
        ReconstructionOutcome::Meshroom {
            detail, meshroom, ..
        } => {
            println!("Detail level: {}", detail.detail_level);
            println!("Meshroom output: {:?}", meshroom.output_dir);
            if let Some(mesh) = &meshroom.mesh_path {
                println!("Mesh: {:?}", mesh);
            }
        }
        ReconstructionOutcome::Local {
            accelerator,
            detail,
            parameters,
            sparse,
            dense,
            dense_skipped,
            warnings,
            ..
        } => {
            println!("Accelerator:  {} ({}MB)", accelerator.name, accelerator.vram_mb);
            println!("Detail level: {} ({:?} parameters)", detail.detail_level, parameters.tier);
            println!("Sparse models: {}", sparse.num_models);
            if let Some(ply) = &sparse.ply_path {
                println!("Sparse cloud: {:?}", ply);
            }
            if let Some(dense) = dense {
                println!("Dense cloud:  {:?}", dense.ply_path);
                if let Some(mesh) = &dense.mesh_path {
                    println!("Mesh:         {:?}", mesh);
                }
            }
            if let Some(reason) = dense_skipped {
                println!("Dense skipped: {:?}", reason);
            }
            for w in warnings {
                println!("Warning: {}", w);
            }
        }
    }
}
