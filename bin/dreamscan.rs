mod subs;
use anyhow::Result;
use colored::Colorize;
use subs::runnable::RunnableSubcommand;
use subs::*;

#[macro_use]
extern crate stump;

extern crate wild;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(name = "dreamscan")]
#[clap(about = "Frame curation and reconstruction for captured sculpt footage", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: DreamScan,

    #[clap(long, short, help = "Verbose output")]
    verbose: bool,
}

#[derive(Subcommand)]
enum DreamScan {
    Run(run::Run),
    Filter(filter::Filter),
    Crop(crop::Crop),
    Segment(segment::Segment),
    Assess(assess::Assess),
    Reconstruct(reconstruct::Reconstruct),
    CheckHardware(checkhardware::CheckHardware),
    ThreshTest(threshtest::ThreshTest),
}

impl DreamScan {
    async fn run(&self) -> Result<()> {
        match self {
            DreamScan::Run(args) => args.run().await,
            DreamScan::Filter(args) => args.run().await,
            DreamScan::Crop(args) => args.run().await,
            DreamScan::Segment(args) => args.run().await,
            DreamScan::Assess(args) => args.run().await,
            DreamScan::Reconstruct(args) => args.run().await,
            DreamScan::CheckHardware(args) => args.run().await,
            DreamScan::ThreshTest(args) => args.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let started = std::time::Instant::now();

    // Warnings and errors only; --verbose or the stump environment override shows the rest
    stump::set_min_log_level(stump::LogEntryLevel::WARN);

    let args = Cli::parse_from(wild::args());
    if args.verbose {
        stump::set_verbose(true);
    }

    if let Err(why) = args.command.run().await {
        error!("{}", "dreamscan failed:".red());
        error!("{}", why);
    }
    info!("Finished in {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}
