use crate::subs::runnable::RunnableSubcommand;
use anyhow::Result;
use clap::Parser;
use dreamscan::config;
use dreamscan::detail;
use dreamscan::params;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Assess subject detail and print the chosen parameters", long_about = None)]
pub struct Assess {
    #[clap(long, short, help = "Input frames directory")]
    input_dir: PathBuf,

    #[clap(long, short = 'n', help = "Number of frames to sample")]
    samples: Option<usize>,

    #[clap(long, short, help = "Print as JSON")]
    json: bool,

    #[clap(long, short, help = "Configuration file")]
    config: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RunnableSubcommand for Assess {
    async fn run(&self) -> Result<()> {
        let mut config = config::load_or_default(&self.config)?;
        if let Some(n) = self.samples {
            config.detail.sample_count = n;
        }

        let assessment = detail::assess(&self.input_dir, &config.detail)?;
        let parameters = params::select(assessment.detail_level, assessment.coverage_pct);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "detail": assessment,
                    "parameters": parameters,
                }))?
            );
        } else {
            println!("Detail level:      {}", assessment.detail_level);
            println!("Average variance:  {:.2}", assessment.avg_variance);
            println!("Coverage:          {:.1}%", assessment.coverage_pct);
            println!("Valid samples:     {}", assessment.sample_count);
            println!("Parameter tier:    {:?}", parameters.tier);
            println!("  peak_threshold   {}", parameters.sift.peak_threshold);
            println!("  edge_threshold   {}", parameters.sift.edge_threshold);
            println!("  first_octave     {}", parameters.sift.first_octave);
            println!("  max_num_features {}", parameters.sift.max_num_features);
        }
        Ok(())
    }
}
