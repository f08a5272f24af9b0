use crate::command::{ToolCommand, ToolRunner};
use serde::Serialize;
use std::time::Duration;

pub const PROBE_PROGRAM: &str = "nvidia-smi";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceleratorInfo {
    pub has_accelerator: bool,
    pub vram_mb: u64,
    pub name: String,
}

impl Default for AcceleratorInfo {
    fn default() -> Self {
        AcceleratorInfo {
            has_accelerator: false,
            vram_mb: 0,
            name: "none".to_owned(),
        }
    }
}

/// Parses `name, memory.total` lines. The first well-formed device wins.
pub fn parse_probe_output(text: &str) -> AcceleratorInfo {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(|p| p.trim()).collect();
            if parts.len() < 2 || parts[0].is_empty() {
                return None;
            }
            let vram = parts[1].parse::<f64>().ok()?;
            Some(AcceleratorInfo {
                has_accelerator: true,
                vram_mb: vram.max(0.0) as u64,
                name: parts[0].to_owned(),
            })
        })
        .next()
        .unwrap_or_default()
}

pub fn probe_command(timeout_secs: u64) -> ToolCommand {
    ToolCommand::new("accelerator_probe", PROBE_PROGRAM)
        .arg("--query-gpu=name,memory.total")
        .arg("--format=csv,noheader,nounits")
        .with_timeout(Duration::from_secs(timeout_secs))
}

/// Queries the accelerator. A missing probe tool, a timeout or a failed query all mean "no
/// accelerator"; none of them is an error.
pub async fn probe(runner: &dyn ToolRunner, timeout_secs: u64) -> AcceleratorInfo {
    let cmd = probe_command(timeout_secs);
    match runner.run(&cmd).await {
        Ok(output) if cmd.is_success(&output) => parse_probe_output(&output.stdout),
        Ok(_) => AcceleratorInfo::default(),
        Err(why) => {
            info!("No accelerator detected: {}", why);
            AcceleratorInfo::default()
        }
    }
}
