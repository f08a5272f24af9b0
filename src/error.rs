use std::path::PathBuf;
use thiserror::Error;

/// Typed failures surfaced by the curation and reconstruction stages. These travel inside
/// `anyhow::Error`; callers that care about the category can `downcast_ref::<PipelineError>()`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid {what}: '{value}'. Supported: {supported}")]
    Validation {
        what: &'static str,
        value: String,
        supported: String,
    },

    #[error("Required tool not found: {0}")]
    MissingDependency(String),

    #[error("Stage '{stage}' failed: {program} exited with {}: {stderr}", exit_label(.exit_code))]
    ExternalTool {
        stage: String,
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Stage '{stage}' timed out after {seconds} seconds")]
    Timeout { stage: String, seconds: u64 },

    #[error("No frames found in {}", .0.display())]
    NoFrames(PathBuf),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {}", c),
        None => "no status (terminated by signal)".to_owned(),
    }
}

impl PipelineError {
    pub fn validation(what: &'static str, value: &str, supported: &[&str]) -> Self {
        PipelineError::Validation {
            what,
            value: value.to_owned(),
            supported: supported.join(", "),
        }
    }

    /// Stage name for failures that originate from an external invocation.
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineError::ExternalTool { stage, .. } | PipelineError::Timeout { stage, .. } => {
                Some(stage)
            }
            _ => None,
        }
    }
}
