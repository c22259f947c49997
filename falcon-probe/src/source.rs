//! Report sources
//!
//! Where a collection cycle gets its report text from: the live status
//! command, or a report saved earlier with `falconctl stats > file`.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::{run_command, CommandError, FalconctlConfig};

/// Produces one raw report per call
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Human readable origin, for logs
    fn describe(&self) -> String;

    /// Capture a fresh report
    async fn capture(&self) -> Result<String, CommandError>;
}

/// Live `falconctl stats` invocation
#[derive(Debug, Clone, Default)]
pub struct Falconctl {
    config: FalconctlConfig,
}

impl Falconctl {
    pub fn new(config: FalconctlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FalconctlConfig {
        &self.config
    }
}

#[async_trait]
impl ReportSource for Falconctl {
    fn describe(&self) -> String {
        format!("{} {}", self.config.program.display(), self.config.args.join(" "))
    }

    async fn capture(&self) -> Result<String, CommandError> {
        run_command(&self.config).await
    }
}

/// A saved report read from disk
#[derive(Debug, Clone)]
pub struct ReportFile {
    path: PathBuf,
}

impl ReportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSource for ReportFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn capture(&self) -> Result<String, CommandError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CommandError::Io {
                program: self.describe(),
                source,
            })
    }
}
