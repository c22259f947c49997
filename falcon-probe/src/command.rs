//! falconctl process runner
//!
//! Spawns the status command, waits for it with a deadline and captures
//! stdout. The child is killed when the deadline passes.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use falcon_core::{DEFAULT_FALCONCTL, DEFAULT_TIMEOUT_SECS, STATS_ARG};

/// Status command configuration
#[derive(Debug, Clone)]
pub struct FalconctlConfig {
    /// Executable path (default: /Library/CS/falconctl)
    pub program: PathBuf,
    /// Arguments (default: `stats`)
    pub args: Vec<String>,
    /// Maximum time to wait for the process
    pub timeout: Duration,
}

impl Default for FalconctlConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_FALCONCTL),
            args: vec![STATS_ARG.to_string()],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FalconctlConfig {
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Failures of the status command; no report is available after any of them
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("Failed to read output of {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run the status command and return its stdout
pub async fn run_command(config: &FalconctlConfig) -> Result<String, CommandError> {
    let program = config.program.display().to_string();

    debug!("Running {} {}", program, config.args.join(" "));

    let child = Command::new(&config.program)
        .args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Dropping the wait future on timeout drops the child, which kills it
    let output = match timeout(config.timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| CommandError::Io {
            program: program.clone(),
            source,
        })?,
        Err(_) => {
            warn!("{} timed out after {:?}, killed", program, config.timeout);
            return Err(CommandError::Timeout {
                program,
                timeout: config.timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(CommandError::Status {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!("{} produced {} bytes", program, output.stdout.len());

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn shell(script: &str) -> FalconctlConfig {
        FalconctlConfig::default()
            .with_program("/bin/sh")
            .with_args(["-c", script])
    }

    #[test]
    fn test_default_config() {
        let config = FalconctlConfig::default();
        assert_eq!(config.program, PathBuf::from("/Library/CS/falconctl"));
        assert_eq!(config.args, vec!["stats".to_string()]);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = run_command(&shell("printf '   Capacity: 42\\n'")).await.unwrap();
        assert_eq!(out, "   Capacity: 42\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let err = run_command(&shell("echo broken >&2; exit 3")).await.unwrap_err();
        match err {
            CommandError::Status { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let config = FalconctlConfig::default().with_program("/nonexistent/falconctl");
        let err = run_command(&config).await.unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let config = shell("sleep 10").with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = run_command(&config).await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
