use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::Environment;
use crate::health::{CheckOutcome, HealthCheck};

/// Reports that the process is up and serving, with its uptime.
pub struct ApplicationCheck {
    started_at: Instant,
    version: String,
    environment: Environment,
}

impl ApplicationCheck {
    pub fn new(started_at: Instant, version: impl Into<String>, environment: Environment) -> Self {
        ApplicationCheck {
            started_at,
            version: version.into(),
            environment,
        }
    }
}

#[async_trait]
impl HealthCheck for ApplicationCheck {
    fn name(&self) -> &'static str {
        "application"
    }

    async fn check(&self) -> CheckOutcome {
        CheckOutcome::healthy("Application is running")
            .with("uptime_seconds", self.started_at.elapsed().as_secs())
            .with("version", self.version.clone())
            .with("environment", self.environment.as_str())
    }
}

/// Host-level facts, plus whether the log directory is still usable.
pub struct SystemCheck {
    log_directory: Option<PathBuf>,
}

impl SystemCheck {
    /// `log_directory` is `None` when file logging is disabled.
    pub fn new(log_directory: Option<PathBuf>) -> Self {
        SystemCheck { log_directory }
    }
}

#[async_trait]
impl HealthCheck for SystemCheck {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn check(&self) -> CheckOutcome {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let Some(dir) = &self.log_directory else {
            return CheckOutcome::healthy("System resources available").with("cpus", cpus);
        };

        let outcome = match try_write(dir).await {
            Ok(()) => CheckOutcome::healthy("System resources available"),
            Err(e) => CheckOutcome::unhealthy(
                "Log directory is not writable",
                format!("{}: {e}", dir.display()),
            ),
        };

        outcome
            .with("cpus", cpus)
            .with("log_directory", dir.display().to_string())
    }
}

/// Creates and removes a scratch file, so the result reflects this process's
/// actual access rather than the mode bits.
async fn try_write(dir: &Path) -> std::io::Result<()> {
    let scratch = dir.join(format!(".health-{}", Uuid::new_v4()));
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&scratch)
        .await?;
    tokio::fs::remove_file(&scratch).await
}
