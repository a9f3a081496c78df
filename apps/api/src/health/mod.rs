//! Pluggable, trait-based health checks aggregated into one report.
//!
//! `AppState` holds an `Arc<HealthChecker>`; the `/health` handler runs every
//! registered check concurrently and reports the combined status.

pub mod checks;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{debug, warn};

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
    /// The check itself failed to run (panicked or was cancelled).
    Error,
}

/// What a single check reports about its dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Check-specific facts (uptime, cpu count, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl CheckOutcome {
    pub fn healthy(details: impl Into<String>) -> Self {
        CheckOutcome {
            status: CheckStatus::Healthy,
            details: details.into(),
            error: None,
            data: Map::new(),
        }
    }

    pub fn unhealthy(details: impl Into<String>, error: impl Into<String>) -> Self {
        CheckOutcome {
            status: CheckStatus::Unhealthy,
            details: details.into(),
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// A check outcome stamped with timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    #[serde(flatten)]
    pub outcome: CheckOutcome,
    pub response_time_ms: f64,
    pub checked_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Every check is healthy.
    Ok,
    /// At least one check is healthy and at least one is not.
    Degraded,
    /// No check is healthy.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub checks: Map<String, Value>,
    pub response_time_ms: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to add a dependency check to `/health`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> CheckOutcome;
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregation
// ────────────────────────────────────────────────────────────────────────────

pub struct HealthChecker {
    service: String,
    version: String,
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        HealthChecker {
            service: service.into(),
            version: version.into(),
            checks: Vec::new(),
        }
    }

    pub fn register(mut self, check: impl HealthCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn check_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checks.iter().map(|check| check.name())
    }

    /// Runs every check concurrently.
    pub async fn run_all(&self) -> HealthReport {
        self.run_selected(|_| true).await
    }

    /// Runs the checks whose name passes `select`, concurrently.
    pub async fn run_selected<F>(&self, select: F) -> HealthReport
    where
        F: Fn(&str) -> bool,
    {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for (index, check) in self.checks.iter().enumerate() {
            if !select(check.name()) {
                continue;
            }
            let check = Arc::clone(check);
            tasks.spawn(async move {
                let check_started = Instant::now();
                let outcome = check.check().await;
                (index, stamp(outcome, check_started))
            });
        }

        let mut reports: Vec<Option<CheckReport>> = vec![None; self.checks.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(e) => warn!("Health check task failed: {e}"),
            }
        }

        let mut checks = Map::new();
        let mut healthy = 0usize;
        let mut total = 0usize;
        for (check, report) in self.checks.iter().zip(reports) {
            if !select(check.name()) {
                continue;
            }
            total += 1;
            // A task that never reported back panicked or was cancelled.
            let report = report.unwrap_or_else(|| failed_report(check.name()));
            if report.outcome.status == CheckStatus::Healthy {
                healthy += 1;
            }
            let value = serde_json::to_value(&report).unwrap_or(Value::Null);
            checks.insert(check.name().to_string(), value);
        }

        let status = overall_status(healthy, total);
        debug!(?status, healthy, total, "Health checks completed");

        HealthReport {
            status,
            timestamp: rfc3339(Utc::now()),
            service: self.service.clone(),
            version: self.version.clone(),
            checks,
            response_time_ms: elapsed_ms(started),
        }
    }
}

/// Zero checks run means nothing is known to be healthy.
fn overall_status(healthy: usize, total: usize) -> OverallStatus {
    if healthy == 0 {
        OverallStatus::Error
    } else if healthy == total {
        OverallStatus::Ok
    } else {
        OverallStatus::Degraded
    }
}

fn stamp(outcome: CheckOutcome, started: Instant) -> CheckReport {
    CheckReport {
        outcome,
        response_time_ms: elapsed_ms(started),
        checked_at: rfc3339(Utc::now()),
    }
}

fn failed_report(name: &str) -> CheckReport {
    CheckReport {
        outcome: CheckOutcome {
            status: CheckStatus::Error,
            details: format!("Health check '{name}' did not complete"),
            error: Some("check panicked or was cancelled".to_string()),
            data: Map::new(),
        },
        response_time_ms: 0.0,
        checked_at: rfc3339(Utc::now()),
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn elapsed_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}
