use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::health::checks::{ApplicationCheck, SystemCheck};
use crate::health::HealthChecker;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub health: Arc<HealthChecker>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let log_directory = settings.logging.file.as_ref().map(|file| {
            match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        });

        let health = HealthChecker::new(settings.app.name.clone(), settings.app.version.clone())
            .register(ApplicationCheck::new(
                Instant::now(),
                settings.app.version.clone(),
                settings.app.environment,
            ))
            .register(SystemCheck::new(log_directory));

        AppState {
            settings: Arc::new(settings),
            health: Arc::new(health),
        }
    }
}
