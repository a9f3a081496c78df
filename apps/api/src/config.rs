use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_LOG_FILE: &str = "logs/resume_tailor.log";
const DEFAULT_RETENTION_COUNT: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: expected one of {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Unsafe configuration for the {environment} environment: {warning}")]
    Unsafe {
        environment: Environment,
        warning: ConfigWarning,
    },
}

/// Application configuration loaded from environment variables.
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub logging: LoggingSettings,
    pub cors: CorsSettings,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub description: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LogLevel,
    /// `None` disables the file sink.
    pub file: Option<PathBuf>,
    pub console: bool,
    pub json: bool,
    pub rotation: LogRotation,
    pub retention_count: usize,
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub origins: AllowList,
    pub methods: AllowList,
    pub headers: AllowList,
    pub allow_credentials: bool,
}

/// A CORS allow-list: either the `*` wildcard or an explicit set of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    Any,
    Only(BTreeSet<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

/// Settings combinations that load fine but should not be served as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    WildcardOriginWithCredentials,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::WildcardOriginWithCredentials => f.write_str(
                "CORS_ORIGINS='*' combined with CORS_ALLOW_CREDENTIALS=true lets any site make credentialed requests",
            ),
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Settings::from_env`], but the env file must exist and parse.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Re-reads the environment for a live reload. Unlike startup, values from
    /// the env file replace ones already present in the process.
    pub fn reload(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path_override(path).map_err(|source| ConfigError::EnvFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            None => {
                dotenvy::dotenv_override().ok();
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let app = AppSettings {
            name: var("APP_NAME").unwrap_or_else(|| "Resume Tailor AI".to_string()),
            version: var("APP_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            description: var("APP_DESCRIPTION")
                .unwrap_or_else(|| "AI-powered resume tailoring application".to_string()),
            host: var("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("APP_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(8000),
            environment: parse_enum("APP_ENVIRONMENT", var("APP_ENVIRONMENT"))?
                .unwrap_or(Environment::Development),
        };

        // An explicitly empty LOG_FILE turns the file sink off, so read it raw.
        let file = match lookup("LOG_FILE") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v.trim())),
            None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        };

        let logging = LoggingSettings {
            level: parse_enum("LOG_LEVEL", var("LOG_LEVEL"))?.unwrap_or(LogLevel::Info),
            file,
            console: parse_bool(var("ENABLE_CONSOLE_LOGGING")).unwrap_or(true),
            json: parse_bool(var("ENABLE_JSON_LOGGING")).unwrap_or(false),
            rotation: parse_enum("LOG_ROTATION", var("LOG_ROTATION"))?
                .unwrap_or(LogRotation::Never),
            retention_count: var("LOG_RETENTION_COUNT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETENTION_COUNT),
        };

        let cors = CorsSettings {
            origins: var("CORS_ORIGINS")
                .map(|v| AllowList::parse(&v))
                .unwrap_or(AllowList::Any),
            methods: var("CORS_ALLOW_METHODS")
                .map(|v| AllowList::parse(&v))
                .unwrap_or(AllowList::Any),
            headers: var("CORS_ALLOW_HEADERS")
                .map(|v| AllowList::parse(&v))
                .unwrap_or(AllowList::Any),
            allow_credentials: parse_bool(var("CORS_ALLOW_CREDENTIALS")).unwrap_or(true),
        };

        Ok(Settings { app, logging, cors })
    }

    /// Combinations that are accepted but unsafe.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.cors.is_wildcard_with_credentials() {
            warnings.push(ConfigWarning::WildcardOriginWithCredentials);
        }
        warnings
    }

    /// Returns the warnings to log, or fails if any of them is fatal in the
    /// configured environment.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let warnings = self.warnings();
        if self.app.environment == Environment::Production {
            if let Some(&warning) = warnings.first() {
                return Err(ConfigError::Unsafe {
                    environment: self.app.environment,
                    warning,
                });
            }
        }
        Ok(warnings)
    }
}

impl CorsSettings {
    pub fn is_wildcard_with_credentials(&self) -> bool {
        self.origins == AllowList::Any && self.allow_credentials
    }
}

impl AllowList {
    /// Parses a comma-separated list. A `*` item anywhere means "allow all".
    pub fn parse(raw: &str) -> Self {
        let items: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();

        if items.is_empty() || items.contains("*") {
            AllowList::Any
        } else {
            AllowList::Only(items)
        }
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// `tracing` has no level above ERROR, so CRITICAL shares it and the log
    /// sinks narrow it to events carrying the `critical` field.
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(()),
        }
    }
}

impl FromStr for LogRotation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(LogRotation::Never),
            "hourly" => Ok(LogRotation::Hourly),
            "daily" => Ok(LogRotation::Daily),
            _ => Err(()),
        }
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "testing" => Ok(Environment::Testing),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

trait Choices {
    const EXPECTED: &'static str;
}

impl Choices for LogLevel {
    const EXPECTED: &'static str = "DEBUG, INFO, WARNING, ERROR, CRITICAL";
}

impl Choices for LogRotation {
    const EXPECTED: &'static str = "never, hourly, daily";
}

impl Choices for Environment {
    const EXPECTED: &'static str = "development, testing, staging, production";
}

fn parse_enum<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = ()> + Choices,
{
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw,
                expected: T::EXPECTED,
            }),
    }
}

/// Unrecognised tokens yield `None` so the caller falls back to its default.
fn parse_bool(value: Option<String>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" | "t" => Some(true),
        "0" | "false" | "no" | "off" | "n" | "f" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]).unwrap();

        assert_eq!(settings.app.name, "Resume Tailor AI");
        assert_eq!(settings.app.host, "127.0.0.1");
        assert_eq!(settings.app.port, 8000);
        assert_eq!(settings.app.environment, Environment::Development);

        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(
            settings.logging.file.as_deref(),
            Some(Path::new("logs/resume_tailor.log"))
        );
        assert!(settings.logging.console);
        assert!(!settings.logging.json);
        assert_eq!(settings.logging.rotation, LogRotation::Never);
        assert_eq!(settings.logging.retention_count, 5);

        assert_eq!(settings.cors.origins, AllowList::Any);
        assert_eq!(settings.cors.methods, AllowList::Any);
        assert_eq!(settings.cors.headers, AllowList::Any);
        assert!(settings.cors.allow_credentials);
    }

    #[test]
    fn test_every_log_level_is_accepted_case_insensitively() {
        for (raw, expected) in [
            ("DEBUG", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("Warning", LogLevel::Warning),
            ("error", LogLevel::Error),
            ("CRITICAL", LogLevel::Critical),
        ] {
            let settings = load(&[("LOG_LEVEL", raw)]).unwrap();
            assert_eq!(settings.logging.level, expected);
        }
    }

    #[test]
    fn test_malformed_log_level_is_a_config_error() {
        for raw in ["INVALID", "warn", "trace", "5"] {
            let err = load(&[("LOG_LEVEL", raw)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { key: "LOG_LEVEL", .. }),
                "{raw} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_unknown_environment_and_rotation_are_rejected() {
        assert!(matches!(
            load(&[("APP_ENVIRONMENT", "prod")]),
            Err(ConfigError::InvalidValue { key: "APP_ENVIRONMENT", .. })
        ));
        assert!(matches!(
            load(&[("LOG_ROTATION", "weekly")]),
            Err(ConfigError::InvalidValue { key: "LOG_ROTATION", .. })
        ));
    }

    #[test]
    fn test_booleans_parse_common_tokens() {
        for (raw, expected) in [
            ("true", true),
            ("TRUE", true),
            ("yes", true),
            ("On", true),
            ("1", true),
            ("false", false),
            ("No", false),
            ("off", false),
            ("0", false),
        ] {
            let settings = load(&[("ENABLE_JSON_LOGGING", raw)]).unwrap();
            assert_eq!(settings.logging.json, expected, "token {raw}");
        }
    }

    #[test]
    fn test_unrecognised_values_fall_back_to_defaults() {
        let settings = load(&[
            ("ENABLE_CONSOLE_LOGGING", "maybe"),
            ("APP_PORT", "not-a-port"),
            ("LOG_RETENTION_COUNT", "-3"),
        ])
        .unwrap();

        assert!(settings.logging.console);
        assert_eq!(settings.app.port, 8000);
        assert_eq!(settings.logging.retention_count, 5);
    }

    #[test]
    fn test_cors_lists_are_trimmed_sets() {
        let settings = load(&[
            ("CORS_ORIGINS", " http://localhost:3000 ,https://example.com,,http://localhost:3000"),
            ("CORS_ALLOW_METHODS", "GET,POST"),
        ])
        .unwrap();

        let expected: BTreeSet<String> = ["http://localhost:3000", "https://example.com"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(settings.cors.origins, AllowList::Only(expected));
        assert_eq!(settings.cors.headers, AllowList::Any);
    }

    #[test]
    fn test_wildcard_item_anywhere_allows_all() {
        assert_eq!(AllowList::parse("https://a.example, *"), AllowList::Any);
        assert_eq!(AllowList::parse(" , "), AllowList::Any);
    }

    #[test]
    fn test_empty_log_file_disables_file_sink() {
        let settings = load(&[("LOG_FILE", "")]).unwrap();
        assert!(settings.logging.file.is_none());
    }

    #[test]
    fn test_wildcard_origin_with_credentials_is_flagged() {
        let settings = load(&[]).unwrap();
        assert_eq!(
            settings.warnings(),
            vec![ConfigWarning::WildcardOriginWithCredentials]
        );

        let safe = load(&[("CORS_ALLOW_CREDENTIALS", "false")]).unwrap();
        assert!(safe.warnings().is_empty());

        let explicit = load(&[("CORS_ORIGINS", "https://app.example")]).unwrap();
        assert!(explicit.warnings().is_empty());
    }

    #[test]
    fn test_unsafe_cors_is_fatal_in_production_only() {
        let dev = load(&[]).unwrap();
        assert_eq!(dev.validate().unwrap().len(), 1);

        let prod = load(&[("APP_ENVIRONMENT", "production")]).unwrap();
        assert!(matches!(
            prod.validate(),
            Err(ConfigError::Unsafe {
                environment: Environment::Production,
                warning: ConfigWarning::WildcardOriginWithCredentials,
            })
        ));
    }

    #[test]
    fn test_missing_env_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.env");

        assert!(matches!(
            Settings::from_env_file(&missing),
            Err(ConfigError::EnvFile { path, .. }) if path == missing
        ));
        assert!(matches!(
            Settings::reload(Some(&missing)),
            Err(ConfigError::EnvFile { .. })
        ));
    }

    #[test]
    fn test_reload_lets_env_file_override_process_values() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join("reload.env");
        std::fs::write(&env_file, "LOG_LEVEL=ERROR\n").unwrap();
        std::env::set_var("LOG_LEVEL", "DEBUG");

        // At startup the process environment wins over the file.
        let startup = Settings::from_env_file(&env_file).unwrap();
        assert_eq!(startup.logging.level, LogLevel::Debug);

        let reloaded = Settings::reload(Some(&env_file)).unwrap();
        std::env::remove_var("LOG_LEVEL");
        assert_eq!(reloaded.logging.level, LogLevel::Error);
    }
}
