use crate::error::ConfigError;
use crate::retention::RetentionConfig;
use crate::scheduler::CronTrigger;
use crate::storage::TimestampSource;
use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub job: RetentionConfig,
    pub storage: StorageSettings,
    pub records: RecordSettings,
    #[serde(default)]
    pub trigger: TriggerSettings,
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageSettings {
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        endpoint_url: Option<String>,
        #[serde(default)]
        force_path_style: bool,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
    Local {
        root: PathBuf,
        #[serde(default)]
        timestamp_source: TimestampSource,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum RecordSettings {
    Firebase {
        database_url: String,
        #[serde(default)]
        auth_token: Option<String>,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
    JsonFile {
        path: PathBuf,
    },
}

/// How runs are started. With neither a schedule nor an HTTP listener the
/// binary runs the job once and exits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerSettings {
    #[serde(default)]
    pub schedule: Option<ScheduleSettings>,
    #[serde(default)]
    pub http: Option<ServerSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    pub cron: String,
    pub timezone: Tz,
    #[serde(default)]
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::new("config/default", FileFormat::Toml))
            // Add in the current environment file
            // Note that this file is _optional_
            .add_source(File::new(&format!("config/{}", env), FileFormat::Toml).required(false))
            // e.g. `PURGE__STORAGE__BUCKET=spider-cam` sets `storage.bucket`
            .add_source(
                Environment::with_prefix("PURGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(s)
    }

    /// Parses settings from a TOML document, for tests and tooling.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::from_config(s)
    }

    fn from_config(s: Config) -> Result<Self, ConfigError> {
        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.job.validate()?;

        if let StorageSettings::S3 { bucket, .. } = &self.storage {
            if bucket.trim().is_empty() {
                return Err(ConfigError::InvalidValue("storage.bucket is empty".into()));
            }
        }
        if let Some(schedule) = &self.trigger.schedule {
            CronTrigger::new(&schedule.cron, schedule.timezone)?;
        }
        if let Some(http) = &self.trigger.http {
            http.host
                .parse::<std::net::IpAddr>()
                .map_err(|e| ConfigError::InvalidValue(format!("trigger.http.host: {e}")))?;
        }
        Ok(())
    }
}
