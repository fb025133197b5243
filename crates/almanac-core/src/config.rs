use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Longest lookback or alarm age accepted, in days.
const MAX_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub expansion: ExpansionConfig,
    pub labels: LabelConfig,
    pub alarms: AlarmConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpansionConfig {
    /// Days before the window start at which the recurrence generator is started.
    pub lookback_days: i64,
    /// Upper bound on generated instances per series and request.
    pub max_instances: usize,
}

/// Titles substituted for redacted events.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelConfig {
    pub private_title: String,
    pub free_title: String,
    pub tentative_title: String,
    pub busy_title: String,
    pub out_of_office_title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlarmConfig {
    pub max_age_days: i64,
    pub action: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub fixture: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            max_instances: 10_000,
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            private_title: "Private event".to_string(),
            free_title: "Free".to_string(),
            tentative_title: "Tentative".to_string(),
            busy_title: "Busy".to_string(),
            out_of_office_title: "Out of office".to_string(),
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            max_age_days: 14,
            action: "DISPLAY".to_string(),
        }
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional `config.toml`.
    /// Environment variables take precedence over file values.
    ///
    /// Variables are prefixed with `ALMANAC_` and nest with `__`, for example
    /// `ALMANAC_EXPANSION__LOOKBACK_DAYS`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration, deserializing it or
    /// validating the result fails.
    pub fn load() -> Result<Self> {
        Self::load_from(environment())
    }

    fn load_from(env: Environment) -> Result<Self> {
        let labels = LabelConfig::default();
        let alarms = AlarmConfig::default();
        let expansion = ExpansionConfig::default();

        let settings = Config::builder()
            .set_default("logging.level", "debug")?
            .set_default("expansion.lookback_days", expansion.lookback_days)?
            .set_default("expansion.max_instances", expansion.max_instances as u64)?
            .set_default("labels.private_title", labels.private_title)?
            .set_default("labels.free_title", labels.free_title)?
            .set_default("labels.tentative_title", labels.tentative_title)?
            .set_default("labels.busy_title", labels.busy_title)?
            .set_default("labels.out_of_office_title", labels.out_of_office_title)?
            .set_default("alarms.max_age_days", alarms.max_age_days)?
            .set_default("alarms.action", alarms.action)?
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(env)
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Checks the numeric limits of the expansion and alarm sections.
    ///
    /// ## Errors
    /// Returns `CoreError::ValidationError` naming the first key out of range.
    pub fn validate(&self) -> CoreResult<()> {
        let out_of_range = |key: &str, value: i64| {
            CoreError::ValidationError(format!("{key} must be within 0..={MAX_DAYS}, got {value}"))
        };
        if !(0..=MAX_DAYS).contains(&self.expansion.lookback_days) {
            return Err(out_of_range(
                "expansion.lookback_days",
                self.expansion.lookback_days,
            ));
        }
        if self.expansion.max_instances == 0 {
            return Err(CoreError::ValidationError(
                "expansion.max_instances must be positive".to_string(),
            ));
        }
        if !(0..=MAX_DAYS).contains(&self.alarms.max_age_days) {
            return Err(out_of_range("alarms.max_age_days", self.alarms.max_age_days));
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix("ALMANAC")
        .prefix_separator("_")
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::trace!(error = %e, "No .env file loaded");
    }

    Settings::load()
}
