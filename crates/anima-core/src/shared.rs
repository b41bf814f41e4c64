//! Shared configuration used by the core engine and the gateway.

use serde::{Deserialize, Serialize};

/// Default sled directory when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_PATH: &str = "./data/anima";

/// Legacy environment variable names and the config keys they override.
const LEGACY_ENV: [(&str, &str); 10] = [
    ("TELEGRAM_BOT_TOKEN", "telegram_bot_token"),
    ("DATABASE_URL", "database_url"),
    ("REPORTS_TOKEN", "reports_token"),
    ("DB_POOL_MIN", "db_pool_min"),
    ("DB_POOL_MAX", "db_pool_max"),
    ("DB_COMMAND_TIMEOUT", "db_command_timeout_secs"),
    ("WEBHOOK_SECRET", "webhook_secret"),
    ("LOG_LEVEL", "log_level"),
    ("APP_TITLE", "app_title"),
    ("PORT", "port"),
];

/// Application configuration (gateway + engine). Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimaConfig {
    /// Service title reported by `/` and used in logs.
    pub app_title: String,
    pub bind_addr: String,
    pub port: u16,
    /// Directory of the sled database. Accepts a `sled://` prefix.
    pub database_url: String,
    /// Empty token puts the outbound transport in dry-run mode (log only).
    #[serde(default)]
    pub telegram_bot_token: String,
    pub telegram_api_base: String,
    /// Empty token leaves the reporting endpoints open.
    #[serde(default)]
    pub reports_token: String,
    /// Empty secret leaves the webhook unprotected.
    #[serde(default)]
    pub webhook_secret: String,
    pub db_pool_min: usize,
    /// Upper bound on message pipelines holding the store at once.
    pub db_pool_max: usize,
    /// How long a pipeline waits for the store before it is reported unavailable.
    pub db_command_timeout_secs: u64,
    pub send_timeout_secs: u64,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Ask name, mood and goal before the questionnaire.
    #[serde(default)]
    pub onboarding_intro: bool,
    pub intent_threshold: f32,
    pub quality_min_len: usize,
    pub quality_max_len: usize,
    /// Homework reminder sweep period; 0 disables the sweep.
    pub reminder_interval_secs: u64,
}

impl Default for AnimaConfig {
    fn default() -> Self {
        Self {
            app_title: "ANIMA".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            database_url: DEFAULT_DATABASE_PATH.to_string(),
            telegram_bot_token: String::new(),
            telegram_api_base: "https://api.telegram.org".to_string(),
            reports_token: String::new(),
            webhook_secret: String::new(),
            db_pool_min: 1,
            db_pool_max: 5,
            db_command_timeout_secs: 15,
            send_timeout_secs: 15,
            log_level: "info".to_string(),
            onboarding_intro: false,
            intent_threshold: 0.35,
            quality_min_len: 60,
            quality_max_len: 900,
            reminder_interval_secs: 3600,
        }
    }
}

impl AnimaConfig {
    /// Load config from defaults, file and environment.
    ///
    /// Precedence (lowest to highest): defaults, file at `ANIMA_CONFIG` (or `config/anima.toml`),
    /// `ANIMA__*` variables, then the legacy variable names (`TELEGRAM_BOT_TOKEN`, `DATABASE_URL`, ...).
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let config_path = std::env::var("ANIMA_CONFIG").unwrap_or_else(|_| "config/anima".to_string());
        let mut builder = config::Config::builder()
            .set_default("app_title", defaults.app_title)?
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("port", defaults.port as i64)?
            .set_default("database_url", defaults.database_url)?
            .set_default("telegram_bot_token", defaults.telegram_bot_token)?
            .set_default("telegram_api_base", defaults.telegram_api_base)?
            .set_default("reports_token", defaults.reports_token)?
            .set_default("webhook_secret", defaults.webhook_secret)?
            .set_default("db_pool_min", defaults.db_pool_min as i64)?
            .set_default("db_pool_max", defaults.db_pool_max as i64)?
            .set_default("db_command_timeout_secs", defaults.db_command_timeout_secs as i64)?
            .set_default("send_timeout_secs", defaults.send_timeout_secs as i64)?
            .set_default("log_level", defaults.log_level)?
            .set_default("onboarding_intro", defaults.onboarding_intro)?
            .set_default("intent_threshold", defaults.intent_threshold as f64)?
            .set_default("quality_min_len", defaults.quality_min_len as i64)?
            .set_default("quality_max_len", defaults.quality_max_len as i64)?
            .set_default("reminder_interval_secs", defaults.reminder_interval_secs as i64)?
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("ANIMA").separator("__"));

        for (var, key) in LEGACY_ENV {
            let value = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.validate()
    }

    fn validate(mut self) -> Result<Self, config::ConfigError> {
        if self.db_pool_max == 0 {
            return Err(config::ConfigError::Message("db_pool_max must be at least 1".into()));
        }
        if self.db_pool_min > self.db_pool_max {
            tracing::warn!(
                min = self.db_pool_min,
                max = self.db_pool_max,
                "db_pool_min exceeds db_pool_max; clamping"
            );
            self.db_pool_min = self.db_pool_max;
        }
        if self.quality_min_len > self.quality_max_len {
            return Err(config::ConfigError::Message(
                "quality_min_len must not exceed quality_max_len".into(),
            ));
        }
        Ok(self)
    }

    /// Filesystem path of the sled database (strips an optional `sled://` scheme).
    pub fn database_path(&self) -> &str {
        self.database_url
            .strip_prefix("sled://")
            .unwrap_or(&self.database_url)
    }

    /// True when outbound sends are only logged.
    pub fn dry_run(&self) -> bool {
        self.telegram_bot_token.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_path_strips_scheme() {
        let cfg = AnimaConfig {
            database_url: "sled:///var/lib/anima".to_string(),
            ..AnimaConfig::default()
        };
        assert_eq!(cfg.database_path(), "/var/lib/anima");
        assert_eq!(AnimaConfig::default().database_path(), DEFAULT_DATABASE_PATH);
    }

    #[test]
    fn empty_token_means_dry_run() {
        assert!(AnimaConfig::default().dry_run());
        let cfg = AnimaConfig {
            telegram_bot_token: "123:abc".to_string(),
            ..AnimaConfig::default()
        };
        assert!(!cfg.dry_run());
    }

    #[test]
    fn validate_clamps_pool_min_and_rejects_bad_quality_band() {
        let cfg = AnimaConfig {
            db_pool_min: 9,
            db_pool_max: 3,
            ..AnimaConfig::default()
        }
        .validate()
        .unwrap();
        assert_eq!(cfg.db_pool_min, 3);

        let bad = AnimaConfig {
            quality_min_len: 500,
            quality_max_len: 100,
            ..AnimaConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
