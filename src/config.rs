//! Configuration file handling.
//!
//! Settings come from `scholarfinder.yml` (every section optional) and are
//! then overridden by `SCHOLARFINDER_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "scholarfinder.yml";
pub const DEFAULT_TOKEN_SECRET: &str = "change-me-scholarfinder-secret";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP service binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file. Parent directories are created on open.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "data/scholarfinder.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for access tokens.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,

    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: i64,

    /// Let `serve` start with the built-in secret. Local development only.
    #[serde(default)]
    pub allow_default_secret: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_days: default_refresh_ttl(),
            allow_default_secret: false,
        }
    }
}

fn default_token_secret() -> String {
    DEFAULT_TOKEN_SECRET.to_string()
}

fn default_access_ttl() -> i64 {
    86_400
}

fn default_refresh_ttl() -> i64 {
    7
}

/// Matching weights and quality thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub weights: Weights,

    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub education_level: i32,
    pub academic_performance: i32,
    pub english_proficiency: i32,
    pub age: i32,
    pub nationality: i32,
    pub financial_need: i32,
    pub field_of_study: i32,
    pub special_categories: i32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            education_level: 20,
            academic_performance: 15,
            english_proficiency: 15,
            age: 10,
            nationality: 10,
            financial_need: 10,
            field_of_study: 10,
            special_categories: 10,
        }
    }
}

impl Weights {
    pub fn total(&self) -> i32 {
        self.education_level
            + self.academic_performance
            + self.english_proficiency
            + self.age
            + self.nationality
            + self.financial_need
            + self.field_of_study
            + self.special_categories
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub minimum_match_percentage: i32,
    pub good_match: i32,
    pub excellent_match: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            minimum_match_percentage: 50,
            good_match: 75,
            excellent_match: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default = "default_admin_email")]
    pub admin_email: String,

    #[serde(default = "default_support_email")]
    pub support_email: String,

    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    #[serde(default)]
    pub discord_webhook_url: Option<String>,

    /// Delivery attempts per e-mail before it stays FAILED.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How often the outbox worker wakes up.
    #[serde(default = "default_worker_interval")]
    pub worker_interval_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            admin_email: default_admin_email(),
            support_email: default_support_email(),
            slack_webhook_url: None,
            discord_webhook_url: None,
            max_retries: default_max_retries(),
            worker_interval_secs: default_worker_interval(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_worker_interval() -> u64 {
    30
}

fn default_from() -> String {
    "noreply@scholarfinder.lk".to_string()
}

fn default_admin_email() -> String {
    "admin@scholarfinder.lk".to_string()
}

fn default_support_email() -> String {
    "support@scholarfinder.lk".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON log lines instead of the human format.
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load from `path` when it exists, otherwise start from defaults, then
    /// apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            serde_yaml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config YAML {:?}", path))?
        } else {
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(bind) = env::var("SCHOLARFINDER_BIND") {
            self.server.bind = bind;
        }
        if let Ok(db) = env::var("SCHOLARFINDER_DB") {
            self.database.path = db;
        }
        if let Ok(secret) = env::var("SCHOLARFINDER_TOKEN_SECRET") {
            self.auth.token_secret = secret;
        }
        if let Some(json) = env_bool("SCHOLARFINDER_LOG_JSON") {
            self.log.json = json;
        }
        if let Some(allow) = env_bool("SCHOLARFINDER_ALLOW_DEFAULT_SECRET") {
            self.auth.allow_default_secret = allow;
        }
        if let Ok(url) = env::var("SLACK_WEBHOOK_URL") {
            self.mail.slack_webhook_url = Some(url);
        }
        if let Ok(url) = env::var("DISCORD_WEBHOOK_URL") {
            self.mail.discord_webhook_url = Some(url);
        }
    }

    /// Default configuration rendered as YAML, for `init-config`.
    pub fn default_yaml() -> Result<String> {
        let body = serde_yaml::to_string(&Config::default())
            .context("Failed to render default config")?;
        Ok(format!("# ScholarFinder configuration\n{}", body))
    }

    /// Returns `(errors, warnings)`.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.matching.weights.total() <= 0 {
            errors.push("matching.weights must sum to a positive total".to_string());
        }
        let w = &self.matching.weights;
        for (name, value) in [
            ("education_level", w.education_level),
            ("academic_performance", w.academic_performance),
            ("english_proficiency", w.english_proficiency),
            ("age", w.age),
            ("nationality", w.nationality),
            ("financial_need", w.financial_need),
            ("field_of_study", w.field_of_study),
            ("special_categories", w.special_categories),
        ] {
            if value < 0 {
                errors.push(format!("matching.weights.{} must not be negative", name));
            }
        }

        let t = &self.matching.thresholds;
        if !(0..=100).contains(&t.minimum_match_percentage)
            || !(0..=100).contains(&t.good_match)
            || !(0..=100).contains(&t.excellent_match)
        {
            errors.push("matching.thresholds must lie within 0..=100".to_string());
        }
        if !(t.minimum_match_percentage <= t.good_match && t.good_match <= t.excellent_match) {
            errors.push(format!(
                "matching.thresholds out of order: minimum {} <= good {} <= excellent {} expected",
                t.minimum_match_percentage, t.good_match, t.excellent_match
            ));
        }

        if self.auth.token_secret.trim().is_empty() {
            errors.push("auth.token_secret must not be empty".to_string());
        } else if self.auth.token_secret == DEFAULT_TOKEN_SECRET {
            warnings.push("auth.token_secret is the built-in default; set SCHOLARFINDER_TOKEN_SECRET".to_string());
        }
        if self.auth.access_token_ttl_secs <= 0 {
            errors.push("auth.access_token_ttl_secs must be positive".to_string());
        }
        if self.auth.refresh_token_ttl_days <= 0 {
            errors.push("auth.refresh_token_ttl_days must be positive".to_string());
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("server.bind '{}' is not a socket address", self.server.bind));
        }

        if self.mail.worker_interval_secs == 0 {
            errors.push("mail.worker_interval_secs must be positive".to_string());
        }
        if self.mail.slack_webhook_url.is_none() && self.mail.discord_webhook_url.is_none() {
            warnings.push("No notification webhook configured; e-mails are only logged".to_string());
        }

        (errors, warnings)
    }

    /// Checks run before the server binds. Fails on any validation error, and
    /// on the built-in token secret unless `auth.allow_default_secret` is set.
    /// Returns the warnings to log.
    pub fn ensure_servable(&self) -> Result<Vec<String>> {
        let (mut errors, warnings) = self.validate();
        if self.auth.token_secret == DEFAULT_TOKEN_SECRET && !self.auth.allow_default_secret {
            errors.push(
                "auth.token_secret is the built-in default; set SCHOLARFINDER_TOKEN_SECRET \
                 or auth.allow_default_secret for local use"
                    .to_string(),
            );
        }
        if !errors.is_empty() {
            anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
        }
        Ok(warnings)
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| match v.as_str() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    })
}
