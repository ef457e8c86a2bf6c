use chrono::Duration;
use std::env;

use crate::error::{ModerationError, Result};

/// Service configuration, loaded once at startup and injected into each
/// component. No ambient globals.
#[derive(Debug, Clone)]
pub struct Config {
    // Server configuration
    pub host: String,
    pub port: u16,

    // Database configuration
    pub database_url: String,
    pub db_max_connections: u32,

    // Classification thresholds
    pub suggest_threshold: f64,
    pub forbidden_threshold: f64,
    pub medium_log_threshold: f64,

    // Duplicate detection
    pub hamming_threshold: u32,

    // Review workflow
    pub false_appeal_threshold: i32,
    pub cooldown_days: i64,
    pub lock_duration_minutes: i64,

    // Vision annotation service
    pub vision_endpoint: String,
    pub vision_api_key: String,
    pub max_label_results: u32,

    // Generative classifier (feature-flagged)
    pub generative_enabled: bool,
    pub generative_endpoint: String,
    pub generative_api_key: String,

    // Moderator allowlist (lowercased emails)
    pub moderator_emails: Vec<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ModerationError::Config("DATABASE_URL must be set".to_string()))?;

        let moderator_emails = env_or("MODERATOR_EMAILS", "")
            .split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 8087),
            database_url,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 20),
            suggest_threshold: parse_env("SUGGEST_THRESHOLD", 0.45),
            forbidden_threshold: parse_env("FORBIDDEN_THRESHOLD", 0.70),
            medium_log_threshold: parse_env("MEDIUM_LOG_THRESHOLD", 0.55),
            hamming_threshold: parse_env("HAMMING_THRESHOLD", 8),
            false_appeal_threshold: parse_env("FALSE_APPEAL_THRESHOLD", 2),
            cooldown_days: parse_env("COOLDOWN_DAYS", 7),
            lock_duration_minutes: parse_env("LOCK_DURATION_MINUTES", 10),
            vision_endpoint: env_or(
                "VISION_ENDPOINT",
                "https://vision.googleapis.com/v1/images:annotate",
            ),
            vision_api_key: env_or("VISION_API_KEY", ""),
            max_label_results: parse_env("MAX_LABEL_RESULTS", 15),
            generative_enabled: env_or("ENABLE_GENERATIVE_CLASSIFIER", "false") == "true",
            generative_endpoint: env_or("GENERATIVE_ENDPOINT", ""),
            generative_api_key: env_or("GENERATIVE_API_KEY", ""),
            moderator_emails,
        })
    }

    pub fn lock_duration(&self) -> Duration {
        Duration::minutes(self.lock_duration_minutes)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::days(self.cooldown_days)
    }

    pub fn is_moderator_email(&self, email: &str) -> bool {
        self.moderator_emails.contains(&email.to_lowercase())
    }
}
