use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Hosts may delete a trip only while more than this many hours remain
    /// before departure.
    #[serde(default = "default_deletion_window")]
    pub deletion_window_hours: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_chat_history")]
    pub chat_history_limit: i64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
    /// Email domains accepted at signup, matched as suffixes.
    #[serde(default = "default_email_suffixes")]
    pub allowed_email_suffixes: Vec<String>,
}

fn default_deletion_window() -> i64 {
    48
}

fn default_sweep_interval() -> u64 {
    900
}

fn default_chat_history() -> i64 {
    100
}

fn default_rate_limit() -> i64 {
    100
}

fn default_email_suffixes() -> Vec<String> {
    vec![".edu".to_string(), ".ac.in".to_string(), ".edu.in".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of BUNKRIDE)
            // Eg.. `BUNKRIDE__SERVER__PORT=8080` would set the port
            .add_source(config::Environment::with_prefix("BUNKRIDE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_defaults_apply() {
        let rules: BusinessRules = serde_json::from_str("{}").unwrap();
        assert_eq!(rules.deletion_window_hours, 48);
        assert_eq!(rules.chat_history_limit, 100);
        assert!(rules.allowed_email_suffixes.contains(&".edu".to_string()));
    }
}
