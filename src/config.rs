use serde::Deserialize;

/// Application configuration, loaded once at startup and passed down
/// explicitly (no module-level globals).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiry_seconds")]
    pub jwt_expiry_seconds: u64,

    /// Disable JWT verification for local development.
    #[serde(default)]
    pub auth_disabled: bool,

    /// Interval of the background commission batch loop, in seconds.
    /// The batch is idempotent, so running it more often than monthly is safe.
    #[serde(default = "default_commission_batch_interval_secs")]
    pub commission_batch_interval_secs: u64,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_jwt_expiry_seconds() -> u64 {
    86400
}

fn default_commission_batch_interval_secs() -> u64 {
    21600
}

impl AppConfig {
    /// Load configuration from environment variables (DATABASE_URL, PORT,
    /// JWT_SECRET, ...). `dotenvy` has already populated the process
    /// environment from `.env` by the time this runs.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let app_config: AppConfig = cfg.try_deserialize()?;
        Ok(app_config)
    }

    pub fn is_auth_disabled(&self) -> bool {
        self.auth_disabled || self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_port(), 8080);
        assert_eq!(default_db_max_connections(), 10);
        assert_eq!(default_commission_batch_interval_secs(), 21600);
    }

    #[test]
    fn test_auth_disabled_in_development() {
        let config = AppConfig {
            environment: "development".to_string(),
            port: 8080,
            database_url: "postgres://localhost/docsafe".to_string(),
            db_max_connections: 10,
            jwt_secret: "secret".to_string(),
            jwt_expiry_seconds: 3600,
            auth_disabled: false,
            commission_batch_interval_secs: 21600,
        };
        assert!(config.is_auth_disabled());
        assert!(!config.is_production());
    }
}
