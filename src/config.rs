use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub gcs_bucket: String,
    pub gcs_project_id: Option<String>,
    pub gcs_credentials_file: Option<String>,
    /// Read for parity with deployments that set it; nothing consumes it yet.
    pub redis_url: Option<String>,
}

/// Token signing settings. Loadable on their own for `issue-token`,
/// which has no database or bucket.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

impl JwtConfig {
    pub const DEFAULT_EXPIRATION_HOURS: i64 = 24;

    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(JwtConfig {
            secret: env::var("JWT_SECRET")?,
            expiration_hours: parse_hours(env::var("JWT_EXPIRATION").ok().as_deref()),
        })
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expiration_hours)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            database_url: env::var("DB_URL").or_else(|_| env::var("DATABASE_URL"))?,
            jwt: JwtConfig::from_env()?,
            gcs_bucket: env::var("GCS_BUCKETNAME")?,
            gcs_project_id: non_empty_var("GCS_PROJECT_ID"),
            gcs_credentials_file: non_empty_var("GCS_CREDENTIALS_FILE"),
            redis_url: non_empty_var("REDIS_URL"),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Unset, unparsable or non-positive values fall back to the default.
fn parse_hours(value: Option<&str>) -> i64 {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|h: &i64| *h > 0)
        .unwrap_or(JwtConfig::DEFAULT_EXPIRATION_HOURS)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
