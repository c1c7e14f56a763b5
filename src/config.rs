use crate::error::{AppError, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_server_port", deserialize_with = "deserialize_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3000
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The three SQLite files the dashboard reads.
///
/// Sensor and prediction files are written by the farm controller and the
/// forecasting model; the users file belongs to this service.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub sensor_path: String,
    pub prediction_path: String,
    pub users_path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_sensor_limit")]
    pub sensor_limit: u32,
    #[serde(default = "default_history_hours")]
    pub history_hours: u32,
}

fn default_max_connections() -> u32 {
    5
}

fn default_sensor_limit() -> u32 {
    50
}

fn default_history_hours() -> u32 {
    24
}

/// Custom deserializer that handles port as both number and string
///
/// Accepts:
/// - `port: 3000` (number)
/// - `port: "3000"` (string that parses to number)
/// - `port: ${PORT}` (env var substituted to either)
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        String(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => Ok(n),
        PortValue::String(s) => s
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid port number: '{}'", s))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub api_base_url: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default)]
    pub initial_delay_seconds: u64,
    /// No timeout unless set.
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_display_offset")]
    pub display_offset_hours: i32,
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_display_offset() -> i32 {
    8
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }

    /// Fixed offset used for hour keys, day keys and the pump schedule.
    pub fn display_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.display_offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!(
                "display_offset_hours {} is not a valid UTC offset",
                self.display_offset_hours
            ))
        })
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - Non-empty database paths
    /// - Sane pool and query limits
    /// - Positive refresh interval
    /// - Valid http(s) base URL
    /// - Display offset inside the real-world UTC range
    fn validate(&self) -> Result<()> {
        let fields_to_check = [
            ("sensor_path", &self.database.sensor_path),
            ("prediction_path", &self.database.prediction_path),
            ("users_path", &self.database.users_path),
            ("api_base_url", &self.dashboard.api_base_url),
        ];

        for (field_name, value) in &fields_to_check {
            if value.contains("${") {
                return Err(AppError::Config(format!(
                    "{} still contains an unexpanded environment variable. \
                     Set it or create a .env file.",
                    field_name
                )));
            }
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} cannot be empty", field_name)));
            }
        }

        if self.server.port == 0 {
            return Err(AppError::Config("Server port cannot be 0".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "Database max_connections must be at least 1".to_string(),
            ));
        }

        if self.database.max_connections > 100 {
            return Err(AppError::Config(format!(
                "Database max_connections {} seems too high, maximum recommended is 100",
                self.database.max_connections
            )));
        }

        if self.database.sensor_limit == 0 {
            return Err(AppError::Config(
                "Database sensor_limit must be at least 1".to_string(),
            ));
        }

        if self.database.history_hours == 0 {
            return Err(AppError::Config(
                "Database history_hours must be at least 1".to_string(),
            ));
        }

        if self.dashboard.refresh_interval_seconds == 0 {
            return Err(AppError::Config(
                "Dashboard refresh_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.dashboard.refresh_interval_seconds < 5 {
            tracing::warn!(
                "Refresh interval of {}s is very short, the source polls every 30s",
                self.dashboard.refresh_interval_seconds
            );
        }

        if self.dashboard.request_timeout_seconds == Some(0) {
            return Err(AppError::Config(
                "Dashboard request_timeout_seconds must be greater than 0 when set".to_string(),
            ));
        }

        match url::Url::parse(&self.dashboard.api_base_url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(parsed) => {
                return Err(AppError::Config(format!(
                    "Dashboard api_base_url must use http or https, got: {}",
                    parsed.scheme()
                )));
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Invalid dashboard api_base_url '{}': {}",
                    self.dashboard.api_base_url, e
                )));
            }
        }

        if !(-12..=14).contains(&self.dashboard.display_offset_hours) {
            return Err(AppError::Config(format!(
                "display_offset_hours {} must be between -12 and 14",
                self.dashboard.display_offset_hours
            )));
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid placeholder pattern: {}", e)))?;

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                if !missing_vars.iter().any(|v| v == var_name) {
                    missing_vars.push(var_name.to_string());
                }
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
