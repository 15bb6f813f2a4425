use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::collaboration::reminders::{ReminderConfig, ReminderSchedule};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub notifications: NotificationConfig,
    pub reminders: ReminderConfig,
    pub cron_secret: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let timeout_secs = env::var("NOTIFY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let notifications = NotificationConfig {
            api_key: non_empty_var("RESEND_API_KEY"),
            api_url: env::var("NOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            from_address: env::var("NOTIFY_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@scholarships.local".to_string()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let defaults = ReminderConfig::default();
        let reminders = ReminderConfig {
            applications: ReminderSchedule {
                lead_days: day_list(
                    "REMINDER_APPLICATION_LEAD_DAYS",
                    defaults.applications.lead_days,
                )?,
                overdue_days: day_list(
                    "REMINDER_APPLICATION_OVERDUE_DAYS",
                    defaults.applications.overdue_days,
                )?,
            },
            collaborations: ReminderSchedule {
                lead_days: day_list(
                    "REMINDER_COLLABORATION_LEAD_DAYS",
                    defaults.collaborations.lead_days,
                )?,
                overdue_days: day_list(
                    "REMINDER_COLLABORATION_OVERDUE_DAYS",
                    defaults.collaborations.overdue_days,
                )?,
            },
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            notifications,
            reminders,
            cron_secret: non_empty_var("CRON_SECRET"),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn day_list(name: &'static str, default: Vec<u32>) -> Result<Vec<u32>, ConfigError> {
    let Some(raw) = non_empty_var(name) else {
        return Ok(default);
    };

    raw.split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigError::InvalidDayList { variable: name })
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Outbound e-mail provider settings. A missing API key leaves the gateway unconfigured.
#[derive(Clone)]
pub struct NotificationConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from_address: String,
    pub app_base_url: String,
    pub timeout: Duration,
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("from_address", &self.from_address)
            .field("app_base_url", &self.app_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidDayList { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "NOTIFY_TIMEOUT_SECS must be a positive number of seconds")
            }
            ConfigError::InvalidDayList { variable } => {
                write!(f, "{variable} must be a comma separated list of day counts")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidDayList { .. } => None,
        }
    }
}
