use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Scheduling knobs. All durations are minutes.
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Minimum lead time between "now" and a new booking's start.
    pub min_lead_minutes: i64,
    /// How far before the start a client may still cancel.
    pub client_cancel_cutoff_minutes: i64,
    /// Once a reminder went out, the client keeps this long to cancel.
    pub reminder_grace_minutes: i64,
    /// Base step that both slot granularities must be a multiple of.
    pub base_granularity_minutes: i64,
    pub service_slot_minutes: i64,
    pub court_slot_minutes: i64,
    /// Fallback duration when neither booking nor service/court carries one.
    pub default_duration_minutes: i64,
    /// Longest bookable appointment. The conflict-query window is derived
    /// from this, so it must dominate every configured service duration.
    pub max_duration_minutes: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_lead_minutes: 120,
            client_cancel_cutoff_minutes: 23 * 60,
            reminder_grace_minutes: 60,
            base_granularity_minutes: 15,
            service_slot_minutes: 30,
            court_slot_minutes: 60,
            default_duration_minutes: 60,
            max_duration_minutes: 480,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Where the outbox worker POSTs notification payloads. Unset means
    /// deliveries are logged only.
    pub webhook_url: Option<String>,
    pub poll_interval_secs: u64,
    pub max_attempts: i64,
    pub backoff_base_secs: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            poll_interval_secs: 5,
            max_attempts: 8,
            backoff_base_secs: 30,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("stripe.enabled", false)?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with BOOKWELL__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("BOOKWELL").separator("__"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects knob combinations that would silently break scheduling:
    /// slot steps that drift off the base grid, and a conflict-query window
    /// smaller than the longest appointment it must be able to see.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.booking;
        if b.base_granularity_minutes <= 0 {
            return Err(ConfigError::Message(
                "booking.base_granularity_minutes must be positive".into(),
            ));
        }
        for (name, step) in [
            ("booking.service_slot_minutes", b.service_slot_minutes),
            ("booking.court_slot_minutes", b.court_slot_minutes),
        ] {
            if step <= 0 || step % b.base_granularity_minutes != 0 {
                return Err(ConfigError::Message(format!(
                    "{} must be a positive multiple of booking.base_granularity_minutes",
                    name
                )));
            }
        }
        if b.max_duration_minutes < b.default_duration_minutes {
            return Err(ConfigError::Message(
                "booking.max_duration_minutes must cover booking.default_duration_minutes".into(),
            ));
        }
        if b.min_lead_minutes < 0 || b.client_cancel_cutoff_minutes < 0 {
            return Err(ConfigError::Message(
                "booking lead/cutoff minutes must not be negative".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://bookwell.db".to_string(),
                max_connections: 10,
            },
            booking: BookingConfig::default(),
            stripe: StripeConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}
