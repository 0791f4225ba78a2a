//! Layered settings: built-in defaults, optional TOML file, then
//! `CANDLEWATCH_*` environment variables (`__` separates sections)

use crate::api::binance::{BINANCE_REST_BASE, BINANCE_STREAM_BASE};
use crate::control::{SetAlertRuleRequest, SetPositionRequest};
use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "candlewatch";
const ENV_PREFIX: &str = "CANDLEWATCH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed: FeedSettings,
    pub server: ServerSettings,
    pub evaluation: EvaluationSettings,
    pub startup: StartupSettings,
    pub logging: LoggingSettings,
}

/// Exchange connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// WebSocket base; the aggTrade path is derived from `symbol`
    pub stream_base_url: String,
    pub rest_base_url: String,
    pub symbol: String,
    /// Candles fetched per timeframe at startup
    pub history_limit: usize,
    pub reconnect_delay_secs: u64,
}

/// Subscriber WebSocket server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// Outbound queue size per subscriber
    pub queue_capacity: usize,
    pub keepalive_secs: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub interval_secs: u64,
}

/// Control requests applied once before the feed starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupSettings {
    pub position: Option<SetPositionRequest>,
    pub alert_rules: Vec<SetAlertRuleRequest>,
    pub price_alerts: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when RUST_LOG is unset
    pub default_filter: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            stream_base_url: BINANCE_STREAM_BASE.to_string(),
            rest_base_url: BINANCE_REST_BASE.to_string(),
            symbol: "BTCUSDT".to_string(),
            history_limit: 250,
            reconnect_delay_secs: 5,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
            queue_capacity: 256,
            keepalive_secs: 60,
            shutdown_grace_secs: 5,
        }
    }
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            default_filter: "candlewatch=info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings
    ///
    /// With `path`, that file must exist. Without it, `candlewatch.toml` in the
    /// working directory is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = config::Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings = builder.build().context("failed to read configuration")?;
        settings
            .try_deserialize()
            .context("invalid configuration")
    }
}

impl FeedSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl ServerSettings {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl EvaluationSettings {
    /// Never zero; a zero interval would spin
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<Settings> {
        Settings::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_defaults() {
        let settings = from_toml("").unwrap();

        assert_eq!(settings.feed.symbol, "BTCUSDT");
        assert_eq!(settings.feed.history_limit, 250);
        assert_eq!(settings.feed.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(settings.server.bind_addr.port(), 5001);
        assert_eq!(settings.server.queue_capacity, 256);
        assert_eq!(settings.server.keepalive(), Duration::from_secs(60));
        assert_eq!(settings.evaluation.interval(), Duration::from_secs(5));
        assert!(settings.startup.position.is_none());
        assert_eq!(settings.logging.default_filter, "candlewatch=info");
    }

    #[test]
    fn test_file_overrides_and_startup_entries() {
        let settings = from_toml(
            r#"
            [feed]
            symbol = "ETHUSDT"
            reconnect_delay_secs = 2

            [server]
            bind_addr = "127.0.0.1:6001"

            [startup]
            price_alerts = [65000.0, 70000.5]

            [startup.position]
            entry_price = 64000.0
            position_type = "SHORT"
            sl_percent = 1.5
            tp_percent = 3.0

            [[startup.alert_rules]]
            timeframe = "1h"
            indicator = "RSI"
            enabled = false
            threshold = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(settings.feed.symbol, "ETHUSDT");
        assert_eq!(settings.feed.history_limit, 250);
        assert_eq!(settings.feed.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(settings.server.bind_addr, "127.0.0.1:6001".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.startup.price_alerts, vec![65000.0, 70000.5]);

        let position = settings.startup.position.unwrap();
        assert_eq!(position.position_type, "SHORT");
        assert!(!position.trailing_tp);
        assert_eq!(settings.startup.alert_rules.len(), 1);
        assert_eq!(settings.startup.alert_rules[0].indicator, "RSI");
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let err = from_toml("[server]\nbind_addr = \"not-an-address\"").unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let settings = from_toml("[evaluation]\ninterval_secs = 0").unwrap();
        assert_eq!(settings.evaluation.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(Settings::load(Some(Path::new("/nonexistent/candlewatch.toml"))).is_err());
    }
}
