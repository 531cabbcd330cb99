//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8080`, `0` auto-assigns).
    pub port: u16,
    /// Seconds between empty-session sweeps.
    pub sweep_interval_secs: u64,
    /// Phones allowed in one session.
    pub max_phones_per_session: usize,
    /// Displays allowed in one session.
    pub max_displays_per_session: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before new ones are dropped.
    pub send_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            sweep_interval_secs: 300,
            max_phones_per_session: 64,
            max_displays_per_session: 8,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from `lookup` (an environment-like key → value source).
    ///
    /// Recognized keys: `PORT`, `RELAY_HOST`, `RELAY_SWEEP_INTERVAL_SECS`,
    /// `RELAY_MAX_PHONES`, `RELAY_MAX_DISPLAYS`. Invalid or out-of-range values
    /// are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = read_range(&lookup, "PORT", 0, u16::MAX) {
            self.port = v;
        }
        if let Some(v) = lookup("RELAY_HOST").filter(|v| !v.trim().is_empty()) {
            self.host = v;
        }
        if let Some(v) = read_range(&lookup, "RELAY_SWEEP_INTERVAL_SECS", 1, 86_400) {
            self.sweep_interval_secs = v;
        }
        if let Some(v) = read_range(&lookup, "RELAY_MAX_PHONES", 1, 10_000) {
            self.max_phones_per_session = v;
        }
        if let Some(v) = read_range(&lookup, "RELAY_MAX_DISPLAYS", 1, 1_000) {
            self.max_displays_per_session = v;
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sweep period as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Parse `val` and accept it only within `[min, max]`.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_range<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    let val = lookup(key)?;
    let result = parse_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key, value = %val, "invalid env var, ignoring");
    }
    result
}
