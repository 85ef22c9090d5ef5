use crate::bus::DEFAULT_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load variables from `.env` in the working directory.
///
/// Values may contain spaces without quoting. Variables already present in
/// the environment win.
pub fn load_dotenv() {
    let Ok(content) = fs::read_to_string(Path::new(".env")) else {
        return;
    };

    for (key, value) in content.lines().filter_map(parse_env_line) {
        if std::env::var(key).is_err() {
            // SAFETY: called at start-up before the runtime spawns threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split one `.env` line into key and value. Comments and blanks yield None.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let mut value = value.trim();
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }
    (!key.is_empty()).then_some((key, value))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// UCL topic prefix.
    pub topic_prefix: String,
    /// How long a request waits for its bus reply.
    pub reply_timeout_ms: u64,
    /// How often expired requests are swept.
    pub sweep_interval_ms: u64,
    /// First Matter endpoint handed to a bus device. 0 is the root node and
    /// 1 the aggregator.
    pub first_dynamic_endpoint: u16,
}

impl BridgeConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero period would make the interval panic
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "unify-matter-bridge".to_string(),
                username: None,
                password: None,
            },
            bridge: BridgeConfig {
                topic_prefix: DEFAULT_PREFIX.to_string(),
                reply_timeout_ms: 5000,
                sweep_interval_ms: 250,
                first_dynamic_endpoint: 2,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults overridden by `lookup`. Unparsable numbers keep
    /// their default.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Some(host) = lookup("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = lookup("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        // Bridge configuration
        if let Some(prefix) = lookup("UCL_TOPIC_PREFIX") {
            config.bridge.topic_prefix = prefix;
        }
        if let Some(timeout) = lookup("BRIDGE_REPLY_TIMEOUT_MS")
            && let Ok(t) = timeout.parse()
        {
            config.bridge.reply_timeout_ms = t;
        }
        if let Some(interval) = lookup("BRIDGE_SWEEP_INTERVAL_MS")
            && let Ok(i) = interval.parse()
        {
            config.bridge.sweep_interval_ms = i;
        }
        if let Some(endpoint) = lookup("BRIDGE_FIRST_DYNAMIC_ENDPOINT")
            && let Ok(e) = endpoint.parse()
        {
            config.bridge.first_dynamic_endpoint = e;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_env_line() {
        assert_eq!(parse_env_line("MQTT_BROKER_HOST=10.0.0.2"), Some(("MQTT_BROKER_HOST", "10.0.0.2")));
        assert_eq!(parse_env_line("NAME = Living Room "), Some(("NAME", "Living Room")));
        assert_eq!(parse_env_line("PASS='a=b'"), Some(("PASS", "a=b")));
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("   "), None);
        assert_eq!(parse_env_line("no equals sign"), None);
        assert_eq!(parse_env_line("Q=\""), Some(("Q", "\"")));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("MQTT_BROKER_PORT", "8883"),
            ("MQTT_USERNAME", "bridge"),
            ("UCL_TOPIC_PREFIX", "site1/ucl"),
            ("BRIDGE_REPLY_TIMEOUT_MS", "750"),
            ("BRIDGE_SWEEP_INTERVAL_MS", "soon"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.mqtt.broker_host, "localhost");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
        assert_eq!(config.bridge.topic_prefix, "site1/ucl");
        assert_eq!(config.bridge.reply_timeout(), Duration::from_millis(750));
        assert_eq!(config.bridge.sweep_interval_ms, 250);
        assert_eq!(config.bridge.first_dynamic_endpoint, 2);
    }
}
