use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, SinkError};
use crate::uri::Destination;

pub const ENV_URI: &str = "TELEGRAF_SOCKET_LISTENER_URI";
pub const ENV_BUFFER_SIZE: &str = "TELEGRAF_BUFFER_SIZE";
pub const ENV_FLUSH_INTERVAL: &str = "TELEGRAF_FLUSH_INTERVAL";
pub const ENV_PREFIX: &str = "TELEGRAF_PREFIX";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// `[scheme://][host]:port` of the listener.
    #[serde(default)]
    pub uri: String,

    /// Lines accumulated before a datagram is sent.
    #[serde(default = "default_buffer_size", alias = "bufferSize")]
    pub buffer_size: usize,

    /// Periodic flush of partial buffers; zero disables the timer.
    #[serde(default, alias = "flushInterval", with = "millis_or_humantime")]
    pub flush_interval: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

fn default_buffer_size() -> usize {
    1
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            buffer_size: default_buffer_size(),
            flush_interval: Duration::ZERO,
            prefix: None,
        }
    }
}

impl SinkConfig {
    pub fn builder() -> SinkConfigBuilder {
        SinkConfigBuilder::default()
    }

    pub fn destination(&self) -> Destination {
        Destination::parse(&self.uri)
    }

    /// Buffer size actually used; zero behaves like one.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }

    pub fn flush_enabled(&self) -> bool {
        !self.flush_interval.is_zero()
    }

    /// Reads the `TELEGRAF_*` environment variables. Unset variables keep
    /// their defaults; unparseable ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(uri) = lookup(ENV_URI) {
            config.uri = uri;
        }

        if let Some(raw) = lookup(ENV_BUFFER_SIZE) {
            match raw.trim().parse() {
                Ok(size) => config.buffer_size = size,
                Err(e) => warn!(
                    variable = ENV_BUFFER_SIZE,
                    value = %raw,
                    error = %e,
                    "Ignoring invalid value"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_FLUSH_INTERVAL) {
            match millis_or_humantime::parse(&raw) {
                Ok(interval) => config.flush_interval = interval,
                Err(e) => warn!(
                    variable = ENV_FLUSH_INTERVAL,
                    value = %raw,
                    error = %e,
                    "Ignoring invalid value"
                ),
            }
        }

        config.prefix = lookup(ENV_PREFIX).filter(|prefix| !prefix.is_empty());
        config
    }
}

#[derive(Default)]
pub struct SinkConfigBuilder {
    uri: Option<String>,
    buffer_size: Option<usize>,
    flush_interval: Option<Duration>,
    prefix: Option<String>,
}

impl SinkConfigBuilder {
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = Some(flush_interval);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> SinkConfig {
        SinkConfig {
            uri: self.uri.unwrap_or_default(),
            buffer_size: self.buffer_size.unwrap_or_else(default_buffer_size),
            flush_interval: self.flush_interval.unwrap_or(Duration::ZERO),
            prefix: self.prefix,
        }
    }
}

/// TOML files keep the settings under a `[sink]` table.
#[derive(Debug, Deserialize)]
struct SinkConfigFile {
    sink: SinkConfig,
}

pub async fn load_sink_config(path: impl AsRef<Path>) -> Result<SinkConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;

    match path.extension().and_then(|s| s.to_str()) {
        Some(format @ ("yaml" | "yml" | "toml" | "json")) => parse_sink_config(&contents, format),
        other => Err(SinkError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

pub fn parse_sink_config(content: &str, format: &str) -> Result<SinkConfig> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(serde_yaml::from_str(content)?),
        "toml" => {
            let file: SinkConfigFile = toml::from_str(content)?;
            Ok(file.sink)
        }
        "json" => Ok(serde_json::from_str(content)?),
        _ => Err(SinkError::UnsupportedFormat(format.to_string())),
    }
}

/// Durations written either as whole milliseconds or as humantime strings.
mod millis_or_humantime {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn parse(raw: &str) -> Result<Duration, humantime::DurationError> {
        let raw = raw.trim();
        match raw.parse::<u64>() {
            Ok(millis) => Ok(Duration::from_millis(millis)),
            Err(_) => humantime::parse_duration(raw),
        }
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(millis) => Ok(Duration::from_millis(millis)),
            Raw::Text(text) => parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SinkConfig::default();
        assert_eq!(config.destination(), Destination::new("localhost", 8094));
        assert_eq!(config.effective_buffer_size(), 1);
        assert!(!config.flush_enabled());
        assert!(config.prefix.is_none());
    }

    #[test]
    fn test_zero_buffer_size_behaves_like_one() {
        let config = SinkConfig::builder().buffer_size(0).build();
        assert_eq!(config.effective_buffer_size(), 1);
    }

    #[test]
    fn test_builder() {
        let config = SinkConfig::builder()
            .uri("udp://telegraf:8125")
            .buffer_size(10)
            .flush_interval(Duration::from_millis(250))
            .prefix("api")
            .build();

        assert_eq!(config.destination(), Destination::new("telegraf", 8125));
        assert_eq!(config.buffer_size, 10);
        assert!(config.flush_enabled());
        assert_eq!(config.prefix.as_deref(), Some("api"));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
uri: "udp://telegraf:8094"
bufferSize: 20
flushInterval: 500
prefix: "svc"
"#;
        let config = parse_sink_config(yaml, "yaml").unwrap();
        assert_eq!(config.buffer_size, 20);
        assert_eq!(config.flush_interval, Duration::from_millis(500));
        assert_eq!(config.prefix.as_deref(), Some("svc"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[sink]
uri = "udp://127.0.0.1:9000"
buffer_size = 5
flush_interval = "2s"
"#;
        let config = parse_sink_config(toml, "toml").unwrap();
        assert_eq!(config.destination(), Destination::new("127.0.0.1", 9000));
        assert_eq!(config.buffer_size, 5);
        assert_eq!(config.flush_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_json_with_defaults() {
        let config = parse_sink_config(r#"{"uri": "udp://:8094"}"#, "json").unwrap();
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.flush_interval, Duration::ZERO);
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let result = parse_sink_config(r#"{"flush_interval": "soon"}"#, "json");
        assert!(matches!(result, Err(SinkError::SerializationError(_))));
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            parse_sink_config("", "ini"),
            Err(SinkError::UnsupportedFormat(f)) if f == "ini"
        ));
    }

    #[test]
    fn test_serialized_interval_round_trips() {
        let config = SinkConfig::builder()
            .flush_interval(Duration::from_millis(1500))
            .build();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"1s 500ms\""));
        assert_eq!(parse_sink_config(&json, "json").unwrap(), config);
    }

    #[test]
    fn test_from_env_lookup() {
        let vars = HashMap::from([
            (ENV_URI, "udp://telegraf:8094"),
            (ENV_BUFFER_SIZE, "many"),
            (ENV_FLUSH_INTERVAL, "100ms"),
            (ENV_PREFIX, ""),
        ]);
        let config = SinkConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.uri, "udp://telegraf:8094");
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.flush_interval, Duration::from_millis(100));
        assert!(config.prefix.is_none());
    }

    #[tokio::test]
    async fn test_load_unknown_extension() {
        let path = std::env::temp_dir().join(format!("telemeter-{}.ini", std::process::id()));
        tokio::fs::write(&path, "uri = x").await.unwrap();

        let result = load_sink_config(&path).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert!(matches!(result, Err(SinkError::UnsupportedFormat(ext)) if ext == "ini"));
    }
}
