// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sink configuration.
//!
//! ## Configuration Priority
//!
//! Sources are applied in order, later sources overriding earlier ones:
//!
//! 1. **Defaults** - [`SinkConfig::default`]
//! 2. **YAML file** - [`yaml::YamlConfigSource`]
//! 3. **Environment variables** - `ES_LOG_*` via [`env::EnvConfigSource`]
//!
//! ## Edge Cases and Behaviors
//!
//! - Numbers and booleans may be given as strings (`"1000"`, `"yes"`).
//! - Invalid values are logged and ignored; the previous layer's value stays.
//! - `additional_fields` accepts a mapping or a `key:value,key:value` string.
//! - `hosts` accepts a list or a comma separated string of `scheme://host:port`.
//!
//! A sink never reads configuration after construction: the built
//! [`SinkConfig`] is shared read-only through an `Arc`.

pub mod env;
pub mod host;
pub mod yaml;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::ConfigurationError;
use crate::index_name::IndexNameFrequency;
pub use host::Host;

pub const DEFAULT_BUFFER_SIZE: usize = 1000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_INDEX_NAME: &str = "rust_logger";
pub const DEFAULT_TIMESTAMP_FIELD_NAME: &str = "timestamp";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of entries held in the buffer before the oldest are evicted.
///
/// Repeatedly failing transmissions would otherwise let the buffer grow
/// without bound between flush attempts.
pub const DEFAULT_MAX_BUFFERED_ENTRIES: usize = 50_000;

/// Merge `Option<T>` fields of a partial config into the config.
#[macro_export]
macro_rules! merge_option {
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(value) = $source.$field {
            $config.$field = value;
        }
    };
    ($config:expr, $config_field:ident, $source:expr, $source_field:ident) => {
        if let Some(value) = $source.$source_field {
            $config.$config_field = value;
        }
    };
}

/// Merge `Option<T>` fields into `Option<T>` config fields.
#[macro_export]
macro_rules! merge_option_to_option {
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(value) = $source.$field {
            $config.$field = Some(value);
        }
    };
}

/// Document layout produced by the normalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// Every record attribute except the derived ones, plus caller extras.
    #[default]
    Full,
    /// Rendered message and a handful of location fields as strings.
    Compact,
}

impl FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(RecordFormat::Full),
            "compact" => Ok(RecordFormat::Compact),
            _ => Err(format!(
                "Invalid record format: '{s}'. Valid values are: full, compact"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for RecordFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(RecordFormat::from_str(&s).unwrap_or_else(|e| {
                error!("{}", e);
                RecordFormat::default()
            })),
            other => {
                error!("Expected a string for record format, got {:?}", other);
                Ok(RecordFormat::default())
            }
        }
    }
}

/// Raw authentication selection. Resolved into a strategy when the client is
/// first built, so an unknown `auth_type` only fails at that point.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    pub auth_type: String,
    pub username: String,
    pub password: String,
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub aws_region: String,
}

impl AuthSettings {
    #[must_use]
    pub fn none() -> Self {
        AuthSettings {
            auth_type: "none".to_string(),
            ..AuthSettings::default()
        }
    }

    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthSettings {
            auth_type: "basic".to_string(),
            username: username.into(),
            password: password.into(),
            ..AuthSettings::default()
        }
    }

    #[must_use]
    pub fn kerberos() -> Self {
        AuthSettings {
            auth_type: "kerberos".to_string(),
            ..AuthSettings::default()
        }
    }

    #[must_use]
    pub fn aws_signed(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        AuthSettings {
            auth_type: "aws_signed".to_string(),
            aws_access_key: access_key.into(),
            aws_secret_key: secret_key.into(),
            aws_region: region.into(),
            ..AuthSettings::default()
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |s: &str| if s.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("AuthSettings")
            .field("auth_type", &self.auth_type)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("aws_access_key", &redacted(&self.aws_access_key))
            .field("aws_secret_key", &redacted(&self.aws_secret_key))
            .field("aws_region", &self.aws_region)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    pub hosts: Vec<Host>,
    pub auth: AuthSettings,
    /// Buffer length that triggers an inline flush.
    pub buffer_size: usize,
    /// Delay between the first unflushed append and the timed flush.
    pub flush_interval: Duration,
    pub index_name: String,
    pub index_name_frequency: IndexNameFrequency,
    pub doc_type: Option<String>,
    pub additional_fields: Map<String, Value>,
    /// Fail-fast: return transmission errors to the caller instead of
    /// logging them and rescheduling. Meant for diagnostics.
    pub raise_on_indexing_exceptions: bool,
    pub timestamp_field_name: String,
    /// Only the timer flushes; reaching `buffer_size` does not.
    pub timed_flush: bool,
    pub record_format: RecordFormat,
    pub include_host_fields: bool,
    /// Oldest entries are evicted beyond this many. Never below `buffer_size`.
    pub max_buffered_entries: usize,
    pub request_timeout: Duration,
    pub verify_certs: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            hosts: vec![Host::default()],
            auth: AuthSettings::none(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            index_name_frequency: IndexNameFrequency::default(),
            doc_type: None,
            additional_fields: Map::new(),
            raise_on_indexing_exceptions: false,
            timestamp_field_name: DEFAULT_TIMESTAMP_FIELD_NAME.to_string(),
            timed_flush: false,
            record_format: RecordFormat::default(),
            include_host_fields: true,
            max_buffered_entries: DEFAULT_MAX_BUFFERED_ENTRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            verify_certs: true,
        }
    }
}

impl SinkConfig {
    /// Checks the settings a sink cannot run without.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.hosts.is_empty() {
            return Err(ConfigurationError::Invalid(
                "at least one host must be configured".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ConfigurationError::Invalid(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.max_buffered_entries == 0 {
            return Err(ConfigurationError::Invalid(
                "max_buffered_entries must be greater than zero".to_string(),
            ));
        }
        if self.index_name.trim().is_empty() {
            return Err(ConfigurationError::Invalid(
                "index_name must not be empty".to_string(),
            ));
        }
        if self.timestamp_field_name.is_empty() {
            return Err(ConfigurationError::Invalid(
                "timestamp_field_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Every setting as it may appear in a YAML file or the environment.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PartialConfig {
    #[serde(deserialize_with = "deserialize_hosts")]
    pub hosts: Option<Vec<Host>>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub auth_type: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub password: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub aws_access_key: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub aws_secret_key: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub aws_region: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_usize")]
    pub buffer_size: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_duration_from_seconds")]
    pub flush_interval: Option<Duration>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub index_name: Option<String>,
    pub index_name_frequency: Option<IndexNameFrequency>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub doc_type: Option<String>,
    #[serde(deserialize_with = "deserialize_key_value_pairs")]
    pub additional_fields: Option<Map<String, Value>>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub raise_on_indexing_exceptions: Option<bool>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub timestamp_field_name: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub timed_flush: Option<bool>,
    pub record_format: Option<RecordFormat>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub include_host_fields: Option<bool>,
    #[serde(deserialize_with = "deserialize_optional_usize")]
    pub max_buffered_entries: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_duration_from_seconds")]
    pub request_timeout: Option<Duration>,
    #[serde(deserialize_with = "deserialize_optional_bool_from_anything")]
    pub verify_certs: Option<bool>,
}

impl PartialConfig {
    /// Overlays every present value onto `config`.
    pub fn merge_into(self, config: &mut SinkConfig) {
        merge_option!(config, self, hosts);
        merge_option!(config.auth, self, auth_type);
        merge_option!(config.auth, self, username);
        merge_option!(config.auth, self, password);
        merge_option!(config.auth, self, aws_access_key);
        merge_option!(config.auth, self, aws_secret_key);
        merge_option!(config.auth, self, aws_region);
        merge_option!(config, self, buffer_size);
        merge_option!(config, self, flush_interval);
        merge_option!(config, self, index_name);
        merge_option!(config, self, index_name_frequency);
        merge_option_to_option!(config, self, doc_type);
        if let Some(fields) = self.additional_fields {
            config.additional_fields.extend(fields);
        }
        merge_option!(config, self, raise_on_indexing_exceptions);
        merge_option!(config, self, timestamp_field_name);
        merge_option!(config, self, timed_flush);
        merge_option!(config, self, record_format);
        merge_option!(config, self, include_host_fields);
        merge_option!(config, self, max_buffered_entries);
        merge_option!(config, self, request_timeout);
        merge_option!(config, self, verify_certs);
    }
}

#[allow(clippy::module_name_repetitions)]
pub trait ConfigSource {
    fn load(&self, config: &mut SinkConfig) -> Result<(), ConfigurationError>;
}

#[derive(Default)]
#[allow(clippy::module_name_repetitions)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    config: SinkConfig,
}

#[allow(clippy::module_name_repetitions)]
impl ConfigBuilder {
    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Applies every source in order. A failing source is logged and skipped.
    pub fn build(&mut self) -> SinkConfig {
        let mut failed_sources = 0;
        for source in &self.sources {
            if let Err(e) = source.load(&mut self.config) {
                error!("Failed to load config: {}", e);
                failed_sources += 1;
            }
        }

        if !self.sources.is_empty() && failed_sources == self.sources.len() {
            debug!("All sources failed to load config, using default config.");
        }

        if self.config.hosts.is_empty() {
            self.config.hosts = vec![Host::default()];
        }

        self.config.clone()
    }
}

/// Defaults overlaid with the optional YAML file, then the environment.
#[must_use]
pub fn get_config(yaml_path: Option<std::path::PathBuf>) -> SinkConfig {
    let mut builder = ConfigBuilder::default();
    if let Some(path) = yaml_path {
        builder = builder.add_source(Box::new(yaml::YamlConfigSource { path }));
    }
    builder.add_source(Box::new(env::EnvConfigSource)).build()
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s.trim().to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Null => Ok(None),
        other => {
            error!("Expected a string, got {:?}, ignoring", other);
            Ok(None)
        }
    }
}

pub fn deserialize_optional_usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => match n.as_u64().and_then(|n| usize::try_from(n).ok()) {
            Some(n) => Ok(Some(n)),
            None => {
                error!("Expected a non-negative integer, got {}, ignoring", n);
                Ok(None)
            }
        },
        Value::String(s) => match s.trim().parse::<usize>() {
            Ok(n) => Ok(Some(n)),
            Err(e) => {
                error!("Failed to parse '{}' as an integer: {}, ignoring", s, e);
                Ok(None)
            }
        },
        Value::Null => Ok(None),
        other => {
            error!("Expected an integer, got {:?}, ignoring", other);
            Ok(None)
        }
    }
}

pub fn deserialize_optional_bool_from_anything<'de, D>(
    deserializer: D,
) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(Some(b)),
        Value::Number(n) => Ok(n.as_f64().map(|n| n != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => {
                error!("Failed to parse '{}' as a boolean, ignoring", s);
                Ok(None)
            }
        },
        Value::Null => Ok(None),
        other => {
            error!("Expected a boolean, got {:?}, ignoring", other);
            Ok(None)
        }
    }
}

/// Seconds as integer, float or numeric string; fractional seconds allowed.
pub fn deserialize_optional_duration_from_seconds<'de, D>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return Ok(None),
        _ => None,
    };
    match seconds.and_then(|s| Duration::try_from_secs_f64(s).ok()) {
        Some(duration) => Ok(Some(duration)),
        None => {
            error!("Expected a non-negative number of seconds, ignoring");
            Ok(None)
        }
    }
}

/// A mapping, or a `key:value,key:value` string. String values that look
/// numeric stay strings.
pub fn deserialize_key_value_pairs<'de, D>(
    deserializer: D,
) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(Some(map)),
        Value::String(s) => {
            let mut map = Map::new();
            for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match pair.split_once(':') {
                    Some((key, value)) if !key.trim().is_empty() => {
                        map.insert(key.trim().to_string(), Value::from(value.trim()));
                    }
                    _ => error!("Failed to parse additional field '{}', ignoring", pair),
                }
            }
            Ok(Some(map))
        }
        Value::Null => Ok(None),
        other => {
            error!("Expected a mapping of additional fields, got {:?}", other);
            Ok(None)
        }
    }
}

pub fn deserialize_hosts<'de, D>(deserializer: D) -> Result<Option<Vec<Host>>, D::Error>
where
    D: Deserializer<'de>,
{
    fn parse_one(value: &Value) -> Option<Host> {
        let parsed = match value {
            Value::String(s) => s.parse::<Host>(),
            Value::Object(obj) => {
                let host = obj.get("host").and_then(Value::as_str).unwrap_or("localhost");
                let port = obj
                    .get("port")
                    .and_then(Value::as_u64)
                    .and_then(|p| u16::try_from(p).ok())
                    .unwrap_or(host::DEFAULT_PORT);
                let scheme = obj.get("scheme").and_then(Value::as_str).unwrap_or("http");
                format!("{scheme}://{host}:{port}").parse::<Host>()
            }
            other => {
                error!("Expected a host, got {:?}", other);
                return None;
            }
        };
        parsed.map_err(|e| error!("{}", e)).ok()
    }

    let hosts: Vec<Host> = match Value::deserialize(deserializer)? {
        Value::String(s) => s
            .split(',')
            .filter(|h| !h.trim().is_empty())
            .filter_map(|h| parse_one(&Value::from(h)))
            .collect(),
        Value::Array(items) => items.iter().filter_map(parse_one).collect(),
        Value::Null => return Ok(None),
        other => {
            error!("Expected a list of hosts, got {:?}", other);
            return Ok(None);
        }
    };
    if hosts.is_empty() {
        return Ok(None);
    }
    Ok(Some(hosts))
}
