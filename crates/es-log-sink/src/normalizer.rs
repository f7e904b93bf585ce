// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Record normalization.
//!
//! Turns a [`LogRecord`] into the flat document stored in the buffer:
//!
//! 1. static fields (configured extras plus host identity) form the base
//! 2. registered record attributes are copied, minus [`DENIED_ATTRIBUTES`]
//! 3. absent values become `""` so the backend mapping sees uniform types
//! 4. positional args are stringified element-wise
//! 5. caller extras are added unless they shadow a registered attribute
//! 6. the UTC timestamp is injected under the configured field name

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{RecordFormat, SinkConfig};
use crate::hostname;
use crate::record::{stringify_arg, LogRecord, RECORD_ATTRIBUTES};
use crate::NormalizedEntry;

/// Derived attributes that duplicate information kept elsewhere.
pub const DENIED_ATTRIBUTES: &[&str] = &["msecs", "relative_created", "level_no", "created"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone)]
pub struct Normalizer {
    static_fields: NormalizedEntry,
    timestamp_field_name: String,
    format: RecordFormat,
}

impl Normalizer {
    /// With `include_host_fields`, the first normalizer in the process
    /// resolves the host identity, which blocks on DNS.
    #[must_use]
    pub fn new(config: &SinkConfig) -> Self {
        let mut static_fields = Map::new();
        if config.include_host_fields {
            let (host, host_ip) = hostname::host_identity();
            static_fields.insert("host".to_string(), Value::from(host.as_str()));
            static_fields.insert("host_ip".to_string(), Value::from(host_ip.as_str()));
        }
        // user supplied fields win over detected host identity
        static_fields.extend(config.additional_fields.clone());

        Normalizer {
            static_fields,
            timestamp_field_name: config.timestamp_field_name.clone(),
            format: config.record_format,
        }
    }

    #[must_use]
    pub fn static_fields(&self) -> &NormalizedEntry {
        &self.static_fields
    }

    #[must_use]
    pub fn normalize(&self, record: &LogRecord) -> NormalizedEntry {
        let mut entry = match self.format {
            RecordFormat::Full => self.full(record),
            RecordFormat::Compact => self.compact(record),
        };
        entry.insert(
            self.timestamp_field_name.clone(),
            Value::from(format_timestamp(record.created)),
        );
        entry
    }

    fn full(&self, record: &LogRecord) -> NormalizedEntry {
        let mut entry = self.static_fields.clone();
        for (name, value) in record.attributes() {
            if DENIED_ATTRIBUTES.contains(&name) {
                continue;
            }
            let value = match (name, value) {
                (_, None | Some(Value::Null)) => Value::from(""),
                ("args", Some(_)) => Value::from(
                    record
                        .args
                        .iter()
                        .map(|arg| Value::from(stringify_arg(arg)))
                        .collect::<Vec<_>>(),
                ),
                (_, Some(value)) => value,
            };
            entry.insert(name.to_string(), value);
        }
        for (key, value) in &record.extra {
            if RECORD_ATTRIBUTES.contains(&key.as_str()) {
                debug!("Ignoring extra field `{key}` shadowing a record attribute");
                continue;
            }
            let value = if value.is_null() {
                Value::from("")
            } else {
                value.clone()
            };
            entry.insert(key.clone(), value);
        }
        entry
    }

    fn compact(&self, record: &LogRecord) -> NormalizedEntry {
        let mut entry = self.static_fields.clone();
        entry.insert("msg".to_string(), Value::from(record.rendered_message()));
        let kept: [(&str, Option<String>); 7] = [
            ("level", Some(record.level.as_str().to_string())),
            ("pathname", record.pathname.clone()),
            ("lineno", record.lineno.map(|l| l.to_string())),
            ("func_name", record.func_name.clone()),
            ("thread_name", record.thread_name.clone()),
            ("process_name", record.process_name.clone()),
            ("process", Some(record.process.to_string())),
        ];
        for (key, value) in kept {
            if let Some(value) = value {
                entry.insert(key.to_string(), Value::from(value));
            }
        }
        entry
    }
}

/// Formats epoch seconds as `YYYY-MM-DDTHH:MM:SS.mmmZ` (UTC, milliseconds
/// truncated).
#[must_use]
pub fn format_timestamp(epoch_seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let micros = (epoch_seconds * 1_000_000.0).round() as i64;
    let datetime = DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_else(|| {
        debug!("Record timestamp {epoch_seconds} out of range, using current time");
        Utc::now()
    });
    datetime.format(TIMESTAMP_FORMAT).to_string()
}
