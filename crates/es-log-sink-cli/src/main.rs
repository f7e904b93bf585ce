// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, path::PathBuf, process};

use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use es_log_sink::{config, LogLevel, LogRecord, LogSink, SinkLayer};

const RECORD_NAME: &str = "stdin";

/// A JSON object line keeps its fields as extras, with `message`/`msg` and
/// `level` lifted out. Anything else is the message itself.
fn record_from_line(line: &str) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(line) else {
        return Some(LogRecord::new(RECORD_NAME, LogLevel::Info, line));
    };

    let message = ["message", "msg"]
        .iter()
        .find_map(|key| fields.remove(*key))
        .map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_default();
    let level = fields
        .remove("level")
        .and_then(|value| value.as_str().and_then(|s| s.parse::<LogLevel>().ok()))
        .unwrap_or_default();

    Some(LogRecord::new(RECORD_NAME, level, message).with_extras(fields))
}

/// Buffers one stdin line. Returns whether a record was accepted.
async fn ship_line(sink: &LogSink, line: &str) -> bool {
    let Some(record) = record_from_line(line) else {
        return false;
    };
    match sink.append(&record).await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to ship record: {}", e);
            false
        }
    }
}

async fn create_index(sink: &LogSink, path: &str) {
    let mapping = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            error!("Unable to read index mapping {}: {}", path, e);
            return;
        }
    };
    let mapping: Value = match serde_json::from_str(&mapping) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) => Value::Object(Map::new()),
        Err(e) => {
            error!("Index mapping {} is not valid JSON: {}", path, e);
            return;
        }
    };
    match sink.create_index_with_mapping(&mapping).await {
        Ok(()) => info!("Index {} is ready", sink.config().index_name),
        Err(e) => error!("Failed to create index {}: {}", sink.config().index_name, e),
    }
}

#[tokio::main]
pub async fn main() {
    let log_level = env::var("ES_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter =
        format!("h2=off,hyper=off,hyper_util=off,rustls=off,reqwest=off,{log_level}");

    // Config parsing problems go to stderr before the sink exists.
    let config_file = env::var("ES_LOG_CONFIG_FILE").ok().map(PathBuf::from);
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || config::get_config(config_file));

    let sink = match LogSink::new(config) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("Invalid es-log-sink configuration: {e}");
            process::exit(1);
        }
    };

    let filter = match EnvFilter::try_new(env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Could not parse ES_LOG_LEVEL: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .without_time(),
        )
        .with(SinkLayer::new(sink.clone()))
        .try_init()
    {
        eprintln!("Setting default subscriber failed: {e}");
        process::exit(1);
    }

    debug!("Logging subsystem enabled");

    match sink.test_connection().await {
        Ok(true) => info!("Connected to {:?}", sink.config().hosts),
        Ok(false) => warn!("No Elasticsearch host is reachable, records will be retried"),
        Err(e) => {
            error!("Unable to build Elasticsearch client: {}", e);
            process::exit(1);
        }
    }

    if let Ok(path) = env::var("ES_LOG_INDEX_MAPPING") {
        create_index(&sink, &path).await;
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", e);
            return;
        }
        signal_token.cancel();
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shipped: u64 = 0;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if ship_line(&sink, &line).await {
                        shipped += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    }

    info!("Shipped {} records, shutting down", shipped);
    // the sink is closed from here on, so report straight to stderr
    if let Err(e) = sink.close().await {
        eprintln!("Final flush failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_log_sink::config::Host;
    use es_log_sink::SinkConfig;
    use serde_json::json;
    use std::time::Duration;

    fn unreachable_sink(raise_on_indexing_exceptions: bool) -> LogSink {
        let config = SinkConfig {
            hosts: vec!["http://127.0.0.1:1".parse::<Host>().expect("host")],
            buffer_size: 1,
            flush_interval: Duration::from_secs(1000),
            include_host_fields: false,
            request_timeout: Duration::from_secs(1),
            raise_on_indexing_exceptions,
            ..SinkConfig::default()
        };
        LogSink::new(config).expect("sink")
    }

    #[test]
    fn test_plain_line() {
        let record = record_from_line("  service started  ").expect("record");
        assert_eq!(record.message, "service started");
        assert_eq!(record.level, LogLevel::Info);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_blank_line_skipped() {
        assert!(record_from_line("   ").is_none());
    }

    #[test]
    fn test_json_line() {
        let record =
            record_from_line(r#"{"msg": "payment declined", "level": "warning", "order": 42}"#)
                .expect("record");
        assert_eq!(record.message, "payment declined");
        assert_eq!(record.level, LogLevel::Warn);
        assert_eq!(record.extra["order"], json!(42));
        assert!(!record.extra.contains_key("msg"));
        assert!(!record.extra.contains_key("level"));
    }

    #[test]
    fn test_json_scalar_is_plain_message() {
        let record = record_from_line("42").expect("record");
        assert_eq!(record.message, "42");
    }

    #[tokio::test]
    async fn test_failed_append_is_not_counted() {
        let sink = unreachable_sink(true);
        assert!(!ship_line(&sink, "lost record").await);
        assert!(!ship_line(&sink, "   ").await);
    }

    #[tokio::test]
    async fn test_accepted_append_is_counted() {
        let sink = unreachable_sink(false);
        assert!(ship_line(&sink, "kept record").await);
    }
}
