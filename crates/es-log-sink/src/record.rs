// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Input log records.
//!
//! A [`LogRecord`] is the immutable event handed to the sink by application
//! code. Besides the values set by the caller it exposes a few derived
//! attributes (`msecs`, `relative_created`, `level_no`) so that the complete
//! attribute set can be enumerated through [`LogRecord::attributes`]; the
//! normalizer decides which of them reach the backend.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity of a record, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Numeric severity code.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            LogLevel::Trace => 5,
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Warn => 30,
            LogLevel::Error => 40,
            LogLevel::Critical => 50,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "critical" | "fatal" => Ok(LogLevel::Critical),
            _ => Err(format!("Invalid log level: '{s}'")),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

/// Every attribute name a record registers, in emission order.
///
/// Caller extras using one of these names are ignored by the normalizer.
pub const RECORD_ATTRIBUTES: &[&str] = &[
    "name",
    "msg",
    "args",
    "level",
    "level_no",
    "pathname",
    "filename",
    "module",
    "func_name",
    "lineno",
    "created",
    "msecs",
    "relative_created",
    "thread",
    "thread_name",
    "process",
    "process_name",
    "exc_text",
    "stack_info",
];

/// Seconds since the epoch at which this process first built a record.
fn process_start() -> f64 {
    static START: OnceLock<f64> = OnceLock::new();
    *START.get_or_init(now_epoch_seconds)
}

#[must_use]
pub fn now_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// A structured log event.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// Logger name (the `tracing` target for layer-produced records).
    pub name: String,
    pub level: LogLevel,
    /// Message template; `{}` placeholders are filled from `args`.
    pub message: String,
    pub args: Vec<Value>,
    pub pathname: Option<String>,
    pub module: Option<String>,
    pub func_name: Option<String>,
    pub lineno: Option<u32>,
    /// Creation time in seconds since the epoch, sub-millisecond precision.
    pub created: f64,
    pub thread: Option<String>,
    pub thread_name: Option<String>,
    pub process: u32,
    pub process_name: Option<String>,
    pub exc_text: Option<String>,
    pub stack_info: Option<String>,
    pub extra: Map<String, Value>,
    start_time: f64,
}

impl LogRecord {
    /// Creates a record stamped with the current time, thread and process.
    #[must_use]
    pub fn new(name: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        let current = std::thread::current();
        LogRecord {
            name: name.into(),
            level,
            message: message.into(),
            args: Vec::new(),
            pathname: None,
            module: None,
            func_name: None,
            lineno: None,
            created: now_epoch_seconds(),
            thread: Some(format!("{:?}", current.id())),
            thread_name: current.name().map(str::to_string),
            process: std::process::id(),
            process_name: std::env::args().next(),
            exc_text: None,
            stack_info: None,
            extra: Map::new(),
            start_time: process_start(),
        }
    }

    #[must_use]
    pub fn with_created(mut self, created: f64) -> Self {
        self.created = created;
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_location(
        mut self,
        pathname: impl Into<String>,
        module: impl Into<String>,
        lineno: u32,
    ) -> Self {
        self.pathname = Some(pathname.into());
        self.module = Some(module.into());
        self.lineno = Some(lineno);
        self
    }

    #[must_use]
    pub fn with_func_name(mut self, func_name: impl Into<String>) -> Self {
        self.func_name = Some(func_name.into());
        self
    }

    #[must_use]
    pub fn with_exc_text(mut self, exc_text: impl Into<String>) -> Self {
        self.exc_text = Some(exc_text.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_extras(mut self, extras: Map<String, Value>) -> Self {
        self.extra.extend(extras);
        self
    }

    /// Last path component of `pathname`.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.pathname
            .as_deref()
            .map(|path| path.rsplit(['/', '\\']).next().unwrap_or(path))
    }

    /// The message with each `{}` replaced by the next positional argument.
    #[must_use]
    pub fn rendered_message(&self) -> String {
        if self.args.is_empty() {
            return self.message.clone();
        }
        let mut args = self.args.iter().map(stringify_arg);
        let mut parts = self.message.split("{}");
        let mut out = parts.next().unwrap_or_default().to_string();
        for part in parts {
            match args.next() {
                Some(arg) => out.push_str(&arg),
                None => out.push_str("{}"),
            }
            out.push_str(part);
        }
        out
    }

    /// Enumerates every registered attribute, derived ones included.
    ///
    /// Absent optional values are reported as `None`.
    #[must_use]
    pub fn attributes(&self) -> Vec<(&'static str, Option<Value>)> {
        let msecs = (self.created.fract() * 1000.0).max(0.0);
        let relative_created = (self.created - self.start_time) * 1000.0;
        vec![
            ("name", Some(Value::from(self.name.clone()))),
            ("msg", Some(Value::from(self.message.clone()))),
            ("args", Some(Value::from(self.args.clone()))),
            ("level", Some(Value::from(self.level.as_str()))),
            ("level_no", Some(Value::from(self.level.number()))),
            ("pathname", self.pathname.clone().map(Value::from)),
            ("filename", self.filename().map(Value::from)),
            ("module", self.module.clone().map(Value::from)),
            ("func_name", self.func_name.clone().map(Value::from)),
            ("lineno", self.lineno.map(Value::from)),
            ("created", Some(Value::from(self.created))),
            ("msecs", Some(Value::from(msecs))),
            ("relative_created", Some(Value::from(relative_created))),
            ("thread", self.thread.clone().map(Value::from)),
            ("thread_name", self.thread_name.clone().map(Value::from)),
            ("process", Some(Value::from(self.process))),
            ("process_name", self.process_name.clone().map(Value::from)),
            ("exc_text", self.exc_text.clone().map(Value::from)),
            ("stack_info", self.stack_info.clone().map(Value::from)),
        ]
    }
}

/// String form of a positional argument: strings verbatim, anything else as
/// its JSON text.
#[must_use]
pub fn stringify_arg(arg: &Value) -> String {
    match arg {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
