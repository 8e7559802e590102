//! Tracing subscriber setup: pretty console output or one OTel-style JSON
//! log record per line.

use std::fmt::Write as _;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Structured fields whose names differ in the log record.
const ATTRIBUTE_NAMES: &[(&str, &str)] = &[
    ("event_name", "event.name"),
    ("event_domain", "event.domain"),
    ("provider_name", "provider.name"),
    ("mount_id", "session.mount_id"),
];

fn attribute_name(field: &str) -> String {
    ATTRIBUTE_NAMES
        .iter()
        .find(|(from, _)| *from == field)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| field.to_string())
}

/// Collects event fields; `message` becomes the record body.
#[derive(Default)]
struct AttributeCollector {
    body: Option<String>,
    attributes: Map<String, Value>,
}

impl AttributeCollector {
    fn record(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.body = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.attributes.insert(attribute_name(field.name()), value);
        }
    }
}

impl Visit for AttributeCollector {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field, format!("{:?}", value).into());
    }
}

#[derive(Serialize)]
struct Resource<'a> {
    #[serde(rename = "service.name")]
    service_name: &'a str,
    #[serde(rename = "service.version")]
    service_version: &'a str,
}

/// One line of JSON output, laid out after the OpenTelemetry log data model.
#[derive(Serialize)]
struct LogRecord<'a> {
    timestamp: String,
    severity_text: &'a str,
    severity_number: u8,
    body: String,
    resource: Resource<'a>,
    attributes: Map<String, Value>,
}

fn severity_number(level: &Level) -> u8 {
    match *level {
        Level::TRACE => 1,
        Level::DEBUG => 5,
        Level::INFO => 9,
        Level::WARN => 13,
        Level::ERROR => 17,
    }
}

struct OtelJsonFormatter {
    service_name: String,
    service_version: String,
}

impl OtelJsonFormatter {
    fn record<'a>(&'a self, event: &Event<'_>) -> LogRecord<'a> {
        let metadata = event.metadata();
        let mut collector = AttributeCollector::default();
        event.record(&mut collector);

        let mut attributes = collector.attributes;
        attributes.insert("code.target".into(), metadata.target().into());
        if let Some(file) = metadata.file() {
            attributes.insert("code.filepath".into(), file.into());
        }
        if let Some(line) = metadata.line() {
            attributes.insert("code.lineno".into(), line.into());
        }

        LogRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            severity_text: metadata.level().as_str(),
            severity_number: severity_number(metadata.level()),
            body: collector
                .body
                .unwrap_or_else(|| metadata.name().to_string()),
            resource: Resource {
                service_name: &self.service_name,
                service_version: &self.service_version,
            },
            attributes,
        }
    }
}

impl<S, N> FormatEvent<S, N> for OtelJsonFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let line = serde_json::to_string(&self.record(event)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging.level '{0}'. Valid values: trace, debug, info, warn, error")]
    InvalidLevel(String),
    #[error("could not install tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Installs the global subscriber. `RUST_LOG` directives are honoured on top of
/// `logging.level`.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), LoggingError> {
    let level_filter = parse_level(&logging_config.level)?;
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    match logging_config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().event_format(OtelJsonFormatter {
                service_name: logging_config.service_name.clone(),
                service_version: logging_config.service_version.clone(),
            }))
            .try_init()?,
        // Anything else gets the human-readable console output.
        _ => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().with_writer(std::io::stderr).pretty())
            .try_init()?,
    }
    Ok(())
}
