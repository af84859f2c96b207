use serde::{Deserialize, Serialize};
use strum::Display;

/// Logging configuration for the Core process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
  /// Minimum level written out.
  /// Default: `info`
  #[serde(default)]
  pub level: LogLevel,

  /// Controls the stdio output: `standard`, `json`, or `none`.
  /// Default: `standard`
  #[serde(default)]
  pub stdio: StdioLogMode,

  /// Whether to use the multi-line pretty formatter on stdio.
  /// Only relevant in `standard` mode.
  #[serde(default)]
  pub pretty: bool,

  /// Whether to include the emitting module in stdio lines.
  #[serde(default)]
  pub location: bool,

  /// Whether to color stdio output.
  /// Default: true
  #[serde(default = "default_ansi")]
  pub ansi: bool,

  /// If set, spans are exported to this OTLP endpoint.
  #[serde(default)]
  pub otlp_endpoint: String,

  /// Service name attached to exported telemetry.
  #[serde(default = "default_opentelemetry_service_name")]
  pub opentelemetry_service_name: String,
}

fn default_ansi() -> bool {
  true
}

fn default_opentelemetry_service_name() -> String {
  String::from("Depot")
}

impl Default for LogConfig {
  fn default() -> Self {
    LogConfig {
      level: Default::default(),
      stdio: Default::default(),
      pretty: false,
      location: false,
      ansi: default_ansi(),
      otlp_endpoint: Default::default(),
      opentelemetry_service_name: default_opentelemetry_service_name(
      ),
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
  Trace,
  Debug,
  #[default]
  Info,
  Warn,
  Error,
}

impl From<LogLevel> for tracing::Level {
  fn from(value: LogLevel) -> Self {
    match value {
      LogLevel::Trace => tracing::Level::TRACE,
      LogLevel::Debug => tracing::Level::DEBUG,
      LogLevel::Info => tracing::Level::INFO,
      LogLevel::Warn => tracing::Level::WARN,
      LogLevel::Error => tracing::Level::ERROR,
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StdioLogMode {
  #[default]
  Standard,
  Json,
  None,
}
