use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::error;

/// Crates whose diagnostics are never interesting in the relay's log stream.
const SILENCED_TARGETS: &str = "h2=off,hyper=off,rustls=off";

/// Verbosity of the relay's own diagnostics. The audit trail is not affected.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The level as an `EnvFilter` directive.
    #[must_use]
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Full filter for the subscriber, with noisy transport crates turned off.
    #[must_use]
    pub fn env_filter(self) -> String {
        format!("{SILENCED_TARGETS},{}", self.as_directive())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("unknown log level '{s}', expected one of error, warn, info, debug, trace")),
        }
    }
}

// An unusable level must not stop the relay from starting.
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = match Value::deserialize(deserializer)? {
            Value::String(s) => s.parse(),
            other => Err(format!("log level must be a string, got {other}")),
        };
        Ok(level.unwrap_or_else(|e| {
            error!("{}, using {}", e, LogLevel::default().as_directive());
            LogLevel::default()
        }))
    }
}
