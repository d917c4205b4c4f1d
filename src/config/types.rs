use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings of a single store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Buffer size of the state channel (default: 256). State subscribers
    /// further behind than this skip to newer snapshots; action and
    /// post-action subscribers never skip.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Tracing output of the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Prefix events with an RFC 3339 UTC timestamp (default: true).
    #[serde(default = "default_timestamps")]
    pub timestamps: bool,
}

fn default_channel_capacity() -> usize {
    256
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_timestamps() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            timestamps: default_timestamps(),
        }
    }
}
