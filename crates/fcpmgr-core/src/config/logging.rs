//! `[logging]` section.

use serde::{Deserialize, Serialize};

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Tracing subscriber settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"warn"` or `"fcpmgr_service=debug,warn"`.
    #[serde(default = "default_directive")]
    pub level: String,
    /// Output rendering.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_directive(),
            format: LogFormat::default(),
        }
    }
}

// Mutations log at info; keep the CLI quiet unless asked.
fn default_directive() -> String {
    "warn".to_string()
}
