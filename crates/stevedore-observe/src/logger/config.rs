use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

use crate::logger::object::{LoggerFormat, LoggerLevel, LoggerTimeZone};

/// Logger configuration, assembled from `LOG_FORMAT`, `LOG_LEVEL` and `TIMEZONE` by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// Filter expression, e.g. `info` or `stevedore_core=debug,info`.
    pub level: LoggerLevel,
    /// Timezone of the timestamp prefix.
    pub tz: LoggerTimeZone,
    /// Include module paths in log lines.
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: false,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Color is used only when enabled and stdout is a terminal.
    ///
    /// Evaluated at logger initialization, so redirecting stdout disables it.
    ///
    /// # Examples
    /// ```rust
    /// use stevedore_observe::LoggerConfig;
    ///
    /// let config = LoggerConfig { use_color: false, ..LoggerConfig::default() };
    /// assert!(!config.should_use_color());
    /// ```
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}
