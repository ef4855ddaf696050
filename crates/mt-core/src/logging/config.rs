//! Logging configuration.
//!
//! Resolved once at startup from `MT_LOG` (level), `MT_LOG_FORMAT`
//! (`human` or `jsonl`) and `MT_LOG_TIMESTAMPS`, then adjusted by the
//! `-v` / `-q` flags. `RUST_LOG`, when set, is handled by `init_logging`
//! and replaces the level-derived filter entirely.

use std::fmt;
use std::str::FromStr;

/// Where log lines go on stderr, and how they look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line, for scheduled batch runs.
    Jsonl,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("unknown log format '{other}' (expected human or jsonl)")),
        }
    }
}

/// Verbosity, ordered from most to least chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

const LEVEL_NAMES: [(LogLevel, &str); 6] = [
    (LogLevel::Trace, "trace"),
    (LogLevel::Debug, "debug"),
    (LogLevel::Info, "info"),
    (LogLevel::Warn, "warn"),
    (LogLevel::Error, "error"),
    (LogLevel::Off, "off"),
];

impl LogLevel {
    /// `-q` wins over `-v`; each `-v` moves one step towards `Trace`.
    pub fn adjust(self, verbose: u8, quiet: bool) -> LogLevel {
        if quiet {
            return LogLevel::Error;
        }
        match verbose {
            0 => self,
            1 => self.min(LogLevel::Debug),
            _ => LogLevel::Trace,
        }
    }

    pub fn as_str(self) -> &'static str {
        LEVEL_NAMES
            .iter()
            .find(|(level, _)| *level == self)
            .map(|(_, name)| *name)
            .unwrap_or("info")
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = if wanted == "warning" { "warn".to_string() } else { wanted };
        LEVEL_NAMES
            .iter()
            .find(|(_, name)| *name == wanted)
            .map(|(level, _)| *level)
            .ok_or_else(|| format!("unknown log level '{s}'"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved logging setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human output with timestamps.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment and the CLI verbosity flags.
    pub fn from_env(verbose: u8, quiet: bool) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), verbose, quiet)
    }

    /// Resolve from an arbitrary variable lookup. Unparseable values fall
    /// back to the defaults.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>, verbose: u8, quiet: bool) -> Self {
        let defaults = LogConfig::default();
        let level = lookup("MT_LOG")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.level);
        let format = lookup("MT_LOG_FORMAT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.format);
        let timestamps = lookup("MT_LOG_TIMESTAMPS")
            .map(|v| !matches!(v.trim(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.timestamps);

        LogConfig {
            format,
            level: level.adjust(verbose, quiet),
            timestamps,
        }
    }
}
