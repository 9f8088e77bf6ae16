//! Tagged logging for the swap engine
//!
//! Console logger with per-module debug control:
//! - Standard levels (Error/Warning/Info/Debug/Verbose)
//! - Debug output is opt-in per tag via --debug-<tag> flags
//! - --debug-all and --verbose widen the filter globally
//!
//! Call `logger::init()` once at startup; library code then logs through
//! the level functions:
//!
//! ```ignore
//! logger::info(LogTag::Session, "Swap session opened");
//! logger::debug(LogTag::Quote, "rate=2000 to_amount=2000.000000"); // --debug-quote
//! ```

use chrono::Local;
use colored::*;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::io::{stdout, Write};
use std::sync::RwLock;

const TAG_WIDTH: usize = 9;

// =============================================================================
// LEVELS & TAGS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
    Verbose = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }
}

/// One tag per engine module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Session,
    Quote,
    Resolver,
    Market,
    Wallet,
    Fees,
    Api,
    System,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Session => "SESSION",
            LogTag::Quote => "QUOTE",
            LogTag::Resolver => "RESOLVER",
            LogTag::Market => "MARKET",
            LogTag::Wallet => "WALLET",
            LogTag::Fees => "FEES",
            LogTag::Api => "API",
            LogTag::System => "SYSTEM",
        }
    }

    /// Key used in --debug-<key> command-line flags
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::Session => "session",
            LogTag::Quote => "quote",
            LogTag::Resolver => "resolver",
            LogTag::Market => "market",
            LogTag::Wallet => "wallet",
            LogTag::Fees => "fees",
            LogTag::Api => "api",
            LogTag::System => "system",
        }
    }

    fn colored(&self) -> ColoredString {
        let padded = format!("{:<width$}", self.as_str(), width = TAG_WIDTH);
        match self {
            LogTag::Session => padded.bright_cyan().bold(),
            LogTag::Quote => padded.bright_green().bold(),
            LogTag::Resolver => padded.bright_white().bold(),
            LogTag::Market => padded.bright_blue().bold(),
            LogTag::Wallet => padded.bright_magenta().bold(),
            LogTag::Fees => padded.bright_yellow().bold(),
            LogTag::Api => padded.bright_purple().bold(),
            LogTag::System => padded.yellow().bold(),
        }
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<String>,
    pub debug_all: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            debug_all: false,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Initialize from the process arguments. Call once at startup.
pub fn init() {
    let args: Vec<String> = std::env::args().collect();
    init_from_args(&args);
}

/// Parse --debug-<tag>, --debug-all, --verbose and --quiet flags
pub fn init_from_args(args: &[String]) {
    let mut config = LoggerConfig::default();
    for arg in args {
        match arg.as_str() {
            "--debug-all" => {
                config.debug_all = true;
                config.min_level = LogLevel::Debug;
            }
            "--verbose" => {
                config.min_level = LogLevel::Verbose;
                config.debug_all = true;
            }
            "--quiet" => {
                config.min_level = LogLevel::Warning;
            }
            other => {
                if let Some(key) = other.strip_prefix("--debug-") {
                    config.debug_tags.insert(key.to_string());
                }
            }
        }
    }
    if let Ok(mut current) = LOGGER_CONFIG.write() {
        *current = config;
    }
}

pub fn is_debug_enabled(tag: LogTag) -> bool {
    match LOGGER_CONFIG.read() {
        Ok(config) => config.debug_all || config.debug_tags.contains(tag.to_debug_key()),
        Err(_) => false,
    }
}

fn should_log(tag: LogTag, level: LogLevel) -> bool {
    // Errors always log
    if level == LogLevel::Error {
        return true;
    }
    let config = match LOGGER_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(_) => return false,
    };
    if level == LogLevel::Debug || level == LogLevel::Verbose {
        return config.min_level >= level
            || config.debug_all
            || config.debug_tags.contains(tag.to_debug_key());
    }
    level <= config.min_level
}

// =============================================================================
// LEVEL FUNCTIONS
// =============================================================================

/// Always shown
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Shown unless --quiet
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Shown by default
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Only shown with --debug-<tag> or --debug-all
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

/// Only shown with --verbose
pub fn verbose(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Verbose, message);
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(tag, level) {
        return;
    }

    let time = Local::now().format("%H:%M:%S").to_string();
    let level_str = match level {
        LogLevel::Error => level.as_str().bright_red().bold(),
        LogLevel::Warning => level.as_str().yellow().bold(),
        LogLevel::Info => level.as_str().normal(),
        LogLevel::Debug => level.as_str().dimmed(),
        LogLevel::Verbose => level.as_str().dimmed(),
    };

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag.colored(),
        level_str,
        message
    );

    // Ignore broken pipes so piped output does not abort the process
    let mut out = stdout().lock();
    let _ = writeln!(out, "{}", line);
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the config is a process-wide global and parallel test
    // threads must not fight over it.
    #[test]
    fn flag_parsing_controls_filtering() {
        init_from_args(&["swapcore".to_string(), "--debug-quote".to_string()]);
        assert!(is_debug_enabled(LogTag::Quote));
        assert!(!is_debug_enabled(LogTag::Wallet));

        init_from_args(&["swapcore".to_string(), "--debug-all".to_string()]);
        assert!(is_debug_enabled(LogTag::Api));
        assert!(is_debug_enabled(LogTag::Session));

        init_from_args(&["swapcore".to_string(), "--quiet".to_string()]);
        assert!(should_log(LogTag::System, LogLevel::Error));
        assert!(!should_log(LogTag::System, LogLevel::Info));

        init_from_args(&["swapcore".to_string()]);
        assert!(should_log(LogTag::System, LogLevel::Info));
        assert!(!should_log(LogTag::System, LogLevel::Debug));
    }
}
