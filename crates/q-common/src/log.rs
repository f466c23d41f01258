// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Event logging for the secure partition manager
//!
//! A no_std ring of formatted entries. Every component owns (or shares) a
//! [`LogBuffer`]; entries are stamped with a monotonically increasing
//! sequence number because no time base is available during boot.
//!
//! # Security
//!
//! - Buffer contents of client messages must NEVER be logged
//! - Only handles, identifiers and status codes are recorded

use core::fmt::{self, Write};
use heapless::{Deque, String};

/// Maximum log message length
pub const MAX_LOG_MESSAGE_LEN: usize = 96;

/// Default log buffer size (number of entries)
pub const LOG_BUFFER_SIZE: usize = 32;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Errors that require immediate attention
    Error = 0,
    /// Warnings about potential issues
    Warn = 1,
    /// Informational messages
    Info = 2,
    /// Debug messages (development only)
    Debug = 3,
    /// Trace messages (very verbose, development only)
    Trace = 4,
}

impl LogLevel {
    /// Get the log level name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Get a short prefix for the log level
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warn => 'W',
            Self::Info => 'I',
            Self::Debug => 'D',
            Self::Trace => 'T',
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log entry
#[derive(Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Sequence number
    pub sequence: u32,
    /// Component tag
    pub module: &'static str,
    /// Message text (truncated to [`MAX_LOG_MESSAGE_LEN`])
    pub message: String<MAX_LOG_MESSAGE_LEN>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:08X}] {} [{}] {}",
            self.sequence,
            self.level.prefix(),
            self.module,
            self.message
        )
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Truncating writer: formatting never fails, excess text is dropped
struct Truncating<'a>(&'a mut String<MAX_LOG_MESSAGE_LEN>);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Circular log buffer, oldest entries are evicted first
pub struct LogBuffer<const N: usize = LOG_BUFFER_SIZE> {
    entries: Deque<LogEntry, N>,
    sequence: u32,
    min_level: LogLevel,
}

impl<const N: usize> LogBuffer<N> {
    /// Create an empty buffer recording `Info` and above
    #[must_use]
    pub const fn new() -> Self {
        Self::with_level(LogLevel::Info)
    }

    /// Create an empty buffer with a minimum level
    #[must_use]
    pub const fn with_level(min_level: LogLevel) -> Self {
        Self {
            entries: Deque::new(),
            sequence: 0,
            min_level,
        }
    }

    /// Set the minimum log level
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Get the minimum log level
    #[must_use]
    pub const fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Check if a log level should be recorded
    #[must_use]
    pub const fn should_log(&self, level: LogLevel) -> bool {
        (level as u8) <= (self.min_level as u8)
    }

    /// Record a formatted entry
    pub fn log(&mut self, level: LogLevel, module: &'static str, args: fmt::Arguments<'_>) {
        if !self.should_log(level) {
            return;
        }

        let mut message = String::new();
        let _ = Truncating(&mut message).write_fmt(args);

        if self.entries.is_full() {
            self.entries.pop_front();
        }
        let entry = LogEntry {
            level,
            sequence: self.sequence,
            module,
            message,
        };
        // Cannot fail: a slot was freed above.
        let _ = self.entries.push_back(entry);
        self.sequence = self.sequence.wrapping_add(1);
    }

    /// Number of entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries ever recorded, including evicted ones
    #[must_use]
    pub const fn recorded(&self) -> u32 {
        self.sequence
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over entries (oldest first)
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Check if any entry of `module` contains `needle`
    #[must_use]
    pub fn contains(&self, module: &str, needle: &str) -> bool {
        self.iter()
            .any(|e| e.module == module && e.message.as_str().contains(needle))
    }

    /// Count entries at exactly `level`
    #[must_use]
    pub fn count_at(&self, level: LogLevel) -> usize {
        self.iter().filter(|e| e.level == level).count()
    }
}

impl<const N: usize> Default for LogBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Error, $module, format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Warn, $module, format_args!($($arg)*))
    };
}

/// Log an informational message
#[macro_export]
macro_rules! log_info {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Info, $module, format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Debug, $module, format_args!($($arg)*))
    };
}

/// Log a trace-level message
#[macro_export]
macro_rules! log_trace {
    ($buffer:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Trace, $module, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filtering() {
        let mut log: LogBuffer<4> = LogBuffer::new();
        log_debug!(log, "test", "hidden {}", 1);
        log_info!(log, "test", "shown {}", 2);
        assert_eq!(log.len(), 1);
        assert!(log.contains("test", "shown 2"));
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut log: LogBuffer<2> = LogBuffer::new();
        for i in 0..3 {
            log_warn!(log, "ring", "entry {}", i);
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.recorded(), 3);
        let first = log.iter().next().map(|e| e.sequence);
        assert_eq!(first, Some(1));
        assert!(!log.contains("ring", "entry 0"));
    }

    #[test]
    fn test_long_message_truncated() {
        let mut log: LogBuffer<1> = LogBuffer::new();
        let long = [b'x'; 200];
        let text = core::str::from_utf8(&long).unwrap();
        log_error!(log, "trunc", "{}", text);
        let entry = log.iter().next().unwrap();
        assert_eq!(entry.message.len(), MAX_LOG_MESSAGE_LEN);
        assert_eq!(log.count_at(LogLevel::Error), 1);
    }
}
