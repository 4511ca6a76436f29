use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Maximum number of entries kept by [`MemoryLog`].
pub const MEMORY_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "Info",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    pub fn display_text(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Fire-and-forget sink for domain events.
///
/// Implementations must never panic or report their own failures back to the
/// caller: a broken sink drops the message.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, level: LogLevel);

    fn info(&self, message: &str) {
        self.log(message, LogLevel::Info);
    }

    fn warning(&self, message: &str) {
        self.log(message, LogLevel::Warning);
    }

    fn error(&self, message: &str) {
        self.log(message, LogLevel::Error);
    }
}

pub type SharedLog = Arc<dyn LogSink>;

/// Forwards everything to the `log` crate facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn log(&self, message: &str, level: LogLevel) {
        match level {
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Warning => log::warn!("{message}"),
            LogLevel::Error => log::error!("{message}"),
        }
    }
}

/// Bounded in-memory log, newest entries last.
#[derive(Debug)]
pub struct MemoryLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    forward: bool,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::with_capacity(MEMORY_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
            forward: false,
        }
    }

    /// Also pass every entry on to [`LogFacade`].
    pub fn forwarding(mut self) -> Self {
        self.forward = true;
        self
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl LogSink for MemoryLog {
    fn log(&self, message: &str, level: LogLevel) {
        if self.forward {
            LogFacade.log(message, level);
        }

        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(LogEntry::new(message, level));
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
    }
}
