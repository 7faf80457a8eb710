//! Buffered, leveled event log.
//!
//! Resolution and apply record what happened into an [`EventLog`] instead of
//! failing on the first problem. Every entry is also emitted through
//! `tracing` as it is written, and the log is kept on the revision so it can
//! be shown after the fact.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        })
    }
}

/// One log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub level: Level,
    pub scope: String,
    pub message: String,
    /// Keys of the objects the event is about
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<String>,
    pub time: DateTime<Utc>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.scope, self.message)?;
        if !self.objects.is_empty() {
            write!(f, " ({})", self.objects.join(", "))?;
        }
        Ok(())
    }
}

/// Ordered list of events for one scope (resolve, apply, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    scope: String,
    entries: Vec<Event>,
}

impl EventLog {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            entries: Vec::new(),
        }
    }

    /// Record an event and mirror it into `tracing`
    pub fn log(&mut self, level: Level, message: impl Into<String>, objects: &[&str]) {
        let event = Event {
            level,
            scope: self.scope.clone(),
            message: message.into(),
            objects: objects.iter().map(|o| o.to_string()).collect(),
            time: Utc::now(),
        };
        let (scope, message, objects) = (&event.scope, &event.message, &event.objects);
        match level {
            Level::Debug => tracing::debug!(%scope, ?objects, "{}", message),
            Level::Info => tracing::info!(%scope, ?objects, "{}", message),
            Level::Warn => tracing::warn!(%scope, ?objects, "{}", message),
            Level::Error => tracing::error!(%scope, ?objects, "{}", message),
        }
        self.entries.push(event);
    }

    pub fn debug(&mut self, message: impl Into<String>, objects: &[&str]) {
        self.log(Level::Debug, message, objects);
    }

    pub fn info(&mut self, message: impl Into<String>, objects: &[&str]) {
        self.log(Level::Info, message, objects);
    }

    pub fn warn(&mut self, message: impl Into<String>, objects: &[&str]) {
        self.log(Level::Warn, message, objects);
    }

    pub fn error(&mut self, message: impl Into<String>, objects: &[&str]) {
        self.log(Level::Error, message, objects);
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn entries(&self) -> &[Event] {
        &self.entries
    }

    /// Entries at or above a level
    pub fn at_least(&self, level: Level) -> impl Iterator<Item = &Event> {
        self.entries.iter().filter(move |e| e.level >= level)
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Level::Error) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the entries of another log, keeping their scope
    pub fn append(&mut self, other: EventLog) {
        self.entries.extend(other.entries);
    }
}
