//! Structured JSON logger
//!
//! - One line per event
//! - `event` first, `severity` second, remaining keys sorted
//! - Synchronous, no buffering
//! - Lines below the process-wide minimum severity are dropped

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-node and per-fragment detail
    Trace = 0,
    /// Request lifecycle
    Info = 1,
    /// Denials and recoverable issues
    Warn = 2,
    /// Request failures
    Error = 3,
    /// The process cannot continue
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Parse a severity name, case-insensitively
    pub fn parse(name: &str) -> Option<Severity> {
        match name.to_ascii_uppercase().as_str() {
            "TRACE" => Some(Severity::Trace),
            "INFO" => Some(Severity::Info),
            "WARN" => Some(Severity::Warn),
            "ERROR" => Some(Severity::Error),
            "FATAL" => Some(Severity::Fatal),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Severity {
        match value {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            3 => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// A structured logger that outputs JSON lines
pub struct Logger;

impl Logger {
    /// Set the process-wide minimum severity
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    /// Log an event to stdout
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if Self::enabled(severity) {
            Self::write_line(&mut io::stdout(), &render(severity, event, fields));
        }
    }

    /// Log an event to stderr
    pub fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if Self::enabled(severity) {
            Self::write_line(&mut io::stderr(), &render(severity, event, fields));
        }
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level, to stderr
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Error, event, fields);
    }

    /// Log at FATAL level, to stderr
    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Fatal, event, fields);
    }
}

/// Render one log line, newline terminated
pub(crate) fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let mut line = String::with_capacity(128);
    line.push('{');
    push_pair(&mut line, "event", event);
    line.push(',');
    push_pair(&mut line, "severity", severity.as_str());
    for (key, value) in sorted {
        line.push(',');
        push_pair(&mut line, key, value);
    }
    line.push_str("}\n");
    line
}

fn push_pair(line: &mut String, key: &str, value: &str) {
    push_quoted(line, key);
    line.push(':');
    push_quoted(line, value);
}

fn push_quoted(line: &mut String, s: &str) {
    line.push('"');
    for c in s.chars() {
        match c {
            '"' => line.push_str("\\\""),
            '\\' => line.push_str("\\\\"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            '\t' => line.push_str("\\t"),
            c if c.is_control() => line.push_str(&format!("\\u{:04x}", c as u32)),
            c => line.push(c),
        }
    }
    line.push('"');
}
