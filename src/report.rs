//! Leveled event reporting for the pipeline.
//!
//! The core stages emit structured severity+message events through the
//! [`Reporter`] trait and never pre-format console output. The console
//! implementation resolves its severity-to-style table once at construction;
//! styles are a fixed enumeration, not a runtime lookup against mutable
//! global state.

use colored::{ColoredString, Colorize};
use std::io::Write;

/// Event severity, ordered from least to most important.
///
/// `Success` sits above `Info`: a successful stage completion is more
/// noteworthy than routine progress but is not a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Detailed progress, shown only at raised verbosity.
    Debug,
    /// Routine progress.
    Info,
    /// A stage or the whole build completed.
    Success,
    /// Something was skipped or degraded; the build continues.
    Warning,
    /// The build is aborting.
    Error,
}

impl Severity {
    /// Uppercase label used in console output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

/// Receives structured events from the pipeline.
///
/// Implementations decide presentation; the core only supplies severity and
/// message text.
pub trait Reporter {
    /// Emit one event.
    fn emit(&mut self, severity: Severity, message: &str);

    /// Emit a [`Severity::Debug`] event.
    fn debug(&mut self, message: &str) {
        self.emit(Severity::Debug, message);
    }

    /// Emit a [`Severity::Info`] event.
    fn info(&mut self, message: &str) {
        self.emit(Severity::Info, message);
    }

    /// Emit a [`Severity::Success`] event.
    fn success(&mut self, message: &str) {
        self.emit(Severity::Success, message);
    }

    /// Emit a [`Severity::Warning`] event.
    fn warning(&mut self, message: &str) {
        self.emit(Severity::Warning, message);
    }

    /// Emit a [`Severity::Error`] event.
    fn error(&mut self, message: &str) {
        self.emit(Severity::Error, message);
    }
}

/// Display rule for one severity, resolved once at reporter construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Blue,
    White,
    BoldGreen,
    Yellow,
    BoldRed,
}

impl Style {
    fn paint(self, text: &str) -> ColoredString {
        match self {
            Style::Blue => text.blue(),
            Style::White => text.white(),
            Style::BoldGreen => text.green().bold(),
            Style::Yellow => text.yellow(),
            Style::BoldRed => text.red().bold(),
        }
    }
}

/// The fixed severity-to-style table.
const fn style_for(severity: Severity) -> Style {
    match severity {
        Severity::Debug => Style::Blue,
        Severity::Info => Style::White,
        Severity::Success => Style::BoldGreen,
        Severity::Warning => Style::Yellow,
        Severity::Error => Style::BoldRed,
    }
}

/// Emoji decoration per severity, used when emoji output is enabled.
const fn emoji_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "\u{2728} ",
        Severity::Warning => "\u{26a0}\u{fe0f} ",
        Severity::Error => "\u{274c} ",
        Severity::Debug | Severity::Info => "",
    }
}

/// Console reporter writing styled events to a stream (normally stderr).
pub struct ConsoleReporter<W: Write> {
    out: W,
    min_severity: Severity,
    emoji_on: bool,
    styles: [(Severity, Style); 5],
}

impl ConsoleReporter<std::io::Stderr> {
    /// Create a reporter writing to stderr.
    ///
    /// `verbosity` follows the `-v` count: `0` shows `Info` and above, `1`
    /// and higher shows everything.
    #[must_use]
    pub fn stderr(verbosity: u8, emoji_on: bool) -> Self {
        Self::with_writer(std::io::stderr(), verbosity, emoji_on)
    }

    /// Create a stderr reporter showing only warnings and errors.
    #[must_use]
    pub fn stderr_quiet(emoji_on: bool) -> Self {
        Self::with_writer_quiet(std::io::stderr(), emoji_on)
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// Create a reporter writing to an arbitrary stream.
    pub fn with_writer(out: W, verbosity: u8, emoji_on: bool) -> Self {
        let min_severity = if verbosity == 0 {
            Severity::Info
        } else {
            Severity::Debug
        };
        let styles = [
            Severity::Debug,
            Severity::Info,
            Severity::Success,
            Severity::Warning,
            Severity::Error,
        ]
        .map(|s| (s, style_for(s)));
        Self {
            out,
            min_severity,
            emoji_on,
            styles,
        }
    }

    /// Create a reporter that shows only warnings and errors.
    pub fn with_writer_quiet(out: W, emoji_on: bool) -> Self {
        let mut reporter = Self::with_writer(out, 0, emoji_on);
        reporter.min_severity = Severity::Warning;
        reporter
    }

    fn style(&self, severity: Severity) -> Style {
        self.styles
            .iter()
            .find(|(s, _)| *s == severity)
            .map_or(Style::White, |(_, style)| *style)
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn emit(&mut self, severity: Severity, message: &str) {
        if severity < self.min_severity {
            return;
        }
        let emoji = if self.emoji_on {
            emoji_for(severity)
        } else {
            ""
        };
        let label = self.style(severity).paint(severity.label());
        // A failed write to the console is not worth aborting a build over.
        let _ = writeln!(self.out, "{emoji}{label} {message}");
    }
}

/// Reporter that buffers events in memory.
///
/// Used by tests and by callers that want to inspect emitted events
/// programmatically.
#[derive(Debug, Default)]
pub struct BufferReporter {
    events: Vec<(Severity, String)>,
}

impl BufferReporter {
    /// Create an empty buffer reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, in order.
    #[must_use]
    pub fn events(&self) -> &[(Severity, String)] {
        &self.events
    }

    /// Messages emitted at the given severity.
    #[must_use]
    pub fn messages_at(&self, severity: Severity) -> Vec<&str> {
        self.events
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.as_str())
            .collect()
    }
}

impl Reporter for BufferReporter {
    fn emit(&mut self, severity: Severity, message: &str) {
        self.events.push((severity, message.to_owned()));
    }
}
