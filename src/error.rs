use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use std::fmt;
use std::io::{self, Write};
use std::ops::Range;

/// Name the interactive session's input goes by in diagnostics.
const SOURCE_ID: &str = "<repl>";

/// Character offsets into the source text, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self::new(pos, pos + 1)
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: &Span) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// This span moved inside a source of `len` characters. A span at or past
    /// the end (a token missing at end of input) lands on the last character.
    fn clamped(&self, len: usize) -> Range<usize> {
        let start = self.start.min(len.saturating_sub(1));
        let end = self.end.clamp(start + 1, len.max(start + 1));
        start..end
    }
}

/// Which stage gave up on the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Runtime,
}

impl ErrorKind {
    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::Lex => "Lexical Error",
            ErrorKind::Parse => "Parse Error",
            ErrorKind::Runtime => "Runtime Error",
        }
    }

    fn color(self) -> Color {
        match self {
            ErrorKind::Lex => Color::Red,
            ErrorKind::Parse => Color::Yellow,
            ErrorKind::Runtime => Color::Magenta,
        }
    }
}

/// A diagnostic from any stage, located in the source it came from.
///
/// `message` is the plain text callers compare against; `help` is an optional
/// hint shown under the snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct MonkeyError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl MonkeyError {
    fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            help: None,
        }
    }

    pub fn lex(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lex, span, message)
    }

    pub fn parse(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, span, message)
    }

    pub fn runtime(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, span, message)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Print a colored snippet of `source` with this error's span underlined.
    pub fn report(&self, source: &str) {
        let stderr = io::stderr();
        if let Err(io_error) = self.write_report(source, true, stderr.lock()) {
            eprintln!("{}: {} ({})", self.kind.title(), self.message, io_error);
        }
    }

    /// Render the snippet into `out`, with or without terminal colors.
    pub fn write_report<W: Write>(&self, source: &str, color: bool, out: W) -> io::Result<()> {
        let range = self.span.clamped(source.chars().count());

        let mut report = Report::build(ReportKind::Error, SOURCE_ID, range.start)
            .with_config(Config::default().with_color(color))
            .with_message(format!("{}: {}", self.kind.title(), self.message))
            .with_label(
                Label::new((SOURCE_ID, range))
                    .with_message(&self.message)
                    .with_color(self.kind.color()),
            );
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report
            .finish()
            .write((SOURCE_ID, Source::from(source)), out)
    }
}

impl fmt::Display for MonkeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MonkeyError {}
