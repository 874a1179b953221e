//! Error types and reporting

use crate::ast::Span;
use thiserror::Error;

/// Result type alias for the compile pipeline
pub type Result<T> = std::result::Result<T, CompileError>;

/// Error produced before evaluation starts
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Lexer error at {span}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Parser error at {span}: {message}")]
    Parser { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } => Some(*span),
            Self::Parser { span, .. } => Some(*span),
            Self::Io { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexer { message, .. } => message,
            Self::Parser { message, .. } => message,
            Self::Io { message, .. } => message,
        }
    }
}

/// Report a compile error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        CompileError::Lexer { .. } => "Lexer",
        CompileError::Parser { .. } => "Parser",
        CompileError::Io { .. } => "IO",
    };

    if let Some(span) = error.span() {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    }
}

/// Report an uncaught runtime error with ariadne
pub fn report_runtime_error(filename: &str, source: &str, error: &crate::interp::RuntimeError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = error.kind.name();
    if let Some(span) = error.span {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(kind)
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(&error.message)
                    .with_color(Color::Red),
            )
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind}: {}", error.message))
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    }
}
