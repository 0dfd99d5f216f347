// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use thiserror::Error;

/// Unified error type for the template engine.
///
/// Parse errors carry the 1-based source line of the offending construct.
/// Render errors carry the line of the directive that failed when it is known,
/// plus the underlying cause (for example an operator failure inside an
/// expression).
#[derive(Debug, Error)]
pub enum Error {
    /// Template source could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// What went wrong.
        message: String,
        /// 1-based source line.
        line: usize,
    },
    /// Evaluation or output failed while rendering.
    #[error("render error{}: {message}", LineSuffix(*line))]
    Render {
        /// What went wrong.
        message: String,
        /// Underlying failure, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Line of the node being rendered, when known.
        line: Option<usize>,
    },
    /// A name to bind does not match the symbol name pattern.
    #[error("invalid symbol name {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
}

impl Error {
    /// Parse error at `line`.
    pub fn parse(message: impl Into<String>, line: usize) -> Self {
        Error::Parse {
            message: message.into(),
            line,
        }
    }

    /// Render error without a location.
    pub fn render(message: impl Into<String>) -> Self {
        Error::Render {
            message: message.into(),
            source: None,
            line: None,
        }
    }

    /// Render error located at `line`.
    pub fn render_at(message: impl Into<String>, line: usize) -> Self {
        Error::Render {
            message: message.into(),
            source: None,
            line: Some(line),
        }
    }

    /// Wraps a failure raised while evaluating `expression`.
    pub fn evaluation(expression: impl fmt::Display, cause: Error) -> Self {
        Error::Render {
            message: format!("failed to evaluate `{expression}`: {}", cause.message()),
            source: Some(Box::new(cause)),
            line: None,
        }
    }

    /// Attaches a line number to render errors that do not carry one yet.
    #[must_use]
    pub fn at_line(self, at: usize) -> Self {
        match self {
            Error::Render {
                message,
                source,
                line: None,
            } => Error::Render {
                message,
                source,
                line: Some(at),
            },
            other => other,
        }
    }

    /// The bare message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Parse { message, .. } | Error::Render { message, .. } => message.clone(),
            Error::InvalidName { name } => format!("invalid symbol name {name:?}"),
        }
    }

    /// Source line associated with the error, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Parse { line, .. } => Some(*line),
            Error::Render { line, .. } => *line,
            Error::InvalidName { .. } => None,
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::render("failed to write template output")
    }
}

struct LineSuffix(Option<usize>);

impl fmt::Display for LineSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(line) => write!(f, " at line {line}"),
            None => Ok(()),
        }
    }
}
