use std::fmt;

use thiserror::Error;

use crate::trace::SourceRegistry;

/// Errors raised while compiling or evaluating a snippet.
///
/// Variants render in the `Kind: message` shape the traceback formatter
/// expects. `Interrupted` is internal: it marks an execution whose consumer
/// went away and is never surfaced to users.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("SyntaxError: unsupported syntax: {0}")]
    Unsupported(String),

    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("KeyError: {0}")]
    Key(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),

    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },

    #[error("execution interrupted")]
    Interrupted,
}

/// An evaluation failure annotated with its synthetic source location.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    /// Synthetic filename the snippet was registered under.
    pub file: String,
    /// 1-based line of the failing statement; 0 when unknown.
    pub line: usize,
    pub error: EvalError,
}

impl ExecutionError {
    /// Render a traceback quoting the registered source line.
    pub fn traceback(&self, registry: &SourceRegistry) -> String {
        let mut rendered = String::from("Traceback (most recent call last):\n");
        rendered.push_str(&format!(
            "  File \"{}\", line {}, in <module>\n",
            self.file, self.line
        ));

        if let Some(source_line) = registry.source_line(&self.file, self.line) {
            rendered.push_str(&format!("    {}\n", source_line.trim()));
        }

        rendered.push_str(&self.error.to_string());
        rendered
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
