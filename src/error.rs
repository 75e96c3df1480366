//! Error taxonomy for the reflection compiler.
//!
//! Errors fall into two groups. Per-file problems (malformed attributes or
//! declarations, unterminated or duplicate containers, write failures) are
//! recoverable: the offending container or artifact is skipped and the run
//! continues. Resolution problems (unknown, ambiguous or cyclic bases) are
//! fatal and stop the run before anything is written.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ReflectError>;

/// Position in a source file (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Reflection compiler errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReflectError {
    /// Attribute expression could not be parsed
    #[error("{}:{location}: malformed attribute: {reason}", file.display())]
    MalformedAttribute {
        file: PathBuf,
        location: SourceLocation,
        reason: String,
    },

    /// Annotated declaration could not be understood
    #[error("{}:{location}: malformed declaration: {reason}", file.display())]
    MalformedDeclaration {
        file: PathBuf,
        location: SourceLocation,
        reason: String,
    },

    /// End of file reached while a container scope was still open
    #[error("{}:{location}: container '{container}' is never closed", file.display())]
    UnterminatedContainer {
        file: PathBuf,
        location: SourceLocation,
        container: String,
    },

    /// Same container name declared twice in one file
    #[error("{}:{location}: container '{container}' is already declared in this file", file.display())]
    DuplicateContainer {
        file: PathBuf,
        location: SourceLocation,
        container: String,
    },

    /// Base name matches no known container
    #[error("{}:{location}: '{container}' derives from unknown type '{base}'", file.display())]
    UnknownBaseType {
        file: PathBuf,
        location: SourceLocation,
        container: String,
        base: String,
    },

    /// Base name matches more than one container
    #[error("{}:{location}: base '{base}' of '{container}' is ambiguous, declared in: {}", file.display(), candidates.join(", "))]
    AmbiguousBaseType {
        file: PathBuf,
        location: SourceLocation,
        container: String,
        base: String,
        candidates: Vec<String>,
    },

    /// Inheritance graph contains a cycle
    #[error("{}:{location}: cyclic inheritance: {}", file.display(), cycle.join(" -> "))]
    CyclicInheritance {
        file: PathBuf,
        location: SourceLocation,
        cycle: Vec<String>,
    },

    /// Generated artifact could not be committed
    #[error("failed to write {}: {reason}", path.display())]
    WriteFailed { path: PathBuf, reason: String },

    /// Input could not be read
    #[error("I/O error for {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReflectError {
    /// Fatal errors abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReflectError::UnknownBaseType { .. }
                | ReflectError::AmbiguousBaseType { .. }
                | ReflectError::CyclicInheritance { .. }
                | ReflectError::Config(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        ReflectError::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
