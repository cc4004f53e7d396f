use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// A position in RAL source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcPos {
    #[serde(default)]
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SrcPos {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Positions start at line 1; line 0 marks a node built without one.
    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for SrcPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem reported for one top-level script or declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<SrcPos>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(err: &CompileError) -> Self {
        Self {
            severity: Severity::Error,
            pos: err.position().cloned(),
            message: err.cause().to_string(),
        }
    }

    pub fn error_in(context: &str, err: &CompileError) -> Self {
        Self {
            severity: Severity::Error,
            pos: err.position().cloned(),
            message: format!("{context}: {}", err.cause()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.pos {
            Some(pos) => write!(f, "{pos}: {severity}: {}", self.message),
            None => write!(f, "{severity}: {}", self.message),
        }
    }
}
