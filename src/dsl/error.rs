//! Diagnostics produced by every compiler phase.
//!
//! Phases never fail fast: each one accumulates [`Diagnostic`]s and reports a
//! success flag, and the orchestrator decides whether the next phase runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable diagnostic codes. These are part of the external contract.
pub mod codes {
    pub const OPEN_FAILED: &str = "E000";
    pub const EMPTY_SOURCE: &str = "E001";

    pub const UNEXPECTED_CHAR: &str = "E010";
    pub const UNTERMINATED_STRING: &str = "E011";
    pub const INVALID_NUMBER: &str = "E012";

    pub const UNEXPECTED_TOKEN: &str = "E020";
    pub const EXPECTED_TOKEN: &str = "E021";

    pub const UNKNOWN_IDENTIFIER: &str = "E101";
    pub const UNKNOWN_FUNCTION: &str = "E102";
    pub const REDEFINITION: &str = "E103";
    pub const HOLE_OUTSIDE_PIPE: &str = "E104";
    pub const INVALID_PIPE_TARGET: &str = "E105";
    pub const TOO_FEW_ARGUMENTS: &str = "E106";
    pub const TOO_MANY_ARGUMENTS: &str = "E107";
    pub const UNKNOWN_PARAMETER: &str = "E108";
    pub const DUPLICATE_ARGUMENT: &str = "E109";
    pub const POSITIONAL_AFTER_NAMED: &str = "E110";
    pub const MISSING_ARGUMENT: &str = "E111";
    pub const INVALID_PARAM_DECL: &str = "E112";
    pub const FUNCTION_AS_VALUE: &str = "E113";
    pub const DUPLICATE_PARAMETER: &str = "E114";
    pub const PATTERN_NOT_STRING: &str = "E115";
    pub const INVALID_PATTERN: &str = "E116";
    pub const MISPLACED_STATEMENT: &str = "E117";

    pub const BUFFER_EXHAUSTED: &str = "E201";
    pub const UNKNOWN_SAMPLE: &str = "E202";
    pub const RECURSIVE_FUNCTION: &str = "E203";
    pub const STRING_AS_SIGNAL: &str = "E204";
    pub const UNRESOLVED_NODE: &str = "E205";

    pub const PARAM_RANGE_SWAPPED: &str = "W001";
    pub const PARAM_REDECLARED: &str = "W002";
}

/// A span in source text.
///
/// `line` and `column` are 1-based, `offset` and `length` are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
    pub length: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32, offset: u32, length: u32) -> Self {
        Self {
            line,
            column,
            offset,
            length,
        }
    }

    /// Smallest location covering both `self` and `other`.
    ///
    /// Line and column come from whichever starts first.
    pub fn to(self, other: SourceLocation) -> Self {
        let (first, _) = if self.offset <= other.offset {
            (self, other)
        } else {
            (other, self)
        };
        let end = (self.offset + self.length).max(other.offset + other.length);
        Self {
            line: first.line,
            column: first.column,
            offset: first.offset,
            length: end - first.offset,
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
            length: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Compilation cannot continue past the current phase.
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        f.write_str(s)
    }
}

/// Secondary location attached to a diagnostic ("previous definition here").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Related {
    pub message: String,
    pub filename: String,
    pub location: SourceLocation,
}

/// A single suggested edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub description: String,
    pub new_text: String,
    pub location: SourceLocation,
}

/// A message produced by one of the compiler phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub filename: String,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Related>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
}

impl Diagnostic {
    pub fn error(
        code: &str,
        message: impl Into<String>,
        filename: &str,
        location: SourceLocation,
    ) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            message: message.into(),
            filename: filename.to_string(),
            location,
            related: Vec::new(),
            fix: None,
        }
    }

    pub fn warning(
        code: &str,
        message: impl Into<String>,
        filename: &str,
        location: SourceLocation,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, filename, location)
        }
    }

    /// Attach a related note in the same file.
    pub fn with_related(mut self, message: impl Into<String>, location: SourceLocation) -> Self {
        self.related.push(Related {
            message: message.into(),
            filename: self.filename.clone(),
            location,
        });
        self
    }

    pub fn with_fix(
        mut self,
        description: impl Into<String>,
        new_text: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        self.fix = Some(Fix {
            description: description.into(),
            new_text: new_text.into(),
            location,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}[{}]: {}",
            self.filename,
            self.location.line,
            self.location.column,
            self.severity,
            self.code,
            self.message
        )
    }
}

/// Whether any diagnostic in the batch is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Render a diagnostic for a terminal, with the offending source line and a caret.
///
/// `source` must be the text the diagnostic's coordinates refer to.
pub fn format_diagnostic(diag: &Diagnostic, source: &str) -> String {
    let mut out = format!("{diag}\n");

    if diag.location.line > 0 {
        if let Some(line) = source.lines().nth(diag.location.line as usize - 1) {
            let gutter = diag.location.line.to_string();
            out.push_str(&format!("  {gutter} | {line}\n"));
            out.push_str(&format!("  {} | ", " ".repeat(gutter.len())));
            out.push_str(&" ".repeat(diag.location.column.saturating_sub(1) as usize));
            out.push('^');
            let tildes = diag.location.length.clamp(1, 80) - 1;
            out.push_str(&"~".repeat(tildes as usize));
            out.push('\n');
        }
    }

    for rel in &diag.related {
        out.push_str(&format!(
            "{}:{}:{}: note: {}\n",
            rel.filename, rel.location.line, rel.location.column, rel.message
        ));
    }

    if let Some(fix) = &diag.fix {
        out.push_str(&format!("  = help: {}\n", fix.description));
    }

    out
}
