//! Provides definition for diagnostics, which are normally errors and warnings
//! associated with linking, verification or execution.
//!
//! A host consumes an ordered list of diagnostics. Each diagnostic has a
//! stable problem code, a severity, a primary location and possibly other
//! locations (for example, both operands of an incompatible assignment).

use std::fmt;

use stint_problems::Problem;

use crate::core::{FileId, Id, Located, SourceSpan};

/// A label that refers to some range in a file and possibly associated
/// with a message related to that range.
///
/// Normally this indicates the location of an error or warning along with a
/// text message describing that position.
#[derive(Debug, Clone)]
pub struct Label {
    /// The position of label.
    pub span: SourceSpan,

    /// A message describing this label.
    pub message: String,
}

impl Label {
    pub fn span(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }

    pub fn located(item: &dyn Located, message: impl Into<String>) -> Self {
        Self::span(item.span(), message)
    }

    /// A "position" that is a file in it's entirety rather that a particular
    /// position.
    pub fn file(file_id: impl Into<FileId>, message: impl Into<String>) -> Self {
        Self {
            span: SourceSpan::range(0, 0).with_file_id(&file_id.into()),
            message: message.into(),
        }
    }
}

/// How a host should treat the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A diagnostic. Diagnostic have a code that is indicative of the category,
/// a primary location and possibly non-zero set of secondary location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// A normally unique value describing the type of diagnostic.
    pub code: String,

    description: String,

    pub severity: Severity,

    /// The primary or first diagnostic.
    pub primary: Label,

    /// Additional descriptions to the constant description.
    pub described: Vec<String>,

    /// Additional information about the diagnostic.
    pub secondary: Vec<Label>,
}

impl Diagnostic {
    /// Creates an error diagnostic from the problem code and with the
    /// specified label.
    pub fn problem(problem: Problem, primary: Label) -> Self {
        Self {
            code: problem.code().to_string(),
            description: problem.message().to_string(),
            severity: Severity::Error,
            primary,
            described: vec![],
            secondary: vec![],
        }
    }

    /// Creates a warning diagnostic from the problem code and with the
    /// specified label.
    pub fn warning(problem: Problem, primary: Label) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::problem(problem, primary)
        }
    }

    /// Creates an internal error diagnostic associated with a file and line
    /// in the Rust source code.
    ///
    /// Unlike other uses of problem, the location in this is related to the
    /// runtime rather than the IEC 61131-3 source.
    pub fn internal_error(file: &str, line: u32) -> Self {
        Diagnostic::problem(
            Problem::InternalError,
            Label::span(
                SourceSpan::default(),
                format!("Internal error at {}#L{}", file, line),
            ),
        )
    }

    /// Adds to the problem description (primary text) additional context
    /// about the problem.
    pub fn with_context(mut self, description: &str, item: &str) -> Self {
        self.described.push(format!("{}={}", description, item));
        self
    }

    /// Adds to the problem description (primary text) additional context
    /// about the problem.
    pub fn with_context_id(mut self, description: &str, item: &Id) -> Self {
        self.described.push(format!("{}={}", description, item));
        self
    }

    pub fn with_secondary(mut self, label: Label) -> Self {
        self.secondary.push(label);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Returns the description for the diagnostic. This may add in other
    /// data in addition that is part of the diagnostic.
    pub fn description(&self) -> String {
        if self.described.is_empty() {
            self.description.clone()
        } else {
            format!("{} ({})", self.description, self.described.join(", "))
        }
    }

    /// Returns every location that the diagnostic cites, primary first.
    pub fn spans(&self) -> impl Iterator<Item = &SourceSpan> {
        std::iter::once(&self.primary.span).chain(self.secondary.iter().map(|label| &label.span))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} at {}",
            self.severity,
            self.code,
            self.description(),
            self.primary.span
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_when_created_then_is_error() {
        let diagnostic = Diagnostic::problem(
            Problem::ExitOutsideLoop,
            Label::span(SourceSpan::range(1, 5), "EXIT"),
        );
        assert!(diagnostic.is_error());
        assert_eq!("P0020", diagnostic.code);
    }

    #[test]
    fn warning_when_created_then_is_not_error() {
        let diagnostic = Diagnostic::warning(
            Problem::CaseValueDuplicated,
            Label::span(SourceSpan::range(1, 5), "Case"),
        );
        assert!(!diagnostic.is_error());
        assert_eq!(Severity::Warning, diagnostic.severity);
    }

    #[test]
    fn description_when_has_context_then_includes_context() {
        let diagnostic = Diagnostic::problem(
            Problem::VariableUndefined,
            Label::span(SourceSpan::default(), "Variable"),
        )
        .with_context_id("variable", &Id::from("Level"));
        assert_eq!(
            "Variable is not defined (variable=Level)",
            diagnostic.description()
        );
    }

    #[test]
    fn spans_when_has_secondary_then_primary_first() {
        let diagnostic = Diagnostic::problem(
            Problem::ValueNotCompatible,
            Label::span(SourceSpan::range(10, 11), "Target"),
        )
        .with_secondary(Label::span(SourceSpan::range(20, 21), "Value"));
        let starts: Vec<usize> = diagnostic.spans().map(|span| span.start).collect();
        assert_eq!(vec![10, 20], starts);
    }
}
