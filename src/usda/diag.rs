//! Error and warning records collected while parsing.

use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.col + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub cursor: Cursor,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.cursor, self.message)
    }
}

/// Two independent LIFO stacks.
///
/// Entries are removed either one by one (to forgive a diagnostic emitted by an
/// abandoned production) or by truncating back to a previously recorded [Depth].
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

/// Sizes of both stacks at some point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Depth {
    errors: usize,
    warnings: usize,
}

impl Diagnostics {
    pub fn push_error(&mut self, message: impl Into<String>, cursor: Cursor) {
        self.errors.push(Diagnostic {
            message: message.into(),
            cursor,
        });
    }

    pub fn pop_error(&mut self) -> Option<Diagnostic> {
        self.errors.pop()
    }

    pub fn push_warn(&mut self, message: impl Into<String>, cursor: Cursor) {
        self.warnings.push(Diagnostic {
            message: message.into(),
            cursor,
        });
    }

    pub fn pop_warn(&mut self) -> Option<Diagnostic> {
        self.warnings.pop()
    }

    #[inline]
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    #[inline]
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn depth(&self) -> Depth {
        Depth {
            errors: self.errors.len(),
            warnings: self.warnings.len(),
        }
    }

    pub fn truncate(&mut self, depth: Depth) {
        self.errors.truncate(depth.errors);
        self.warnings.truncate(depth.warnings);
    }

    pub fn error_report(&self) -> String {
        report(&self.errors)
    }

    pub fn warning_report(&self) -> String {
        report(&self.warnings)
    }
}

/// Oldest first, one entry per line.
fn report(stack: &[Diagnostic]) -> String {
    stack.iter().map(|diag| format!("{diag}\n")).collect()
}
