//! User-facing diagnostics.
//!
//! Passes collect diagnostics instead of aborting, so a single compile can
//! report as many issues as feasible. Internal invariant violations do not
//! go through here; they abort via `enoki_core::ice!`.

/// How severe a diagnostic is. Errors make the program ill-formed; warnings
/// (like possible use-before-definition) do not stop code generation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
}

/// A single message, anchored to a source line (0 when synthetic).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u32,
    pub message: String,
}

/// Collection of diagnostic messages from parsing and analysis.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, line: u32, message: impl Into<String>) {
        self.messages.push(Diagnostic {
            severity: Severity::Error,
            line,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, line: u32, message: impl Into<String>) {
        self.messages.push(Diagnostic {
            severity: Severity::Warning,
            line,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    /// Print every message to stderr, prefixed with the file name.
    pub fn print(&self, filename: &str) {
        for d in &self.messages {
            let severity = match d.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            if d.line > 0 {
                eprintln!("{filename}:{}: {severity}: {}", d.line, d.message);
            } else {
                eprintln!("{filename}: {severity}: {}", d.message);
            }
        }
    }
}
