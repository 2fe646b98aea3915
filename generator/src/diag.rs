// diag.rs — Unified diagnostics model
//
// Provides the diagnostic type shared by the loader and every generation
// stage, plus the table of stable diagnostic codes. Stages return
// `Result<_, Diagnostic>`; only the binary decides how to report and exit.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ir::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0201`, `W0101`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Input and loading
    pub const E_INPUT_UNREADABLE: DiagCode = DiagCode("E0001");
    pub const E_SYNTAX: DiagCode = DiagCode("E0002");
    pub const E_BITCODE: DiagCode = DiagCode("E0003");
    pub const E_EMPTY_CONTAINER: DiagCode = DiagCode("E0004");
    pub const E_SIGNATURE: DiagCode = DiagCode("E0005");
    pub const E_OUTPUT: DiagCode = DiagCode("E0006");

    // Target lookup
    pub const E_FUNCTION_NOT_FOUND: DiagCode = DiagCode("E0101");
    pub const E_FUNCTION_DECLARED_ONLY: DiagCode = DiagCode("E0102");
    pub const E_FUNCTION_NAME: DiagCode = DiagCode("E0103");
    pub const W_MODULE_SKIPPED: DiagCode = DiagCode("W0101");

    // Parameter binding
    pub const E_METADATA_SHAPE: DiagCode = DiagCode("E0201");
    pub const E_BINDING_UNDERCOUNT: DiagCode = DiagCode("E0202");
    pub const E_PARAM_NAME: DiagCode = DiagCode("E0203");
    pub const W_ARG_MISMATCH: DiagCode = DiagCode("W0201");
    pub const W_NON_PARAMETER: DiagCode = DiagCode("W0202");

    // Representation selection
    pub const E_UNSUPPORTED_TYPE: DiagCode = DiagCode("E0301");
    pub const E_INT_WIDTH: DiagCode = DiagCode("E0302");
    pub const E_POINTER_CONVENTION: DiagCode = DiagCode("E0303");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted while loading or generating.
///
/// `span` is a byte range in the text of module `module`; both are absent
/// for diagnostics about the input as a whole.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Option<Span>,
    pub module: Option<usize>,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, location, hint, or related spans.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span: None,
            module: None,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message).with_code(code)
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a primary source location.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attribute the diagnostic to a module of the container. Keeps an
    /// already-set module.
    pub fn in_module(mut self, module: usize) -> Self {
        self.module.get_or_insert(module);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related span.
    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}
