//! Error taxonomy and breadcrumb accumulation.
//!
//! The evaluator never uses `std::error::Error`/panics for control flow
//! (see `eval::Flow` for that channel); this module is strictly for
//! genuine failures: bad indices, shape mismatches, unknown symbols, and
//! the handful of host/IO failures that can cross the boundary.

use std::fmt;

/// Flat error-kind enum. Each arm documents the subsystem that raises it.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // -- array engine --
    IndexOutOfRange,
    InvalidIndex,
    ShapeMismatch,
    SingularMatrix,
    KindConversionRefused,

    // -- evaluator --
    UnknownSymbol,
    UnassignedReturn,
    InsufficientReturns,
    TooManyInputs,
    TooManyOutputs,
    NotCallable,
    NotIndexable,

    // -- misc --
    UnboundEnd,
    ParseError,
    TypeValidationFailed,

    // -- external surface --
    IoError,
    HostError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::IndexOutOfRange => "index out of range",
            ErrorKind::InvalidIndex => "invalid index",
            ErrorKind::ShapeMismatch => "shape mismatch",
            ErrorKind::SingularMatrix => "singular matrix",
            ErrorKind::KindConversionRefused => "kind conversion refused",
            ErrorKind::UnknownSymbol => "unknown symbol",
            ErrorKind::UnassignedReturn => "unassigned return value",
            ErrorKind::InsufficientReturns => "insufficient return values",
            ErrorKind::TooManyInputs => "too many input arguments",
            ErrorKind::TooManyOutputs => "too many output arguments",
            ErrorKind::NotCallable => "value is not callable",
            ErrorKind::NotIndexable => "value is not indexable",
            ErrorKind::UnboundEnd => "unbound `end`",
            ErrorKind::ParseError => "parse error",
            ErrorKind::TypeValidationFailed => "type validation failed",
            ErrorKind::IoError => "I/O error",
            ErrorKind::HostError => "host error",
        };
        f.write_str(label)
    }
}

/// One breadcrumb: a message plus the optional reconstructed source of the
/// IR node active when the error was raised.
#[derive(Debug, Clone)]
pub struct Breadcrumb {
    pub text: String,
    pub node_source: Option<String>,
}

/// An error together with its accumulated call-stack breadcrumbs.
///
/// Breadcrumbs are pushed outermost-last (i.e. the root cause is at index
/// 0); `render` prints outermost-to-innermost per the user-visible format.
#[derive(Debug, Clone)]
pub struct Traced {
    pub kind: ErrorKind,
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl Traced {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Traced {
            kind,
            breadcrumbs: vec![Breadcrumb {
                text: message.into(),
                node_source: None,
            }],
        }
    }

    pub fn with_node(kind: ErrorKind, message: impl Into<String>, node_source: impl Into<String>) -> Self {
        Traced {
            kind,
            breadcrumbs: vec![Breadcrumb {
                text: message.into(),
                node_source: Some(node_source.into()),
            }],
        }
    }

    /// Appends a breadcrumb and returns self, for `.map_err(|e| e.wrap(...))`
    /// style chaining at call boundaries.
    pub fn wrap(mut self, message: impl Into<String>) -> Self {
        self.breadcrumbs.push(Breadcrumb {
            text: message.into(),
            node_source: None,
        });
        self
    }

    /// Appends the standard "error during call to <name>" context used at
    /// every function-call boundary.
    pub fn wrap_call(self, name: &str) -> Self {
        self.wrap(format!("error during call to {name}"))
    }

    /// Outermost-to-innermost, one line per breadcrumb, with the
    /// reconstructed source of the active IR node appended when present.
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.breadcrumbs.len());
        for crumb in self.breadcrumbs.iter().rev() {
            match &crumb.node_source {
                Some(src) => lines.push(format!("{}: {}", crumb.text, src)),
                None => lines.push(crumb.text.clone()),
            }
        }
        lines.join("\n")
    }
}

impl fmt::Display for Traced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.render())
    }
}

impl std::error::Error for Traced {}

pub type Result<T> = std::result::Result<T, Traced>;
