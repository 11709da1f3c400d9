//! Error Types
//!
//! One error enum per subsystem plus the `CompilerError` umbrella used by
//! the public entry points.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::output::source_map::Token;
use crate::parse_util::{ParseError, SourcePos};
use crate::py_parser::NodeKind;

/// Source position attached to a diagnostic, if the node has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location(pub Option<SourcePos>);

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pos) => write!(f, "{}", pos),
            None => f.write_str("Line: n. a., column: n. a."),
        }
    }
}

impl From<Option<SourcePos>> for Location {
    fn from(pos: Option<SourcePos>) -> Self {
        Location(pos)
    }
}

fn kind_name(kind: &Option<NodeKind>) -> &'static str {
    kind.map(NodeKind::name).unwrap_or("n. a.")
}

/// Failures raised while rewriting a source tree.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A recognized construct the rule set refuses under the current
    /// configuration.
    #[error("Node type '{kind}': {location}. {message}")]
    Unsupported {
        kind: NodeKind,
        location: Location,
        message: String,
    },

    /// Every rule registered for the kind declined the node.
    #[error("Node type '{kind}': {location}. No transformation for the node")]
    NoTransformation { kind: NodeKind, location: Location },

    /// Misconfiguration or a broken internal assumption.
    #[error("Node type '{}': {location}. {message}", kind_name(.kind))]
    Transformation {
        kind: Option<NodeKind>,
        location: Location,
        message: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl TransformError {
    pub fn transformation(message: impl Into<String>) -> Self {
        TransformError::Transformation {
            kind: None,
            location: Location(None),
            message: message.into(),
        }
    }

    /// Kind of the offending node, when the error carries one.
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            TransformError::Unsupported { kind, .. } | TransformError::NoTransformation { kind, .. } => {
                Some(*kind)
            }
            TransformError::Transformation { kind, .. } => *kind,
            TransformError::Parse(_) => None,
        }
    }

    pub fn location(&self) -> Option<SourcePos> {
        match self {
            TransformError::Unsupported { location, .. }
            | TransformError::NoTransformation { location, .. }
            | TransformError::Transformation { location, .. } => location.0,
            TransformError::Parse(err) => Some(err.location.pos()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("Invalid source map segment '{segment}': {reason}")]
    Decode { segment: String, reason: String },

    #[error("Invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token with given dst_line and dst_col already exists: existing {existing:?}, added {added:?}")]
    DuplicateToken { existing: Box<Token>, added: Box<Token> },
}

impl SourceMapError {
    pub(crate) fn decode(segment: &str, reason: impl Into<String>) -> Self {
        SourceMapError::Decode {
            segment: segment.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Module '{module}' not found in {folders:?}")]
    ModuleNotFound { module: String, folders: Vec<PathBuf> },

    #[error("Module '{module}' is ambiguous, candidates: {candidates:?}")]
    AmbiguousModule {
        module: String,
        candidates: Vec<PathBuf>,
    },

    #[error("Dependency cycle detected among modules: {}", .residual.join(", "))]
    Cycle { residual: Vec<String> },

    #[error("Cannot read '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Rules for node type '{0}' are defined more than once")]
    DuplicateKind(NodeKind),
}

/// Umbrella error for the public API.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    SourceMap(#[from] SourceMapError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Two modules of a bundle bind the same top-level name.
    #[error("Name '{name}' of module '{module}' is already bound by module '{bound_by}'")]
    DuplicateName {
        name: String,
        module: String,
        bound_by: String,
    },
}

pub type Result<T, E = CompilerError> = std::result::Result<T, E>;
