//! Injection errors
//!
//! [`InjectError`] is the single failure type of the pipeline. Every variant
//! is terminal; stages collect them across unrelated targets before the
//! pass aborts, and [`Diagnostic`] flattens them for reports.

use crate::config::ConfigError;
use std::path::{Path, PathBuf};
use stitch_artifact::{ArtifactError, ClassName, MemberSignature, TypeName};
use stitch_plan::{MemberRef, PlanError};
use stitch_symbol::{IndexError, Violation};

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, InjectError>;

/// Failures of an injection pass
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// Directive attributes are missing or contradictory
    #[error("malformed directive on {member}: {reason}")]
    MalformedDirective { member: MemberRef, reason: String },

    /// Target class cannot be found or has no usable shape
    #[error("cannot resolve target {target} of {member}: {reason}")]
    UnresolvedTarget {
        member: MemberRef,
        target: String,
        reason: String,
    },

    /// Field type needs an explicit `fieldClzName`
    #[error(
        "ambiguous type '{declared}' of {member} in {target}: {} (set fieldClzName)",
        candidates_text(.candidates)
    )]
    AmbiguousFieldType {
        member: MemberRef,
        target: ClassName,
        declared: TypeName,
        candidates: Vec<ClassName>,
    },

    /// Planning conflict
    #[error(transparent)]
    DuplicateInjection(#[from] PlanError),

    /// A mutation needs a member the target does not have, or cannot take
    #[error("cannot mutate {target} at {signature} for {member}: {reason}")]
    StructuralMutationError {
        target: ClassName,
        member: MemberRef,
        signature: MemberSignature,
        reason: String,
    },

    /// Mutated class broke an invariant
    #[error("verification of {target} failed: {}", violations_text(.violations))]
    VerificationFailed {
        target: ClassName,
        violations: Vec<Violation>,
    },

    /// Filesystem failure with the path that caused it
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be decoded or encoded
    #[error(transparent)]
    Codec(#[from] ArtifactError),

    /// Corpus declares the same class twice
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn candidates_text(candidates: &[ClassName]) -> String {
    if candidates.is_empty() {
        return "no corpus class has that simple name".into();
    }
    let names: Vec<_> = candidates.iter().map(ClassName::as_str).collect();
    format!("candidates are {}", names.join(", "))
}

fn violations_text(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl InjectError {
    /// Create I/O error with path context
    pub fn io_error(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Stable kind name used in reports
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedDirective { .. } => "malformed_directive",
            Self::UnresolvedTarget { .. } => "unresolved_target",
            Self::AmbiguousFieldType { .. } => "ambiguous_field_type",
            Self::DuplicateInjection(_) => "duplicate_injection",
            Self::StructuralMutationError { .. } => "structural_mutation_error",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::Io { .. } => "io",
            Self::Codec(_) | Self::Index(_) => "codec",
            Self::Config(_) => "config",
        }
    }

    /// Target class the error is about, when there is one
    #[must_use]
    pub fn target(&self) -> Option<String> {
        match self {
            Self::UnresolvedTarget { target, .. } => Some(target.clone()),
            Self::AmbiguousFieldType { target, .. }
            | Self::StructuralMutationError { target, .. }
            | Self::VerificationFailed { target, .. } => Some(target.to_string()),
            Self::DuplicateInjection(PlanError::DuplicateInjection { target, .. }) => {
                Some(target.to_string())
            }
            Self::Index(IndexError::DuplicateClass(name)) => Some(name.to_string()),
            _ => None,
        }
    }

    /// Source members the error is about
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        match self {
            Self::MalformedDirective { member, .. }
            | Self::UnresolvedTarget { member, .. }
            | Self::AmbiguousFieldType { member, .. }
            | Self::StructuralMutationError { member, .. } => vec![member.to_string()],
            Self::DuplicateInjection(PlanError::DuplicateInjection { sources, native, .. }) => {
                sources
                    .iter()
                    .map(ToString::to_string)
                    .chain(native.iter().map(|n| format!("native {n}")))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Flatten into a report entry
    #[must_use]
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind(),
            message: self.to_string(),
            target: self.target(),
            members: self.members(),
            violations: match self {
                Self::VerificationFailed { violations, .. } => violations.clone(),
                _ => Vec::new(),
            },
        }
    }
}

/// One entry of the ordered diagnostic list
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}
