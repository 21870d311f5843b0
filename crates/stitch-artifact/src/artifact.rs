//! Content-addressed class artifacts
//!
//! A [`ClassArtifact`] pairs the decoded [`ClassFile`] with the exact bytes it
//! was read from and their [`ContentHash`]. Untouched artifacts are emitted
//! from `bytes`, never re-encoded.

use crate::class::ClassFile;
use crate::hash::ContentHash;
use crate::name::NameError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Errors related to artifact encoding and decoding
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Bytes are not a valid class document
    #[error("cannot decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Class could not be serialized
    #[error("cannot encode {class}: {reason}")]
    Encode { class: String, reason: String },

    /// Content invariant violation
    #[error("content invariant violated in {class}: {reason}")]
    InvariantViolation { class: String, reason: String },

    /// Malformed class name
    #[error(transparent)]
    InvalidName(#[from] NameError),
}

/// One compiled class with its on-disk identity
///
/// # Invariants
/// - `hash` is always `ContentHash::compute(&bytes)`
/// - `class` is the decoding of `bytes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassArtifact {
    path: PathBuf,
    bytes: Vec<u8>,
    hash: ContentHash,
    class: ClassFile,
}

impl ClassArtifact {
    /// Decode an artifact read from `path`
    ///
    /// # Errors
    /// Returns error if the bytes are not a class document or the class
    /// violates structural invariants
    pub fn decode(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, ArtifactError> {
        let path = path.into();
        let class: ClassFile =
            serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Decode {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        validate(&class)?;
        let hash = ContentHash::compute(&bytes);
        Ok(Self {
            path,
            bytes,
            hash,
            class,
        })
    }

    /// Encode a class into a fresh artifact at its canonical path
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn from_class(class: ClassFile) -> Result<Self, ArtifactError> {
        let mut bytes = serde_json::to_vec_pretty(&class).map_err(|e| ArtifactError::Encode {
            class: class.name.to_string(),
            reason: e.to_string(),
        })?;
        bytes.push(b'\n');
        let hash = ContentHash::compute(&bytes);
        Ok(Self {
            path: class.name.artifact_path(),
            bytes,
            hash,
            class,
        })
    }

    /// Re-encode after mutation, keeping the original path
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn with_class(&self, class: ClassFile) -> Result<Self, ArtifactError> {
        let mut next = Self::from_class(class)?;
        next.path.clone_from(&self.path);
        Ok(next)
    }

    /// Path relative to the corpus root
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    #[inline]
    #[must_use]
    pub fn class(&self) -> &ClassFile {
        &self.class
    }

    /// Take the decoded class out of the artifact
    #[inline]
    #[must_use]
    pub fn into_class(self) -> ClassFile {
        self.class
    }

    /// Verify integrity
    ///
    /// Returns true if hash matches content recomputation
    #[inline]
    #[must_use]
    pub fn verify(&self) -> bool {
        self.hash.matches(&self.bytes)
    }
}

/// Structural checks every decoded class must pass
fn validate(class: &ClassFile) -> Result<(), ArtifactError> {
    let violation = |reason: String| ArtifactError::InvariantViolation {
        class: class.name.to_string(),
        reason,
    };

    let mut seen = HashSet::new();
    for member in class.member_signatures() {
        if !seen.insert(member.clone()) {
            return Err(violation(format!("duplicate member {member}")));
        }
    }

    if class.is_interface() && !class.fields.iter().all(|f| f.modifiers.is_static) {
        return Err(violation("interface declares an instance field".into()));
    }

    if let Some(companion) = &class.companion {
        if companion == &class.name {
            return Err(violation("class is its own companion".into()));
        }
    }

    if !class.is_interface() {
        if let Some(method) = class.methods.iter().find(|m| m.body.is_none()) {
            return Err(violation(format!(
                "concrete class declares bodiless {}",
                method.signature()
            )));
        }
    }

    Ok(())
}
