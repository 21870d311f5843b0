//! Stitch Artifact Model
//!
//! Content-addressed compiled classes and the instruction trees inside them.
//!
//! # Core Concepts
//!
//! - [`ClassArtifact`]: one compiled class, its original bytes and their hash
//! - [`ClassFile`]: decoded class with field and method tables
//! - [`Stmt`] / [`Expr`]: structured method bodies
//! - [`ClassName`] / [`TypeName`]: validated names
//! - [`snippet`]: textual statement fragments carried by directives
//!
//! # Example
//!
//! ```rust,ignore
//! use stitch_artifact::ClassArtifact;
//!
//! let artifact = ClassArtifact::decode(path, bytes)?;
//! println!("{} {}", artifact.class().name, artifact.hash().short());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod body;
mod class;
mod hash;
mod name;

pub mod snippet;

pub use artifact::{ArtifactError, ClassArtifact};
pub use body::{always_exits, strip_field_writes, BinOp, Expr, Stmt, Value};
pub use class::{
    Access, Annotation, AnnotationValue, ClassFile, ClassKind, FieldDecl, MemberSignature,
    MethodDecl, MethodSignature, Modifiers, CLASS_INIT, INSTANCE_INIT,
};
pub use hash::ContentHash;
pub use name::{ClassName, NameError, TypeName, COMPANION_SUFFIX};

/// Annotation type that marks a member for injection
pub const INJECT_ANNOTATION: &str = "stitch.Inject";

/// File extension of class artifacts inside a corpus
pub const ARTIFACT_EXTENSION: &str = "class.json";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
