//! Stitch Symbol System
//!
//! Corpus-wide class lookup and reference checking.
//!
//! # Overview
//!
//! - **ClassIndex**: classes by qualified name (radix trie), by simple name,
//!   and interface implementors
//! - **MemberTable**: fields by name and methods by signature
//! - **ReferenceValidator**: dangling references and static-context checks
//!
//! # Example
//!
//! ```rust,ignore
//! use stitch_symbol::{ClassIndex, ReferenceValidator};
//!
//! let index = ClassIndex::build(&classes)?;
//! let validator = ReferenceValidator::new(&index, &external_prefixes);
//! let violations = validator.validate_class(&class, &touched);
//! ```

#![allow(missing_docs)]

pub mod index;
pub mod member;
pub mod validation;

// Re-exports
pub use index::{ClassEntry, ClassIndex, IndexError, MethodHit};
pub use member::{duplicate_members, FieldEntry, MemberTable, MethodEntry};
pub use validation::{ReferenceValidator, Violation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
