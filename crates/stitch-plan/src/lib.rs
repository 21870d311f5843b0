//! Stitch Injection Planning
//!
//! Turns resolved injection specs into deterministic per-target mutation
//! lists.
//!
//! # Conflict policy
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | two specs, same member name, no `replace` | one `DuplicateInjection` naming both |
//! | spec without `replace` hits a native member | `DuplicateInjection` naming the native |
//! | `replace` on a native member | native discarded |
//! | `replace` with nothing to replace | plain addition |
//!
//! # Ordering
//!
//! Within one target: fields, then added or replaced methods, then advice,
//! then body wrapping. Declaration order within each stage.

#![allow(missing_docs)]

pub mod mutation;
pub mod planner;
pub mod spec;

pub use mutation::{InjectionPlan, Mutation, PlannedMutation, Stage, TargetPlan};
pub use planner::{PlanError, Planner};
pub use spec::{Binding, CatchTemplate, InjectionSpec, MemberRef, ResolvedSpec, SpecPayload};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
