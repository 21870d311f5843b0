//! Stitch Injection Engine
//!
//! Weaves directive-annotated members into separately compiled target
//! classes.
//!
//! # Architecture
//!
//! ```text
//! corpus ──▶ Extractor ──▶ Resolver ──▶ Planner ──▶ Mutator ──▶ Verifier ──▶ emit
//!            (specs)       (targets)    (plan)      (rayon)     (index)
//! ```
//!
//! Data flows strictly forward. Every stage collects all of its failures
//! before the pass stops; output is written only after verification passes.
//!
//! # Example
//!
//! ```rust,ignore
//! use stitch_engine::{StitchConfig, Weaver};
//!
//! let weaver = Weaver::new(StitchConfig::discover(&input)?);
//! match weaver.run(&input, &output) {
//!     Ok(report) => println!("{} classes mutated", report.targets.len()),
//!     Err(failure) => {
//!         for diagnostic in failure.diagnostics() {
//!             eprintln!("{}", diagnostic.message);
//!         }
//!     }
//! }
//! ```

#![allow(missing_docs)]

pub mod config;
pub mod corpus;
pub mod directive;
pub mod error;
pub mod exec;
pub mod extract;
pub mod mutate;
pub mod pipeline;
pub mod resolve;
pub mod verify;

pub use config::{ConfigError, StitchConfig, CONFIG_FILE};
pub use corpus::{Corpus, EmitSummary};
pub use directive::Directive;
pub use error::{Diagnostic, InjectError, Result};
pub use exec::{Fault, Machine, ObjectId, Slot};
pub use extract::Extractor;
pub use mutate::Mutator;
pub use pipeline::{
    BuildFailure, DirectiveSummary, FailureReport, PipelineStage, TargetReport, WeaveReport,
    Weaver,
};
pub use resolve::Resolver;
pub use verify::Verifier;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
