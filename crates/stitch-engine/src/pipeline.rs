//! Injection pipeline
//!
//! [`Weaver`] runs the stages in order: extract, resolve, plan, mutate,
//! verify. A stage drops the specs or targets it rejects and passes the
//! rest on, so one pass reports failures from every stage. Any failure
//! means nothing is emitted.

use crate::config::StitchConfig;
use crate::corpus::{Corpus, EmitSummary};
use crate::error::{Diagnostic, InjectError};
use crate::extract::Extractor;
use crate::mutate::Mutator;
use crate::resolve::Resolver;
use crate::verify::Verifier;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use stitch_artifact::{ClassName, ContentHash};
use stitch_plan::{InjectionSpec, Planner};
use stitch_symbol::ClassIndex;

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Load,
    Extract,
    Resolve,
    Plan,
    Mutate,
    Verify,
    Emit,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Load => "load",
            PipelineStage::Extract => "extract",
            PipelineStage::Resolve => "resolve",
            PipelineStage::Plan => "plan",
            PipelineStage::Mutate => "mutate",
            PipelineStage::Verify => "verify",
            PipelineStage::Emit => "emit",
        })
    }
}

/// Failed pass: the earliest failing stage and every diagnostic found
#[derive(Debug, thiserror::Error)]
#[error("injection failed at {stage} with {} error(s)", .errors.len())]
pub struct BuildFailure {
    pub stage: PipelineStage,
    pub errors: Vec<InjectError>,
}

impl BuildFailure {
    fn new(stage: PipelineStage, errors: Vec<InjectError>) -> Self {
        tracing::error!(%stage, errors = errors.len(), "stage failed");
        Self { stage, errors }
    }

    fn single(stage: PipelineStage, error: impl Into<InjectError>) -> Self {
        Self::new(stage, vec![error.into()])
    }

    /// Ordered diagnostic list
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(InjectError::diagnostic).collect()
    }

    /// Serializable form for `--json` output
    #[must_use]
    pub fn report(&self) -> FailureReport {
        FailureReport {
            passed: false,
            stage: self.stage,
            diagnostics: self.diagnostics(),
        }
    }
}

/// Diagnostics gathered across stages
#[derive(Debug, Default)]
struct Failures {
    stage: Option<PipelineStage>,
    errors: Vec<InjectError>,
}

impl Failures {
    fn record(&mut self, stage: PipelineStage, mut errors: Vec<InjectError>) {
        if errors.is_empty() {
            return;
        }
        tracing::warn!(%stage, errors = errors.len(), "stage reported failures, continuing");
        self.stage.get_or_insert(stage);
        self.errors.append(&mut errors);
    }

    /// Fail now with everything gathered so far plus `error`
    fn abort(&mut self, stage: PipelineStage, error: InjectError) -> BuildFailure {
        self.record(stage, vec![error]);
        let stage = self.stage.unwrap_or(stage);
        BuildFailure::new(stage, std::mem::take(&mut self.errors))
    }

    fn finish(self) -> Result<(), BuildFailure> {
        match self.stage {
            Some(stage) => Err(BuildFailure::new(stage, self.errors)),
            None => Ok(()),
        }
    }
}

/// JSON shape of a failed pass
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FailureReport {
    pub passed: bool,
    pub stage: PipelineStage,
    pub diagnostics: Vec<Diagnostic>,
}

/// One mutated class
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TargetReport {
    pub class: ClassName,
    /// Applied mutations, in application order
    pub mutations: Vec<String>,
    /// Hash of the emitted artifact
    pub hash: ContentHash,
}

/// Successful pass
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WeaveReport {
    pub passed: bool,
    pub classes: usize,
    pub directives: usize,
    pub targets: Vec<TargetReport>,
    /// Classes emitted byte-for-byte as loaded
    pub unchanged: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emitted: Option<EmitSummary>,
}

/// One directive with the classes it resolved to
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DirectiveSummary {
    pub source: String,
    pub target: String,
    pub member: String,
    pub replace: bool,
    pub before: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_catch: Option<String>,
    pub resolved: Vec<ClassName>,
}

/// Runs injection passes under one configuration
#[derive(Debug, Clone, Default)]
pub struct Weaver {
    config: StitchConfig,
}

impl Weaver {
    #[inline]
    #[must_use]
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Load `input`, weave, and emit to `output`
    ///
    /// `output` is only written when every stage passes, and must not lie
    /// inside `input`.
    ///
    /// # Errors
    /// Returns every diagnostic, tagged with the earliest failing stage
    pub fn run(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<WeaveReport, BuildFailure> {
        let (input, output) = (input.as_ref(), output.as_ref());
        crate::corpus::ensure_output_outside(input, output)
            .map_err(|e| BuildFailure::single(PipelineStage::Load, e))?;
        let corpus = Corpus::load(input).map_err(|e| BuildFailure::new(PipelineStage::Load, e))?;
        let (woven, mut report) = self.weave(corpus)?;
        let summary = woven
            .emit(output)
            .map_err(|e| BuildFailure::single(PipelineStage::Emit, e))?;
        report.emitted = Some(summary);
        Ok(report)
    }

    /// Weave an in-memory corpus
    ///
    /// A stage that fails for some specs hands the rest on, so later
    /// stages still report their own diagnostics. Any failure leaves the
    /// corpus unreplaced.
    ///
    /// # Errors
    /// Returns every diagnostic, tagged with the earliest failing stage
    pub fn weave(&self, mut corpus: Corpus) -> Result<(Corpus, WeaveReport), BuildFailure> {
        let mut index = ClassIndex::build(corpus.classes())
            .map_err(|e| BuildFailure::single(PipelineStage::Load, e))?;
        let mut failures = Failures::default();

        let (specs, errors) = Extractor::new(&self.config).extract_partial(&corpus);
        failures.record(PipelineStage::Extract, errors);
        let (resolved, errors) = Resolver::new(&index, &self.config).resolve_partial(&specs);
        failures.record(PipelineStage::Resolve, errors);
        let (plan, conflicts) = Planner::new(&index).plan_partial(&resolved);
        failures.record(
            PipelineStage::Plan,
            conflicts.into_iter().map(InjectError::from).collect(),
        );

        let work: Vec<_> = plan
            .into_targets()
            .into_iter()
            .filter_map(|target| {
                let class = corpus.get(&target.target)?.class().clone();
                Some((target, class))
            })
            .collect();
        let (mutated, errors) = Mutator::new(self.config.workers)
            .apply_partial(work)
            .map_err(|e| failures.abort(PipelineStage::Mutate, e))?;
        failures.record(PipelineStage::Mutate, errors);

        for (_, class) in &mutated {
            index.refresh(class);
        }
        if let Err(errors) = Verifier::new(&index, &self.config.external_prefixes).verify(&mutated) {
            failures.record(PipelineStage::Verify, errors);
        }
        failures.finish()?;

        let mut targets = Vec::with_capacity(mutated.len());
        for (plan, class) in mutated {
            let name = class.name.clone();
            let hash = corpus
                .replace(class)
                .map_err(|e| BuildFailure::single(PipelineStage::Emit, e))?;
            targets.push(TargetReport {
                class: name,
                mutations: plan.mutations.iter().map(|m| m.mutation.to_string()).collect(),
                hash,
            });
        }

        let report = WeaveReport {
            passed: true,
            classes: corpus.len(),
            directives: specs.len(),
            unchanged: corpus.len() - targets.len(),
            targets,
            emitted: None,
        };
        tracing::info!(
            classes = report.classes,
            directives = report.directives,
            mutated = report.targets.len(),
            "weave complete"
        );
        Ok((corpus, report))
    }

    /// Extract and resolve without mutating
    ///
    /// # Errors
    /// Returns extraction or resolution failures
    pub fn inspect(&self, corpus: &Corpus) -> Result<Vec<DirectiveSummary>, BuildFailure> {
        let index = ClassIndex::build(corpus.classes())
            .map_err(|e| BuildFailure::single(PipelineStage::Load, e))?;
        let specs = Extractor::new(&self.config)
            .extract(corpus)
            .map_err(|e| BuildFailure::new(PipelineStage::Extract, e))?;
        let resolved = Resolver::new(&index, &self.config)
            .resolve(&specs)
            .map_err(|e| BuildFailure::new(PipelineStage::Resolve, e))?;

        Ok(specs
            .iter()
            .map(|spec| DirectiveSummary {
                source: spec.source_member.to_string(),
                target: spec.target_class_name.to_string(),
                member: spec.injected_signature().to_string(),
                replace: spec.replace_existing,
                before: spec.advice_before,
                add_catch: spec.catch_template.as_ref().map(|t| t.source.clone()),
                resolved: resolved
                    .iter()
                    .filter(|r| same_spec(r.spec, spec))
                    .map(|r| r.target.clone())
                    .collect(),
            })
            .collect())
    }
}

fn same_spec(a: &InjectionSpec, b: &InjectionSpec) -> bool {
    a.ordinal == b.ordinal
}
