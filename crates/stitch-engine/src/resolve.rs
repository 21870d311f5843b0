//! Target resolution
//!
//! Maps each spec's target name to the concrete class(es) it mutates and
//! settles the static type of injected fields.
//!
//! # Core Concepts
//!
//! - **Plain names** resolve to the class of that name.
//! - **Companion names** (`Foo$Companion`) address the companion member set
//!   of `Foo`. Fields land on `Foo` itself as statics, methods land on the
//!   companion class `Foo` designates and run with the companion instance as
//!   receiver.
//! - **Interfaces** fan out to every class that directly implements them.
//! - **Field types** must be provably unique. A simple type name is only
//!   inferred when exactly one corpus class carries it.

use crate::config::StitchConfig;
use crate::error::InjectError;
use stitch_artifact::{ClassName, TypeName};
use stitch_plan::{Binding, InjectionSpec, ResolvedSpec, SpecPayload};
use stitch_symbol::ClassIndex;

/// Resolves specs against a class index
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a ClassIndex,
    config: &'a StitchConfig,
}

impl<'a> Resolver<'a> {
    #[inline]
    #[must_use]
    pub fn new(index: &'a ClassIndex, config: &'a StitchConfig) -> Self {
        Self { index, config }
    }

    /// Resolve every spec
    ///
    /// # Errors
    /// Returns every unresolved target and ambiguous field type
    pub fn resolve<'s>(
        &self,
        specs: &'s [InjectionSpec],
    ) -> Result<Vec<ResolvedSpec<'s>>, Vec<InjectError>> {
        let (resolved, errors) = self.resolve_partial(specs);
        if errors.is_empty() {
            Ok(resolved)
        } else {
            Err(errors)
        }
    }

    /// Resolved targets of every resolvable spec, plus the failures of the rest
    #[must_use]
    pub fn resolve_partial<'s>(
        &self,
        specs: &'s [InjectionSpec],
    ) -> (Vec<ResolvedSpec<'s>>, Vec<InjectError>) {
        let mut resolved = Vec::new();
        let mut errors = Vec::new();

        for spec in specs {
            match self.resolve_one(spec) {
                Ok(mut targets) => resolved.append(&mut targets),
                Err(e) => errors.push(e),
            }
        }

        tracing::info!(
            specs = specs.len(),
            targets = resolved.len(),
            failed = errors.len(),
            "targets resolved"
        );
        (resolved, errors)
    }

    fn resolve_one<'s>(&self, spec: &'s InjectionSpec) -> Result<Vec<ResolvedSpec<'s>>, InjectError> {
        let requested = &spec.target_class_name;
        let unresolved = |reason: String| InjectError::UnresolvedTarget {
            member: spec.source_member.clone(),
            target: requested.to_string(),
            reason,
        };

        let (class, binding) = if let Some(owner) = requested.companion_owner() {
            self.companion_target(spec, &owner).map_err(unresolved)?
        } else {
            (requested.clone(), Binding::AsDeclared)
        };

        let entry = self
            .visible(&class)
            .ok_or_else(|| unresolved(format!("{class} is not in the corpus")))?;

        let targets: Vec<ClassName> = if entry.is_interface() {
            let implementors: Vec<_> = self
                .index
                .implementors(&class)
                .iter()
                .filter(|c| !self.config.is_skipped(c))
                .cloned()
                .collect();
            if implementors.is_empty() {
                return Err(unresolved(format!("interface {class} has no implementing class")));
            }
            tracing::debug!(
                source = %spec.source_member,
                interface = %class,
                implementors = implementors.len(),
                "fanning out to implementors"
            );
            implementors
        } else {
            vec![class]
        };

        targets
            .into_iter()
            .map(|target| {
                let field_type = self.field_type(spec, &target)?;
                Ok(ResolvedSpec {
                    spec,
                    target,
                    binding,
                    field_type,
                })
            })
            .collect()
    }

    /// Class and binding behind a `$Companion` name
    fn companion_target(
        &self,
        spec: &InjectionSpec,
        owner: &ClassName,
    ) -> Result<(ClassName, Binding), String> {
        let entry = self
            .visible(owner)
            .ok_or_else(|| format!("enclosing class {owner} is not in the corpus"))?;
        let companion = entry
            .companion
            .as_ref()
            .ok_or_else(|| format!("{owner} designates no companion"))?;
        if spec.is_field() {
            Ok((owner.clone(), Binding::Static))
        } else {
            Ok((companion.clone(), Binding::Instance))
        }
    }

    fn visible(&self, class: &ClassName) -> Option<&'a stitch_symbol::ClassEntry> {
        if self.config.is_skipped(class) {
            return None;
        }
        self.index.get(class)
    }

    /// Final static type of a field spec; `None` for methods
    fn field_type(&self, spec: &InjectionSpec, target: &ClassName) -> Result<Option<TypeName>, InjectError> {
        let SpecPayload::Field(field) = &spec.payload else {
            return Ok(None);
        };

        if let Some(declared) = &spec.declared_field_type {
            if field.ty.is_determined() {
                tracing::debug!(
                    source = %spec.source_member,
                    source_type = %field.ty,
                    declared = %declared,
                    "redundant fieldClzName, declared type wins"
                );
            }
            return Ok(Some(declared.clone()));
        }

        if field.ty.is_determined() {
            return Ok(Some(field.ty.clone()));
        }

        let simple = field.ty.object_name().unwrap_or_default();
        match self.index.by_simple_name(simple) {
            [only] => {
                tracing::debug!(source = %spec.source_member, inferred = %only, "field type inferred");
                Ok(Some(TypeName::Object(only.to_string())))
            }
            candidates => Err(InjectError::AmbiguousFieldType {
                member: spec.source_member.clone(),
                target: target.clone(),
                declared: field.ty.clone(),
                candidates: candidates.to_vec(),
            }),
        }
    }
}
