//! Injection planner
//!
//! Partitions resolved specs by target, applies the conflict policy, and
//! builds each target's ordered mutation list. Planning is a pure transform:
//! no artifact is touched and every conflict in the corpus is reported.

use crate::mutation::{InjectionPlan, Mutation, PlannedMutation};
use crate::spec::{MemberRef, ResolvedSpec, SpecPayload};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use stitch_artifact::{
    Access, ClassName, FieldDecl, MemberSignature, MethodDecl, MethodSignature, Modifiers,
    TypeName,
};
use stitch_symbol::ClassIndex;

/// Planning conflicts
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
pub enum PlanError {
    /// Same member injected twice without `replace`, or colliding with a
    /// native member
    #[error("duplicate injection of '{member}' into {target} from {}{}", list(.sources), native_suffix(.native))]
    DuplicateInjection {
        target: ClassName,
        member: String,
        sources: Vec<MemberRef>,
        /// Native member the injection collides with
        native: Option<MemberSignature>,
    },
}

fn list(sources: &[MemberRef]) -> String {
    sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn native_suffix(native: &Option<MemberSignature>) -> String {
    native
        .as_ref()
        .map(|n| format!(" (collides with native {n})"))
        .unwrap_or_default()
}

/// Builds [`InjectionPlan`]s against a class index
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    index: &'a ClassIndex,
}

impl<'a> Planner<'a> {
    #[inline]
    #[must_use]
    pub fn new(index: &'a ClassIndex) -> Self {
        Self { index }
    }

    /// Plan every resolved spec
    ///
    /// # Errors
    /// Returns every conflict found across all targets
    pub fn plan(&self, resolved: &[ResolvedSpec<'_>]) -> Result<InjectionPlan, Vec<PlanError>> {
        let (plan, conflicts) = self.plan_partial(resolved);
        if conflicts.is_empty() {
            Ok(plan)
        } else {
            Err(conflicts)
        }
    }

    /// Plan every conflict-free target; conflicting targets are left out of
    /// the plan and reported
    #[must_use]
    pub fn plan_partial(&self, resolved: &[ResolvedSpec<'_>]) -> (InjectionPlan, Vec<PlanError>) {
        let mut by_target: BTreeMap<&ClassName, Vec<&ResolvedSpec<'_>>> = BTreeMap::new();
        for spec in resolved {
            by_target.entry(&spec.target).or_default().push(spec);
        }

        let mut plan = InjectionPlan::new();
        let mut conflicts = Vec::new();

        for (target, mut specs) in by_target {
            specs.sort_by_key(|r| r.spec.ordinal);
            let before = conflicts.len();
            let mutations = self.plan_target(target, &specs, &mut conflicts);
            if conflicts.len() > before {
                tracing::debug!(target = %target, "target has conflicts, not planned");
                continue;
            }
            let target_plan = plan.target_mut(target);
            target_plan.mutations = mutations;
            target_plan.order();
            for m in &target_plan.mutations {
                tracing::debug!(target = %target, origin = %m.origin, "{}", m.mutation);
            }
        }

        tracing::info!(
            targets = plan.targets().count(),
            mutations = plan.mutation_count(),
            conflicts = conflicts.len(),
            "injection plan built"
        );
        (plan, conflicts)
    }

    fn plan_target(
        &self,
        target: &ClassName,
        specs: &[&ResolvedSpec<'_>],
        conflicts: &mut Vec<PlanError>,
    ) -> Vec<PlannedMutation> {
        let native = self.index.get(target).map(|entry| &entry.members);
        let mut mutations = Vec::new();

        let mut groups: IndexMap<(bool, &str), Vec<&ResolvedSpec<'_>>> = IndexMap::new();
        for resolved in specs.iter().copied().filter(|r| !r.spec.advice_before) {
            groups
                .entry((resolved.spec.is_field(), resolved.spec.injected_name()))
                .or_default()
                .push(resolved);
        }

        for ((_, member), group) in groups {
            for chosen in choose(target, member, &group, conflicts) {
                let spec = chosen.spec;
                let signature = spec.injected_signature();

                if !spec.replace_existing && native.is_some_and(|table| table.contains(&signature)) {
                    conflicts.push(PlanError::DuplicateInjection {
                        target: target.clone(),
                        member: member.to_string(),
                        sources: vec![spec.source_member.clone()],
                        native: Some(signature),
                    });
                    continue;
                }

                let mutation = match &spec.payload {
                    SpecPayload::Field(field) => Mutation::AddField {
                        field: injected_field(chosen, field),
                        replace_existing: spec.replace_existing,
                    },
                    SpecPayload::Method(method) => Mutation::AddOrReplaceMethod {
                        method: injected_method(chosen, method),
                        replace_existing: spec.replace_existing,
                    },
                };
                mutations.push(planned(chosen, mutation));
                if let (Some(template), MemberSignature::Method { signature }) =
                    (&spec.catch_template, signature)
                {
                    mutations.push(planned(
                        chosen,
                        Mutation::WrapMethodBody {
                            signature,
                            handler: template.handler.clone(),
                        },
                    ));
                }
            }
        }

        let mut advice_counts: HashMap<MethodSignature, usize> = HashMap::new();
        for resolved in specs.iter().copied().filter(|r| r.spec.advice_before) {
            let SpecPayload::Method(method) = &resolved.spec.payload else {
                tracing::warn!(source = %resolved.spec.source_member, "advice on a field ignored");
                continue;
            };
            let signature = MethodSignature::new(resolved.spec.injected_name(), method.params.clone());
            let count = advice_counts.entry(signature.clone()).or_default();
            let helper_name = format!("{}$before{}", signature.name, count);
            *count += 1;

            let mut helper = injected_method(resolved, method);
            helper.name = helper_name;
            helper.modifiers.access = Access::Private;
            let guard = helper.returns == TypeName::Bool;
            mutations.push(planned(
                resolved,
                Mutation::AdviseMethod {
                    signature: signature.clone(),
                    helper,
                    guard,
                },
            ));
            if let Some(template) = &resolved.spec.catch_template {
                mutations.push(planned(
                    resolved,
                    Mutation::WrapMethodBody {
                        signature,
                        handler: template.handler.clone(),
                    },
                ));
            }
        }

        mutations
    }
}

/// Surviving specs of a same-name group; conflicts are recorded
///
/// Without any `replace` in the group, every spec conflicts with the others.
/// Otherwise `replace` only supersedes specs of the same signature, and
/// distinct overloads are each planned.
fn choose<'r, 's>(
    target: &ClassName,
    member: &str,
    group: &[&'r ResolvedSpec<'s>],
    conflicts: &mut Vec<PlanError>,
) -> Vec<&'r ResolvedSpec<'s>> {
    if let [only] = group {
        return vec![*only];
    }
    if !group.iter().any(|r| r.spec.replace_existing) {
        conflicts.push(PlanError::DuplicateInjection {
            target: target.clone(),
            member: member.to_string(),
            sources: group.iter().map(|r| r.spec.source_member.clone()).collect(),
            native: None,
        });
        return Vec::new();
    }

    let mut by_signature: IndexMap<MemberSignature, Vec<&'r ResolvedSpec<'s>>> = IndexMap::new();
    for resolved in group.iter().copied() {
        by_signature
            .entry(resolved.spec.injected_signature())
            .or_default()
            .push(resolved);
    }

    let mut chosen = Vec::with_capacity(by_signature.len());
    for (signature, same) in by_signature {
        if let [only] = same.as_slice() {
            chosen.push(*only);
            continue;
        }
        let Some(winner) = same.iter().rev().find(|r| r.spec.replace_existing) else {
            conflicts.push(PlanError::DuplicateInjection {
                target: target.clone(),
                member: signature.to_string(),
                sources: same.iter().map(|r| r.spec.source_member.clone()).collect(),
                native: None,
            });
            continue;
        };
        for loser in same.iter().filter(|r| r.spec.ordinal != winner.spec.ordinal) {
            tracing::warn!(
                target = %target,
                member = %signature,
                dropped = %loser.spec.source_member,
                kept = %winner.spec.source_member,
                "later replace wins"
            );
        }
        chosen.push(*winner);
    }
    chosen
}

fn planned(resolved: &ResolvedSpec<'_>, mutation: Mutation) -> PlannedMutation {
    PlannedMutation {
        mutation,
        origin: resolved.spec.source_member.clone(),
        ordinal: resolved.spec.ordinal,
    }
}

fn bound_modifiers(resolved: &ResolvedSpec<'_>, declared: Modifiers) -> Modifiers {
    Modifiers {
        is_static: resolved.binding.is_static(declared.is_static),
        ..declared
    }
}

fn injected_field(resolved: &ResolvedSpec<'_>, source: &FieldDecl) -> FieldDecl {
    FieldDecl {
        name: resolved.spec.injected_name().to_string(),
        ty: resolved.field_type.clone().unwrap_or_else(|| source.ty.clone()),
        modifiers: bound_modifiers(resolved, source.modifiers),
        initializer: source.initializer.clone(),
        annotations: Vec::new(),
    }
}

fn injected_method(resolved: &ResolvedSpec<'_>, source: &MethodDecl) -> MethodDecl {
    MethodDecl {
        name: resolved.spec.injected_name().to_string(),
        params: source.params.clone(),
        returns: source.returns.clone(),
        modifiers: bound_modifiers(resolved, source.modifiers),
        body: source.body.clone(),
        annotations: Vec::new(),
    }
}
