//! Mutations and plans
//!
//! A [`Mutation`] is one atomic structural change to a target class. The
//! [`InjectionPlan`] holds, per target, the mutations in the order they must
//! be applied.

use crate::spec::MemberRef;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use stitch_artifact::{ClassName, FieldDecl, MemberSignature, MethodDecl, MethodSignature, Stmt};

/// Application stage; all mutations of a lower stage run first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AddField,
    AddOrReplaceMethod,
    AdviseMethod,
    WrapMethodBody,
}

/// One structural change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a field; with `replace_existing` a same-name native field is
    /// dropped first
    AddField {
        field: FieldDecl,
        replace_existing: bool,
    },

    /// Insert a method; with `replace_existing` the same-signature native is
    /// dropped first
    AddOrReplaceMethod {
        method: MethodDecl,
        replace_existing: bool,
    },

    /// Install `helper` next to the existing method and call it first
    ///
    /// When `guard` is set the helper returns boolean and the target returns
    /// early on `true`.
    AdviseMethod {
        signature: MethodSignature,
        helper: MethodDecl,
        guard: bool,
    },

    /// Wrap the whole body in a guarded region running `handler` on fault
    WrapMethodBody {
        signature: MethodSignature,
        handler: Vec<Stmt>,
    },
}

impl Mutation {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Mutation::AddField { .. } => Stage::AddField,
            Mutation::AddOrReplaceMethod { .. } => Stage::AddOrReplaceMethod,
            Mutation::AdviseMethod { .. } => Stage::AdviseMethod,
            Mutation::WrapMethodBody { .. } => Stage::WrapMethodBody,
        }
    }

    /// Members whose content this mutation writes
    #[must_use]
    pub fn touched(&self) -> Vec<MemberSignature> {
        match self {
            Mutation::AddField { field, .. } => vec![MemberSignature::Field {
                name: field.name.clone(),
            }],
            Mutation::AddOrReplaceMethod { method, .. } => vec![MemberSignature::Method {
                signature: method.signature(),
            }],
            Mutation::AdviseMethod {
                signature, helper, ..
            } => vec![
                MemberSignature::Method {
                    signature: signature.clone(),
                },
                MemberSignature::Method {
                    signature: helper.signature(),
                },
            ],
            Mutation::WrapMethodBody { signature, .. } => vec![MemberSignature::Method {
                signature: signature.clone(),
            }],
        }
    }
}

impl Display for Mutation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::AddField {
                field,
                replace_existing,
            } => write!(
                f,
                "{} field {}: {}",
                if *replace_existing { "replace" } else { "add" },
                field.name,
                field.ty
            ),
            Mutation::AddOrReplaceMethod {
                method,
                replace_existing,
            } => write!(
                f,
                "{} method {}",
                if *replace_existing { "replace" } else { "add" },
                method.signature()
            ),
            Mutation::AdviseMethod {
                signature, guard, ..
            } => write!(
                f,
                "advise {signature}{}",
                if *guard { " (guard)" } else { "" }
            ),
            Mutation::WrapMethodBody { signature, .. } => write!(f, "wrap {signature}"),
        }
    }
}

/// Mutation together with the directive that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMutation {
    pub mutation: Mutation,
    pub origin: MemberRef,
    /// Discovery position of the originating spec
    pub ordinal: usize,
}

/// Ordered mutations for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    pub target: ClassName,
    pub mutations: Vec<PlannedMutation>,
}

impl TargetPlan {
    #[must_use]
    pub fn new(target: ClassName) -> Self {
        Self {
            target,
            mutations: Vec::new(),
        }
    }

    /// Sort by stage, then discovery order
    pub fn order(&mut self) {
        self.mutations
            .sort_by_key(|m| (m.mutation.stage(), m.ordinal));
    }

    /// Every member written by the plan, without repeats
    #[must_use]
    pub fn touched(&self) -> Vec<MemberSignature> {
        let mut touched = Vec::new();
        for member in self.mutations.iter().flat_map(|m| m.mutation.touched()) {
            if !touched.contains(&member) {
                touched.push(member);
            }
        }
        touched
    }
}

/// Plans for every target, keyed and iterated by target name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionPlan {
    targets: BTreeMap<ClassName, TargetPlan>,
}

impl InjectionPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan for `target`, created empty on first use
    pub fn target_mut(&mut self, target: &ClassName) -> &mut TargetPlan {
        self.targets
            .entry(target.clone())
            .or_insert_with(|| TargetPlan::new(target.clone()))
    }

    #[must_use]
    pub fn get(&self, target: &ClassName) -> Option<&TargetPlan> {
        self.targets.get(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &TargetPlan> {
        self.targets.values()
    }

    #[must_use]
    pub fn into_targets(self) -> Vec<TargetPlan> {
        self.targets.into_values().collect()
    }

    /// Total mutation count
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.targets.values().map(|t| t.mutations.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_artifact::TypeName;
    use stitch_test_utils::{field, method, name};

    fn origin() -> MemberRef {
        MemberRef::new(
            name("p.Patch"),
            MemberSignature::Field {
                name: "x".into(),
            },
        )
    }

    fn planned(mutation: Mutation, ordinal: usize) -> PlannedMutation {
        PlannedMutation {
            mutation,
            origin: origin(),
            ordinal,
        }
    }

    #[test]
    fn order_groups_by_stage_then_ordinal() {
        let run = MethodSignature::new("run", vec![]);
        let mut plan = TargetPlan::new(name("a.Foo"));
        plan.mutations = vec![
            planned(
                Mutation::WrapMethodBody {
                    signature: run.clone(),
                    handler: vec![],
                },
                0,
            ),
            planned(
                Mutation::AddOrReplaceMethod {
                    method: method("run", vec![], TypeName::Void, vec![]),
                    replace_existing: false,
                },
                3,
            ),
            planned(
                Mutation::AddField {
                    field: field("b", TypeName::Int),
                    replace_existing: false,
                },
                2,
            ),
            planned(
                Mutation::AddField {
                    field: field("a", TypeName::Int),
                    replace_existing: false,
                },
                1,
            ),
        ];
        plan.order();

        let described: Vec<_> = plan.mutations.iter().map(|m| m.mutation.to_string()).collect();
        assert_eq!(
            described,
            vec!["add field a: int", "add field b: int", "add method run()", "wrap run()"]
        );
        assert_eq!(plan.touched().len(), 3);
    }

    #[test]
    fn plan_iterates_targets_by_name() {
        let mut plan = InjectionPlan::new();
        plan.target_mut(&name("b.Zed"));
        plan.target_mut(&name("a.Alpha"));
        plan.target_mut(&name("b.Zed"));
        let names: Vec<_> = plan.targets().map(|t| t.target.to_string()).collect();
        assert_eq!(names, vec!["a.Alpha", "b.Zed"]);
        assert_eq!(plan.mutation_count(), 0);
    }
}
