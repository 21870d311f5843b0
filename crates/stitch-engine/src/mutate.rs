//! Artifact mutation
//!
//! Applies each target's ordered mutations to its decoded class. Targets are
//! independent, so they are moved onto a rayon pool one class per task;
//! the mutations of one target run in order on that task.

use crate::config::ConfigError;
use crate::error::InjectError;
use rayon::prelude::*;
use stitch_artifact::{
    snippet::CATCH_BINDING, strip_field_writes, ClassFile, Expr, FieldDecl, MemberSignature,
    MethodDecl, MethodSignature, Stmt, CLASS_INIT, INSTANCE_INIT,
};
use stitch_plan::{MemberRef, Mutation, PlannedMutation, TargetPlan};

/// Applies target plans to classes
#[derive(Debug, Clone, Copy, Default)]
pub struct Mutator {
    workers: usize,
}

impl Mutator {
    /// Mutator with `workers` threads; 0 uses the rayon default
    #[inline]
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// Apply every plan to its class, in parallel across targets
    ///
    /// Returns the mutated classes of every target that applied cleanly, in
    /// the order of `work`, plus the failures of the rest.
    ///
    /// # Errors
    /// Returns a config error when the worker pool cannot be built
    pub fn apply_partial(
        &self,
        work: Vec<(TargetPlan, ClassFile)>,
    ) -> Result<(Vec<(TargetPlan, ClassFile)>, Vec<InjectError>), InjectError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| {
                InjectError::from(ConfigError::Workers {
                    workers: self.workers,
                    reason: e.to_string(),
                })
            })?;

        let results: Vec<Result<(TargetPlan, ClassFile), InjectError>> = pool.install(|| {
            work.into_par_iter()
                .map(|(plan, class)| apply(&plan, class).map(|class| (plan, class)))
                .collect()
        });

        let mut mutated = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(pair) => mutated.push(pair),
                Err(e) => errors.push(e),
            }
        }
        tracing::info!(classes = mutated.len(), failed = errors.len(), "mutations applied");
        Ok((mutated, errors))
    }
}

/// Apply one target plan in order
///
/// # Errors
/// Returns error on the first mutation that does not fit the class
pub fn apply(plan: &TargetPlan, mut class: ClassFile) -> Result<ClassFile, InjectError> {
    for planned in &plan.mutations {
        apply_one(&mut class, planned)?;
        tracing::debug!(target = %class.name, origin = %planned.origin, "applied: {}", planned.mutation);
    }
    Ok(class)
}

fn apply_one(class: &mut ClassFile, planned: &PlannedMutation) -> Result<(), InjectError> {
    match &planned.mutation {
        Mutation::AddField {
            field,
            replace_existing,
        } => add_field(class, &planned.origin, field, *replace_existing),
        Mutation::AddOrReplaceMethod {
            method,
            replace_existing,
        } => add_method(class, &planned.origin, method, *replace_existing),
        Mutation::AdviseMethod {
            signature,
            helper,
            guard,
        } => advise(class, &planned.origin, signature, helper, *guard),
        Mutation::WrapMethodBody { signature, handler } => {
            wrap(class, &planned.origin, signature, handler)
        }
    }
}

fn structural(
    class: &ClassFile,
    origin: &MemberRef,
    signature: MemberSignature,
    reason: impl Into<String>,
) -> InjectError {
    InjectError::StructuralMutationError {
        target: class.name.clone(),
        member: origin.clone(),
        signature,
        reason: reason.into(),
    }
}

fn method_member(signature: &MethodSignature) -> MemberSignature {
    MemberSignature::Method {
        signature: signature.clone(),
    }
}

fn add_field(
    class: &mut ClassFile,
    origin: &MemberRef,
    field: &FieldDecl,
    replace_existing: bool,
) -> Result<(), InjectError> {
    if let Some(pos) = class.fields.iter().position(|f| f.name == field.name) {
        if !replace_existing {
            return Err(structural(
                class,
                origin,
                MemberSignature::Field {
                    name: field.name.clone(),
                },
                "field already declared",
            ));
        }
        let native = class.fields.remove(pos);
        let initializer = if native.modifiers.is_static {
            CLASS_INIT
        } else {
            INSTANCE_INIT
        };
        let owner = class.name.clone();
        let stripped: usize = class
            .methods
            .iter_mut()
            .filter(|m| m.name == initializer)
            .filter_map(|m| m.body.as_mut())
            .map(|body| strip_field_writes(body, &owner, &native.name, native.modifiers.is_static))
            .sum();
        tracing::debug!(target = %owner, field = %native.name, stripped, "native field replaced");
    }
    class.fields.push(field.clone());
    Ok(())
}

fn add_method(
    class: &mut ClassFile,
    origin: &MemberRef,
    method: &MethodDecl,
    replace_existing: bool,
) -> Result<(), InjectError> {
    let signature = method.signature();
    if let Some(pos) = class.methods.iter().position(|m| m.signature() == signature) {
        if !replace_existing {
            return Err(structural(
                class,
                origin,
                method_member(&signature),
                "method already declared",
            ));
        }
        class.methods.remove(pos);
        tracing::debug!(target = %class.name, method = %signature, "native method discarded");
    }
    class.methods.push(method.clone());
    Ok(())
}

fn advise(
    class: &mut ClassFile,
    origin: &MemberRef,
    signature: &MethodSignature,
    helper: &MethodDecl,
    guard: bool,
) -> Result<(), InjectError> {
    let Some(target) = class.method(signature) else {
        return Err(structural(class, origin, method_member(signature), "advised method does not exist"));
    };
    if target.body.is_none() {
        return Err(structural(class, origin, method_member(signature), "advised method has no body"));
    }
    if guard && !target.returns.is_void() {
        return Err(structural(
            class,
            origin,
            method_member(signature),
            "guard advice needs a void method",
        ));
    }
    let helper_signature = helper.signature();
    if class.method(&helper_signature).is_some() {
        return Err(structural(
            class,
            origin,
            method_member(&helper_signature),
            "advice helper name already taken",
        ));
    }

    let args = (0..signature.params.len())
        .map(|i| Expr::Param {
            index: u16::try_from(i).unwrap_or(u16::MAX),
        })
        .collect();
    let call = if helper.modifiers.is_static {
        Expr::InvokeStatic {
            owner: class.name.clone(),
            method: helper.name.clone(),
            args,
        }
    } else {
        Expr::InvokeVirtual {
            method: helper.name.clone(),
            args,
        }
    };
    let prologue = if guard {
        Stmt::If {
            cond: call,
            then: vec![Stmt::Return { value: None }],
            otherwise: Vec::new(),
        }
    } else {
        Stmt::Eval { expr: call }
    };

    class.methods.push(helper.clone());
    if let Some(body) = class.method_mut(signature).and_then(|m| m.body.as_mut()) {
        body.insert(0, prologue);
    }
    Ok(())
}

fn wrap(
    class: &mut ClassFile,
    origin: &MemberRef,
    signature: &MethodSignature,
    handler: &[Stmt],
) -> Result<(), InjectError> {
    let missing = structural(class, origin, method_member(signature), "wrapped method does not exist");
    let Some(method) = class.method_mut(signature) else {
        return Err(missing);
    };
    let Some(body) = method.body.take() else {
        return Err(missing);
    };
    method.body = Some(vec![Stmt::Guard {
        body,
        binding: CATCH_BINDING.to_string(),
        handler: handler.to_vec(),
    }]);
    Ok(())
}
