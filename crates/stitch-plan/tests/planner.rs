//! Planner conflict policy and ordering

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use stitch_artifact::{snippet, ClassFile, MemberSignature, MethodDecl, TypeName};
use stitch_plan::{
    Binding, CatchTemplate, InjectionSpec, MemberRef, Mutation, PlanError, Planner, ResolvedSpec,
    SpecPayload, Stage,
};
use stitch_symbol::ClassIndex;
use stitch_test_utils::{field, foo, logging_method, name, FOO, FOO_PATCH};

fn method_spec(method: MethodDecl, target_name: &str, ordinal: usize) -> InjectionSpec {
    InjectionSpec {
        source_member: MemberRef::new(
            name(FOO_PATCH),
            MemberSignature::Method {
                signature: method.signature(),
            },
        ),
        target_class_name: name(FOO),
        member_name: Some(target_name.to_string()),
        declared_field_type: None,
        replace_existing: false,
        catch_template: None,
        advice_before: false,
        payload: SpecPayload::Method(method),
        ordinal,
    }
}

fn resolve(specs: &[InjectionSpec]) -> Vec<ResolvedSpec<'_>> {
    specs
        .iter()
        .map(|spec| ResolvedSpec {
            spec,
            target: spec.target_class_name.clone(),
            binding: Binding::AsDeclared,
            field_type: None,
        })
        .collect()
}

fn index(classes: &[ClassFile]) -> ClassIndex {
    ClassIndex::build(classes).unwrap()
}

#[test]
fn fresh_method_is_added() {
    let idx = index(&[foo(false)]);
    let specs = vec![method_spec(logging_method("patchTest", "injected"), "test", 0)];
    let plan = Planner::new(&idx).plan(&resolve(&specs)).unwrap();

    let target = plan.get(&name(FOO)).unwrap();
    assert_eq!(target.mutations.len(), 1);
    let Mutation::AddOrReplaceMethod {
        method,
        replace_existing,
    } = &target.mutations[0].mutation
    else {
        panic!("expected method mutation");
    };
    assert_eq!(method.name, "test");
    assert!(!replace_existing);
    assert!(method.annotations.is_empty());
}

#[test]
fn replace_flag_is_irrelevant_without_native() {
    let idx = index(&[foo(false)]);
    let mut spec = method_spec(logging_method("patchTest", "injected"), "test", 0);
    spec.replace_existing = true;
    let specs = vec![spec];
    let plan = Planner::new(&idx).plan(&resolve(&specs)).unwrap();
    assert_eq!(plan.mutation_count(), 1);
}

#[test]
fn native_collision_without_replace_conflicts() {
    let idx = index(&[foo(true)]);
    let specs = vec![method_spec(logging_method("patchTest", "injected"), "test", 0)];
    let errors = Planner::new(&idx).plan(&resolve(&specs)).unwrap_err();
    assert_eq!(errors.len(), 1);
    let PlanError::DuplicateInjection { native, sources, .. } = &errors[0];
    assert_eq!(native.as_ref().unwrap().to_string(), "test()");
    assert_eq!(sources.len(), 1);
}

#[test]
fn replace_on_native_is_planned() {
    let idx = index(&[foo(true)]);
    let mut spec = method_spec(logging_method("patchTest", "injected"), "test", 0);
    spec.replace_existing = true;
    let specs = vec![spec];
    let plan = Planner::new(&idx).plan(&resolve(&specs)).unwrap();
    assert!(matches!(
        plan.get(&name(FOO)).unwrap().mutations[0].mutation,
        Mutation::AddOrReplaceMethod {
            replace_existing: true,
            ..
        }
    ));
}

#[test]
fn same_name_pair_reports_one_conflict_naming_both() {
    let idx = index(&[foo(false)]);
    let specs = vec![
        method_spec(logging_method("initA", "a"), "init", 0),
        method_spec(logging_method("initB", "b"), "init", 1),
    ];
    let errors = Planner::new(&idx).plan(&resolve(&specs)).unwrap_err();
    assert_eq!(errors.len(), 1);
    let PlanError::DuplicateInjection {
        target,
        member,
        sources,
        native,
    } = &errors[0];
    assert_eq!(target, &name(FOO));
    assert_eq!(member, "init");
    assert_eq!(native, &None);
    let described: Vec<_> = sources.iter().map(ToString::to_string).collect();
    assert_eq!(
        described,
        vec![
            "com.example.patch.FooPatch#initA()",
            "com.example.patch.FooPatch#initB()"
        ]
    );
}

#[test]
fn conflicts_accumulate_across_targets() {
    let other = stitch_test_utils::class("com.example.Bar").build();
    let idx = index(&[foo(true), other]);
    let mut bar_a = method_spec(logging_method("x1", "x"), "go", 0);
    bar_a.target_class_name = name("com.example.Bar");
    let mut bar_b = method_spec(logging_method("x2", "x"), "go", 1);
    bar_b.target_class_name = name("com.example.Bar");
    let specs = vec![
        bar_a,
        bar_b,
        method_spec(logging_method("t", "t"), "test", 2),
    ];
    let errors = Planner::new(&idx).plan(&resolve(&specs)).unwrap_err();
    assert_eq!(errors.len(), 2);
}

#[test]
fn later_replace_wins_within_a_group() {
    let idx = index(&[foo(true)]);
    let mut first = method_spec(logging_method("t1", "first"), "test", 0);
    first.replace_existing = true;
    let mut second = method_spec(logging_method("t2", "second"), "test", 1);
    second.replace_existing = true;
    let specs = vec![first, second];
    let plan = Planner::new(&idx).plan(&resolve(&specs)).unwrap();
    let target = plan.get(&name(FOO)).unwrap();
    assert_eq!(target.mutations.len(), 1);
    assert_eq!(
        target.mutations[0].origin.member.to_string(),
        "t2()"
    );
}

fn emit(source: &str, param: TypeName) -> MethodDecl {
    stitch_test_utils::static_method(
        source,
        vec![param],
        TypeName::Void,
        snippet::parse("log($1);").unwrap(),
    )
}

#[test]
fn replace_keeps_distinct_overloads() {
    let idx = index(&[foo(false)]);
    let mut by_string = method_spec(emit("emitString", TypeName::Str), "emit", 1);
    by_string.replace_existing = true;
    let specs = vec![method_spec(emit("emitInt", TypeName::Int), "emit", 0), by_string];
    let plan = Planner::new(&idx).plan(&resolve(&specs)).unwrap();

    let planned: Vec<_> = plan
        .get(&name(FOO))
        .unwrap()
        .mutations
        .iter()
        .map(|m| m.origin.member.to_string())
        .collect();
    assert_eq!(planned, vec!["emitInt(int)", "emitString(String)"]);
}

#[test]
fn same_overload_twice_conflicts_beside_a_replace() {
    let idx = index(&[foo(false)]);
    let mut by_string = method_spec(emit("emitString", TypeName::Str), "emit", 2);
    by_string.replace_existing = true;
    let specs = vec![
        method_spec(emit("emitA", TypeName::Int), "emit", 0),
        method_spec(emit("emitB", TypeName::Int), "emit", 1),
        by_string,
    ];
    let (plan, errors) = Planner::new(&idx).plan_partial(&resolve(&specs));
    assert_eq!(errors.len(), 1);
    let PlanError::DuplicateInjection { member, sources, .. } = &errors[0];
    assert_eq!(member, "emit(int)");
    assert_eq!(sources.len(), 2);
    assert!(plan.get(&name(FOO)).is_none());
}

#[test]
fn catch_template_adds_wrap_after_methods() {
    let idx = index(&[foo(false)]);
    let mut guarded = method_spec(logging_method("risky", "r"), "risky", 0);
    guarded.catch_template = Some(CatchTemplate {
        source: "log($e);".into(),
        handler: snippet::parse("log($e);").unwrap(),
    });
    let field_spec = InjectionSpec {
        source_member: MemberRef::new(
            name(FOO_PATCH),
            MemberSignature::Field {
                name: "flag".into(),
            },
        ),
        target_class_name: name(FOO),
        member_name: None,
        declared_field_type: None,
        replace_existing: false,
        catch_template: None,
        advice_before: false,
        payload: SpecPayload::Field(field("flag", TypeName::Bool)),
        ordinal: 1,
    };
    let specs = vec![guarded, field_spec];
    let plan = Planner::new(&idx).plan(&resolve(&specs)).unwrap();
    let stages: Vec<_> = plan
        .get(&name(FOO))
        .unwrap()
        .mutations
        .iter()
        .map(|m| m.mutation.stage())
        .collect();
    assert_eq!(
        stages,
        vec![Stage::AddField, Stage::AddOrReplaceMethod, Stage::WrapMethodBody]
    );
}

#[test]
fn advice_gets_numbered_private_helpers() {
    let idx = index(&[foo(true)]);
    let mut a = method_spec(logging_method("beforeA", "a"), "test", 0);
    a.advice_before = true;
    let mut b = method_spec(logging_method("beforeB", "b"), "test", 1);
    b.advice_before = true;
    let specs = vec![a, b];
    let plan = Planner::new(&idx).plan(&resolve(&specs)).unwrap();
    let helpers: Vec<_> = plan
        .get(&name(FOO))
        .unwrap()
        .mutations
        .iter()
        .map(|m| match &m.mutation {
            Mutation::AdviseMethod { helper, guard, .. } => {
                assert!(!guard);
                helper.name.clone()
            }
            other => panic!("unexpected {other}"),
        })
        .collect();
    assert_eq!(helpers, vec!["test$before0", "test$before1"]);
}

proptest! {
    #[test]
    fn plan_is_independent_of_input_order(seed in any::<u64>(), count in 1usize..8) {
        let idx = index(&[foo(false)]);
        let specs: Vec<_> = (0..count)
            .map(|i| method_spec(logging_method(&format!("m{i}"), "x"), &format!("m{i}"), i))
            .collect();
        let forward = resolve(&specs);
        let mut shuffled = forward.clone();
        let len = shuffled.len();
        for i in 0..len {
            let j = (seed.wrapping_mul(i as u64 + 7) % len as u64) as usize;
            shuffled.swap(i, j);
        }

        let a = Planner::new(&idx).plan(&forward).unwrap();
        let b = Planner::new(&idx).plan(&shuffled).unwrap();
        prop_assert_eq!(a, b);
    }
}
