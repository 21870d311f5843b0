//! Reference validation for mutated classes
//!
//! [`ReferenceValidator`] walks method bodies and field initializers and
//! reports every reference that does not hold against a [`ClassIndex`]:
//! missing fields or methods, unknown classes, unbound locals, parameter
//! indices out of range, instance access from static context, and writes
//! to final fields outside their initializer.

use crate::index::ClassIndex;
use crate::member::duplicate_members;
use std::collections::HashSet;
use stitch_artifact::{
    always_exits, ClassFile, ClassName, Expr, MemberSignature, MethodDecl, Stmt, TypeName,
    CLASS_INIT, INSTANCE_INIT,
};

/// One broken invariant inside a class
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// Signature declared twice in one class
    #[error("duplicate member {member}")]
    DuplicateSignature { member: MemberSignature },

    /// Field not found on the owner or its super classes
    #[error("{site}: no field {owner}.{name}")]
    DanglingField {
        site: MemberSignature,
        owner: ClassName,
        name: String,
    },

    /// Method with matching name and arity not found
    #[error("{site}: no method {owner}.{name} taking {arity} argument(s)")]
    DanglingMethod {
        site: MemberSignature,
        owner: ClassName,
        name: String,
        arity: usize,
    },

    /// Class neither in the corpus nor under an external prefix
    #[error("{site}: unknown class {class}")]
    UnknownClass {
        site: MemberSignature,
        class: String,
    },

    #[error("{site}: unbound local '{name}'")]
    UnboundLocal { site: MemberSignature, name: String },

    #[error("{site}: parameter index {index} out of range ({count} declared)")]
    ParamOutOfRange {
        site: MemberSignature,
        index: u16,
        count: usize,
    },

    /// `this` or an own instance member used where no receiver exists
    #[error("{site}: instance access '{what}' in static context")]
    InstanceAccessInStaticContext { site: MemberSignature, what: String },

    /// Static reference resolves to an instance member
    #[error("{site}: {owner}.{name} is not static")]
    NotStatic {
        site: MemberSignature,
        owner: ClassName,
        name: String,
    },

    /// Guarded non-void body whose handler can fall off the end
    #[error("{site}: fault handler falls through in non-void method")]
    HandlerFallsThrough { site: MemberSignature },

    /// Final field assigned outside the initializer of its declaring class
    #[error("{site}: write to final field {owner}.{name}")]
    FinalFieldWrite {
        site: MemberSignature,
        owner: ClassName,
        name: String,
    },

    /// Non-void body that can complete without returning
    #[error("{site}: non-void method can complete without returning")]
    MissingReturn { site: MemberSignature },
}

/// Checks references of selected members against a class index
#[derive(Debug, Clone, Copy)]
pub struct ReferenceValidator<'a> {
    index: &'a ClassIndex,
    external_prefixes: &'a [String],
}

impl<'a> ReferenceValidator<'a> {
    /// Create validator over `index`
    ///
    /// Classes whose names start with one of `external_prefixes` are platform
    /// classes and never required to be in the index.
    #[inline]
    #[must_use]
    pub fn new(index: &'a ClassIndex, external_prefixes: &'a [String]) -> Self {
        Self {
            index,
            external_prefixes,
        }
    }

    /// Whether a class name belongs to the platform
    #[must_use]
    pub fn is_external(&self, name: &str) -> bool {
        self.external_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Validate `class`
    ///
    /// Duplicate signatures are checked across the whole class; references
    /// only inside the members listed in `touched`.
    #[must_use]
    pub fn validate_class(&self, class: &ClassFile, touched: &[MemberSignature]) -> Vec<Violation> {
        let mut violations: Vec<Violation> = duplicate_members(class)
            .into_iter()
            .map(|member| Violation::DuplicateSignature { member })
            .collect();

        for member in touched {
            match member {
                MemberSignature::Field { name } => {
                    if let Some(field) = class.field(name) {
                        self.check_type(member, &field.ty, &mut violations);
                        if let Some(init) = &field.initializer {
                            let scope = Scope {
                                class: &class.name,
                                site: member,
                                is_static: field.modifiers.is_static,
                                method: None,
                                params: 0,
                            };
                            self.check_expr(&scope, init, &HashSet::new(), &mut violations);
                        }
                    }
                }
                MemberSignature::Method { signature } => {
                    for method in class
                        .methods
                        .iter()
                        .filter(|m| m.name == signature.name && m.params == signature.params)
                    {
                        self.check_method(class, member, method, &mut violations);
                    }
                }
            }
        }
        violations
    }

    fn check_method(
        &self,
        class: &ClassFile,
        site: &MemberSignature,
        method: &MethodDecl,
        out: &mut Vec<Violation>,
    ) {
        for ty in method.params.iter().chain(std::iter::once(&method.returns)) {
            self.check_type(site, ty, out);
        }
        let Some(body) = &method.body else {
            return;
        };
        let scope = Scope {
            class: &class.name,
            site,
            is_static: method.modifiers.is_static,
            method: Some(&method.name),
            params: method.params.len(),
        };
        self.check_block(&scope, body, HashSet::new(), out);

        if !method.returns.is_void() && !method.is_initializer() && !always_exits(body) {
            let site = site.clone();
            match body.last() {
                Some(Stmt::Guard { body, handler, .. })
                    if always_exits(body) && !always_exits(handler) =>
                {
                    out.push(Violation::HandlerFallsThrough { site });
                }
                _ => out.push(Violation::MissingReturn { site }),
            }
        }
    }

    fn check_type(&self, site: &MemberSignature, ty: &TypeName, out: &mut Vec<Violation>) {
        let Some(name) = ty.object_name() else {
            return;
        };
        if !ty.is_determined() || self.is_external(name) {
            return;
        }
        let known = ClassName::new(name).is_ok_and(|n| self.index.contains(&n));
        if !known {
            out.push(Violation::UnknownClass {
                site: site.clone(),
                class: name.to_string(),
            });
        }
    }

    fn check_block(
        &self,
        scope: &Scope<'_>,
        stmts: &[Stmt],
        mut locals: HashSet<String>,
        out: &mut Vec<Violation>,
    ) {
        for stmt in stmts {
            for expr in stmt.exprs() {
                self.check_expr(scope, expr, &locals, out);
            }
            match stmt {
                Stmt::Let { name, .. } => {
                    locals.insert(name.clone());
                }
                Stmt::SetStatic { owner, name, .. } => {
                    self.check_static_field(scope, owner, name, out);
                    self.check_final_write(scope, owner, name, out);
                }
                Stmt::SetInstance { name, .. } => {
                    self.check_own_field(scope, name, out);
                    self.check_final_write(scope, scope.class, name, out);
                }
                Stmt::If {
                    then, otherwise, ..
                } => {
                    self.check_block(scope, then, locals.clone(), out);
                    self.check_block(scope, otherwise, locals.clone(), out);
                }
                Stmt::Guard {
                    body,
                    binding,
                    handler,
                } => {
                    self.check_block(scope, body, locals.clone(), out);
                    let mut handler_locals = locals.clone();
                    handler_locals.insert(binding.clone());
                    self.check_block(scope, handler, handler_locals, out);
                }
                Stmt::Eval { .. } | Stmt::Log { .. } | Stmt::Return { .. } | Stmt::Throw { .. } => {}
            }
        }
    }

    fn check_expr(
        &self,
        scope: &Scope<'_>,
        expr: &Expr,
        locals: &HashSet<String>,
        out: &mut Vec<Violation>,
    ) {
        expr.walk(&mut |e| match e {
            Expr::Const { .. } | Expr::Binary { .. } => {}
            Expr::This => {
                if scope.is_static {
                    out.push(Violation::InstanceAccessInStaticContext {
                        site: scope.site.clone(),
                        what: "this".into(),
                    });
                }
            }
            Expr::Param { index } => {
                if usize::from(*index) >= scope.params {
                    out.push(Violation::ParamOutOfRange {
                        site: scope.site.clone(),
                        index: *index,
                        count: scope.params,
                    });
                }
            }
            Expr::Local { name } => {
                if !locals.contains(name) {
                    out.push(Violation::UnboundLocal {
                        site: scope.site.clone(),
                        name: name.clone(),
                    });
                }
            }
            Expr::StaticField { owner, name } => self.check_static_field(scope, owner, name, out),
            Expr::InstanceField { name } => self.check_own_field(scope, name, out),
            Expr::InvokeStatic {
                owner,
                method,
                args,
            } => self.check_static_call(scope, owner, method, args.len(), out),
            Expr::InvokeVirtual { method, args } => {
                match self.index.find_method(scope.class, method, args.len()) {
                    None => out.push(Violation::DanglingMethod {
                        site: scope.site.clone(),
                        owner: scope.class.clone(),
                        name: method.clone(),
                        arity: args.len(),
                    }),
                    Some(hit) if scope.is_static && !hit.entry.is_static => {
                        out.push(Violation::InstanceAccessInStaticContext {
                            site: scope.site.clone(),
                            what: format!("{method}()"),
                        });
                    }
                    Some(_) => {}
                }
            }
        });
    }

    fn check_own_field(&self, scope: &Scope<'_>, name: &str, out: &mut Vec<Violation>) {
        match self.index.find_field(scope.class, name) {
            None => out.push(Violation::DanglingField {
                site: scope.site.clone(),
                owner: scope.class.clone(),
                name: name.to_string(),
            }),
            Some((_, field)) if scope.is_static && !field.is_static => {
                out.push(Violation::InstanceAccessInStaticContext {
                    site: scope.site.clone(),
                    what: format!("this.{name}"),
                });
            }
            Some(_) => {}
        }
    }

    /// Final statics may only be set in `<clinit>`, final instance fields in
    /// `<init>`, and only by the declaring class
    fn check_final_write(
        &self,
        scope: &Scope<'_>,
        owner: &ClassName,
        name: &str,
        out: &mut Vec<Violation>,
    ) {
        let Some((declared_on, field)) = self.index.find_field(owner, name) else {
            return;
        };
        if !field.is_final {
            return;
        }
        let initializer = if field.is_static { CLASS_INIT } else { INSTANCE_INIT };
        if declared_on != scope.class || scope.method != Some(initializer) {
            out.push(Violation::FinalFieldWrite {
                site: scope.site.clone(),
                owner: declared_on.clone(),
                name: name.to_string(),
            });
        }
    }

    /// Returns false when the owner is external and nothing more can be checked
    fn check_owner(&self, scope: &Scope<'_>, owner: &ClassName, out: &mut Vec<Violation>) -> bool {
        if self.is_external(owner.as_str()) {
            return false;
        }
        if !self.index.contains(owner) {
            out.push(Violation::UnknownClass {
                site: scope.site.clone(),
                class: owner.to_string(),
            });
            return false;
        }
        true
    }

    fn check_static_field(
        &self,
        scope: &Scope<'_>,
        owner: &ClassName,
        name: &str,
        out: &mut Vec<Violation>,
    ) {
        if !self.check_owner(scope, owner, out) {
            return;
        }
        match self.index.find_field(owner, name) {
            None => out.push(Violation::DanglingField {
                site: scope.site.clone(),
                owner: owner.clone(),
                name: name.to_string(),
            }),
            Some((declared_on, field)) if !field.is_static => out.push(Violation::NotStatic {
                site: scope.site.clone(),
                owner: declared_on.clone(),
                name: name.to_string(),
            }),
            Some(_) => {}
        }
    }

    fn check_static_call(
        &self,
        scope: &Scope<'_>,
        owner: &ClassName,
        method: &str,
        arity: usize,
        out: &mut Vec<Violation>,
    ) {
        if !self.check_owner(scope, owner, out) {
            return;
        }
        match self.index.find_method(owner, method, arity) {
            None => out.push(Violation::DanglingMethod {
                site: scope.site.clone(),
                owner: owner.clone(),
                name: method.to_string(),
                arity,
            }),
            Some(hit) if !hit.entry.is_static => out.push(Violation::NotStatic {
                site: scope.site.clone(),
                owner: hit.owner.clone(),
                name: method.to_string(),
            }),
            Some(_) => {}
        }
    }
}

/// Where a body lives
struct Scope<'a> {
    class: &'a ClassName,
    site: &'a MemberSignature,
    is_static: bool,
    /// Enclosing method name; `None` inside a field initializer
    method: Option<&'a str>,
    params: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stitch_artifact::{MethodSignature, Value};
    use stitch_test_utils::{class, field, method, name, static_field, static_method};

    fn externals() -> Vec<String> {
        vec!["java.".to_string()]
    }

    fn site(name: &str) -> MemberSignature {
        MemberSignature::Method {
            signature: MethodSignature::new(name, vec![]),
        }
    }

    fn check(classes: &[ClassFile], target: &str, touched: &[MemberSignature]) -> Vec<Violation> {
        let index = ClassIndex::build(classes).unwrap();
        let externals = externals();
        let validator = ReferenceValidator::new(&index, &externals);
        let class = classes.iter().find(|c| c.name.as_str() == target).unwrap();
        validator.validate_class(class, touched)
    }

    #[test]
    fn clean_body_passes() {
        let classes = vec![
            class("a.Util")
                .field(static_field("LEVEL", TypeName::Int, None))
                .method(static_method("fmt", vec![TypeName::Str], TypeName::Str, vec![]))
                .build(),
            class("a.Foo")
                .field(field("count", TypeName::Int))
                .method(method(
                    "run",
                    vec![TypeName::Str],
                    TypeName::Void,
                    vec![
                        Stmt::Let {
                            name: "x".into(),
                            value: Expr::InvokeStatic {
                                owner: name("a.Util"),
                                method: "fmt".into(),
                                args: vec![Expr::Param { index: 0 }],
                            },
                        },
                        Stmt::Log {
                            message: Expr::local("x"),
                        },
                        Stmt::SetInstance {
                            name: "count".into(),
                            value: Expr::StaticField {
                                owner: name("a.Util"),
                                name: "LEVEL".into(),
                            },
                        },
                        Stmt::Eval {
                            expr: Expr::InvokeStatic {
                                owner: name("java.lang.System"),
                                method: "gc".into(),
                                args: vec![],
                            },
                        },
                    ],
                ))
                .build(),
        ];
        let touched = [MemberSignature::Method {
            signature: MethodSignature::new("run", vec![TypeName::Str]),
        }];
        assert_eq!(check(&classes, "a.Foo", &touched), vec![]);
    }

    #[test]
    fn dangling_references_are_all_reported() {
        let classes = vec![class("a.Foo")
            .method(static_method(
                "run",
                vec![],
                TypeName::Void,
                vec![
                    Stmt::Eval {
                        expr: Expr::InvokeStatic {
                            owner: name("a.Foo"),
                            method: "missing".into(),
                            args: vec![],
                        },
                    },
                    Stmt::Log {
                        message: Expr::StaticField {
                            owner: name("b.Gone"),
                            name: "X".into(),
                        },
                    },
                    Stmt::Log {
                        message: Expr::Param { index: 2 },
                    },
                    Stmt::Log {
                        message: Expr::local("nope"),
                    },
                ],
            ))
            .build()];
        let violations = check(&classes, "a.Foo", &[site("run")]);
        assert_eq!(violations.len(), 4);
        assert!(matches!(violations[0], Violation::DanglingMethod { .. }));
        assert!(matches!(violations[1], Violation::UnknownClass { .. }));
        assert!(matches!(violations[2], Violation::ParamOutOfRange { index: 2, count: 0, .. }));
        assert!(matches!(violations[3], Violation::UnboundLocal { .. }));
    }

    #[test]
    fn static_context_rejects_receiver_access() {
        let classes = vec![class("a.Foo")
            .field(field("count", TypeName::Int))
            .method(method("inst", vec![], TypeName::Void, vec![]))
            .method(static_method(
                "run",
                vec![],
                TypeName::Void,
                vec![
                    Stmt::Log {
                        message: Expr::This,
                    },
                    Stmt::Log {
                        message: Expr::InstanceField {
                            name: "count".into(),
                        },
                    },
                    Stmt::Eval {
                        expr: Expr::InvokeVirtual {
                            method: "inst".into(),
                            args: vec![],
                        },
                    },
                ],
            ))
            .build()];
        let violations = check(&classes, "a.Foo", &[site("run")]);
        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .all(|v| matches!(v, Violation::InstanceAccessInStaticContext { .. })));
    }

    #[test]
    fn guard_binding_is_scoped_to_handler() {
        let classes = vec![class("a.Foo")
            .method(static_method(
                "run",
                vec![],
                TypeName::Bool,
                vec![Stmt::Guard {
                    body: vec![Stmt::Return {
                        value: Some(Expr::local("$e")),
                    }],
                    binding: "$e".into(),
                    handler: vec![Stmt::Log {
                        message: Expr::local("$e"),
                    }],
                }],
            ))
            .build()];
        let violations = check(&classes, "a.Foo", &[site("run")]);
        assert_eq!(
            violations,
            vec![
                Violation::UnboundLocal {
                    site: site("run"),
                    name: "$e".into()
                },
                Violation::HandlerFallsThrough { site: site("run") },
            ]
        );
    }

    #[test]
    fn untouched_members_are_not_walked() {
        let classes = vec![class("a.Foo")
            .method(static_method(
                "broken",
                vec![],
                TypeName::Int,
                vec![Stmt::Log {
                    message: Expr::constant(Value::Int(1)),
                }],
            ))
            .build()];
        assert!(check(&classes, "a.Foo", &[]).is_empty());
        assert_eq!(
            check(&classes, "a.Foo", &[site("broken")]),
            vec![Violation::MissingReturn {
                site: site("broken")
            }]
        );
    }

    fn final_static(name: &str) -> stitch_artifact::FieldDecl {
        let mut decl = static_field(name, TypeName::Int, None);
        decl.modifiers.is_final = true;
        decl
    }

    fn set_limit(owner: &str) -> Vec<Stmt> {
        vec![Stmt::SetStatic {
            owner: stitch_test_utils::name(owner),
            name: "LIMIT".into(),
            value: Expr::constant(Value::Int(99)),
        }]
    }

    #[test]
    fn final_fields_are_only_set_by_their_initializer() {
        let classes = vec![
            class("a.Foo")
                .field(final_static("LIMIT"))
                .method(static_method(CLASS_INIT, vec![], TypeName::Void, set_limit("a.Foo")))
                .method(static_method("bump", vec![], TypeName::Void, set_limit("a.Foo")))
                .build(),
            class("a.Other")
                .method(static_method(CLASS_INIT, vec![], TypeName::Void, set_limit("a.Foo")))
                .build(),
        ];
        assert!(check(&classes, "a.Foo", &[site(CLASS_INIT)]).is_empty());
        assert_eq!(
            check(&classes, "a.Foo", &[site("bump")]),
            vec![Violation::FinalFieldWrite {
                site: site("bump"),
                owner: name("a.Foo"),
                name: "LIMIT".into(),
            }]
        );
        assert_eq!(check(&classes, "a.Other", &[site(CLASS_INIT)]).len(), 1);
    }

    #[test]
    fn final_instance_field_is_set_in_constructor_only() {
        let mut id = field("id", TypeName::Int);
        id.modifiers.is_final = true;
        let assign = || {
            vec![Stmt::SetInstance {
                name: "id".into(),
                value: Expr::constant(Value::Int(7)),
            }]
        };
        let classes = vec![class("a.Foo")
            .field(id)
            .method(method(INSTANCE_INIT, vec![], TypeName::Void, assign()))
            .method(method("reset", vec![], TypeName::Void, assign()))
            .build()];
        assert!(check(&classes, "a.Foo", &[site(INSTANCE_INIT)]).is_empty());
        assert!(matches!(
            check(&classes, "a.Foo", &[site("reset")]).as_slice(),
            [Violation::FinalFieldWrite { .. }]
        ));
    }

    #[test]
    fn duplicates_and_unknown_field_types() {
        let dup = method("go", vec![], TypeName::Void, vec![]);
        let classes = vec![class("a.Foo")
            .field(field("when", TypeName::Object("b.Missing".into())))
            .method(dup.clone())
            .method(dup)
            .build()];
        let touched = [MemberSignature::Field {
            name: "when".into(),
        }];
        let violations = check(&classes, "a.Foo", &touched);
        assert_eq!(violations.len(), 2);
        assert!(matches!(violations[0], Violation::DuplicateSignature { .. }));
        assert!(matches!(violations[1], Violation::UnknownClass { .. }));
    }
}
