//! Injection specs
//!
//! An [`InjectionSpec`] is the immutable record of one directive-annotated
//! source member. A [`ResolvedSpec`] binds it to one concrete target class.

use std::fmt::{self, Display, Formatter};
use stitch_artifact::{
    ClassName, FieldDecl, MemberSignature, MethodDecl, MethodSignature, Stmt, TypeName,
};

/// A member of a specific class
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct MemberRef {
    pub class: ClassName,
    pub member: MemberSignature,
}

impl MemberRef {
    #[must_use]
    pub fn new(class: ClassName, member: MemberSignature) -> Self {
        Self { class, member }
    }
}

impl Display for MemberRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.member)
    }
}

/// Parsed `addCatch` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchTemplate {
    /// Template text as written in the directive
    pub source: String,
    /// Handler statements; the caught fault is bound to `$e`
    pub handler: Vec<Stmt>,
}

/// The source member copied into targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecPayload {
    Field(FieldDecl),
    Method(MethodDecl),
}

/// One directive, materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionSpec {
    pub source_member: MemberRef,
    pub target_class_name: ClassName,
    /// Final name in the target; the source member's own name when absent
    pub member_name: Option<String>,
    pub declared_field_type: Option<TypeName>,
    pub replace_existing: bool,
    pub catch_template: Option<CatchTemplate>,
    /// Prepend to the existing target method instead of adding a member
    pub advice_before: bool,
    pub payload: SpecPayload,
    /// Discovery position across the corpus
    pub ordinal: usize,
}

impl InjectionSpec {
    /// Name the member will carry in the target
    #[must_use]
    pub fn injected_name(&self) -> &str {
        match (&self.member_name, &self.payload) {
            (Some(name), _) => name,
            (None, SpecPayload::Field(field)) => &field.name,
            (None, SpecPayload::Method(method)) => &method.name,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_field(&self) -> bool {
        matches!(self.payload, SpecPayload::Field(_))
    }

    /// Signature the member will carry in the target
    #[must_use]
    pub fn injected_signature(&self) -> MemberSignature {
        match &self.payload {
            SpecPayload::Field(_) => MemberSignature::Field {
                name: self.injected_name().to_string(),
            },
            SpecPayload::Method(method) => MemberSignature::Method {
                signature: MethodSignature::new(self.injected_name(), method.params.clone()),
            },
        }
    }
}

/// How the injected member binds in its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    /// Keep the source member's static-ness
    #[default]
    AsDeclared,
    /// Companion state lives as statics of the enclosing class
    Static,
    /// Companion behavior runs with the companion instance as `this`
    Instance,
}

impl Binding {
    /// Apply to a declared static flag
    #[inline]
    #[must_use]
    pub fn is_static(self, declared: bool) -> bool {
        match self {
            Binding::AsDeclared => declared,
            Binding::Static => true,
            Binding::Instance => false,
        }
    }
}

/// A spec bound to one concrete target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpec<'a> {
    pub spec: &'a InjectionSpec,
    pub target: ClassName,
    pub binding: Binding,
    /// Final static type for field directives
    pub field_type: Option<TypeName>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_artifact::Modifiers;
    use stitch_test_utils::{field, method, name};

    fn spec(payload: SpecPayload, member_name: Option<&str>) -> InjectionSpec {
        let member = match &payload {
            SpecPayload::Field(f) => MemberSignature::Field {
                name: f.name.clone(),
            },
            SpecPayload::Method(m) => MemberSignature::Method {
                signature: m.signature(),
            },
        };
        InjectionSpec {
            source_member: MemberRef::new(name("p.Patch"), member),
            target_class_name: name("a.Foo"),
            member_name: member_name.map(str::to_string),
            declared_field_type: None,
            replace_existing: false,
            catch_template: None,
            advice_before: false,
            payload,
            ordinal: 0,
        }
    }

    #[test]
    fn injected_name_defaults_to_source() {
        let s = spec(SpecPayload::Field(field("tag", TypeName::Str)), None);
        assert_eq!(s.injected_name(), "tag");
        assert!(s.is_field());

        let s = spec(
            SpecPayload::Method(method("patchInit", vec![TypeName::Int], TypeName::Void, vec![])),
            Some("init"),
        );
        assert_eq!(s.injected_name(), "init");
        assert_eq!(s.injected_signature().to_string(), "init(int)");
    }

    #[test]
    fn member_ref_display() {
        let s = spec(
            SpecPayload::Method(method("run", vec![], TypeName::Void, vec![])),
            None,
        );
        assert_eq!(s.source_member.to_string(), "p.Patch#run()");
    }

    #[test]
    fn binding_overrides_static_flag() {
        let declared = Modifiers::public_static().is_static;
        assert!(Binding::AsDeclared.is_static(declared));
        assert!(!Binding::Instance.is_static(declared));
        assert!(Binding::Static.is_static(false));
    }
}
