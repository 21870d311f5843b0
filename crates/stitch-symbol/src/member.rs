//! Member tables
//!
//! A [`MemberTable`] is the lookup view of one class's fields and methods,
//! keyed by member name and method signature.

use indexmap::IndexMap;
use std::collections::HashSet;
use stitch_artifact::{ClassFile, MemberSignature, MethodSignature, TypeName};

/// Indexed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub ty: TypeName,
    pub is_static: bool,
    pub is_final: bool,
}

/// Indexed method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    pub returns: TypeName,
    pub is_static: bool,
    pub has_body: bool,
}

/// Fields by name and methods by signature, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberTable {
    fields: IndexMap<String, FieldEntry>,
    methods: IndexMap<MethodSignature, MethodEntry>,
}

impl MemberTable {
    /// Build the table for a class
    ///
    /// Later duplicates shadow earlier ones; use [`duplicate_members`] to
    /// detect them.
    #[must_use]
    pub fn from_class(class: &ClassFile) -> Self {
        let fields = class
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    FieldEntry {
                        ty: f.ty.clone(),
                        is_static: f.modifiers.is_static,
                        is_final: f.modifiers.is_final,
                    },
                )
            })
            .collect();
        let methods = class
            .methods
            .iter()
            .map(|m| {
                (
                    m.signature(),
                    MethodEntry {
                        returns: m.returns.clone(),
                        is_static: m.modifiers.is_static,
                        has_body: m.body.is_some(),
                    },
                )
            })
            .collect();
        Self { fields, methods }
    }

    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.get(name)
    }

    #[inline]
    #[must_use]
    pub fn method(&self, signature: &MethodSignature) -> Option<&MethodEntry> {
        self.methods.get(signature)
    }

    /// First declared method with the given name and parameter count
    #[must_use]
    pub fn method_with_arity(&self, name: &str, arity: usize) -> Option<(&MethodSignature, &MethodEntry)> {
        self.methods
            .iter()
            .find(|(sig, _)| sig.name == name && sig.params.len() == arity)
    }

    /// Whether any method carries the name
    #[must_use]
    pub fn has_method_named(&self, name: &str) -> bool {
        self.methods.keys().any(|sig| sig.name == name)
    }

    #[must_use]
    pub fn contains(&self, member: &MemberSignature) -> bool {
        match member {
            MemberSignature::Field { name } => self.fields.contains_key(name),
            MemberSignature::Method { signature } => self.methods.contains_key(signature),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldEntry)> {
        self.fields.iter()
    }

    pub fn methods(&self) -> impl Iterator<Item = (&MethodSignature, &MethodEntry)> {
        self.methods.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len() + self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Member signatures declared more than once, each reported once
#[must_use]
pub fn duplicate_members(class: &ClassFile) -> Vec<MemberSignature> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for member in class.member_signatures() {
        if !seen.insert(member.clone()) && reported.insert(member.clone()) {
            duplicates.push(member);
        }
    }
    duplicates
}
