//! Compiled class model
//!
//! A [`ClassFile`] is the decoded form of one class artifact: its name and
//! kind, the type hierarchy, and the field and method tables with their
//! annotations and bodies.

use crate::body::{Expr, Stmt};
use crate::name::{ClassName, TypeName};
use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};

/// Name of the static initializer method
pub const CLASS_INIT: &str = "<clinit>";

/// Name of instance constructors
pub const INSTANCE_INIT: &str = "<init>";

/// Kind of compiled class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    /// Singleton object; every member is reachable statically
    Object,
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

/// Member modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub access: Access,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

impl Modifiers {
    /// Public static modifiers
    #[inline]
    #[must_use]
    pub fn public_static() -> Self {
        Self {
            is_static: true,
            ..Self::default()
        }
    }
}

/// Annotation attribute value
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Annotation attached to a member
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    /// Qualified annotation type
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, AnnotationValue>,
}

impl Annotation {
    /// Annotation with no attributes
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            values: IndexMap::new(),
        }
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: AnnotationValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Raw attribute
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.values.get(key)
    }
}

/// Field declaration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeName,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<TypeName>,
    pub returns: TypeName,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// `None` for abstract and interface methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<Stmt>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl MethodDecl {
    /// Name plus parameter types
    #[must_use]
    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }

    /// Whether this is a static or instance initializer
    #[inline]
    #[must_use]
    pub fn is_initializer(&self) -> bool {
        self.name == CLASS_INIT || self.name == INSTANCE_INIT
    }
}

/// Method identity within a class: name plus parameter types
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<TypeName>,
}

impl MethodSignature {
    #[must_use]
    pub fn new(name: impl Into<String>, params: Vec<TypeName>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

/// Field or method identity within a class
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "member", rename_all = "snake_case")]
pub enum MemberSignature {
    Field { name: String },
    Method { signature: MethodSignature },
}

impl MemberSignature {
    /// Bare member name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MemberSignature::Field { name } => name,
            MemberSignature::Method { signature } => &signature.name,
        }
    }
}

impl Display for MemberSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MemberSignature::Field { name } => f.write_str(name),
            MemberSignature::Method { signature } => write!(f, "{signature}"),
        }
    }
}

/// Decoded compiled class
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClassFile {
    pub name: ClassName,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_class: Option<ClassName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<ClassName>,
    /// Designated companion class holding shared members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion: Option<ClassName>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

impl ClassFile {
    /// Empty class of the given kind
    #[must_use]
    pub fn new(name: ClassName, kind: ClassKind) -> Self {
        Self {
            name,
            kind,
            super_class: None,
            interfaces: Vec::new(),
            companion: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// Field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Method by exact signature
    #[must_use]
    pub fn method(&self, signature: &MethodSignature) -> Option<&MethodDecl> {
        self.methods
            .iter()
            .find(|m| m.name == signature.name && m.params == signature.params)
    }

    /// Mutable method by exact signature
    pub fn method_mut(&mut self, signature: &MethodSignature) -> Option<&mut MethodDecl> {
        self.methods
            .iter_mut()
            .find(|m| m.name == signature.name && m.params == signature.params)
    }

    /// All overloads sharing a name
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDecl> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    /// Every member signature, fields first, in declaration order
    pub fn member_signatures(&self) -> impl Iterator<Item = MemberSignature> + '_ {
        self.fields
            .iter()
            .map(|f| MemberSignature::Field {
                name: f.name.clone(),
            })
            .chain(self.methods.iter().map(|m| MemberSignature::Method {
                signature: m.signature(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Value;

    fn sample() -> ClassFile {
        let mut class = ClassFile::new(ClassName::new("a.Foo").unwrap(), ClassKind::Class);
        class.fields.push(FieldDecl {
            name: "count".into(),
            ty: TypeName::Int,
            modifiers: Modifiers::default(),
            initializer: Some(Expr::constant(Value::Int(0))),
            annotations: vec![],
        });
        class.methods.push(MethodDecl {
            name: "test".into(),
            params: vec![TypeName::Int, TypeName::Str],
            returns: TypeName::Void,
            modifiers: Modifiers::default(),
            body: Some(vec![]),
            annotations: vec![Annotation::new("x.Marker")],
        });
        class
    }

    #[test]
    fn signature_display() {
        let sig = MethodSignature::new("test", vec![TypeName::Int, TypeName::Str]);
        assert_eq!(sig.to_string(), "test(int,String)");
        assert_eq!(MethodSignature::new("run", vec![]).to_string(), "run()");
    }

    #[test]
    fn lookup_by_signature() {
        let class = sample();
        let sig = MethodSignature::new("test", vec![TypeName::Int, TypeName::Str]);
        assert!(class.method(&sig).is_some());
        assert!(class
            .method(&MethodSignature::new("test", vec![TypeName::Int]))
            .is_none());
        assert_eq!(class.methods_named("test").count(), 1);
        assert!(class.field("count").is_some());
    }

    #[test]
    fn member_signatures_lists_fields_first() {
        let names: Vec<_> = sample().member_signatures().map(|m| m.to_string()).collect();
        assert_eq!(names, vec!["count", "test(int,String)"]);
    }

    #[test]
    fn class_file_json_defaults() {
        let class: ClassFile = serde_json::from_str(
            r#"{"name":"a.Bar","methods":[{"name":"go","returns":"void","modifiers":{"static":true}}]}"#,
        )
        .unwrap();
        assert_eq!(class.kind, ClassKind::Class);
        assert!(class.fields.is_empty());
        assert!(class.methods[0].modifiers.is_static);
        assert!(class.methods[0].body.is_none());
    }
}
