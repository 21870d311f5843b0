//! Testing utilities for the stitch workspace
//!
//! Class builders, directive helpers and the shared fixture corpora.

#![allow(missing_docs)]

use std::path::Path;
use stitch_artifact::{
    Annotation, AnnotationValue, ClassArtifact, ClassFile, ClassKind, ClassName, Expr, FieldDecl,
    MethodDecl, Modifiers, Stmt, TypeName, Value, INJECT_ANNOTATION,
};

pub const FOO: &str = "com.example.Foo";
pub const FOO_PATCH: &str = "com.example.patch.FooPatch";
pub const COMPANION_HOST: &str = "com.example.api.TestCompanionKotlin";
pub const COMPANION_PATCH: &str = "com.example.patch.CompanionPatch";

pub fn name(raw: &str) -> ClassName {
    ClassName::new(raw).unwrap()
}

/// Fluent class builder
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    class: ClassFile,
}

pub fn class(raw: &str) -> ClassBuilder {
    ClassBuilder {
        class: ClassFile::new(name(raw), ClassKind::Class),
    }
}

pub fn interface(raw: &str) -> ClassBuilder {
    ClassBuilder {
        class: ClassFile::new(name(raw), ClassKind::Interface),
    }
}

impl ClassBuilder {
    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.class.kind = kind;
        self
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.class.super_class = Some(name(parent));
        self
    }

    pub fn implements(mut self, iface: &str) -> Self {
        self.class.interfaces.push(name(iface));
        self
    }

    pub fn companion(mut self, companion: &str) -> Self {
        self.class.companion = Some(name(companion));
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.class.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.class.methods.push(method);
        self
    }

    pub fn build(self) -> ClassFile {
        self.class
    }
}

pub fn field(name: &str, ty: TypeName) -> FieldDecl {
    FieldDecl {
        name: name.to_string(),
        ty,
        modifiers: Modifiers::default(),
        initializer: None,
        annotations: Vec::new(),
    }
}

pub fn static_field(name: &str, ty: TypeName, initializer: Option<Expr>) -> FieldDecl {
    FieldDecl {
        modifiers: Modifiers::public_static(),
        initializer,
        ..field(name, ty)
    }
}

pub fn method(name: &str, params: Vec<TypeName>, returns: TypeName, body: Vec<Stmt>) -> MethodDecl {
    MethodDecl {
        name: name.to_string(),
        params,
        returns,
        modifiers: Modifiers::default(),
        body: Some(body),
        annotations: Vec::new(),
    }
}

pub fn static_method(
    name: &str,
    params: Vec<TypeName>,
    returns: TypeName,
    body: Vec<Stmt>,
) -> MethodDecl {
    MethodDecl {
        modifiers: Modifiers::public_static(),
        ..method(name, params, returns, body)
    }
}

/// Injection directive targeting `target`
pub fn inject(target: &str) -> Annotation {
    Annotation::new(INJECT_ANNOTATION).with("target", AnnotationValue::Str(target.to_string()))
}

/// Directive attribute helpers
pub trait DirectiveExt {
    fn named(self, name: &str) -> Self;
    fn replace(self) -> Self;
    fn before(self) -> Self;
    fn add_catch(self, template: &str) -> Self;
    fn field_type(self, ty: &str) -> Self;
}

impl DirectiveExt for Annotation {
    fn named(self, name: &str) -> Self {
        self.with("name", AnnotationValue::Str(name.to_string()))
    }

    fn replace(self) -> Self {
        self.with("replace", AnnotationValue::Bool(true))
    }

    fn before(self) -> Self {
        self.with("before", AnnotationValue::Bool(true))
    }

    fn add_catch(self, template: &str) -> Self {
        self.with("addCatch", AnnotationValue::Str(template.to_string()))
    }

    fn field_type(self, ty: &str) -> Self {
        self.with("fieldClzName", AnnotationValue::Str(ty.to_string()))
    }
}

/// Attach an annotation to a member
pub trait Annotate {
    fn annotated(self, annotation: Annotation) -> Self;
}

impl Annotate for MethodDecl {
    fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

impl Annotate for FieldDecl {
    fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

pub fn log(message: &str) -> Stmt {
    Stmt::Log {
        message: Expr::str(message),
    }
}

pub fn ret(value: Option<Value>) -> Stmt {
    Stmt::Return {
        value: value.map(Expr::constant),
    }
}

pub fn throw(message: &str) -> Stmt {
    Stmt::Throw {
        message: Expr::str(message),
    }
}

/// `com.example.Foo`
///
/// Holds a static `TAG` set by `<clinit>`, an instance `count`, and when
/// `with_test` is set a static `test()` that logs `"original test"`.
pub fn foo(with_test: bool) -> ClassFile {
    let owner = name(FOO);
    let mut builder = class(FOO)
        .field(static_field("TAG", TypeName::Str, None))
        .field(field("count", TypeName::Int))
        .method(static_method(
            "<clinit>",
            vec![],
            TypeName::Void,
            vec![Stmt::SetStatic {
                owner,
                name: "TAG".into(),
                value: Expr::str("native"),
            }],
        ))
        .method(method(
            "<init>",
            vec![],
            TypeName::Void,
            vec![Stmt::SetInstance {
                name: "count".into(),
                value: Expr::constant(Value::Int(0)),
            }],
        ));
    if with_test {
        builder = builder.method(static_method(
            "test",
            vec![],
            TypeName::Void,
            vec![log("original test"), ret(None)],
        ));
    }
    builder.build()
}

/// Patch class carrying the given members
pub fn patch(raw: &str, fields: Vec<FieldDecl>, methods: Vec<MethodDecl>) -> ClassFile {
    let mut class = class(raw).build();
    class.fields = fields;
    class.methods = methods;
    class
}

/// Static zero-argument void method that logs `message`
pub fn logging_method(name: &str, message: &str) -> MethodDecl {
    static_method(name, vec![], TypeName::Void, vec![log(message)])
}

/// Host class with a designated companion, plus the companion itself
pub fn companion_pair() -> Vec<ClassFile> {
    let companion_name = name(COMPANION_HOST).nested("Companion");
    let host = class(COMPANION_HOST)
        .companion(companion_name.as_str())
        .field(static_field(
            "Companion",
            TypeName::Object(companion_name.to_string()),
            None,
        ))
        .build();
    let companion = class(companion_name.as_str())
        .method(method(
            "greet",
            vec![],
            TypeName::Str,
            vec![Stmt::Return {
                value: Some(Expr::str("hello")),
            }],
        ))
        .build();
    vec![host, companion]
}

/// Write classes as a corpus under `root`
pub fn write_corpus(root: &Path, classes: &[ClassFile]) {
    for class in classes {
        let artifact = ClassArtifact::from_class(class.clone()).unwrap();
        let path = root.join(artifact.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, artifact.bytes()).unwrap();
    }
}

/// Fresh temporary corpus holding `classes`
pub fn temp_corpus(classes: &[ClassFile]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), classes);
    dir
}
