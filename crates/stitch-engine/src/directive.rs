//! Directive attributes
//!
//! Typed view of one [`INJECT_ANNOTATION`](stitch_artifact::INJECT_ANNOTATION)
//! annotation. Attribute names follow the source-language declaration.

use stitch_artifact::{Annotation, AnnotationValue};

pub const ATTR_TARGET: &str = "target";
pub const ATTR_NAME: &str = "name";
pub const ATTR_FIELD_TYPE: &str = "fieldClzName";
pub const ATTR_REPLACE: &str = "replace";
pub const ATTR_ADD_CATCH: &str = "addCatch";
pub const ATTR_BEFORE: &str = "before";

/// Raw directive attributes, type-checked but not yet validated
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directive {
    pub target: Option<String>,
    pub name: Option<String>,
    pub field_type: Option<String>,
    pub replace: bool,
    pub add_catch: Option<String>,
    pub before: bool,
}

impl Directive {
    /// Read attributes from an annotation
    ///
    /// # Errors
    /// Returns one reason per unknown or mistyped attribute
    pub fn from_annotation(annotation: &Annotation) -> Result<Self, Vec<String>> {
        let mut directive = Self::default();
        let mut problems = Vec::new();

        for (key, value) in &annotation.values {
            match key.as_str() {
                ATTR_TARGET => directive.target = string(key, value, &mut problems),
                ATTR_NAME => directive.name = string(key, value, &mut problems),
                ATTR_FIELD_TYPE => directive.field_type = string(key, value, &mut problems),
                ATTR_ADD_CATCH => directive.add_catch = string(key, value, &mut problems),
                ATTR_REPLACE => directive.replace = boolean(key, value, &mut problems),
                ATTR_BEFORE => directive.before = boolean(key, value, &mut problems),
                other => problems.push(format!("unknown attribute '{other}'")),
            }
        }

        if problems.is_empty() {
            Ok(directive)
        } else {
            Err(problems)
        }
    }
}

fn string(key: &str, value: &AnnotationValue, problems: &mut Vec<String>) -> Option<String> {
    if let AnnotationValue::Str(s) = value {
        Some(s.clone())
    } else {
        problems.push(format!("attribute '{key}' must be a string"));
        None
    }
}

fn boolean(key: &str, value: &AnnotationValue, problems: &mut Vec<String>) -> bool {
    if let AnnotationValue::Bool(b) = value {
        *b
    } else {
        problems.push(format!("attribute '{key}' must be a boolean"));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_test_utils::{inject, DirectiveExt};

    #[test]
    fn reads_every_attribute() {
        let annotation = inject("a.Foo")
            .named("test")
            .replace()
            .add_catch("return;")
            .field_type("a.Bar");
        let directive = Directive::from_annotation(&annotation).unwrap();
        assert_eq!(directive.target.as_deref(), Some("a.Foo"));
        assert_eq!(directive.name.as_deref(), Some("test"));
        assert_eq!(directive.field_type.as_deref(), Some("a.Bar"));
        assert_eq!(directive.add_catch.as_deref(), Some("return;"));
        assert!(directive.replace);
        assert!(!directive.before);
    }

    #[test]
    fn collects_every_problem() {
        let annotation = inject("a.Foo")
            .with(ATTR_REPLACE, AnnotationValue::Str("yes".into()))
            .with("priority", AnnotationValue::Int(3));
        let problems = Directive::from_annotation(&annotation).unwrap_err();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("boolean"));
        assert!(problems[1].contains("priority"));
    }
}
