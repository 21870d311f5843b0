//! Directive extraction
//!
//! Scans the corpus for members carrying an injection directive and turns
//! each into an [`InjectionSpec`]. Discovery order is corpus order, then
//! fields before methods, then declaration order; the resulting ordinals
//! drive every later ordering decision.

use crate::config::StitchConfig;
use crate::corpus::Corpus;
use crate::directive::Directive;
use crate::error::InjectError;
use stitch_artifact::{
    snippet, Annotation, ClassFile, ClassName, FieldDecl, MemberSignature, MethodDecl, TypeName,
    INJECT_ANNOTATION,
};
use stitch_plan::{CatchTemplate, InjectionSpec, MemberRef, SpecPayload};

/// Source member a directive is attached to
enum Source<'a> {
    Field(&'a FieldDecl),
    Method(&'a MethodDecl),
}

impl Source<'_> {
    fn signature(&self) -> MemberSignature {
        match self {
            Source::Field(f) => MemberSignature::Field {
                name: f.name.clone(),
            },
            Source::Method(m) => MemberSignature::Method {
                signature: m.signature(),
            },
        }
    }

    fn annotations(&self) -> &[Annotation] {
        match self {
            Source::Field(f) => &f.annotations,
            Source::Method(m) => &m.annotations,
        }
    }

    /// Member copy without its annotations
    fn payload(&self) -> SpecPayload {
        match self {
            Source::Field(f) => SpecPayload::Field(FieldDecl {
                annotations: Vec::new(),
                ..(*f).clone()
            }),
            Source::Method(m) => SpecPayload::Method(MethodDecl {
                annotations: Vec::new(),
                ..(*m).clone()
            }),
        }
    }
}

/// Materializes injection specs from a corpus
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    config: &'a StitchConfig,
}

impl<'a> Extractor<'a> {
    #[inline]
    #[must_use]
    pub fn new(config: &'a StitchConfig) -> Self {
        Self { config }
    }

    /// Extract every directive in the corpus
    ///
    /// # Errors
    /// Returns one `MalformedDirective` per invalid directive, across the
    /// whole corpus
    pub fn extract(&self, corpus: &Corpus) -> Result<Vec<InjectionSpec>, Vec<InjectError>> {
        let (specs, errors) = self.extract_partial(corpus);
        if errors.is_empty() {
            Ok(specs)
        } else {
            Err(errors)
        }
    }

    /// Well-formed specs alongside one error per malformed directive
    ///
    /// Ordinals stay dense over the returned specs.
    #[must_use]
    pub fn extract_partial(&self, corpus: &Corpus) -> (Vec<InjectionSpec>, Vec<InjectError>) {
        let mut specs = Vec::new();
        let mut errors = Vec::new();

        for class in corpus.classes() {
            if self.config.is_skipped(&class.name) {
                tracing::debug!(class = %class.name, "skipped by filters");
                continue;
            }
            let sources = class
                .fields
                .iter()
                .map(Source::Field)
                .chain(class.methods.iter().map(Source::Method));
            for source in sources {
                for annotation in source
                    .annotations()
                    .iter()
                    .filter(|a| a.type_name == INJECT_ANNOTATION)
                {
                    let member = MemberRef::new(class.name.clone(), source.signature());
                    match materialize(class, &source, annotation, member, specs.len()) {
                        Ok(spec) => {
                            tracing::debug!(
                                source = %spec.source_member,
                                target = %spec.target_class_name,
                                name = spec.injected_name(),
                                "directive found"
                            );
                            specs.push(spec);
                        }
                        Err(e) => errors.push(e),
                    }
                }
            }
        }

        tracing::info!(directives = specs.len(), malformed = errors.len(), "directives extracted");
        (specs, errors)
    }
}

fn materialize(
    class: &ClassFile,
    source: &Source<'_>,
    annotation: &Annotation,
    member: MemberRef,
    ordinal: usize,
) -> Result<InjectionSpec, InjectError> {
    let malformed = |reasons: Vec<String>| InjectError::MalformedDirective {
        member: member.clone(),
        reason: reasons.join("; "),
    };
    let directive = Directive::from_annotation(annotation).map_err(malformed)?;
    let mut reasons = Vec::new();

    let target = match directive.target.as_deref().map(str::trim) {
        None | Some("") => {
            reasons.push("missing target".to_string());
            None
        }
        Some(raw) => ClassName::new(raw)
            .map_err(|e| reasons.push(format!("invalid target '{raw}': {e}")))
            .ok(),
    };

    if directive.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        reasons.push("empty name".into());
    }

    let mut catch_template = None;
    let mut declared_field_type = None;
    match source {
        Source::Field(_) => {
            if directive.add_catch.is_some() {
                reasons.push("addCatch on a field directive".into());
            }
            if directive.before {
                reasons.push("before on a field directive".into());
            }
            if let Some(raw) = &directive.field_type {
                match raw.parse::<TypeName>() {
                    Ok(ty) => declared_field_type = Some(ty),
                    Err(e) => reasons.push(format!("invalid fieldClzName '{raw}': {e}")),
                }
            }
        }
        Source::Method(method) => {
            if directive.before && directive.replace {
                reasons.push("before cannot be combined with replace".into());
            }
            if method.body.is_none() {
                reasons.push("directive on a bodiless method".into());
            }
            if let Some(raw) = &directive.add_catch {
                match snippet::parse(raw) {
                    Ok(handler) => {
                        catch_template = Some(CatchTemplate {
                            source: raw.clone(),
                            handler,
                        });
                    }
                    Err(e) => reasons.push(format!("addCatch template: {e}")),
                }
            }
            if directive.field_type.is_some() {
                tracing::warn!(source = %member, "fieldClzName on a method directive ignored");
            }
        }
    }

    let Some(target_class_name) = target.filter(|_| reasons.is_empty()) else {
        return Err(malformed(reasons));
    };

    tracing::trace!(class = %class.name, ordinal, "spec materialized");
    Ok(InjectionSpec {
        source_member: member,
        target_class_name,
        member_name: directive.name.map(|n| n.trim().to_string()),
        declared_field_type,
        replace_existing: directive.replace,
        catch_template,
        advice_before: directive.before,
        payload: source.payload(),
        ordinal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_artifact::{AnnotationValue, Stmt};
    use stitch_test_utils::{
        class, field, inject, log, logging_method, patch, Annotate, DirectiveExt,
    };

    fn extract(classes: Vec<ClassFile>) -> Result<Vec<InjectionSpec>, Vec<InjectError>> {
        let corpus = Corpus::from_classes(classes).unwrap();
        Extractor::new(&StitchConfig::default()).extract(&corpus)
    }

    #[test]
    fn discovery_order_is_fields_then_methods() {
        let patch_class = patch(
            "p.Patch",
            vec![field("b", TypeName::Int).annotated(inject("a.Foo"))],
            vec![
                logging_method("first", "1").annotated(inject("a.Foo")),
                logging_method("plain", "x"),
                logging_method("second", "2").annotated(inject("a.Foo").named("renamed")),
            ],
        );
        let specs = extract(vec![patch_class]).unwrap();
        let names: Vec<_> = specs.iter().map(InjectionSpec::injected_name).collect();
        assert_eq!(names, vec!["b", "first", "renamed"]);
        assert_eq!(specs[2].ordinal, 2);
    }

    #[test]
    fn payload_drops_annotations() {
        let specs = extract(vec![patch(
            "p.Patch",
            vec![],
            vec![logging_method("run", "hi").annotated(inject("a.Foo"))],
        )])
        .unwrap();
        let SpecPayload::Method(method) = &specs[0].payload else {
            panic!("method payload expected");
        };
        assert!(method.annotations.is_empty());
        assert_eq!(method.body.as_deref(), Some(&[log("hi")][..]));
    }

    #[test]
    fn catch_template_is_parsed() {
        let specs = extract(vec![patch(
            "p.Patch",
            vec![],
            vec![logging_method("run", "hi").annotated(inject("a.Foo").add_catch("log($e);"))],
        )])
        .unwrap();
        let template = specs[0].catch_template.as_ref().unwrap();
        assert_eq!(template.source, "log($e);");
        assert!(matches!(template.handler[0], Stmt::Log { .. }));
    }

    #[test]
    fn every_malformed_directive_is_reported() {
        let bad = patch(
            "p.Patch",
            vec![
                field("a", TypeName::Int).annotated(inject("a.Foo").add_catch("return;")),
                field("b", TypeName::Int).annotated(inject("a.Foo").before()),
            ],
            vec![
                logging_method("c", "x").annotated(inject("")),
                logging_method("d", "x").annotated(inject("a.Foo").before().replace()),
                logging_method("e", "x").annotated(inject("a.Foo").add_catch("log(")),
                logging_method("f", "x")
                    .annotated(Annotation::new(INJECT_ANNOTATION).with("name", AnnotationValue::Str("f".into()))),
            ],
        );
        let errors = extract(vec![bad, class("a.Foo").build()]).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().all(|e| e.kind() == "malformed_directive"));
        let text: Vec<_> = errors.iter().map(ToString::to_string).collect();
        assert!(text[0].contains("addCatch on a field"));
        assert!(text[1].contains("before on a field"));
        assert!(text[2].contains("missing target"));
        assert!(text[3].contains("before cannot be combined"));
        assert!(text[4].contains("addCatch template"));
        assert!(text[5].contains("missing target"));
    }

    #[test]
    fn skipped_classes_are_not_scanned() {
        let corpus = Corpus::from_classes(vec![patch(
            "gen.Patch",
            vec![],
            vec![logging_method("run", "x").annotated(inject(""))],
        )])
        .unwrap();
        let config = StitchConfig::new().with_skip_prefixes(vec!["gen.".into()]);
        assert!(Extractor::new(&config).extract(&corpus).unwrap().is_empty());
    }

    #[test]
    fn field_type_override_is_parsed() {
        let specs = extract(vec![patch(
            "p.Patch",
            vec![field("when", TypeName::Object("Date".into()))
                .annotated(inject("a.Foo").field_type("java.util.Date"))],
            vec![],
        )])
        .unwrap();
        assert_eq!(
            specs[0].declared_field_type,
            Some(TypeName::Object("java.util.Date".into()))
        );
    }
}
