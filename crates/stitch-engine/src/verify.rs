//! Consistency verification
//!
//! Every mutated class is checked against an index of the whole
//! post-mutation corpus, then encoded and decoded again to prove the
//! artifact it will be written as is structurally valid.

use crate::error::InjectError;
use stitch_artifact::{ClassArtifact, ClassFile};
use stitch_plan::TargetPlan;
use stitch_symbol::{ClassIndex, ReferenceValidator};

/// Checks mutated classes
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    index: &'a ClassIndex,
    external_prefixes: &'a [String],
}

impl<'a> Verifier<'a> {
    /// `index` must already reflect the mutated classes
    #[inline]
    #[must_use]
    pub fn new(index: &'a ClassIndex, external_prefixes: &'a [String]) -> Self {
        Self {
            index,
            external_prefixes,
        }
    }

    /// Verify each mutated class against the members its plan touched
    ///
    /// # Errors
    /// Returns one `VerificationFailed` per broken class
    pub fn verify(&self, mutated: &[(TargetPlan, ClassFile)]) -> Result<(), Vec<InjectError>> {
        let validator = ReferenceValidator::new(self.index, self.external_prefixes);
        let mut errors = Vec::new();

        for (plan, class) in mutated {
            let violations = validator.validate_class(class, &plan.touched());
            if !violations.is_empty() {
                for violation in &violations {
                    tracing::debug!(target = %class.name, %violation, "violation");
                }
                errors.push(InjectError::VerificationFailed {
                    target: class.name.clone(),
                    violations,
                });
                continue;
            }
            if let Err(e) = reread(class) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            tracing::info!(classes = mutated.len(), "mutated classes verified");
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Encode then decode, applying the artifact-level structural checks
fn reread(class: &ClassFile) -> Result<(), InjectError> {
    let artifact = ClassArtifact::from_class(class.clone())?;
    let decoded = ClassArtifact::decode(artifact.path(), artifact.bytes().to_vec())?;
    if decoded.class() != class {
        return Err(stitch_artifact::ArtifactError::InvariantViolation {
            class: class.name.to_string(),
            reason: "class changed across encode and decode".into(),
        }
        .into());
    }
    Ok(())
}
