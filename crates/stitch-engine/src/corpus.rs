//! Corpus I/O
//!
//! A [`Corpus`] is every class artifact under one directory, in sorted path
//! order, plus the non-class files that travel with them. Emission stages
//! the whole tree in a sibling directory and renames it into place, so an
//! output directory is either fully written or untouched.

use crate::error::{InjectError, Result};
use std::path::{Path, PathBuf};
use stitch_artifact::{ClassArtifact, ClassFile, ClassName, ContentHash, ARTIFACT_EXTENSION};

/// Loaded class corpus
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    artifacts: Vec<ClassArtifact>,
    /// Non-class files, relative path and bytes
    passthrough: Vec<(PathBuf, Vec<u8>)>,
}

/// What [`Corpus::emit`] wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EmitSummary {
    pub artifacts: usize,
    pub passthrough: usize,
}

impl Corpus {
    /// Load every file under `root`
    ///
    /// # Errors
    /// Returns every unreadable or undecodable file
    pub fn load(root: impl AsRef<Path>) -> std::result::Result<Self, Vec<InjectError>> {
        let root = root.as_ref();
        let mut files = Vec::new();
        collect_files(root, root, &mut files).map_err(|e| vec![e])?;
        files.sort();

        let mut corpus = Self::default();
        let mut errors = Vec::new();
        for relative in files {
            let absolute = root.join(&relative);
            let bytes = match std::fs::read(&absolute) {
                Ok(bytes) => bytes,
                Err(e) => {
                    errors.push(InjectError::io_error(&absolute, e));
                    continue;
                }
            };
            if is_artifact(&relative) {
                match ClassArtifact::decode(relative, bytes) {
                    Ok(artifact) => corpus.artifacts.push(artifact),
                    Err(e) => errors.push(e.into()),
                }
            } else {
                corpus.passthrough.push((relative, bytes));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        tracing::info!(
            root = %root.display(),
            classes = corpus.artifacts.len(),
            other_files = corpus.passthrough.len(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// In-memory corpus, each class at its canonical path
    ///
    /// # Errors
    /// Returns error if a class cannot be encoded
    pub fn from_classes(classes: impl IntoIterator<Item = ClassFile>) -> Result<Self> {
        let mut artifacts = classes
            .into_iter()
            .map(ClassArtifact::from_class)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        artifacts.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(Self {
            artifacts,
            passthrough: Vec::new(),
        })
    }

    /// Artifacts in corpus order
    #[inline]
    #[must_use]
    pub fn artifacts(&self) -> &[ClassArtifact] {
        &self.artifacts
    }

    /// Decoded classes in corpus order
    pub fn classes(&self) -> impl Iterator<Item = &ClassFile> {
        self.artifacts.iter().map(ClassArtifact::class)
    }

    #[must_use]
    pub fn get(&self, name: &ClassName) -> Option<&ClassArtifact> {
        self.artifacts.iter().find(|a| &a.class().name == name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Swap in a mutated class, re-encoding it at the original path
    ///
    /// Returns the hash of the new artifact.
    ///
    /// # Errors
    /// Returns error if the class is not in the corpus or cannot be encoded
    pub fn replace(&mut self, class: ClassFile) -> Result<ContentHash> {
        let slot = self
            .artifacts
            .iter_mut()
            .find(|a| a.class().name == class.name)
            .ok_or_else(|| {
                InjectError::io_error(
                    class.name.artifact_path(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "class not in corpus"),
                )
            })?;
        *slot = slot.with_class(class)?;
        Ok(*slot.hash())
    }

    /// Write the corpus to `output`, replacing whatever is there
    ///
    /// # Errors
    /// Returns error on any filesystem failure; `output` is left as it was
    pub fn emit(&self, output: impl AsRef<Path>) -> Result<EmitSummary> {
        let output = output.as_ref();
        let staging = staging_dir(output)?;
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| InjectError::io_error(&staging, e))?;
        }

        let written = self.write_tree(&staging);
        if let Err(e) = written {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        if output.exists() {
            std::fs::remove_dir_all(output).map_err(|e| InjectError::io_error(output, e))?;
        }
        std::fs::rename(&staging, output).map_err(|e| InjectError::io_error(output, e))?;

        let summary = EmitSummary {
            artifacts: self.artifacts.len(),
            passthrough: self.passthrough.len(),
        };
        tracing::info!(output = %output.display(), artifacts = summary.artifacts, "corpus emitted");
        Ok(summary)
    }

    fn write_tree(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| InjectError::io_error(dir, e))?;
        let files = self
            .artifacts
            .iter()
            .map(|a| (a.path(), a.bytes()))
            .chain(self.passthrough.iter().map(|(p, b)| (p.as_path(), b.as_slice())));
        for (relative, bytes) in files {
            let path = dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| InjectError::io_error(parent, e))?;
            }
            std::fs::write(&path, bytes).map_err(|e| InjectError::io_error(&path, e))?;
        }
        Ok(())
    }
}

fn is_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(&format!(".{ARTIFACT_EXTENSION}")))
}

fn staging_dir(output: &Path) -> Result<PathBuf> {
    let name = output.file_name().ok_or_else(|| {
        InjectError::io_error(
            output,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "output has no directory name"),
        )
    })?;
    let mut staged = std::ffi::OsString::from(".");
    staged.push(name);
    staged.push(".stitch-staging");
    Ok(output.with_file_name(staged))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| InjectError::io_error(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| InjectError::io_error(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| InjectError::io_error(&path, e))?;
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        } else {
            tracing::debug!(path = %path.display(), ?file_type, "skipping non-regular entry");
        }
    }
    Ok(())
}

/// Fail when `output` is `input` or lies inside it
///
/// A woven tree emitted inside its own input would be loaded again by the
/// next pass next to the classes it came from.
///
/// # Errors
/// Returns an I/O error naming `output`
pub(crate) fn ensure_output_outside(input: &Path, output: &Path) -> Result<()> {
    let input = input.canonicalize().map_err(|e| InjectError::io_error(input, e))?;
    let resolved = resolve_missing(output)?;
    if resolved.starts_with(&input) {
        return Err(InjectError::io_error(
            output,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("output lies inside the input corpus {}", input.display()),
            ),
        ));
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet
fn resolve_missing(path: &Path) -> Result<PathBuf> {
    let mut rest = Vec::new();
    let mut existing = path;
    while !existing.exists() {
        let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
            break;
        };
        rest.push(name.to_os_string());
        existing = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
    }
    let mut resolved = existing
        .canonicalize()
        .map_err(|e| InjectError::io_error(existing, e))?;
    resolved.extend(rest.iter().rev());
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_test_utils::{class, foo, temp_corpus};

    #[test]
    fn load_sorts_and_keeps_other_files() {
        let dir = temp_corpus(&[class("b.Second").build(), class("a.First").build()]);
        std::fs::write(dir.path().join("README.txt"), b"notes").unwrap();

        let corpus = Corpus::load(dir.path()).unwrap();
        let names: Vec<_> = corpus.classes().map(|c| c.name.to_string()).collect();
        assert_eq!(names, vec!["a.First", "b.Second"]);
        assert_eq!(corpus.passthrough.len(), 1);
    }

    #[test]
    fn load_reports_every_bad_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.class.json"), b"{").unwrap();
        std::fs::write(dir.path().join("y.class.json"), b"[]").unwrap();
        let errors = Corpus::load(dir.path()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind() == "codec"));
    }

    #[test]
    fn emit_round_trips_bytes() {
        let input = temp_corpus(&[foo(true), class("a.Other").build()]);
        std::fs::write(input.path().join("extra.bin"), [0u8, 1, 2]).unwrap();
        let corpus = Corpus::load(input.path()).unwrap();

        let out_root = tempfile::tempdir().unwrap();
        let output = out_root.path().join("out");
        std::fs::create_dir_all(output.join("stale")).unwrap();
        let summary = corpus.emit(&output).unwrap();
        assert_eq!(summary, EmitSummary { artifacts: 2, passthrough: 1 });
        assert!(!output.join("stale").exists());

        for artifact in corpus.artifacts() {
            let written = std::fs::read(output.join(artifact.path())).unwrap();
            assert_eq!(written, artifact.bytes());
        }
        assert_eq!(std::fs::read(output.join("extra.bin")).unwrap(), vec![0u8, 1, 2]);
        assert!(!out_root.path().join(".out.stitch-staging").exists());
    }

    #[test]
    fn output_inside_input_is_rejected() {
        let input = temp_corpus(&[foo(false)]);
        let nested = input.path().join("woven").join("out");
        let err = ensure_output_outside(input.path(), &nested).unwrap_err();
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("inside the input corpus"));
        assert!(ensure_output_outside(input.path(), input.path()).is_err());

        let elsewhere = tempfile::tempdir().unwrap();
        ensure_output_outside(input.path(), &elsewhere.path().join("out")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let input = temp_corpus(&[foo(false)]);
        let other = temp_corpus(&[class("a.Elsewhere").build()]);
        std::os::unix::fs::symlink(other.path(), input.path().join("linked")).unwrap();
        let corpus = Corpus::load(input.path()).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn replace_keeps_path_and_changes_hash() {
        let mut corpus = Corpus::from_classes(vec![foo(false)]).unwrap();
        let before = *corpus.artifacts()[0].hash();
        let mut changed = foo(false);
        changed.fields.clear();
        let after = corpus.replace(changed).unwrap();
        assert_ne!(after, before);
        assert_eq!(corpus.artifacts()[0].hash(), &after);
        assert!(corpus.replace(class("a.Missing").build()).is_err());
    }
}
