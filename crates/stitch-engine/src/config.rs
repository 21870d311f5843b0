//! Engine configuration
//!
//! Loaded from `stitch.toml`; every key is optional.
//!
//! ```toml
//! skip_prefixes = ["com.example.generated."]
//! skip_contains = ["$$Lambda"]
//! external_prefixes = ["java.", "kotlin.", "android."]
//! workers = 4
//! log_filter = "stitch=debug"
//! ```

use std::path::{Path, PathBuf};
use stitch_artifact::ClassName;

/// Default config file name looked up next to the input corpus
pub const CONFIG_FILE: &str = "stitch.toml";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Worker pool could not be started
    #[error("cannot start {workers} mutation workers: {reason}")]
    Workers { workers: usize, reason: String },
}

/// Injection pass configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StitchConfig {
    /// Class-name prefixes excluded from extraction and resolution
    pub skip_prefixes: Vec<String>,
    /// Class-name substrings with the same effect
    pub skip_contains: Vec<String>,
    /// Platform packages the verifier does not expect in the corpus
    pub external_prefixes: Vec<String>,
    /// Mutation worker threads; 0 lets rayon decide
    pub workers: usize,
    /// Default tracing filter for the CLI
    pub log_filter: String,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: Vec::new(),
            skip_contains: Vec::new(),
            external_prefixes: vec!["java.".into(), "kotlin.".into(), "android.".into()],
            workers: 0,
            log_filter: "info".into(),
        }
    }
}

impl StitchConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid config
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load `stitch.toml` from `dir` if present, defaults otherwise
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be loaded
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let candidate = dir.as_ref().join(CONFIG_FILE);
        if candidate.is_file() {
            Self::load(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// With skip prefixes
    #[inline]
    #[must_use]
    pub fn with_skip_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.skip_prefixes = prefixes;
        self
    }

    /// With skip substrings
    #[inline]
    #[must_use]
    pub fn with_skip_contains(mut self, needles: Vec<String>) -> Self {
        self.skip_contains = needles;
        self
    }

    /// With external prefixes
    #[inline]
    #[must_use]
    pub fn with_external_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.external_prefixes = prefixes;
        self
    }

    /// With mutation worker count
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Whether the skip filters exclude `class`
    #[must_use]
    pub fn is_skipped(&self, class: &ClassName) -> bool {
        let name = class.as_str();
        self.skip_prefixes.iter().any(|p| name.starts_with(p.as_str()))
            || self.skip_contains.iter().any(|c| name.contains(c.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_test_utils::name;

    #[test]
    fn empty_file_means_defaults() {
        let config: StitchConfig = toml::from_str("").unwrap();
        assert_eq!(config, StitchConfig::default());
        assert_eq!(config.external_prefixes.len(), 3);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: StitchConfig =
            toml::from_str("skip_prefixes = [\"gen.\"]\nworkers = 2\n").unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.log_filter, "info");
        assert!(config.is_skipped(&name("gen.Foo")));
        assert!(!config.is_skipped(&name("app.Foo")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<StitchConfig>("skip = 1").is_err());
    }

    #[test]
    fn substring_filter() {
        let config = StitchConfig::new().with_skip_contains(vec!["$Lambda".into()]);
        assert!(config.is_skipped(&name("a.Foo$Lambda1")));
        assert!(!config.is_skipped(&name("a.Foo")));
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "workers = \"many\"").unwrap();
        let err = StitchConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE));

        assert_eq!(
            StitchConfig::discover(tempfile::tempdir().unwrap().path()).unwrap(),
            StitchConfig::default()
        );
    }
}
