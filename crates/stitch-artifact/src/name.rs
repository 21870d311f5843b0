//! Class and type names
//!
//! Provides [`ClassName`] for addressing classes inside a corpus and
//! [`TypeName`] for the static types of fields, parameters and returns.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Nested marker type that addresses a class's companion member set.
pub const COMPANION_SUFFIX: &str = "$Companion";

/// Fully qualified class name
///
/// Packages are separated by `.`, nested classes by `$`.
///
/// # Examples
/// - `com.example.Foo`
/// - `com.example.Foo$Companion`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassName(String);

impl ClassName {
    /// Parse and validate a class name
    ///
    /// # Errors
    /// Returns error on empty names, empty segments or invalid characters
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        for segment in name.split(['.', '$']) {
            if segment.is_empty() {
                return Err(NameError::EmptySegment(name));
            }
            if segment.contains(|c: char| !c.is_alphanumeric() && c != '_') {
                return Err(NameError::InvalidSegment {
                    name: name.clone(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self(name))
    }

    /// Name as written
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Simple name: everything after the last package separator
    ///
    /// Nested classes keep their `$` chain (`Foo$Companion`).
    #[inline]
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Whether the name carries the companion marker suffix
    #[inline]
    #[must_use]
    pub fn is_companion(&self) -> bool {
        self.0.ends_with(COMPANION_SUFFIX) && self.0.len() > COMPANION_SUFFIX.len()
    }

    /// Enclosing class of a companion marker (`Foo$Companion` -> `Foo`)
    #[must_use]
    pub fn companion_owner(&self) -> Option<ClassName> {
        if !self.is_companion() {
            return None;
        }
        let owner = &self.0[..self.0.len() - COMPANION_SUFFIX.len()];
        ClassName::new(owner).ok()
    }

    /// Nested class name under this one
    #[must_use]
    pub fn nested(&self, inner: &str) -> ClassName {
        ClassName(format!("{}${}", self.0, inner))
    }

    /// Relative artifact path for this class (`a/b/Foo.class.json`)
    #[must_use]
    pub fn artifact_path(&self) -> std::path::PathBuf {
        let mut path: std::path::PathBuf = self.0.split('.').collect();
        path.set_extension(crate::ARTIFACT_EXTENSION);
        path
    }
}

impl Display for ClassName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClassName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ClassName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClassName> for String {
    fn from(value: ClassName) -> Self {
        value.0
    }
}

impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Static type of a field, parameter or return value
///
/// Reference types keep the name exactly as the compiler recorded it; a
/// reference type with no package qualifier is only as precise as the
/// surrounding corpus lets it be.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeName {
    Void,
    Bool,
    Int,
    Long,
    Str,
    Object(String),
}

impl TypeName {
    /// Whether the type is fully determined by its own spelling
    ///
    /// Primitives, `String` and package-qualified references are; a bare
    /// simple name is not.
    #[inline]
    #[must_use]
    pub fn is_determined(&self) -> bool {
        match self {
            TypeName::Object(name) => name.contains('.'),
            _ => true,
        }
    }

    /// Reference types only
    #[inline]
    #[must_use]
    pub fn object_name(&self) -> Option<&str> {
        match self {
            TypeName::Object(name) => Some(name),
            _ => None,
        }
    }

    /// `void` returns
    #[inline]
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeName::Void)
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Void => f.write_str("void"),
            TypeName::Bool => f.write_str("boolean"),
            TypeName::Int => f.write_str("int"),
            TypeName::Long => f.write_str("long"),
            TypeName::Str => f.write_str("String"),
            TypeName::Object(name) => f.write_str(name),
        }
    }
}

impl FromStr for TypeName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "" => return Err(NameError::Empty),
            "void" => TypeName::Void,
            "boolean" => TypeName::Bool,
            "int" => TypeName::Int,
            "long" => TypeName::Long,
            "String" | "java.lang.String" | "kotlin.String" => TypeName::Str,
            other => TypeName::Object(ClassName::new(other)?.0),
        })
    }
}

impl TryFrom<String> for TypeName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeName> for String {
    fn from(value: TypeName) -> Self {
        value.to_string()
    }
}

/// Errors for malformed class or type names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Name is empty
    #[error("empty name")]
    Empty,

    /// Name has an empty segment (`a..b`, trailing `$`)
    #[error("empty segment in name '{0}'")]
    EmptySegment(String),

    /// Segment contains characters outside `[A-Za-z0-9_]`
    #[error("invalid segment '{segment}' in name '{name}'")]
    InvalidSegment { name: String, segment: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_parts() {
        let name = ClassName::new("com.example.api.TestCompanionKotlin$Companion").unwrap();
        assert_eq!(name.simple_name(), "TestCompanionKotlin$Companion");
        assert!(name.is_companion());
        assert_eq!(
            name.companion_owner().unwrap().as_str(),
            "com.example.api.TestCompanionKotlin"
        );
    }

    #[test]
    fn class_name_without_package() {
        let name = ClassName::new("Foo").unwrap();
        assert_eq!(name.simple_name(), "Foo");
        assert!(!name.is_companion());
    }

    #[test]
    fn bare_companion_suffix_is_not_a_companion() {
        assert!(ClassName::new("$Companion").is_err());
    }

    #[test]
    fn class_name_rejects_bad_segments() {
        assert_eq!(ClassName::new(""), Err(NameError::Empty));
        assert!(matches!(
            ClassName::new("a..b"),
            Err(NameError::EmptySegment(_))
        ));
        assert!(matches!(
            ClassName::new("a.b-c"),
            Err(NameError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn artifact_path_follows_packages() {
        let name = ClassName::new("com.example.Foo$Companion").unwrap();
        assert_eq!(
            name.artifact_path(),
            std::path::PathBuf::from("com/example/Foo$Companion.class.json")
        );
    }

    #[test]
    fn type_name_parsing() {
        assert_eq!("int".parse::<TypeName>().unwrap(), TypeName::Int);
        assert_eq!("java.lang.String".parse::<TypeName>().unwrap(), TypeName::Str);
        assert_eq!(
            "Date".parse::<TypeName>().unwrap(),
            TypeName::Object("Date".into())
        );
        assert!(!TypeName::Object("Date".into()).is_determined());
        assert!(TypeName::Object("java.util.Date".into()).is_determined());
        assert!(TypeName::Long.is_determined());
    }

    #[test]
    fn type_name_serde_is_plain_string() {
        let json = serde_json::to_string(&TypeName::Bool).unwrap();
        assert_eq!(json, "\"boolean\"");
        let back: TypeName = serde_json::from_str("\"java.util.Date\"").unwrap();
        assert_eq!(back, TypeName::Object("java.util.Date".into()));
    }
}
