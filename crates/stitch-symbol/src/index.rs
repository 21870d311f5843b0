//! Class index with radix tree
//!
//! Provides [`ClassIndex`], the corpus-wide lookup structure used by target
//! resolution and verification. Classes are keyed by fully qualified name in
//! a radix trie so package-prefix queries walk a single subtree.

use crate::member::{FieldEntry, MemberTable, MethodEntry};
use radix_trie::{Trie, TrieCommon};
use std::collections::HashMap;
use stitch_artifact::{ClassFile, ClassKind, ClassName, MethodSignature};

/// Indexed class summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub name: ClassName,
    pub kind: ClassKind,
    pub super_class: Option<ClassName>,
    pub interfaces: Vec<ClassName>,
    pub companion: Option<ClassName>,
    pub members: MemberTable,
}

impl ClassEntry {
    #[must_use]
    pub fn from_class(class: &ClassFile) -> Self {
        Self {
            name: class.name.clone(),
            kind: class.kind,
            super_class: class.super_class.clone(),
            interfaces: class.interfaces.clone(),
            companion: class.companion.clone(),
            members: MemberTable::from_class(class),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }
}

/// Method found by [`ClassIndex::find_method`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHit<'a> {
    /// Class that declares the method
    pub owner: &'a ClassName,
    pub signature: &'a MethodSignature,
    pub entry: &'a MethodEntry,
}

/// Errors from index construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Two artifacts declare the same class
    #[error("class {0} is declared more than once")]
    DuplicateClass(ClassName),
}

/// Corpus-wide class index
///
/// Lookups by exact name go through the trie; simple names and interface
/// implementors are kept in side tables built at insertion time.
#[derive(Debug)]
pub struct ClassIndex {
    trie: Trie<String, ClassEntry>,
    by_simple_name: HashMap<String, Vec<ClassName>>,
    implementors: HashMap<ClassName, Vec<ClassName>>,
}

impl Default for ClassIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Upper bound on super-chain walks; cyclic hierarchies stop here
const MAX_HIERARCHY_DEPTH: usize = 64;

impl ClassIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: Trie::new(),
            by_simple_name: HashMap::new(),
            implementors: HashMap::new(),
        }
    }

    /// Build an index over a set of classes
    ///
    /// # Errors
    /// Returns error if two classes share a name
    pub fn build<'a>(classes: impl IntoIterator<Item = &'a ClassFile>) -> Result<Self, IndexError> {
        let mut index = Self::new();
        for class in classes {
            index.insert(class)?;
        }
        Ok(index)
    }

    /// Insert one class
    ///
    /// # Errors
    /// Returns error if the class is already indexed
    pub fn insert(&mut self, class: &ClassFile) -> Result<(), IndexError> {
        let key = class.name.to_string();
        if self.trie.get(&key).is_some() {
            return Err(IndexError::DuplicateClass(class.name.clone()));
        }

        self.by_simple_name
            .entry(class.name.simple_name().to_string())
            .or_default()
            .push(class.name.clone());
        if !class.is_interface() {
            for iface in &class.interfaces {
                self.implementors
                    .entry(iface.clone())
                    .or_default()
                    .push(class.name.clone());
            }
        }
        self.trie.insert(key, ClassEntry::from_class(class));
        Ok(())
    }

    /// Replace the entry of an already indexed class
    ///
    /// Hierarchy side tables are left as they were; mutations never change
    /// a class's name, kind or interfaces.
    pub fn refresh(&mut self, class: &ClassFile) {
        self.trie
            .insert(class.name.to_string(), ClassEntry::from_class(class));
    }

    #[must_use]
    pub fn get(&self, name: &ClassName) -> Option<&ClassEntry> {
        self.trie.get(name.as_str())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &ClassName) -> bool {
        self.get(name).is_some()
    }

    /// Classes whose simple name matches (`Date` -> `java.util.Date`, ...)
    #[must_use]
    pub fn by_simple_name(&self, simple: &str) -> &[ClassName] {
        self.by_simple_name
            .get(simple)
            .map_or(&[], Vec::as_slice)
    }

    /// Non-interface classes that directly implement `iface`, in insertion order
    #[must_use]
    pub fn implementors(&self, iface: &ClassName) -> &[ClassName] {
        self.implementors.get(iface).map_or(&[], Vec::as_slice)
    }

    /// `name` followed by its super classes, stopping at the first class
    /// outside the index
    pub fn hierarchy<'a>(&'a self, name: &ClassName) -> impl Iterator<Item = &'a ClassEntry> + 'a {
        let mut next = self.get(name);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.super_class.as_ref().and_then(|s| self.get(s));
            Some(current)
        })
        .take(MAX_HIERARCHY_DEPTH)
    }

    /// Field visible on `class`, searching the super chain
    #[must_use]
    pub fn find_field(&self, class: &ClassName, field: &str) -> Option<(&ClassName, &FieldEntry)> {
        self.hierarchy(class)
            .find_map(|entry| entry.members.field(field).map(|f| (&entry.name, f)))
    }

    /// Method visible on `class` by name and arity, searching the super chain
    ///
    /// The nearest declaring class wins; within one class the first
    /// declared overload of that arity wins.
    #[must_use]
    pub fn find_method(&self, class: &ClassName, method: &str, arity: usize) -> Option<MethodHit<'_>> {
        self.hierarchy(class).find_map(|entry| {
            entry
                .members
                .method_with_arity(method, arity)
                .map(|(signature, method_entry)| MethodHit {
                    owner: &entry.name,
                    signature,
                    entry: method_entry,
                })
        })
    }

    /// Every indexed class in key order
    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.trie.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_artifact::TypeName;
    use stitch_test_utils::{class, field, interface, method, name, static_method};

    fn sample() -> ClassIndex {
        let classes = vec![
            interface("a.Greeter").build(),
            class("a.Base")
                .field(field("id", TypeName::Long))
                .method(method("hello", vec![], TypeName::Void, vec![]))
                .build(),
            class("a.Impl")
                .extends("a.Base")
                .implements("a.Greeter")
                .method(static_method("make", vec![TypeName::Int], TypeName::Void, vec![]))
                .build(),
            class("a.Impl$Inner").build(),
            class("b.Date").build(),
            class("c.Date").build(),
        ];
        ClassIndex::build(&classes).unwrap()
    }

    #[test]
    fn rejects_duplicate_classes() {
        let classes = vec![class("a.Foo").build(), class("a.Foo").build()];
        assert_eq!(
            ClassIndex::build(&classes).unwrap_err(),
            IndexError::DuplicateClass(name("a.Foo"))
        );
    }

    #[test]
    fn simple_names_collect_every_package() {
        let index = sample();
        assert_eq!(index.by_simple_name("Date").len(), 2);
        assert_eq!(index.by_simple_name("Base"), &[name("a.Base")]);
        assert!(index.by_simple_name("Missing").is_empty());
    }

    #[test]
    fn implementors_skip_unrelated_classes() {
        let index = sample();
        assert_eq!(index.implementors(&name("a.Greeter")), &[name("a.Impl")]);
        assert!(index.implementors(&name("a.Base")).is_empty());
    }

    #[test]
    fn lookups_walk_super_chain() {
        let index = sample();
        let (owner, id) = index.find_field(&name("a.Impl"), "id").unwrap();
        assert_eq!(owner, &name("a.Base"));
        assert_eq!(id.ty, TypeName::Long);

        let hit = index.find_method(&name("a.Impl"), "hello", 0).unwrap();
        assert_eq!(hit.owner, &name("a.Base"));
        assert!(index.find_method(&name("a.Impl"), "hello", 1).is_none());
        assert!(index.find_method(&name("a.Impl"), "make", 1).unwrap().entry.is_static);
    }

    #[test]
    fn cyclic_hierarchy_terminates() {
        let classes = vec![
            class("a.X").extends("a.Y").build(),
            class("a.Y").extends("a.X").build(),
        ];
        let index = ClassIndex::build(&classes).unwrap();
        assert!(index.find_field(&name("a.X"), "nope").is_none());
        assert_eq!(index.hierarchy(&name("a.X")).count(), MAX_HIERARCHY_DEPTH);
    }
}
