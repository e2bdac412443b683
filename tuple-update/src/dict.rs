//! Field name resolution.
//!
//! The engine itself only knows field numbers; translating a name or a path
//! head into a top-level field number is the caller's schema knowledge,
//! supplied through [`FieldDictionary`].

use hashbrown::HashMap;

/// Maps top-level field names to field numbers.
pub trait FieldDictionary {
    /// Zero-based field number for `name`, if the schema defines it.
    fn field_no(&self, name: &str) -> Option<u32>;
}

/// Dictionary for schemaless tuples: resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNames;

impl FieldDictionary for NoNames {
    fn field_no(&self, _name: &str) -> Option<u32> {
        None
    }
}

/// Hash-backed name dictionary.
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    names: HashMap<String, u32>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as field number `field_no`.
    pub fn insert(&mut self, name: impl Into<String>, field_no: u32) {
        self.names.insert(name.into(), field_no);
    }
}

impl FieldDictionary for NameMap {
    fn field_no(&self, name: &str) -> Option<u32> {
        self.names.get(name).copied()
    }
}

impl<'s, T: FieldDictionary + ?Sized> FieldDictionary for &'s T {
    fn field_no(&self, name: &str) -> Option<u32> {
        (**self).field_no(name)
    }
}

impl<S: core::hash::BuildHasher> FieldDictionary for HashMap<String, u32, S> {
    fn field_no(&self, name: &str) -> Option<u32> {
        self.get(name).copied()
    }
}

impl FromIterator<(String, u32)> for NameMap {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        NameMap {
            names: iter.into_iter().collect(),
        }
    }
}
