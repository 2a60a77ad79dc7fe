//! Function registries: URI → shared definition.
//!
//! Backed by a `DashMap`, so one registry can be shared read-mostly across
//! sessions. Entries are keyed by URI; eviction of a transient definition is a
//! plain key lookup.

use std::sync::Arc;

use dashmap::DashMap;

use crate::graph::vocab;

use super::{Definition, FunctionDef, TupleFunctionDef};

/// Registry of definitions of one kind.
pub struct Registry<D> {
    entries: DashMap<String, Arc<D>>,
}

/// Scalar function registry.
pub type FunctionRegistry = Registry<FunctionDef>;

/// Magic-property registry.
pub type TupleFunctionRegistry = Registry<TupleFunctionDef>;

impl<D: Definition> Registry<D> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn has(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn get(&self, uri: &str) -> Option<Arc<D>> {
        self.entries.get(uri).map(|r| Arc::clone(r.value()))
    }

    /// Register a definition, replacing any previous one with the same URI.
    pub fn add(&self, definition: D) -> Arc<D> {
        let definition = Arc::new(definition);
        tracing::debug!(
            uri = definition.uri(),
            origin = ?definition.origin(),
            "registered definition"
        );
        self.entries
            .insert(definition.uri().to_string(), Arc::clone(&definition));
        definition
    }

    /// Remove a definition. Returns `true` if it was registered.
    pub fn remove(&self, definition: &D) -> bool {
        self.entries.remove(definition.uri()).is_some()
    }

    /// Evict the entry for `uri` if it is transient.
    pub fn remove_transient(&self, uri: &str) -> Option<Arc<D>> {
        self.entries
            .remove_if(uri, |_, def| def.is_transient())
            .map(|(_, def)| def)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered URIs, sorted.
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        uris.sort();
        uris
    }
}

impl<D: Definition> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// A registry pre-populated with native XPath string functions.
    pub fn with_standard_functions() -> Self {
        let registry = Self::new();
        for uri in vocab::fn_::STANDARD {
            registry.add(FunctionDef::native(*uri));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Origin;

    fn transient(uri: &str) -> FunctionDef {
        FunctionDef {
            origin: Origin::Transient,
            ..FunctionDef::native(uri)
        }
    }

    #[test]
    fn add_get_remove() {
        let reg = FunctionRegistry::new();
        assert!(!reg.has("http://ex/f"));
        let def = reg.add(transient("http://ex/f"));
        assert!(reg.has("http://ex/f"));
        assert_eq!(reg.get("http://ex/f").unwrap(), def);
        assert!(reg.remove(&def));
        assert!(!reg.remove(&def));
        assert!(reg.is_empty());
    }

    #[test]
    fn only_transient_entries_are_evicted() {
        let reg = TupleFunctionRegistry::new();
        reg.add(TupleFunctionDef::native("http://ex/native"));
        reg.add(TupleFunctionDef {
            origin: Origin::Transient,
            ..TupleFunctionDef::native("http://ex/stored")
        });
        assert!(reg.remove_transient("http://ex/native").is_none());
        assert!(reg.remove_transient("http://ex/stored").is_some());
        assert_eq!(reg.uris(), vec!["http://ex/native".to_string()]);
    }

    #[test]
    fn standard_functions_are_native() {
        let reg = FunctionRegistry::with_standard_functions();
        assert_eq!(reg.len(), vocab::fn_::STANDARD.len());
        let concat = reg.get("http://www.w3.org/2005/xpath-functions#concat").unwrap();
        assert!(!concat.is_transient());
    }
}
