//! Class hierarchy cache and per-subject class ordering.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::StoreResult;
use crate::graph::source::FactSource;
use crate::graph::vocab::rdfs;
use crate::graph::{Iri, Term};

/// Direct superclasses per class.
pub type Superclasses = HashMap<Iri, HashSet<Iri>>;

/// A subject's classes, most specific first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassOrder {
    pub classes: Vec<Iri>,
    /// Classes left unordered by a subclass cycle, by IRI.
    pub cycle: Vec<Iri>,
}

/// Lazily built `rdfs:subClassOf` map, reset on any subclass change.
pub struct ClassHierarchyCache {
    superclasses: RwLock<Option<Arc<Superclasses>>>,
}

impl ClassHierarchyCache {
    pub fn new() -> Self {
        Self {
            superclasses: RwLock::new(None),
        }
    }

    /// The class → direct-superclasses map, built on first use.
    pub fn superclasses(&self, source: &dyn FactSource) -> StoreResult<Arc<Superclasses>> {
        if let Some(map) = self.superclasses.read().expect("hierarchy lock poisoned").as_ref() {
            return Ok(Arc::clone(map));
        }

        let predicate = Iri::new(rdfs::SUB_CLASS_OF);
        let mut map = Superclasses::new();
        for st in source.statements(None, Some(&predicate), None)? {
            let st = st?;
            if let (Term::Iri(sub), Term::Iri(sup)) = (st.subject, st.object) {
                map.entry(sub).or_default().insert(sup);
            }
        }
        tracing::debug!(classes = map.len(), "built class hierarchy");

        let map = Arc::new(map);
        *self.superclasses.write().expect("hierarchy lock poisoned") = Some(Arc::clone(&map));
        Ok(map)
    }

    pub fn reset(&self) {
        *self.superclasses.write().expect("hierarchy lock poisoned") = None;
    }

    pub fn is_cached(&self) -> bool {
        self.superclasses.read().expect("hierarchy lock poisoned").is_some()
    }

    /// Order `classes` most specific first.
    ///
    /// Classes with no superclass among the remaining ones are peeled off
    /// repeatedly, giving a least-specific-first list that is then reversed.
    /// A class is never its own blocker. If peeling stalls, the remainder is
    /// a cycle (or sits below one) and is placed first, by IRI.
    pub fn order_classes(
        &self,
        classes: &[Iri],
        source: &dyn FactSource,
    ) -> StoreResult<ClassOrder> {
        let supers = self.superclasses(source)?;

        let mut remaining: Vec<Iri> = Vec::with_capacity(classes.len());
        for class in classes {
            if !remaining.contains(class) {
                remaining.push(class.clone());
            }
        }

        let mut reverse = Vec::with_capacity(remaining.len());
        let mut cycle = Vec::new();
        while !remaining.is_empty() {
            let blocked: Vec<bool> = remaining
                .iter()
                .map(|class| {
                    supers.get(class).is_some_and(|s| {
                        s.iter()
                            .any(|sup| sup != class && remaining.contains(sup))
                    })
                })
                .collect();
            if blocked.iter().all(|b| *b) {
                let sorted: BTreeSet<Iri> = remaining.drain(..).collect();
                cycle = sorted.iter().cloned().collect();
                reverse.extend(sorted.into_iter().rev());
                break;
            }
            let mut next = Vec::new();
            for (class, blocked) in remaining.drain(..).zip(blocked) {
                if blocked {
                    next.push(class);
                } else {
                    reverse.push(class);
                }
            }
            remaining = next;
        }

        reverse.reverse();
        Ok(ClassOrder {
            classes: reverse,
            cycle,
        })
    }
}

impl Default for ClassHierarchyCache {
    fn default() -> Self {
        Self::new()
    }
}
