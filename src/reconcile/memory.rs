//! # In-memory root store.
//!
//! [`MemoryRoots`] keeps roots in creation order behind a mutex. A transaction
//! runs against a staged copy that replaces the committed state only if the
//! body succeeds, so readers never observe half-applied plans.
//!
//! Test hooks ([`refuse_data_for`](MemoryRoots::refuse_data_for),
//! [`reject_root`](MemoryRoots::reject_root)) make the store behave like an
//! instance enforcing its own consistency rules.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::RootError;
use crate::reconcile::{RootDescriptor, RootStore, RootWriter, TransactionBody};

#[derive(Clone)]
struct Roots<D, A> {
    roots: Vec<RootDescriptor<D, A>>,
    attribute_keys: BTreeSet<String>,
    refuse_data: BTreeSet<String>,
    reject: BTreeSet<String>,
}

impl<D, A> Roots<D, A> {
    fn find(&self, name: &str) -> Result<usize, RootError> {
        self.roots
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| RootError::NotFound {
                root: name.to_string(),
            })
    }
}

/// Reference [`RootStore`] holding roots in memory.
pub struct MemoryRoots<D, A> {
    state: Mutex<Roots<D, A>>,
    transactions: AtomicU64,
}

impl<D, A> Default for MemoryRoots<D, A> {
    fn default() -> Self {
        Self {
            state: Mutex::new(Roots {
                roots: Vec::new(),
                attribute_keys: BTreeSet::new(),
                refuse_data: BTreeSet::new(),
                reject: BTreeSet::new(),
            }),
            transactions: AtomicU64::new(0),
        }
    }
}

impl<D, A> MemoryRoots<D, A> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `roots`; their attribute keys are registered.
    pub fn from_roots(roots: Vec<RootDescriptor<D, A>>) -> Self {
        let store = Self::default();
        {
            let mut state = store.lock();
            for root in &roots {
                state.attribute_keys.extend(root.attributes.keys().cloned());
            }
            state.roots = roots;
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Roots<D, A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every data push into root `name` fail with a consistency conflict.
    pub fn refuse_data_for(&self, name: &str) {
        self.lock().refuse_data.insert(name.to_string());
    }

    /// Makes every write touching root `name` fail with [`RootError::Rejected`].
    pub fn reject_root(&self, name: &str) {
        self.lock().reject.insert(name.to_string());
    }

    /// Registered attribute keys.
    pub fn attribute_keys(&self) -> BTreeSet<String> {
        self.lock().attribute_keys.clone()
    }

    /// Number of committed transactions.
    pub fn transactions(&self) -> u64 {
        self.transactions.load(Ordering::Relaxed)
    }
}

impl<D, A> RootStore for MemoryRoots<D, A>
where
    D: Clone + PartialEq + Send + Sync + 'static,
    A: Clone + PartialEq + Send + Sync + 'static,
{
    type Data = D;
    type Attr = A;

    fn root_names(&self) -> Vec<String> {
        self.lock().roots.iter().map(|r| r.name.clone()).collect()
    }

    fn root_data(&self, name: &str) -> Result<D, RootError> {
        let state = self.lock();
        let idx = state.find(name)?;
        Ok(state.roots[idx].data.clone())
    }

    fn root_attributes(&self, name: &str) -> Result<BTreeMap<String, A>, RootError> {
        let state = self.lock();
        let idx = state.find(name)?;
        Ok(state.roots[idx].attributes.clone())
    }

    fn transaction(&self, body: TransactionBody<'_, D, A>) -> Result<(), RootError> {
        let mut state = self.lock();
        let mut staged = state.clone();
        body(&mut staged)?;
        *state = staged;
        self.transactions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl<D, A> Roots<D, A> {
    fn check(&self, name: &str) -> Result<(), RootError> {
        if self.reject.contains(name) {
            return Err(RootError::Rejected {
                root: name.to_string(),
                reason: "rejected by store".into(),
            });
        }
        Ok(())
    }
}

impl<D, A> RootWriter<D, A> for Roots<D, A> {
    fn create_root(
        &mut self,
        name: &str,
        data: D,
        attributes: BTreeMap<String, A>,
    ) -> Result<(), RootError> {
        self.check(name)?;
        if self.find(name).is_ok() {
            return Err(RootError::AlreadyExists {
                root: name.to_string(),
            });
        }
        self.attribute_keys.extend(attributes.keys().cloned());
        self.roots.push(RootDescriptor {
            name: name.to_string(),
            data,
            attributes,
        });
        Ok(())
    }

    fn remove_root(&mut self, name: &str) -> Result<(), RootError> {
        self.check(name)?;
        let idx = self.find(name)?;
        self.roots.remove(idx);
        Ok(())
    }

    fn set_root_data(&mut self, name: &str, data: D) -> Result<(), RootError> {
        self.check(name)?;
        let idx = self.find(name)?;
        if self.refuse_data.contains(name) {
            return Err(RootError::Conflict {
                root: name.to_string(),
                reason: "local edits diverged".into(),
            });
        }
        self.roots[idx].data = data;
        Ok(())
    }

    fn register_attribute(&mut self, key: &str) -> Result<(), RootError> {
        self.attribute_keys.insert(key.to_string());
        Ok(())
    }

    fn clear_root_attributes(&mut self, name: &str) -> Result<(), RootError> {
        self.check(name)?;
        let idx = self.find(name)?;
        self.roots[idx].attributes.clear();
        Ok(())
    }

    fn set_root_attributes(
        &mut self,
        name: &str,
        attributes: BTreeMap<String, A>,
    ) -> Result<(), RootError> {
        self.check(name)?;
        let idx = self.find(name)?;
        if let Some(key) = attributes.keys().find(|k| !self.attribute_keys.contains(*k)) {
            return Err(RootError::Rejected {
                root: name.to_string(),
                reason: format!("attribute {key:?} not registered"),
            });
        }
        self.roots[idx].attributes = attributes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Store = MemoryRoots<u32, &'static str>;

    #[test]
    fn failed_transaction_leaves_state_untouched() {
        let store = Store::from_roots(vec![RootDescriptor::new("A", 1)]);
        let err = store
            .transaction(&mut |w: &mut dyn RootWriter<u32, &'static str>| -> Result<(), RootError> {
                w.set_root_data("A", 2)?;
                w.remove_root("missing")
            })
            .expect_err("missing root");

        assert_eq!(err.as_label(), "root_not_found");
        assert_eq!(store.root_data("A").expect("A"), 1);
        assert_eq!(store.transactions(), 0);
    }

    #[test]
    fn unregistered_attribute_keys_are_rejected() {
        let store = Store::from_roots(vec![RootDescriptor::new("A", 1)]);
        let attrs: BTreeMap<String, &'static str> = [("color".to_string(), "red")].into();

        let refused = store.transaction(
            &mut |w: &mut dyn RootWriter<u32, &'static str>| -> Result<(), RootError> {
                w.set_root_attributes("A", attrs.clone())
            },
        );
        assert!(matches!(refused, Err(RootError::Rejected { .. })));

        store
            .transaction(&mut |w: &mut dyn RootWriter<u32, &'static str>| -> Result<(), RootError> {
                w.register_attribute("color")?;
                w.set_root_attributes("A", attrs.clone())
            })
            .expect("registered");
        assert_eq!(store.root_attributes("A").expect("A"), attrs);
    }

    #[test]
    fn creating_an_existing_root_fails() {
        let store = Store::from_roots(vec![RootDescriptor::new("A", 1)]);
        let err = store
            .transaction(&mut |w: &mut dyn RootWriter<u32, &'static str>| -> Result<(), RootError> {
                w.create_root("A", 5, BTreeMap::new())
            })
            .expect_err("duplicate");
        assert_eq!(err, RootError::AlreadyExists { root: "A".into() });
    }
}
