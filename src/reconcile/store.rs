//! # Root store contract.
//!
//! A [`RootStore`] is the reconciler's view of a managed instance holding
//! several keyed roots. Reads happen outside transactions; every write goes
//! through a [`RootWriter`] inside [`RootStore::transaction`], which the store
//! applies atomically (all or nothing).

use std::collections::BTreeMap;

use crate::error::RootError;
use crate::reconcile::RootDescriptor;

/// Body of a transaction; may be invoked again if the store retries.
pub type TransactionBody<'a, D, A> =
    &'a mut dyn FnMut(&mut dyn RootWriter<D, A>) -> Result<(), RootError>;

/// # Multi-root state of a managed instance.
pub trait RootStore: Send + Sync {
    /// Root payload type.
    type Data: Clone + PartialEq + Send + Sync + 'static;
    /// Attribute value type.
    type Attr: Clone + PartialEq + Send + Sync + 'static;

    /// Names of the existing roots, in store order.
    fn root_names(&self) -> Vec<String>;

    /// Current payload of root `name`.
    fn root_data(&self, name: &str) -> Result<Self::Data, RootError>;

    /// Current attributes of root `name`.
    fn root_attributes(&self, name: &str) -> Result<BTreeMap<String, Self::Attr>, RootError>;

    /// Runs `body` as one atomic step.
    ///
    /// If `body` returns an error, none of its writes may become visible and
    /// the error is returned.
    fn transaction(
        &self,
        body: TransactionBody<'_, Self::Data, Self::Attr>,
    ) -> Result<(), RootError>;

    /// Reads every root into descriptors, in store order.
    fn snapshot(&self) -> Result<Vec<RootDescriptor<Self::Data, Self::Attr>>, RootError> {
        self.root_names()
            .into_iter()
            .map(|name| {
                let data = self.root_data(&name)?;
                let attributes = self.root_attributes(&name)?;
                Ok(RootDescriptor {
                    name,
                    data,
                    attributes,
                })
            })
            .collect()
    }
}

/// # Write access to a store inside a transaction.
pub trait RootWriter<D, A> {
    /// Creates root `name`. Fails with [`RootError::AlreadyExists`] if present.
    fn create_root(
        &mut self,
        name: &str,
        data: D,
        attributes: BTreeMap<String, A>,
    ) -> Result<(), RootError>;

    /// Detaches root `name`.
    fn remove_root(&mut self, name: &str) -> Result<(), RootError>;

    /// Pushes new data into root `name`.
    ///
    /// May fail with [`RootError::Conflict`] when the store's consistency model
    /// refuses the overwrite.
    fn set_root_data(&mut self, name: &str, data: D) -> Result<(), RootError>;

    /// Makes attribute key `key` known to the store. Idempotent.
    fn register_attribute(&mut self, key: &str) -> Result<(), RootError>;

    /// Removes every attribute of root `name`.
    fn clear_root_attributes(&mut self, name: &str) -> Result<(), RootError>;

    /// Sets the attributes of root `name`; every key must be registered.
    fn set_root_attributes(
        &mut self,
        name: &str,
        attributes: BTreeMap<String, A>,
    ) -> Result<(), RootError>;
}
