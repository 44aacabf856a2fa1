use std::collections::BTreeMap;

/// One keyed root: name, data payload and attributes.
///
/// Two descriptors with the same name are compared structurally: data and
/// attributes separately, so a plan can tell which of the two changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDescriptor<D, A> {
    /// Unique root name.
    pub name: String,
    /// Root payload.
    pub data: D,
    /// Root attributes, ordered by key.
    pub attributes: BTreeMap<String, A>,
}

impl<D, A> RootDescriptor<D, A> {
    /// Creates a root without attributes.
    pub fn new(name: impl Into<String>, data: D) -> Self {
        Self {
            name: name.into(),
            data,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) one attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: A) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
