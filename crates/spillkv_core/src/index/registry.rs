//! Named secondary indexes over cached values.

use crate::error::{CoreError, CoreResult};
use crate::index::attr::AttrValue;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Function mapping a value to the attribute it is indexed under.
pub type AttributeFn<V> = Arc<dyn Fn(&V) -> AttrValue + Send + Sync>;

/// A named index: a name plus a pure attribute function.
///
/// # Example
///
/// ```rust
/// use spillkv_core::{AttrValue, IndexDefinition};
///
/// struct User { region: String }
///
/// let by_region = IndexDefinition::new("region", |u: &User| u.region.as_str().into());
/// assert_eq!(by_region.name(), "region");
/// assert_eq!(
///     by_region.attribute(&User { region: "eu".into() }),
///     AttrValue::Text("eu".into())
/// );
/// ```
pub struct IndexDefinition<V> {
    name: String,
    attribute: AttributeFn<V>,
}

impl<V> IndexDefinition<V> {
    /// Creates an index definition.
    ///
    /// `attribute` must be deterministic. Postings are not recomputed if it
    /// changes behavior after values were inserted.
    pub fn new<F>(name: impl Into<String>, attribute: F) -> Self
    where
        F: Fn(&V) -> AttrValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            attribute: Arc::new(attribute),
        }
    }

    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Computes the attribute of `value`.
    pub fn attribute(&self, value: &V) -> AttrValue {
        (self.attribute)(value)
    }
}

impl<V> Clone for IndexDefinition<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            attribute: Arc::clone(&self.attribute),
        }
    }
}

impl<V> fmt::Debug for IndexDefinition<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Postings of one index.
///
/// `attributes` records the attribute each key is currently filed under, so
/// an overwrite can move the key out of its old posting set.
struct Postings<K> {
    sets: HashMap<AttrValue, HashSet<K>>,
    attributes: HashMap<K, AttrValue>,
}

impl<K: Eq + Hash + Clone> Postings<K> {
    fn new() -> Self {
        Self {
            sets: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    fn insert(&mut self, key: K, attr: AttrValue) {
        if let Some(old) = self.attributes.get(&key) {
            if *old == attr {
                return;
            }
            let old = old.clone();
            self.discard(&key, &old);
        }
        self.sets.entry(attr.clone()).or_default().insert(key.clone());
        self.attributes.insert(key, attr);
    }

    /// Removes `key` from whatever set it is filed under.
    fn retract(&mut self, key: &K) -> bool {
        match self.attributes.remove(key) {
            Some(attr) => {
                self.discard(key, &attr);
                true
            }
            None => false,
        }
    }

    fn discard(&mut self, key: &K, attr: &AttrValue) {
        if let Some(set) = self.sets.get_mut(attr) {
            set.remove(key);
            if set.is_empty() {
                self.sets.remove(attr);
            }
        }
    }
}

struct Index<K, V> {
    definition: IndexDefinition<V>,
    postings: RwLock<Postings<K>>,
}

/// The set of indexes attached to one cache.
///
/// Indexes are registered up front and cannot be removed. Each index guards
/// its postings with its own lock, so queries may run alongside updates.
pub struct IndexRegistry<K, V> {
    indexes: Vec<Index<K, V>>,
}

impl<K, V> Default for IndexRegistry<K, V> {
    fn default() -> Self {
        Self {
            indexes: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> IndexRegistry<K, V> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an index.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIndex` if an index with the same name exists.
    pub fn register(&mut self, definition: IndexDefinition<V>) -> CoreResult<()> {
        if self.find(definition.name()).is_some() {
            return Err(CoreError::DuplicateIndex {
                name: definition.name().to_string(),
            });
        }
        self.indexes.push(Index {
            definition,
            postings: RwLock::new(Postings::new()),
        });
        Ok(())
    }

    /// Files `key` under the attributes of `value` in every index.
    ///
    /// A `None` value has no attributes; the key is only retracted.
    pub fn on_put(&self, key: &K, value: Option<&V>) {
        for index in &self.indexes {
            let mut postings = index.postings.write();
            match value {
                Some(v) => postings.insert(key.clone(), index.definition.attribute(v)),
                None => {
                    postings.retract(key);
                }
            }
        }
    }

    /// Removes `key` from every index.
    ///
    /// `value` is the value being removed. It is only consulted if an index
    /// has no record of the key.
    pub fn on_remove(&self, key: &K, value: Option<&V>) {
        for index in &self.indexes {
            let mut postings = index.postings.write();
            if !postings.retract(key) {
                if let Some(v) = value {
                    postings.discard(key, &index.definition.attribute(v));
                }
            }
        }
    }

    /// Returns the keys filed under `attr` in the index named `name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndex` if no index has that name.
    pub fn query(&self, name: &str, attr: &AttrValue) -> CoreResult<Vec<K>> {
        let index = self
            .find(name)
            .ok_or_else(|| CoreError::unknown_index(name))?;
        let postings = index.postings.read();
        Ok(postings
            .sets
            .get(attr)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Names of the registered indexes, in registration order.
    #[must_use]
    pub fn index_names(&self) -> Vec<&str> {
        self.indexes.iter().map(|i| i.definition.name()).collect()
    }

    /// Number of registered indexes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns true if no index is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Index<K, V>> {
        self.indexes.iter().find(|i| i.definition.name() == name)
    }
}

impl<K, V> fmt::Debug for IndexRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.indexes.iter().map(|i| i.definition.name()))
            .finish()
    }
}
