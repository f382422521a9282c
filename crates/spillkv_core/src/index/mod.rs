//! Secondary indexes.
//!
//! An index maps an attribute computed from each value to the set of keys
//! whose current value has that attribute. The layer works on keys and
//! deserialized values only, so any cache implementation can drive it.

mod attr;
mod registry;

pub use attr::AttrValue;
pub use registry::{AttributeFn, IndexDefinition, IndexRegistry};
