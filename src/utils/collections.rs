//! Small helpers for the collection types used across channels and partials.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Construct an empty extra-data map using the crate's default hasher.
#[must_use]
pub fn new_extra_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}
