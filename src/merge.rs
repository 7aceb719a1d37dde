//! Recursive structural merge over YAML settings trees.
//!
//! Overlapping keys whose values are both mappings merge recursively; any
//! other overlap is won by the overlay. Sequences are replaced, not
//! concatenated.

use serde_yaml::{Mapping, Value};

/// Merge `overlay` onto `base`, overlay winning on conflicts.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            Value::Mapping(deep_merge_mappings(base_map, overlay_map))
        }
        (_, overlay) => overlay,
    }
}

/// Mapping-typed entry point, used where the tree root is known to be a mapping.
pub fn deep_merge_mappings(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, overlay_value) in overlay {
        let merged = match base.remove(&key) {
            Some(base_value) => deep_merge(base_value, overlay_value),
            None => overlay_value,
        };
        base.insert(key, merged);
    }
    base
}
