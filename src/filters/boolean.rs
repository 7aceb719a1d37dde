//! Boolean coercion of string leaves (last post-filter).

use crate::error::Result;
use crate::filters::{FilterContext, SettingsFilter};
use serde_yaml::{Mapping, Value};

const TRUTHY: [&str; 3] = ["true", "t", "yes"];
const FALSEY: [&str; 3] = ["false", "f", "no"];

/// Converts the strings `true`/`t`/`yes` and `false`/`f`/`no`
/// (case-sensitive) to booleans. Everything else passes through unchanged.
///
/// A null value stops coercion of the remaining entries of its mapping;
/// those entries are kept verbatim. Long-standing behavior, pinned by test.
pub struct BooleanConversionFilter;

impl SettingsFilter for BooleanConversionFilter {
    fn transform(&self, data: &Mapping, _context: &FilterContext<'_>) -> Result<Mapping> {
        Ok(convert_mapping(data))
    }
}

fn convert_mapping(data: &Mapping) -> Mapping {
    let mut output = Mapping::new();
    let mut converting = true;
    for (key, value) in data {
        if converting && value.is_null() {
            converting = false;
        }
        let new_value = if converting {
            convert_value(value)
        } else {
            value.clone()
        };
        output.insert(key.clone(), new_value);
    }
    output
}

fn convert_value(value: &Value) -> Value {
    match value {
        Value::Mapping(nested) => Value::Mapping(convert_mapping(nested)),
        Value::String(s) if TRUTHY.contains(&s.as_str()) => Value::Bool(true),
        Value::String(s) if FALSEY.contains(&s.as_str()) => Value::Bool(false),
        other => other.clone(),
    }
}
