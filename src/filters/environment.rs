//! Environment-variable override (second post-filter).

use crate::error::Result;
use crate::filters::{FilterContext, SettingsFilter};
use serde_yaml::{Mapping, Value};

/// Overrides leaves with same-named process environment variables.
///
/// The variable name for a leaf is its key path joined with `_` and
/// uppercased, the same convention `to_environment` uses for export. The
/// environment is read, never written.
pub struct EnvironmentFilter;

impl SettingsFilter for EnvironmentFilter {
    fn transform(&self, data: &Mapping, _context: &FilterContext<'_>) -> Result<Mapping> {
        Ok(override_mapping(data, &[]))
    }
}

fn override_mapping(data: &Mapping, path: &[String]) -> Mapping {
    let mut output = Mapping::new();
    for (key, value) in data {
        let key_name = key.as_str().unwrap_or_default().to_string();
        let new_value = match value {
            Value::Mapping(nested) => {
                let mut child_path = path.to_vec();
                child_path.push(key_name);
                Value::Mapping(override_mapping(nested, &child_path))
            }
            other => match std::env::var(variable_name(path, key.as_str().unwrap_or_default())) {
                Ok(from_env) => Value::String(from_env),
                Err(_) => other.clone(),
            },
        };
        output.insert(key.clone(), new_value);
    }
    output
}

fn variable_name(path: &[String], key: &str) -> String {
    let mut parts: Vec<&str> = path.iter().map(String::as_str).collect();
    parts.push(key);
    parts.join("_").to_uppercase()
}
