//! Namespace collapsing (the only pre-filter).

use crate::error::Result;
use crate::filters::{FilterContext, SettingsFilter};
use crate::merge::deep_merge_mappings;
use serde_yaml::{Mapping, Value};

/// Collapses namespaced top-level keys.
///
/// When any top-level key names a configured namespace, the output is the
/// merge of the sub-trees under each matching key, in namespace order, later
/// namespaces overriding earlier ones; all non-matching top-level keys are
/// discarded. When no key matches, the data is not namespaced and passes
/// through unchanged.
pub struct NamespaceFilter;

impl SettingsFilter for NamespaceFilter {
    fn transform(&self, data: &Mapping, context: &FilterContext<'_>) -> Result<Mapping> {
        let is_namespaced = data
            .iter()
            .any(|(key, _)| matches!(key.as_str(), Some(name) if context.namespaces.contains(name)));
        if !is_namespaced {
            return Ok(data.clone());
        }

        let mut collapsed = Mapping::new();
        for namespace in context.namespaces {
            match data.get(namespace) {
                Some(Value::Mapping(subtree)) => {
                    collapsed = deep_merge_mappings(collapsed, subtree.clone());
                }
                _ => continue,
            }
        }
        Ok(collapsed)
    }
}
