//! Secure-key projections used by the encryption write-back commands.

use crate::error::Result;
use crate::filters::{FilterContext, SettingsFilter, SECURE_PREFIX};
use rsa::traits::PublicKeyParts;
use serde_yaml::{Mapping, Value};

// Structural ciphertext checks need a modulus size even when no public key
// is installed; RSA-2048 is the size this tool generates.
const DEFAULT_MODULUS_LEN: usize = 256;

/// Keeps only secure-prefixed entries, at any depth. Groups that end up
/// empty are dropped, so sibling non-secure keys never leak through.
pub struct SecureFilter;

/// Keeps only secure-prefixed entries whose values are still plaintext,
/// i.e. pending encryption.
pub struct InsecureFilter;

impl SettingsFilter for SecureFilter {
    fn transform(&self, data: &Mapping, _context: &FilterContext<'_>) -> Result<Mapping> {
        Ok(project(data, &|_| true))
    }
}

impl SettingsFilter for InsecureFilter {
    fn transform(&self, data: &Mapping, context: &FilterContext<'_>) -> Result<Mapping> {
        let modulus_len = context
            .encryption_keys
            .primary()
            .map(|key| key.size())
            .unwrap_or(DEFAULT_MODULUS_LEN);
        Ok(project(data, &move |value| match value {
            Value::String(wire) => !crate::keys::crypto::appears_encrypted(wire, modulus_len),
            _ => true,
        }))
    }
}

fn project(data: &Mapping, keep_value: &dyn Fn(&Value) -> bool) -> Mapping {
    let mut output = Mapping::new();
    for (key, value) in data {
        let is_secure = matches!(key.as_str(), Some(name) if name.starts_with(SECURE_PREFIX));
        if is_secure {
            if keep_value(value) {
                output.insert(key.clone(), value.clone());
            }
        } else if let Value::Mapping(nested) = value {
            let projected = project(nested, keep_value);
            if !projected.is_empty() {
                output.insert(key.clone(), Value::Mapping(projected));
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::test_support::{empty_context, yaml_mapping};

    #[test]
    fn keeps_only_secure_keys_at_any_depth() {
        let data = yaml_mapping(
            "_secure_a: x\nb: y\ngroup:\n  _secure_c: z\n  d: w",
        );
        let output = SecureFilter.transform(&data, &empty_context()).unwrap();
        assert_eq!(output, yaml_mapping("_secure_a: x\ngroup:\n  _secure_c: z"));
    }

    #[test]
    fn drops_groups_without_secure_entries() {
        let data = yaml_mapping("plain:\n  a: 1\n  b: 2");
        let output = SecureFilter.transform(&data, &empty_context()).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn insecure_filter_keeps_plaintext_secure_values_only() {
        // 344 chars of base64 decode to 256 bytes, the RSA-2048 modulus size.
        let encrypted_like = format!("{}==", "A".repeat(342));
        let data = yaml_mapping(&format!(
            "_secure_plain: password1\n_secure_done: \"{encrypted_like}\"\nother: x"
        ));

        let output = InsecureFilter.transform(&data, &empty_context()).unwrap();
        assert_eq!(output, yaml_mapping("_secure_plain: password1"));
    }
}
