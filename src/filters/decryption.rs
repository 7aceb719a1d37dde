//! Secure-value decryption (first post-filter).

use crate::error::{ChamberError, Result};
use crate::filters::{joined_path, FilterContext, SettingsFilter, SECURE_PREFIX};
use rsa::traits::PublicKeyParts;
use serde_yaml::{Mapping, Value};
use tracing::warn;

/// Decrypts secure-prefixed values and strips the prefix from their keys.
///
/// With no decryption key installed, values pass through still encrypted so
/// settings remain readable without private key material. A secure value
/// that does not look like cipher output is passed through with a warning
/// (the author forgot to encrypt it). In strict mode, a value that looks
/// encrypted but cannot be decrypted is a [`ChamberError::DecryptionFailure`];
/// the permissive default warns and passes it through instead.
pub struct DecryptionFilter {
    strict: bool,
}

impl DecryptionFilter {
    pub fn permissive() -> Self {
        Self { strict: false }
    }

    /// Fail-on-undecryptable variant, for verification-style commands.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    fn transform_mapping(
        &self,
        data: &Mapping,
        context: &FilterContext<'_>,
        path: &[String],
    ) -> Result<Mapping> {
        let mut output = Mapping::new();
        for (key, value) in data {
            let key_name = key.as_str();
            match key_name.and_then(|name| name.strip_prefix(SECURE_PREFIX)) {
                Some(stripped) => {
                    let decrypted =
                        self.decrypt_value(value, context, &joined_path(path, stripped))?;
                    output.insert(Value::String(stripped.to_string()), decrypted);
                }
                None => {
                    let transformed =
                        self.transform_value(value, context, path, key_name.unwrap_or_default())?;
                    output.insert(key.clone(), transformed);
                }
            }
        }
        Ok(output)
    }

    fn transform_value(
        &self,
        value: &Value,
        context: &FilterContext<'_>,
        path: &[String],
        key: &str,
    ) -> Result<Value> {
        match value {
            Value::Mapping(nested) => {
                let mut child_path = path.to_vec();
                child_path.push(key.to_string());
                Ok(Value::Mapping(self.transform_mapping(nested, context, &child_path)?))
            }
            Value::Sequence(items) => {
                let mut transformed = Vec::with_capacity(items.len());
                for item in items {
                    transformed.push(self.transform_value(item, context, path, key)?);
                }
                Ok(Value::Sequence(transformed))
            }
            other => Ok(other.clone()),
        }
    }

    fn decrypt_value(
        &self,
        value: &Value,
        context: &FilterContext<'_>,
        key_path: &str,
    ) -> Result<Value> {
        let Value::String(wire) = value else {
            warn!(key = key_path, "secure value is not a string; expected it to be encrypted");
            return Ok(value.clone());
        };

        if context.decryption_keys.is_empty() {
            return Ok(value.clone());
        }

        let looks_encrypted = context
            .decryption_keys
            .candidates()
            .any(|key| crate::keys::crypto::appears_encrypted(wire, key.size()));
        if !looks_encrypted {
            warn!(key = key_path, "secure value does not appear to be encrypted");
            return Ok(value.clone());
        }

        for key in context.decryption_keys.candidates() {
            if let Ok(decrypted) = context.cipher.decrypt(wire, key) {
                return Ok(decrypted);
            }
        }

        if self.strict {
            Err(ChamberError::DecryptionFailure {
                key_path: key_path.to_string(),
            })
        } else {
            warn!(key = key_path, "secure value could not be decrypted with installed keys");
            Ok(value.clone())
        }
    }
}

impl SettingsFilter for DecryptionFilter {
    fn transform(&self, data: &Mapping, context: &FilterContext<'_>) -> Result<Mapping> {
        self.transform_mapping(data, context, &[])
    }
}
