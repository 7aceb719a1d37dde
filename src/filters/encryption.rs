//! Encryption of pending secure values, for the secure write-back path.

use crate::error::{ChamberError, Result};
use crate::filters::{joined_path, FilterContext, SettingsFilter, SECURE_PREFIX};
use crate::keys::DEFAULT_NAMESPACE;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde_yaml::{Mapping, Value};

/// Encrypts secure-prefixed values that are still plaintext.
///
/// Keys keep their prefix so the rewritten file stays marked. Values that
/// already look encrypted are left alone, making the filter idempotent.
/// A namespaced filter encrypts with that namespace's public key so each
/// environment can hold its own private key; without one it falls back to
/// the default key. A pending value with no key installed at all is fatal.
pub struct EncryptionFilter {
    namespace: Option<String>,
}

impl EncryptionFilter {
    /// Encrypts with the default-namespace key.
    pub fn new() -> Self {
        Self { namespace: None }
    }

    /// Prefer the named namespace's key, falling back to the default.
    pub fn for_namespace<S: Into<String>>(namespace: S) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    fn encrypt_mapping(
        &self,
        data: &Mapping,
        context: &FilterContext<'_>,
        path: &[String],
    ) -> Result<Mapping> {
        let mut output = Mapping::new();
        for (key, value) in data {
            let key_name = key.as_str().unwrap_or_default();
            let new_value = if key_name.starts_with(SECURE_PREFIX) {
                self.encrypt_value(value, context, &joined_path(path, key_name))?
            } else if let Value::Mapping(nested) = value {
                let mut child_path = path.to_vec();
                child_path.push(key_name.to_string());
                Value::Mapping(self.encrypt_mapping(nested, context, &child_path)?)
            } else {
                value.clone()
            };
            output.insert(key.clone(), new_value);
        }
        Ok(output)
    }

    fn encrypt_value(
        &self,
        value: &Value,
        context: &FilterContext<'_>,
        key_path: &str,
    ) -> Result<Value> {
        let public_key = self.select_key(context)?;

        if let Value::String(wire) = value {
            if crate::keys::crypto::appears_encrypted(wire, public_key.size()) {
                return Ok(value.clone());
            }
        }

        let wire = context
            .cipher
            .encrypt(value, public_key)
            .map_err(|e| ChamberError::EncryptionFailure {
                key_path: key_path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Value::String(wire))
    }

    fn select_key<'a>(&self, context: &FilterContext<'a>) -> Result<&'a RsaPublicKey> {
        let keys = context.encryption_keys;
        let selected = match &self.namespace {
            Some(namespace) => keys.key_for(namespace).or_else(|| keys.primary()),
            None => keys.primary(),
        };
        selected.ok_or_else(|| ChamberError::MissingEncryptionKey {
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        })
    }
}

impl Default for EncryptionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsFilter for EncryptionFilter {
    fn transform(&self, data: &Mapping, context: &FilterContext<'_>) -> Result<Mapping> {
        self.encrypt_mapping(data, context, &[])
    }
}
