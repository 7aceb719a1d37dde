//! The merged, filtered settings tree.
//!
//! A Settings owns the raw merged mapping plus the namespaces and key
//! material it was resolved with. Raw data is immutable once constructed;
//! every transformation yields a new tree. The filtered view is computed
//! lazily in two cached stages: pre-filters (namespace collapsing) first,
//! post-filters (decrypt, environment override, boolean coercion) on that
//! result. Namespace collapsing must complete before the later filters see
//! the key set, so the stages cache independently.

use crate::error::{ChamberError, Result};
use crate::filters::{self, FilterContext, SettingsFilter};
use crate::keys::crypto::SecureValueCipher;
use crate::keys::{DecryptionKeyring, EncryptionKeyring};
use crate::merge::deep_merge_mappings;
use crate::namespaces::NamespaceSet;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct Settings {
    raw: Mapping,
    namespaces: NamespaceSet,
    decryption_keys: DecryptionKeyring,
    encryption_keys: EncryptionKeyring,
    cipher: SecureValueCipher,
    pre_filtered: OnceLock<Mapping>,
    filtered: OnceLock<Mapping>,
}

impl Settings {
    pub fn new(raw: Mapping, namespaces: NamespaceSet) -> Self {
        Self {
            raw,
            namespaces,
            ..Self::default()
        }
    }

    pub fn with_decryption_keys(mut self, keys: DecryptionKeyring) -> Self {
        self.decryption_keys = keys;
        self
    }

    pub fn with_encryption_keys(mut self, keys: EncryptionKeyring) -> Self {
        self.encryption_keys = keys;
        self
    }

    pub fn with_cipher(mut self, cipher: SecureValueCipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn namespaces(&self) -> &NamespaceSet {
        &self.namespaces
    }

    pub fn raw(&self) -> &Mapping {
        &self.raw
    }

    fn context(&self) -> FilterContext<'_> {
        FilterContext {
            namespaces: &self.namespaces,
            decryption_keys: &self.decryption_keys,
            encryption_keys: &self.encryption_keys,
            cipher: &self.cipher,
        }
    }

    fn pre_filtered(&self) -> Result<&Mapping> {
        if let Some(cached) = self.pre_filtered.get() {
            return Ok(cached);
        }
        let computed = filters::apply_all(&filters::pre_filters(), &self.raw, &self.context())?;
        Ok(self.pre_filtered.get_or_init(|| computed))
    }

    /// The fully filtered tree. Computed once, then served from cache.
    pub fn effective(&self) -> Result<&Mapping> {
        if let Some(cached) = self.filtered.get() {
            return Ok(cached);
        }
        let computed =
            filters::apply_all(&filters::post_filters(), self.pre_filtered()?, &self.context())?;
        Ok(self.filtered.get_or_init(|| computed))
    }

    /// New tree merging `other` onto `self`: recursive structural merge of
    /// raw data with `other` winning conflicts, namespaces concatenated
    /// (`self` first), key material from `self` when present, else `other`.
    pub fn merge(&self, other: &Settings) -> Settings {
        let decryption_keys = if self.decryption_keys.is_empty() {
            other.decryption_keys.clone()
        } else {
            self.decryption_keys.clone()
        };
        let encryption_keys = if self.encryption_keys.is_empty() {
            other.encryption_keys.clone()
        } else {
            self.encryption_keys.clone()
        };
        Settings {
            raw: deep_merge_mappings(self.raw.clone(), other.raw.clone()),
            namespaces: self.namespaces.concat(&other.namespaces),
            decryption_keys,
            encryption_keys,
            cipher: self.cipher.clone(),
            pre_filtered: OnceLock::new(),
            filtered: OnceLock::new(),
        }
    }

    /// Dotted-path access into the filtered tree. Numeric segments index
    /// sequences.
    pub fn get(&self, path: &str) -> Result<&Value> {
        let mut node: ValueRef<'_> = ValueRef::Mapping(self.effective()?);
        for segment in path.split('.') {
            node = match node {
                ValueRef::Mapping(mapping) => match mapping.get(segment) {
                    Some(value) => ValueRef::from(value),
                    None => {
                        return Err(ChamberError::UnknownSetting {
                            path: path.to_string(),
                            segment: segment.to_string(),
                        })
                    }
                },
                ValueRef::Value(Value::Sequence(items)) => match segment.parse::<usize>() {
                    Ok(index) if index < items.len() => ValueRef::from(&items[index]),
                    Ok(index) => {
                        return Err(ChamberError::UnknownIndex {
                            path: path.to_string(),
                            index,
                            len: items.len(),
                        })
                    }
                    Err(_) => {
                        return Err(ChamberError::UnknownSetting {
                            path: path.to_string(),
                            segment: segment.to_string(),
                        })
                    }
                },
                ValueRef::Value(Value::Mapping(mapping)) => match mapping.get(segment) {
                    Some(value) => ValueRef::from(value),
                    None => {
                        return Err(ChamberError::UnknownSetting {
                            path: path.to_string(),
                            segment: segment.to_string(),
                        })
                    }
                },
                ValueRef::Value(_) => {
                    return Err(ChamberError::UnknownSetting {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })
                }
            };
        }
        match node {
            ValueRef::Value(value) => Ok(value),
            ValueRef::Mapping(_) => Err(ChamberError::UnknownSetting {
                path: path.to_string(),
                segment: String::new(),
            }),
        }
    }

    pub fn get_str(&self, path: &str) -> Result<Option<&str>> {
        Ok(self.get(path)?.as_str())
    }

    pub fn get_bool(&self, path: &str) -> Result<Option<bool>> {
        Ok(self.get(path)?.as_bool())
    }

    pub fn get_i64(&self, path: &str) -> Result<Option<i64>> {
        Ok(self.get(path)?.as_i64())
    }

    /// Clone of the filtered tree, for serialization.
    pub fn to_hash(&self) -> Result<Mapping> {
        Ok(self.effective()?.clone())
    }

    /// Flatten the filtered tree to environment-variable pairs: key paths
    /// joined with `_` and uppercased, values stringified, entries in
    /// lexicographic key order.
    pub fn to_environment(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .to_flattened_name_hash()?
            .into_iter()
            .map(|(name, value)| (name, stringify(&value)))
            .collect())
    }

    /// Like [`to_environment`](Self::to_environment) but keeps the leaf
    /// values typed.
    pub fn to_flattened_name_hash(&self) -> Result<BTreeMap<String, Value>> {
        let mut pairs = BTreeMap::new();
        flatten(self.effective()?, &[], &mut pairs);
        Ok(pairs)
    }

    /// Render the environment pairs as `KEY<sep>"VALUE"` text, configurable
    /// for shell-export syntax versus plain display.
    pub fn to_string_with(
        &self,
        pair_separator: &str,
        value_surrounder: &str,
        name_value_separator: &str,
    ) -> Result<String> {
        let rendered: Vec<String> = self
            .to_environment()?
            .into_iter()
            .map(|(name, value)| {
                format!("{name}{name_value_separator}{value_surrounder}{value}{value_surrounder}")
            })
            .collect();
        Ok(rendered.join(pair_separator))
    }

    /// Secure entries only (still encrypted), for sensitive-value listings.
    pub fn secure_only(&self) -> Result<Mapping> {
        filters::SecureFilter.transform(self.pre_filtered()?, &self.context())
    }

    /// Secure entries whose values are still plaintext, pending encryption.
    pub fn insecure(&self) -> Result<Mapping> {
        filters::InsecureFilter.transform(self.pre_filtered()?, &self.context())
    }

    /// Verify every secure value decrypts with the installed keys. Used by
    /// CI-style checks; the permissive default pipeline never raises.
    pub fn validate_decryptable(&self) -> Result<()> {
        filters::DecryptionFilter::strict()
            .transform(self.pre_filtered()?, &self.context())
            .map(|_| ())
    }
}

/// Two trees are equal when their filtered data and namespaces both match.
impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        self.namespaces == other.namespaces && self.effective().ok() == other.effective().ok()
    }
}

enum ValueRef<'a> {
    Mapping(&'a Mapping),
    Value(&'a Value),
}

impl<'a> From<&'a Value> for ValueRef<'a> {
    fn from(value: &'a Value) -> Self {
        ValueRef::Value(value)
    }
}

fn flatten(data: &Mapping, path: &[&str], out: &mut BTreeMap<String, Value>) {
    for (key, value) in data {
        let key_name = key.as_str().unwrap_or_default();
        match value {
            Value::Mapping(nested) => {
                let mut child_path = path.to_vec();
                child_path.push(key_name);
                flatten(nested, &child_path, out);
            }
            leaf => {
                let mut parts = path.to_vec();
                parts.push(key_name);
                out.insert(parts.join("_").to_uppercase(), leaf.clone());
            }
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
