//! The settings filter chain.
//!
//! Each filter is a pure transform over a settings mapping: input is never
//! mutated, output is a new mapping. The filter set is closed; chains are
//! plain arrays of trait objects executed in order.
//!
//! Standard pipeline: [`NamespaceFilter`] runs once on raw merged data
//! (pre-filter), then [`DecryptionFilter`], [`EnvironmentFilter`], and
//! [`BooleanConversionFilter`] run in that order on the namespace-collapsed
//! result. Decrypted values are therefore still subject to environment
//! override and boolean coercion. [`SecureFilter`], [`InsecureFilter`], and
//! [`EncryptionFilter`] are installed on demand by the secure/unsecure
//! write-back paths.

mod boolean;
mod decryption;
mod encryption;
mod environment;
mod namespace;
mod secure;

pub use boolean::BooleanConversionFilter;
pub use decryption::DecryptionFilter;
pub use encryption::EncryptionFilter;
pub use environment::EnvironmentFilter;
pub use namespace::NamespaceFilter;
pub use secure::{InsecureFilter, SecureFilter};

use crate::error::Result;
use crate::keys::crypto::SecureValueCipher;
use crate::keys::{DecryptionKeyring, EncryptionKeyring};
use crate::namespaces::NamespaceSet;
use serde_yaml::Mapping;

/// Reserved key-name prefix marking a value as sensitive.
pub const SECURE_PREFIX: &str = "_secure_";

/// Shared read-only state available to every filter.
pub struct FilterContext<'a> {
    pub namespaces: &'a NamespaceSet,
    pub decryption_keys: &'a DecryptionKeyring,
    pub encryption_keys: &'a EncryptionKeyring,
    pub cipher: &'a SecureValueCipher,
}

/// One step of the settings pipeline.
pub trait SettingsFilter {
    fn transform(&self, data: &Mapping, context: &FilterContext<'_>) -> Result<Mapping>;
}

/// Run `filters` in order, feeding each output to the next.
pub fn apply_all(
    filters: &[Box<dyn SettingsFilter>],
    data: &Mapping,
    context: &FilterContext<'_>,
) -> Result<Mapping> {
    let mut current = data.clone();
    for filter in filters {
        current = filter.transform(&current, context)?;
    }
    Ok(current)
}

/// Filters applied to raw merged data before anything else.
pub fn pre_filters() -> Vec<Box<dyn SettingsFilter>> {
    vec![Box::new(NamespaceFilter)]
}

/// Filters applied to the namespace-collapsed tree, in execution order.
pub fn post_filters() -> Vec<Box<dyn SettingsFilter>> {
    vec![
        Box::new(DecryptionFilter::permissive()),
        Box::new(EnvironmentFilter),
        Box::new(BooleanConversionFilter),
    ]
}

/// Dotted render of a key path, for diagnostics.
fn joined_path(path: &[String], key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path.join("."), key)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::OnceLock;

    pub fn empty_context() -> FilterContext<'static> {
        static NAMESPACES: OnceLock<NamespaceSet> = OnceLock::new();
        static DECRYPTION: OnceLock<DecryptionKeyring> = OnceLock::new();
        static ENCRYPTION: OnceLock<EncryptionKeyring> = OnceLock::new();
        static CIPHER: OnceLock<SecureValueCipher> = OnceLock::new();
        FilterContext {
            namespaces: NAMESPACES.get_or_init(NamespaceSet::new),
            decryption_keys: DECRYPTION.get_or_init(DecryptionKeyring::default),
            encryption_keys: ENCRYPTION.get_or_init(EncryptionKeyring::default),
            cipher: CIPHER.get_or_init(SecureValueCipher::new),
        }
    }

    pub fn yaml_mapping(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }
}
