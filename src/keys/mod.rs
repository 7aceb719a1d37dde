//! Key material resolution for secure values.
//!
//! Keys are held per namespace so environments can rotate independently.
//! Resolution order for each namespace: explicit path or inline PEM, then a
//! `.chamber.<namespace>.pem` file beside the rootpath, then the
//! `CHAMBER_<NAMESPACE>_KEY` environment variable. Public (encryption) keys
//! use the `.pub.pem` file suffix and the `_PUBLIC_KEY` variable suffix.
//! A namespace with no key anywhere simply has no entry; key material that
//! exists but does not parse is fatal.

pub mod crypto;

use crate::error::{ChamberError, Result};
use crate::namespaces::NamespaceSet;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::Path;

/// Namespace used for keys not tied to any configured namespace.
pub const DEFAULT_NAMESPACE: &str = "__default";

const PEM_MARKER: &str = "-----BEGIN";

/// Private keys for decryption, in candidate order: default first, then the
/// configured namespaces in NamespaceSet order.
#[derive(Debug, Clone, Default)]
pub struct DecryptionKeyring {
    keys: Vec<(String, RsaPrivateKey)>,
}

/// Public keys for encryption, keyed the same way.
#[derive(Debug, Clone, Default)]
pub struct EncryptionKeyring {
    keys: Vec<(String, RsaPublicKey)>,
}

impl DecryptionKeyring {
    /// Resolve private keys for the default namespace plus each configured
    /// namespace. `explicit` overrides the default-namespace lookup and may
    /// be a file path or inline PEM text.
    pub fn resolve(
        rootpath: &Path,
        namespaces: &NamespaceSet,
        explicit: Option<&str>,
    ) -> Result<Self> {
        let mut keys = Vec::new();
        for namespace in resolution_namespaces(namespaces) {
            let explicit = explicit.filter(|_| namespace == DEFAULT_NAMESPACE);
            if let Some((material, origin)) =
                find_material(rootpath, &namespace, "pem", "KEY", explicit)?
            {
                let key = parse_private_pem(&material).map_err(|reason| {
                    ChamberError::InvalidKeyMaterial {
                        namespace: namespace.clone(),
                        origin,
                        reason,
                    }
                })?;
                keys.push((namespace, key));
            }
        }
        Ok(Self { keys })
    }

    pub fn key_for(&self, namespace: &str) -> Option<&RsaPrivateKey> {
        self.keys
            .iter()
            .find(|(ns, _)| ns == namespace)
            .map(|(_, key)| key)
    }

    /// Keys in resolution order, for try-each-until-one-works decryption.
    pub fn candidates(&self) -> impl Iterator<Item = &RsaPrivateKey> {
        self.keys.iter().map(|(_, key)| key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl EncryptionKeyring {
    pub fn resolve(
        rootpath: &Path,
        namespaces: &NamespaceSet,
        explicit: Option<&str>,
    ) -> Result<Self> {
        let mut keys = Vec::new();
        for namespace in resolution_namespaces(namespaces) {
            let explicit = explicit.filter(|_| namespace == DEFAULT_NAMESPACE);
            if let Some((material, origin)) =
                find_material(rootpath, &namespace, "pub.pem", "PUBLIC_KEY", explicit)?
            {
                let key = parse_public_pem(&material).map_err(|reason| {
                    ChamberError::InvalidKeyMaterial {
                        namespace: namespace.clone(),
                        origin,
                        reason,
                    }
                })?;
                keys.push((namespace, key));
            }
        }
        Ok(Self { keys })
    }

    pub fn key_for(&self, namespace: &str) -> Option<&RsaPublicKey> {
        self.keys
            .iter()
            .find(|(ns, _)| ns == namespace)
            .map(|(_, key)| key)
    }

    /// The key used when a value is not tied to a specific namespace: the
    /// default-namespace key, else the first namespace key present.
    pub fn primary(&self) -> Option<&RsaPublicKey> {
        self.key_for(DEFAULT_NAMESPACE)
            .or_else(|| self.keys.first().map(|(_, key)| key))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn resolution_namespaces(namespaces: &NamespaceSet) -> Vec<String> {
    std::iter::once(DEFAULT_NAMESPACE.to_string())
        .chain(namespaces.iter().map(str::to_string))
        .collect()
}

/// Locate key material for one namespace. Returns the PEM text and a
/// human-readable origin for error messages, or None when no source exists.
fn find_material(
    rootpath: &Path,
    namespace: &str,
    file_suffix: &str,
    env_suffix: &str,
    explicit: Option<&str>,
) -> Result<Option<(String, String)>> {
    if let Some(explicit) = explicit {
        if explicit.contains(PEM_MARKER) {
            return Ok(Some((explicit.to_string(), "inline key".to_string())));
        }
        let path = Path::new(explicit);
        let material = std::fs::read_to_string(path).map_err(|source| ChamberError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(Some((material, path.display().to_string())));
    }

    let filename = if namespace == DEFAULT_NAMESPACE {
        format!(".chamber.{file_suffix}")
    } else {
        format!(".chamber.{namespace}.{file_suffix}")
    };
    let path = rootpath.join(filename);
    if path.is_file() {
        let material = std::fs::read_to_string(&path)
            .map_err(|source| ChamberError::Io { path: path.clone(), source })?;
        return Ok(Some((material, path.display().to_string())));
    }

    let var = if namespace == DEFAULT_NAMESPACE {
        format!("CHAMBER_{env_suffix}")
    } else {
        format!("CHAMBER_{}_{env_suffix}", env_component(namespace))
    };
    if let Ok(material) = std::env::var(&var) {
        // Keys exported through the environment commonly carry escaped newlines.
        return Ok(Some((material.replace("\\n", "\n"), format!("${var}"))));
    }

    Ok(None)
}

fn env_component(namespace: &str) -> String {
    namespace.to_uppercase().replace('-', "_")
}

fn parse_private_pem(pem: &str) -> std::result::Result<RsaPrivateKey, String> {
    if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| e.to_string())
}

fn parse_public_pem(pem: &str) -> std::result::Result<RsaPublicKey, String> {
    if let Ok(key) = RsaPublicKey::from_pkcs1_pem(pem) {
        return Ok(key);
    }
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| e.to_string())
}
