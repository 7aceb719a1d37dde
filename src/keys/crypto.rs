//! Cipher for secure settings values.
//!
//! Short plaintexts are encrypted directly with RSA PKCS#1 v1.5. Plaintexts
//! above the threshold use a hybrid scheme: a fresh AES-256-GCM key encrypts
//! the payload and RSA wraps the AES key. Wire forms:
//!
//! - direct: `base64(rsa_ciphertext)`
//! - hybrid: `base64(wrapped_key)#base64(nonce)#base64(ciphertext)`

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use serde_yaml::Value;
use thiserror::Error;

/// Plaintext length (bytes) above which the hybrid scheme is used.
pub const DEFAULT_HYBRID_THRESHOLD: usize = 128;

const AES_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("asymmetric encryption failed: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("symmetric cipher failure")]
    Symmetric,
    #[error("ciphertext is not valid base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext structure not recognized")]
    Malformed,
}

/// Encrypts and decrypts individual secure values.
#[derive(Debug, Clone)]
pub struct SecureValueCipher {
    hybrid_threshold: usize,
}

impl Default for SecureValueCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureValueCipher {
    pub fn new() -> Self {
        Self {
            hybrid_threshold: DEFAULT_HYBRID_THRESHOLD,
        }
    }

    /// Override the direct/hybrid cutoff. The cutoff is a policy constant,
    /// not a structural requirement; it must stay below the RSA message
    /// limit (modulus size - 11 bytes for PKCS#1 v1.5).
    pub fn with_threshold(hybrid_threshold: usize) -> Self {
        Self { hybrid_threshold }
    }

    /// Encrypt a settings value, yielding its wire form.
    ///
    /// Strings are encrypted raw; other values are YAML-serialized first so
    /// numbers and nested structures survive the round trip typed.
    pub fn encrypt(&self, value: &Value, key: &RsaPublicKey) -> Result<String, CipherError> {
        let plaintext = serialize_plaintext(value);
        let bytes = plaintext.as_bytes();

        if bytes.len() <= self.hybrid_threshold {
            let ciphertext = key.encrypt(&mut OsRng, Pkcs1v15Encrypt, bytes)?;
            Ok(BASE64.encode(ciphertext))
        } else {
            self.encrypt_hybrid(bytes, key)
        }
    }

    /// Decrypt a wire-form value back into a settings value.
    pub fn decrypt(&self, wire: &str, key: &RsaPrivateKey) -> Result<Value, CipherError> {
        let plaintext = if wire.contains('#') {
            self.decrypt_hybrid(wire, key)?
        } else {
            let ciphertext = BASE64.decode(wire)?;
            key.decrypt(Pkcs1v15Encrypt, &ciphertext)?
        };
        let text = String::from_utf8(plaintext).map_err(|_| CipherError::Malformed)?;
        Ok(deserialize_plaintext(&text))
    }

    fn encrypt_hybrid(&self, bytes: &[u8], key: &RsaPublicKey) -> Result<String, CipherError> {
        let mut aes_key = [0u8; AES_KEY_LEN];
        OsRng.fill_bytes(&mut aes_key);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), bytes)
            .map_err(|_| CipherError::Symmetric)?;
        let wrapped_key = key.encrypt(&mut OsRng, Pkcs1v15Encrypt, &aes_key)?;

        Ok(format!(
            "{}#{}#{}",
            BASE64.encode(wrapped_key),
            BASE64.encode(nonce),
            BASE64.encode(ciphertext)
        ))
    }

    fn decrypt_hybrid(&self, wire: &str, key: &RsaPrivateKey) -> Result<Vec<u8>, CipherError> {
        let mut parts = wire.splitn(3, '#');
        let (wrapped, nonce, payload) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(CipherError::Malformed),
        };

        let aes_key = key.decrypt(Pkcs1v15Encrypt, &BASE64.decode(wrapped)?)?;
        let nonce = BASE64.decode(nonce)?;
        if aes_key.len() != AES_KEY_LEN || nonce.len() != NONCE_LEN {
            return Err(CipherError::Malformed);
        }

        let payload = BASE64.decode(payload)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key));
        cipher
            .decrypt(Nonce::from_slice(&nonce), payload.as_slice())
            .map_err(|_| CipherError::Symmetric)
    }
}

/// Structural check: does `wire` look like output of this cipher for a key
/// of `modulus_len` bytes? Used to tell "encrypted" from "author forgot to
/// encrypt" without attempting decryption.
pub fn appears_encrypted(wire: &str, modulus_len: usize) -> bool {
    if let Some((wrapped, rest)) = wire.split_once('#') {
        let Some((nonce, payload)) = rest.split_once('#') else {
            return false;
        };
        matches!(BASE64.decode(wrapped), Ok(k) if k.len() == modulus_len)
            && matches!(BASE64.decode(nonce), Ok(n) if n.len() == NONCE_LEN)
            && BASE64.decode(payload).is_ok()
    } else {
        matches!(BASE64.decode(wire), Ok(c) if c.len() == modulus_len)
    }
}

fn serialize_plaintext(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

fn deserialize_plaintext(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::OnceLock;

    // Key generation dominates test time; share one pair across tests.
    fn test_keypair() -> (&'static RsaPrivateKey, RsaPublicKey) {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        let private = KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap());
        let public = RsaPublicKey::from(private);
        (private, public)
    }

    fn other_private_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
    }

    #[test]
    fn round_trips_short_string() {
        let (private, public) = test_keypair();
        let cipher = SecureValueCipher::new();
        let wire = cipher.encrypt(&Value::String("s3cr3t".into()), &public).unwrap();
        assert!(!wire.contains('#'));
        assert_eq!(
            cipher.decrypt(&wire, private).unwrap(),
            Value::String("s3cr3t".into())
        );
    }

    #[test]
    fn round_trips_number_typed() {
        let (private, public) = test_keypair();
        let cipher = SecureValueCipher::new();
        let wire = cipher.encrypt(&Value::Number(1234.into()), &public).unwrap();
        assert_eq!(
            cipher.decrypt(&wire, private).unwrap(),
            Value::Number(1234.into())
        );
    }

    #[test]
    fn long_values_use_hybrid_form() {
        let (private, public) = test_keypair();
        let cipher = SecureValueCipher::new();
        let long = "x".repeat(300);
        let wire = cipher.encrypt(&Value::String(long.clone()), &public).unwrap();
        assert_eq!(wire.matches('#').count(), 2);
        assert_eq!(cipher.decrypt(&wire, private).unwrap(), Value::String(long));
    }

    #[test]
    fn round_trips_nested_structure() {
        let (private, public) = test_keypair();
        let cipher = SecureValueCipher::new();
        let value: Value =
            serde_yaml::from_str("host: db.internal\nport: 5432\nreplicas: [a, b]").unwrap();
        let wire = cipher.encrypt(&value, &public).unwrap();
        assert_eq!(cipher.decrypt(&wire, private).unwrap(), value);
    }

    #[test]
    fn threshold_selects_scheme() {
        let (_, public) = test_keypair();
        let cipher = SecureValueCipher::with_threshold(4);
        let wire = cipher.encrypt(&Value::String("12345".into()), &public).unwrap();
        assert!(wire.contains('#'));
    }

    #[test]
    fn recognizes_encrypted_wire_forms() {
        let (_, public) = test_keypair();
        let modulus_len = public.size();
        let cipher = SecureValueCipher::new();

        let direct = cipher.encrypt(&Value::String("v".into()), &public).unwrap();
        let hybrid = cipher
            .encrypt(&Value::String("v".repeat(200)), &public)
            .unwrap();

        assert!(appears_encrypted(&direct, modulus_len));
        assert!(appears_encrypted(&hybrid, modulus_len));
        assert!(!appears_encrypted("plaintext password", modulus_len));
        assert!(!appears_encrypted("aGVsbG8=", modulus_len));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let (_, public) = test_keypair();
        let cipher = SecureValueCipher::new();
        let wire = cipher.encrypt(&Value::String("v".into()), &public).unwrap();
        assert!(cipher.decrypt(&wire, other_private_key()).is_err());
    }
}
