//! Error types for settings resolution, key handling, and secure values.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum ChamberError {
    /// A settings file exists but its content is not a valid YAML mapping
    /// after templating.
    #[error("malformed settings source {path}: {reason}")]
    MalformedSource { path: PathBuf, reason: String },

    /// Key material at a path or in an environment variable is not a parseable key.
    #[error("invalid key material for namespace '{namespace}' ({origin}): {reason}")]
    InvalidKeyMaterial {
        namespace: String,
        origin: String,
        reason: String,
    },

    /// Ciphertext could not be decrypted with the installed key. Raised only by
    /// the strict decryption path; the permissive filter warns instead.
    #[error("unable to decrypt secure value at '{key_path}'")]
    DecryptionFailure { key_path: String },

    /// A secure value needs encrypting but no public key is installed for its namespace.
    #[error("no encryption key available for namespace '{namespace}'")]
    MissingEncryptionKey { namespace: String },

    #[error("encryption of secure value at '{key_path}' failed: {reason}")]
    EncryptionFailure { key_path: String, reason: String },

    /// Dotted-path access named a key that does not exist.
    #[error("unknown setting '{segment}' in path '{path}'")]
    UnknownSetting { path: String, segment: String },

    /// Dotted-path access indexed past the end of a sequence.
    #[error("index {index} out of bounds (length {len}) in path '{path}'")]
    UnknownIndex {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("invalid file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ChamberError>;
