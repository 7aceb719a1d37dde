//! Chamber: layered settings resolution
//!
//! Loads settings from layered YAML files, merges them by namespace and
//! directory precedence, decrypts secure values with asymmetric keys, and
//! projects the result into environment-variable form.

pub mod configuration;
pub mod error;
pub mod files;
pub mod filters;
pub mod instance;
pub mod keys;
pub mod logging;
pub mod merge;
pub mod namespaces;
pub mod settings;
pub mod templating;
pub mod tooling;

pub use configuration::Configuration;
pub use error::{ChamberError, Result};
pub use files::{FileDescriptor, FileSet};
pub use instance::Instance;
pub use namespaces::NamespaceSet;
pub use settings::Settings;
