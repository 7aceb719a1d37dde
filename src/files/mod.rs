//! Settings file sources.

pub mod resolver;

pub use resolver::FileSet;

use crate::error::{ChamberError, Result};
use crate::namespaces::NamespaceSet;
use crate::templating;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// A concrete settings source discovered by the resolver.
///
/// Carries the NamespaceSet used during discovery so per-file namespace
/// collapsing can run later. Content is parsed on access and never cached;
/// descriptors are transient and handed off to the tree builder.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    path: PathBuf,
    namespaces: NamespaceSet,
    namespace: Option<String>,
}

impl FileDescriptor {
    pub fn new(path: PathBuf, namespaces: NamespaceSet) -> Self {
        Self {
            path,
            namespaces,
            namespace: None,
        }
    }

    /// Tag this descriptor with the namespace its filename suffix matched.
    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn namespaces(&self) -> &NamespaceSet {
        &self.namespaces
    }

    /// The namespace this file's `-<namespace>` suffix matched, if any.
    /// Drives per-namespace key selection when the file is rewritten.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Read, template, and parse this file.
    ///
    /// A missing file degrades to an empty mapping; unreadable or malformed
    /// content is fatal.
    pub fn parse(&self) -> Result<Mapping> {
        match self.read()? {
            Some(text) => self.parse_text(&templating::render(&text)),
            None => Ok(Mapping::new()),
        }
    }

    /// Parse without the templating pass. The write-back commands use this
    /// so `${NAME}` references in rewritten files stay references instead of
    /// being frozen to their current environment values.
    pub fn parse_raw(&self) -> Result<Mapping> {
        match self.read()? {
            Some(text) => self.parse_text(&text),
            None => Ok(Mapping::new()),
        }
    }

    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ChamberError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn parse_text(&self, rendered: &str) -> Result<Mapping> {
        if rendered.trim().is_empty() {
            return Ok(Mapping::new());
        }

        let document: Value =
            serde_yaml::from_str(&rendered).map_err(|e| ChamberError::MalformedSource {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        match document {
            Value::Mapping(mapping) => Ok(mapping),
            Value::Null => Ok(Mapping::new()),
            _ => Err(ChamberError::MalformedSource {
                path: self.path.clone(),
                reason: "top-level document is not a mapping".to_string(),
            }),
        }
    }
}
