//! Resolution orchestration: basepath, file patterns, namespaces, keys.

use crate::error::Result;
use crate::files::FileSet;
use crate::keys::{DecryptionKeyring, EncryptionKeyring};
use crate::namespaces::NamespaceSet;
use crate::settings::Settings;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};

/// Default file patterns resolved under the basepath, in merge order.
const DEFAULT_PATTERNS: [&str; 3] = ["credentials*.yml", "settings*.yml", "settings"];

/// A fully resolved resolution configuration.
///
/// Owns the settings tree it produces: `settings()` discovers files, parses
/// each in resolver order, and folds them into one merged tree carrying this
/// configuration's namespaces and key material.
#[derive(Debug, Clone)]
pub struct Configuration {
    basepath: PathBuf,
    rootpath: PathBuf,
    patterns: Vec<PathBuf>,
    namespaces: NamespaceSet,
    decryption_keys: DecryptionKeyring,
    encryption_keys: EncryptionKeyring,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub fn basepath(&self) -> &Path {
        &self.basepath
    }

    /// Directory searched for `.chamber.*` key files.
    pub fn rootpath(&self) -> &Path {
        &self.rootpath
    }

    pub fn namespaces(&self) -> &NamespaceSet {
        &self.namespaces
    }

    pub fn decryption_keys(&self) -> &DecryptionKeyring {
        &self.decryption_keys
    }

    pub fn encryption_keys(&self) -> &EncryptionKeyring {
        &self.encryption_keys
    }

    /// The ordered files this configuration resolves to.
    pub fn file_set(&self) -> Result<FileSet> {
        FileSet::resolve(&self.patterns, &self.namespaces)
    }

    /// Build the merged settings tree, parsing each resolved file in order.
    pub fn settings(&self) -> Result<Settings> {
        let mut merged = Settings::new(Mapping::new(), self.namespaces.clone())
            .with_decryption_keys(self.decryption_keys.clone())
            .with_encryption_keys(self.encryption_keys.clone());

        for descriptor in self.file_set()?.iter() {
            let raw = descriptor.parse()?;
            let file_settings = Settings::new(raw, descriptor.namespaces().clone());
            merged = merged.merge(&file_settings);
        }
        Ok(merged)
    }
}

/// Builder for [`Configuration`]. Key material resolves at `build()`.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    basepath: Option<PathBuf>,
    rootpath: Option<PathBuf>,
    files: Vec<PathBuf>,
    namespaces: NamespaceSet,
    decryption_key: Option<String>,
    encryption_key: Option<String>,
}

impl ConfigurationBuilder {
    /// Directory the default file patterns resolve under. Defaults to `.`.
    pub fn basepath<P: Into<PathBuf>>(mut self, basepath: P) -> Self {
        self.basepath = Some(basepath.into());
        self
    }

    /// Directory searched for key files. Defaults to the basepath.
    pub fn rootpath<P: Into<PathBuf>>(mut self, rootpath: P) -> Self {
        self.rootpath = Some(rootpath.into());
        self
    }

    /// Explicit file patterns, replacing the defaults.
    pub fn files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn namespaces(mut self, namespaces: NamespaceSet) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespaces.push(namespace);
        self
    }

    /// Private key for the default namespace: a file path or inline PEM.
    pub fn decryption_key<S: Into<String>>(mut self, key: S) -> Self {
        self.decryption_key = Some(key.into());
        self
    }

    /// Public key for the default namespace: a file path or inline PEM.
    pub fn encryption_key<S: Into<String>>(mut self, key: S) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn build(self) -> Result<Configuration> {
        let basepath = self.basepath.unwrap_or_else(|| PathBuf::from("."));
        let rootpath = self.rootpath.unwrap_or_else(|| basepath.clone());

        let patterns = if self.files.is_empty() {
            DEFAULT_PATTERNS
                .iter()
                .map(|pattern| basepath.join(pattern))
                .collect()
        } else {
            self.files
        };

        let decryption_keys = DecryptionKeyring::resolve(
            &rootpath,
            &self.namespaces,
            self.decryption_key.as_deref(),
        )?;
        let encryption_keys = EncryptionKeyring::resolve(
            &rootpath,
            &self.namespaces,
            self.encryption_key.as_deref(),
        )?;

        Ok(Configuration {
            basepath,
            rootpath,
            patterns,
            namespaces: self.namespaces,
            decryption_keys,
            encryption_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_patterns_cover_credentials_settings_and_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("credentials.yml"), "secret_source: creds\n").unwrap();
        std::fs::write(dir.path().join("settings.yml"), "from_settings: 1\n").unwrap();
        let sub = dir.path().join("settings");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("extra.yml"), "from_directory: 2\n").unwrap();

        let configuration = Configuration::builder()
            .basepath(dir.path())
            .build()
            .unwrap();
        let settings = configuration.settings().unwrap();
        let env = settings.to_environment().unwrap();
        assert_eq!(env.get("SECRET_SOURCE"), Some(&"creds".to_string()));
        assert_eq!(env.get("FROM_SETTINGS"), Some(&"1".to_string()));
        assert_eq!(env.get("FROM_DIRECTORY"), Some(&"2".to_string()));
    }

    #[test]
    fn explicit_files_replace_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yml"), "ignored: true\n").unwrap();
        std::fs::write(dir.path().join("only.yml"), "kept: true\n").unwrap();

        let configuration = Configuration::builder()
            .basepath(dir.path())
            .files([dir.path().join("only.yml")])
            .build()
            .unwrap();
        let env = configuration.settings().unwrap().to_environment().unwrap();
        assert_eq!(env.get("KEPT"), Some(&"true".to_string()));
        assert!(env.get("IGNORED").is_none());
    }

    #[test]
    fn namespaced_files_override_base_in_namespace_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yml"), "x: 1\n").unwrap();
        std::fs::write(dir.path().join("settings-blue.yml"), "x: 2\n").unwrap();
        std::fs::write(dir.path().join("settings-green.yml"), "x: 3\n").unwrap();

        let blue_green = Configuration::builder()
            .basepath(dir.path())
            .namespace("blue")
            .namespace("green")
            .build()
            .unwrap();
        assert_eq!(
            blue_green.settings().unwrap().get_i64("x").unwrap(),
            Some(3)
        );

        let green_blue = Configuration::builder()
            .basepath(dir.path())
            .namespace("green")
            .namespace("blue")
            .build()
            .unwrap();
        assert_eq!(
            green_blue.settings().unwrap().get_i64("x").unwrap(),
            Some(2)
        );
    }

    #[test]
    fn empty_resolution_yields_empty_settings() {
        let dir = TempDir::new().unwrap();
        let configuration = Configuration::builder()
            .basepath(dir.path())
            .build()
            .unwrap();
        let settings = configuration.settings().unwrap();
        assert!(settings.to_environment().unwrap().is_empty());
    }
}
