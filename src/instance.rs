//! Top-level facade combining a configuration with settings access.

use crate::configuration::Configuration;
use crate::error::Result;
use crate::files::FileSet;
use crate::settings::Settings;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One resolved chamber: a configuration plus its lazily built settings
/// tree. Constructed explicitly by the entry point and passed to consumers;
/// there is no ambient process-wide instance.
#[derive(Debug)]
pub struct Instance {
    configuration: Configuration,
    settings: OnceLock<Settings>,
}

impl Instance {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            settings: OnceLock::new(),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The merged settings tree, built on first access.
    pub fn settings(&self) -> Result<&Settings> {
        if let Some(cached) = self.settings.get() {
            return Ok(cached);
        }
        let built = self.configuration.settings()?;
        Ok(self.settings.get_or_init(|| built))
    }

    pub fn files(&self) -> Result<FileSet> {
        self.configuration.file_set()
    }

    pub fn get(&self, path: &str) -> Result<&Value> {
        self.settings()?.get(path)
    }

    pub fn get_str(&self, path: &str) -> Result<Option<&str>> {
        self.settings()?.get_str(path)
    }

    pub fn get_bool(&self, path: &str) -> Result<Option<bool>> {
        self.settings()?.get_bool(path)
    }

    pub fn to_hash(&self) -> Result<Mapping> {
        self.settings()?.to_hash()
    }

    pub fn to_environment(&self) -> Result<BTreeMap<String, String>> {
        self.settings()?.to_environment()
    }

    pub fn to_flattened_name_hash(&self) -> Result<BTreeMap<String, Value>> {
        self.settings()?.to_flattened_name_hash()
    }

    pub fn to_string_with(
        &self,
        pair_separator: &str,
        value_surrounder: &str,
        name_value_separator: &str,
    ) -> Result<String> {
        self.settings()?
            .to_string_with(pair_separator, value_surrounder, name_value_separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChamberError;
    use tempfile::TempDir;

    fn instance(dir: &TempDir) -> Instance {
        let configuration = Configuration::builder()
            .basepath(dir.path())
            .build()
            .unwrap();
        Instance::new(configuration)
    }

    #[test]
    fn delegates_settings_access() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yml"), "app:\n  name: chamber\n").unwrap();

        let instance = instance(&dir);
        assert_eq!(instance.get_str("app.name").unwrap(), Some("chamber"));
        assert_eq!(
            instance.to_environment().unwrap().get("APP_NAME"),
            Some(&"chamber".to_string())
        );
    }

    #[test]
    fn unresolvable_access_is_an_unknown_setting_error() {
        let dir = TempDir::new().unwrap();
        let instance = instance(&dir);
        assert!(matches!(
            instance.get("nope").unwrap_err(),
            ChamberError::UnknownSetting { .. }
        ));
    }

    #[test]
    fn settings_tree_is_built_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yml"), "a: 1\n").unwrap();

        let instance = instance(&dir);
        let first = instance.settings().unwrap() as *const Settings;
        let second = instance.settings().unwrap() as *const Settings;
        assert_eq!(first, second);
    }
}
