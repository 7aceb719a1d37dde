//! Command-line interface for settings resolution and secure-value upkeep.

use crate::configuration::Configuration;
use crate::error::{ChamberError, Result};
use crate::filters::{
    EncryptionFilter, FilterContext, InsecureFilter, SettingsFilter, SECURE_PREFIX,
};
use crate::instance::Instance;
use crate::keys::crypto::SecureValueCipher;
use crate::namespaces::NamespaceSet;
use clap::{Parser, Subcommand};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;
use tracing::info;

/// Chamber CLI - layered settings resolution with secure values
#[derive(Parser)]
#[command(name = "chamber")]
#[command(about = "Resolve layered YAML settings with namespace precedence and secure values")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory the default settings file patterns resolve under
    #[arg(long, default_value = ".")]
    pub basepath: PathBuf,

    /// Directory searched for .chamber.*.pem key files (default: basepath)
    #[arg(long)]
    pub rootpath: Option<PathBuf>,

    /// Explicit settings file or glob pattern (repeatable, replaces defaults)
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// Namespace, in precedence order (repeatable; last wins on conflicts)
    #[arg(long = "namespace")]
    pub namespaces: Vec<String>,

    /// Private key for decryption (file path or inline PEM)
    #[arg(long)]
    pub decryption_key: Option<String>,

    /// Public key for encryption (file path or inline PEM)
    #[arg(long)]
    pub encryption_key: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the resolved settings tree
    Show {
        /// Output format (yaml or json)
        #[arg(long, default_value = "yaml")]
        format: String,
        /// Show only secure entries (values left encrypted)
        #[arg(long)]
        only_secure: bool,
        /// Fail if any secure value cannot be decrypted
        #[arg(long)]
        strict: bool,
    },
    /// List resolved settings files in merge order
    Files,
    /// Render settings as shell export statements
    Export,
    /// Encrypt plaintext secure values in the settings files
    Secure {
        /// List pending values without rewriting files
        #[arg(long)]
        dry_run: bool,
    },
    /// Decrypt secure values in the settings files back to plaintext
    Unsecure {
        /// List encrypted values without rewriting files
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    pub fn context(&self) -> Result<CliContext> {
        let mut builder = Configuration::builder().basepath(&self.basepath);
        if let Some(rootpath) = &self.rootpath {
            builder = builder.rootpath(rootpath);
        }
        if !self.files.is_empty() {
            builder = builder.files(self.files.iter().cloned());
        }
        builder = builder.namespaces(NamespaceSet::from_values(self.namespaces.iter().cloned()));
        if let Some(key) = &self.decryption_key {
            builder = builder.decryption_key(key);
        }
        if let Some(key) = &self.encryption_key {
            builder = builder.encryption_key(key);
        }
        Ok(CliContext::new(builder.build()?))
    }
}

/// Executes commands against one resolved instance.
pub struct CliContext {
    instance: Instance,
    cipher: SecureValueCipher,
}

impl CliContext {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            instance: Instance::new(configuration),
            cipher: SecureValueCipher::new(),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn execute(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Show {
                format,
                only_secure,
                strict,
            } => self.show(format, *only_secure, *strict),
            Commands::Files => self.files(),
            Commands::Export => self.export(),
            Commands::Secure { dry_run } => self.secure(*dry_run),
            Commands::Unsecure { dry_run } => self.unsecure(*dry_run),
        }
    }

    fn show(&self, format: &str, only_secure: bool, strict: bool) -> Result<String> {
        let settings = self.instance.settings()?;
        if strict {
            settings.validate_decryptable()?;
        }
        let tree = if only_secure {
            settings.secure_only()?
        } else {
            settings.to_hash()?
        };
        render_mapping(&tree, format)
    }

    fn files(&self) -> Result<String> {
        let listed: Vec<String> = self
            .instance
            .files()?
            .paths()
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        Ok(listed.join("\n"))
    }

    fn export(&self) -> Result<String> {
        let exports: Vec<String> = self
            .instance
            .to_environment()?
            .into_iter()
            .map(|(name, value)| format!("export {name}=\"{value}\""))
            .collect();
        Ok(exports.join("\n"))
    }

    /// Rewrite each settings file with its pending secure values encrypted.
    fn secure(&self, dry_run: bool) -> Result<String> {
        let configuration = self.instance.configuration();
        let context = FilterContext {
            namespaces: configuration.namespaces(),
            decryption_keys: configuration.decryption_keys(),
            encryption_keys: configuration.encryption_keys(),
            cipher: &self.cipher,
        };

        let mut report = Vec::new();
        for descriptor in self.instance.files()?.iter() {
            // Raw parse: the rewritten file must keep its ${NAME} references.
            let raw = descriptor.parse_raw()?;
            let pending = InsecureFilter.transform(&raw, &context)?;
            if pending.is_empty() {
                continue;
            }

            let mut key_paths = Vec::new();
            collect_key_paths(&pending, &mut Vec::new(), &mut key_paths);
            for key_path in &key_paths {
                report.push(format!("{}: {key_path}", descriptor.path().display()));
            }

            if !dry_run {
                let filter = match descriptor.namespace() {
                    Some(namespace) => EncryptionFilter::for_namespace(namespace),
                    None => EncryptionFilter::new(),
                };
                let encrypted = filter.transform(&raw, &context)?;
                write_settings_file(descriptor.path(), &encrypted)?;
                info!(file = %descriptor.path().display(), count = key_paths.len(), "encrypted pending secure values");
            }
        }

        if report.is_empty() {
            Ok("no pending secure values".to_string())
        } else {
            Ok(report.join("\n"))
        }
    }

    /// Rewrite each settings file with its secure values decrypted in place,
    /// keeping the secure-prefix markers.
    fn unsecure(&self, dry_run: bool) -> Result<String> {
        let configuration = self.instance.configuration();
        let mut report = Vec::new();

        for descriptor in self.instance.files()?.iter() {
            let raw = descriptor.parse_raw()?;
            let mut decrypted_paths = Vec::new();
            let decrypted = decrypt_in_place(
                &raw,
                configuration.decryption_keys(),
                &self.cipher,
                &mut Vec::new(),
                &mut decrypted_paths,
            )?;
            if decrypted_paths.is_empty() {
                continue;
            }

            for key_path in &decrypted_paths {
                report.push(format!("{}: {key_path}", descriptor.path().display()));
            }
            if !dry_run {
                write_settings_file(descriptor.path(), &decrypted)?;
            }
        }

        if report.is_empty() {
            Ok("no encrypted secure values".to_string())
        } else {
            Ok(report.join("\n"))
        }
    }
}

fn render_mapping(tree: &Mapping, format: &str) -> Result<String> {
    match format {
        "yaml" => serde_yaml::to_string(tree)
            .map(|text| text.trim_end().to_string())
            .map_err(|e| ChamberError::Render(e.to_string())),
        "json" => serde_json::to_string_pretty(tree)
            .map_err(|e| ChamberError::Render(e.to_string())),
        other => Err(ChamberError::InvalidArgument(format!(
            "unknown format '{other}', expected yaml or json"
        ))),
    }
}

fn write_settings_file(path: &std::path::Path, tree: &Mapping) -> Result<()> {
    let text = serde_yaml::to_string(tree).map_err(|e| ChamberError::Render(e.to_string()))?;
    std::fs::write(path, text).map_err(|source| ChamberError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Dotted paths of every leaf in a (projected) mapping.
fn collect_key_paths(data: &Mapping, path: &mut Vec<String>, out: &mut Vec<String>) {
    for (key, value) in data {
        let key_name = key.as_str().unwrap_or_default().to_string();
        if let Value::Mapping(nested) = value {
            path.push(key_name);
            collect_key_paths(nested, path, out);
            path.pop();
        } else {
            path.push(key_name);
            out.push(path.join("."));
            path.pop();
        }
    }
}

/// Decrypt secure values while keeping their prefixed keys, for write-back.
fn decrypt_in_place(
    data: &Mapping,
    keys: &crate::keys::DecryptionKeyring,
    cipher: &SecureValueCipher,
    path: &mut Vec<String>,
    decrypted_paths: &mut Vec<String>,
) -> Result<Mapping> {
    use rsa::traits::PublicKeyParts;

    let mut output = Mapping::new();
    for (key, value) in data {
        let key_name = key.as_str().unwrap_or_default().to_string();
        let new_value = match value {
            Value::Mapping(nested) => {
                path.push(key_name.clone());
                let transformed = decrypt_in_place(nested, keys, cipher, path, decrypted_paths)?;
                path.pop();
                Value::Mapping(transformed)
            }
            Value::String(wire) if key_name.starts_with(SECURE_PREFIX) => {
                let looks_encrypted = keys
                    .candidates()
                    .any(|k| crate::keys::crypto::appears_encrypted(wire, k.size()));
                if looks_encrypted {
                    path.push(key_name.clone());
                    let key_path = path.join(".");
                    path.pop();

                    let decrypted = keys
                        .candidates()
                        .find_map(|candidate| cipher.decrypt(wire, candidate).ok());
                    match decrypted {
                        Some(plain) => {
                            decrypted_paths.push(key_path);
                            plain
                        }
                        None => return Err(ChamberError::DecryptionFailure { key_path }),
                    }
                } else {
                    value.clone()
                }
            }
            other => other.clone(),
        };
        output.insert(key.clone(), new_value);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use std::sync::OnceLock;
    use tempfile::TempDir;

    fn test_private_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
    }

    fn rotation_private_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
    }

    fn write_keys(dir: &TempDir) {
        std::fs::write(
            dir.path().join(".chamber.pem"),
            test_private_key()
                .to_pkcs8_pem(LineEnding::LF)
                .unwrap()
                .as_bytes(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".chamber.pub.pem"),
            RsaPublicKey::from(test_private_key())
                .to_public_key_pem(LineEnding::LF)
                .unwrap(),
        )
        .unwrap();
    }

    fn context(dir: &TempDir) -> CliContext {
        let configuration = Configuration::builder()
            .basepath(dir.path())
            .build()
            .unwrap();
        CliContext::new(configuration)
    }

    #[test]
    fn show_renders_yaml_and_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yml"), "app:\n  name: chamber\n").unwrap();

        let cli = context(&dir);
        let yaml = cli
            .execute(&Commands::Show {
                format: "yaml".into(),
                only_secure: false,
                strict: false,
            })
            .unwrap();
        assert!(yaml.contains("name: chamber"));

        let json = cli
            .execute(&Commands::Show {
                format: "json".into(),
                only_secure: false,
                strict: false,
            })
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["app"]["name"], "chamber");
    }

    #[test]
    fn show_rejects_unknown_format() {
        let dir = TempDir::new().unwrap();
        let cli = context(&dir);
        let err = cli
            .execute(&Commands::Show {
                format: "toml".into(),
                only_secure: false,
                strict: false,
            })
            .unwrap_err();
        assert!(matches!(err, ChamberError::InvalidArgument(_)));
    }

    #[test]
    fn files_lists_resolved_paths_in_merge_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yml"), "a: 1\n").unwrap();
        std::fs::write(dir.path().join("credentials.yml"), "b: 2\n").unwrap();

        let cli = context(&dir);
        let listing = cli.execute(&Commands::Files).unwrap();
        assert!(listing.contains("credentials.yml"));
        assert!(listing.contains("settings.yml"));
    }

    #[test]
    fn export_renders_shell_statements() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yml"), "db:\n  port: 5432\n").unwrap();

        let cli = context(&dir);
        let exports = cli.execute(&Commands::Export).unwrap();
        assert_eq!(exports, "export DB_PORT=\"5432\"");
    }

    #[test]
    fn secure_then_unsecure_round_trips_file_content() {
        let dir = TempDir::new().unwrap();
        write_keys(&dir);
        let settings_file = dir.path().join("settings.yml");
        std::fs::write(&settings_file, "_secure_token: password1\nplain: kept\n").unwrap();

        let cli = context(&dir);

        let dry = cli.execute(&Commands::Secure { dry_run: true }).unwrap();
        assert!(dry.contains("_secure_token"));
        // Dry run leaves the file untouched.
        assert!(std::fs::read_to_string(&settings_file)
            .unwrap()
            .contains("password1"));

        cli.execute(&Commands::Secure { dry_run: false }).unwrap();
        let encrypted_text = std::fs::read_to_string(&settings_file).unwrap();
        assert!(!encrypted_text.contains("password1"));
        assert!(encrypted_text.contains("_secure_token"));
        assert!(encrypted_text.contains("plain: kept"));

        // The resolved settings still decrypt transparently.
        let resolved = context(&dir);
        assert_eq!(
            resolved.instance().get_str("token").unwrap(),
            Some("password1")
        );

        cli.execute(&Commands::Unsecure { dry_run: false }).unwrap();
        let decrypted_text = std::fs::read_to_string(&settings_file).unwrap();
        assert!(decrypted_text.contains("password1"));

        // Unsecure restores the pre-encryption state, so the values read as
        // pending again.
        let report = cli.execute(&Commands::Secure { dry_run: true }).unwrap();
        assert!(report.contains("_secure_token"));
    }

    #[test]
    fn secure_write_back_keeps_template_references() {
        let dir = TempDir::new().unwrap();
        write_keys(&dir);
        std::env::set_var("CHAMBER_CLI_TEST_WRITEBACK_HOST", "db.internal");
        let settings_file = dir.path().join("settings.yml");
        std::fs::write(
            &settings_file,
            "host: ${CHAMBER_CLI_TEST_WRITEBACK_HOST}\n_secure_token: password1\n",
        )
        .unwrap();

        let cli = context(&dir);
        cli.execute(&Commands::Secure { dry_run: false }).unwrap();

        // The interpolation stays a reference instead of freezing to the
        // current environment value.
        let rewritten = std::fs::read_to_string(&settings_file).unwrap();
        assert!(rewritten.contains("${CHAMBER_CLI_TEST_WRITEBACK_HOST}"));
        assert!(!rewritten.contains("db.internal"));

        // Reading still expands it.
        let resolved = context(&dir);
        assert_eq!(
            resolved.instance().get_str("host").unwrap(),
            Some("db.internal")
        );
        assert_eq!(
            resolved.instance().get_str("token").unwrap(),
            Some("password1")
        );
        std::env::remove_var("CHAMBER_CLI_TEST_WRITEBACK_HOST");
    }

    #[test]
    fn secure_encrypts_namespaced_files_with_their_namespace_key() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".chamber.pub.pem"),
            RsaPublicKey::from(test_private_key())
                .to_public_key_pem(LineEnding::LF)
                .unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".chamber.blue.pub.pem"),
            RsaPublicKey::from(rotation_private_key())
                .to_public_key_pem(LineEnding::LF)
                .unwrap(),
        )
        .unwrap();
        let settings_file = dir.path().join("settings-blue.yml");
        std::fs::write(&settings_file, "_secure_rotated: blue-secret\n").unwrap();

        let configuration = Configuration::builder()
            .basepath(dir.path())
            .namespace("blue")
            .build()
            .unwrap();
        let cli = CliContext::new(configuration);
        cli.execute(&Commands::Secure { dry_run: false }).unwrap();

        let rewritten: Mapping =
            serde_yaml::from_str(&std::fs::read_to_string(&settings_file).unwrap()).unwrap();
        let wire = rewritten
            .get("_secure_rotated")
            .and_then(Value::as_str)
            .unwrap();

        // Only the blue private key can read the rewritten value.
        let cipher = SecureValueCipher::new();
        assert_eq!(
            cipher.decrypt(wire, rotation_private_key()).unwrap(),
            Value::String("blue-secret".into())
        );
        assert!(cipher.decrypt(wire, test_private_key()).is_err());
    }

    #[test]
    fn secure_reports_nothing_when_no_pending_values() {
        let dir = TempDir::new().unwrap();
        write_keys(&dir);
        std::fs::write(dir.path().join("settings.yml"), "plain: only\n").unwrap();

        let cli = context(&dir);
        assert_eq!(
            cli.execute(&Commands::Secure { dry_run: false }).unwrap(),
            "no pending secure values"
        );
    }
}
