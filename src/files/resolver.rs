//! File discovery: glob expansion, namespace-suffix matching, merge ordering.
//!
//! The resolver turns path/glob patterns plus a NamespaceSet into the ordered
//! list of files to merge. Plain files come first, then namespace-suffixed
//! files grouped by namespace in NamespaceSet order, so every namespaced file
//! overrides its base and later namespaces override earlier ones.

use crate::error::{ChamberError, Result};
use crate::files::FileDescriptor;
use crate::namespaces::NamespaceSet;
use std::path::{Path, PathBuf};

const SETTINGS_EXTENSION: &str = "yml";

/// The ordered, deduplicated set of settings files for one resolution.
#[derive(Debug, Clone)]
pub struct FileSet {
    files: Vec<FileDescriptor>,
}

impl FileSet {
    /// Discover files for `patterns` under the given namespaces.
    ///
    /// A bare directory expands to `<dir>/*.yml`. A literal path that matches
    /// nothing is kept; its parse degrades to empty content. A namespaced
    /// file whose suffix matches no configured namespace is excluded.
    pub fn resolve<I, P>(patterns: I, namespaces: &NamespaceSet) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut discovered: Vec<PathBuf> = Vec::new();
        for pattern in patterns {
            expand_pattern(pattern.as_ref(), &mut discovered)?;
        }

        let (plain, namespaced): (Vec<_>, Vec<_>) = discovered
            .into_iter()
            .partition(|path| namespace_suffix(path).is_none());

        let mut ordered = plain;
        for namespace in namespaces {
            for path in &namespaced {
                if namespace_suffix(path).as_deref() == Some(namespace) {
                    push_unique(&mut ordered, path.clone());
                }
            }
        }

        let files = ordered
            .into_iter()
            .map(|path| {
                let suffix = namespace_suffix(&path).filter(|ns| namespaces.contains(ns));
                let descriptor = FileDescriptor::new(path, namespaces.clone());
                match suffix {
                    Some(ns) => descriptor.with_namespace(ns),
                    None => descriptor,
                }
            })
            .collect();
        Ok(Self { files })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.files.iter()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(FileDescriptor::path).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl IntoIterator for FileSet {
    type Item = FileDescriptor;
    type IntoIter = std::vec::IntoIter<FileDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

fn expand_pattern(pattern: &Path, discovered: &mut Vec<PathBuf>) -> Result<()> {
    let expanded = if pattern.is_dir() {
        pattern.join(format!("*.{SETTINGS_EXTENSION}"))
    } else {
        pattern.to_path_buf()
    };
    let pattern_text = expanded.to_string_lossy().into_owned();

    let mut matched_any = false;
    let matches = glob::glob(&pattern_text).map_err(|source| ChamberError::InvalidPattern {
        pattern: pattern_text.clone(),
        source,
    })?;
    for path in matches.flatten() {
        matched_any = true;
        push_unique(discovered, path);
    }

    // Keep a literal path even when absent: missing files contribute empty
    // settings rather than silently vanishing from the resolution.
    if !matched_any && !is_glob(&pattern_text) {
        push_unique(discovered, expanded);
    }
    Ok(())
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// The `<namespace>` of a `*-<namespace>.<ext>` filename, if any.
fn namespace_suffix(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit_once('-').map(|(_, suffix)| suffix.to_string())
}

fn push_unique(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}
