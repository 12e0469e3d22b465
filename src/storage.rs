//! # Storage
//!
//! Where received files end up.
//!
//! The receiver hands every verified frame to a [`FileSink`]: the sink maps the
//! file name's extension to a category directory, makes sure the directory
//! exists, and writes the payload there. [`MediaStore`] is the implementation
//! backed by the `[storage]` section of the configuration.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{Result, TransferError};

/// Outcome of classifying a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Category name, e.g. "Images"
    pub category: String,
    /// Directory the file is written into
    pub directory: PathBuf,
}

impl Placement {
    /// Full destination path for `file_name`
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.directory.join(file_name)
    }
}

/// Classification and persistence collaborator used by the receiver
pub trait FileSink: Send + Sync + 'static {
    /// Map a file name to its category directory
    fn classify(&self, file_name: &str) -> Result<Placement>;

    /// Create `dir` and any missing parents; succeeding if it already exists
    fn ensure_directory(&self, dir: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Create or truncate `path` and write `bytes` to it
    fn persist(&self, path: &Path, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;
}

/// Extension of the final path element, including the dot.
///
/// `"photo.PNG"` gives `".PNG"`, `"archive.tar.gz"` gives `".gz"`, `"README"` gives `""`.
pub fn extension_of(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(i) => &file_name[i..],
        None => "",
    }
}

/// Accept only a single, ordinary path component
pub fn check_file_name(file_name: &str) -> Result<()> {
    let bad = file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0']);
    if bad {
        return Err(TransferError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct Category {
    name: String,
    directory: PathBuf,
}

/// Filesystem-backed [`FileSink`] built from the category table
#[derive(Debug, Clone)]
pub struct MediaStore {
    categories: Vec<Category>,
    by_extension: HashMap<String, usize>,
}

impl MediaStore {
    /// Build the store, rejecting a table with duplicate or malformed extensions
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(TransferError::ConfigError(errors.join("; ")));
        }

        let mut categories = Vec::with_capacity(config.categories.len());
        let mut by_extension = HashMap::new();
        for (index, category) in config.categories.iter().enumerate() {
            categories.push(Category {
                name: category.name.clone(),
                directory: config.root.join(&category.path),
            });
            for ext in &category.extensions {
                by_extension.insert(ext.to_ascii_lowercase(), index);
            }
        }

        Ok(Self {
            categories,
            by_extension,
        })
    }
}

impl FileSink for MediaStore {
    fn classify(&self, file_name: &str) -> Result<Placement> {
        check_file_name(file_name)?;

        let ext = extension_of(file_name);
        let index = self
            .by_extension
            .get(&ext.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| TransferError::UnknownExtension(ext.to_string()))?;

        let category = &self.categories[index];
        Ok(Placement {
            category: category.name.clone(),
            directory: category.directory.clone(),
        })
    }

    async fn ensure_directory(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| TransferError::Directory {
                path: dir.to_path_buf(),
                source,
            })
    }

    async fn persist(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| TransferError::Persist {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), bytes = bytes.len(), "File written");
        Ok(())
    }
}
