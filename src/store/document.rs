//! Typed JSON document persistence shared by every store.
//!
//! Reads never fail: a missing or blank file is initialised with the default
//! value, and an unreadable or malformed file yields the default without being
//! overwritten. Writes go through a sibling temp file followed by a rename.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonDocument<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for JsonDocument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDocument")
            .field("path", &self.path)
            .finish()
    }
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, falling back to `T::default()` on any read or parse problem.
    pub async fn load(&self) -> T {
        match fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => self.initialize().await,
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(err) => {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %err,
                        "stored document is malformed; using default value"
                    );
                    T::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => self.initialize().await,
            Err(err) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to read stored document; using default value"
                );
                T::default()
            }
        }
    }

    /// Serializes `value` and replaces the document on disk.
    pub async fn save(&self, value: &T) -> Result<()> {
        let encoded = serde_json::to_vec(value)
            .with_context(|| format!("failed to encode {}", self.path.display()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let staging = self.staging_path();
        fs::write(&staging, &encoded)
            .await
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    async fn initialize(&self) -> T {
        let value = T::default();
        if let Err(err) = self.save(&value).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to initialise missing document"
            );
        }
        value
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("document"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
