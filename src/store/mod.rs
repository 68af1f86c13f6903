//! Flat-file JSON persistence.
//!
//! One file per resource under the data directory. Reads are forgiving: a
//! missing, corrupt, or wrong-shaped file degrades to the resource's empty
//! value instead of failing the request. Writes go through a temp file in
//! the same directory followed by a rename, so a crash never leaves a
//! half-written resource behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Mode, Resource};

/// Flat-file store rooted at the data directory.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn file_path(&self, resource: Resource) -> PathBuf {
        self.data_dir.join(resource.file_name())
    }

    /// Load a resource's value, degrading to the empty default when the
    /// file is absent or unusable.
    pub async fn load(&self, resource: Resource) -> Result<Value, AppError> {
        let path = self.file_path(resource);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(resource.empty_value());
            }
            Err(err) => {
                tracing::error!("Failed to read {}: {}", path.display(), err);
                return Err(AppError::Storage("Failed to load data".to_string()));
            }
        };

        let value: Value = match serde_json::from_slice(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    "Unparseable JSON in {}, treating as empty: {}",
                    path.display(),
                    err
                );
                return Ok(resource.empty_value());
            }
        };

        let shape_ok = match resource.mode() {
            Mode::Collection => value.is_array(),
            Mode::Singleton => value.is_object(),
        };
        if !shape_ok {
            tracing::warn!(
                "Unexpected shape in {}, treating as empty",
                path.display()
            );
            return Ok(resource.empty_value());
        }

        Ok(value)
    }

    /// Persist a resource's full value as pretty-printed JSON, atomically.
    pub async fn save(&self, resource: Resource, value: &Value) -> Result<(), AppError> {
        let path = self.file_path(resource);
        let bytes = serde_json::to_vec_pretty(value).map_err(|err| {
            tracing::error!("Failed to serialize {}: {}", resource.name(), err);
            AppError::Storage("Failed to save data".to_string())
        })?;

        let tmp_path = self
            .data_dir
            .join(format!(".{}.{}.tmp", resource.file_name(), Uuid::new_v4()));

        let write = async {
            tokio::fs::write(&tmp_path, &bytes).await?;
            tokio::fs::rename(&tmp_path, &path).await
        };
        if let Err(err) = write.await {
            tracing::error!("Failed to write {}: {}", path.display(), err);
            tokio::fs::remove_file(&tmp_path).await.ok();
            return Err(AppError::Storage("Failed to save data".to_string()));
        }

        Ok(())
    }

    /// Copy seed resource files shipped with the site into the data
    /// directory when the live copy is missing or older. Runs once at
    /// startup, before the server accepts requests.
    pub fn sync_seed_data(&self, seed_dir: &Path) {
        if !seed_dir.is_dir() {
            return;
        }
        for resource in Resource::ALL {
            let source = seed_dir.join(resource.file_name());
            if !source.is_file() {
                continue;
            }
            let target = self.file_path(resource);
            let newer = match (source.metadata(), target.metadata()) {
                (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                    (Ok(src_time), Ok(dst_time)) => src_time > dst_time,
                    _ => false,
                },
                (Ok(_), Err(_)) => true,
                _ => false,
            };
            if newer {
                if let Err(err) = std::fs::copy(&source, &target) {
                    tracing::warn!(
                        "Could not sync seed file {}: {}",
                        resource.file_name(),
                        err
                    );
                }
            }
        }
    }
}
