//! Photo storage on the local filesystem
//!
//! Files are written under `upload.path` with a random name and served back
//! at `/uploads/<name>`.

use anyhow::Context;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;

/// A file received from a client, not yet validated
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A file written to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid type {0}")]
    InvalidType(String),

    #[error("file too large (max {} MB)", .0 / 1024 / 1024)]
    TooLarge(u64),

    #[error("empty file")]
    Empty,

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

pub struct PhotoStorage {
    config: UploadConfig,
    /// Prefix for photo URLs; empty keeps them relative
    public_url: String,
}

impl PhotoStorage {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            public_url: String::new(),
        }
    }

    /// Serve photo URLs from `public_url` instead of relative paths
    pub fn with_public_url(mut self, public_url: &str) -> Self {
        self.public_url = public_url.trim_end_matches('/').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Validate and write one file
    pub async fn store(&self, file: &UploadedFile) -> Result<StoredFile, StorageError> {
        if !self.config.is_type_allowed(&file.content_type) {
            return Err(StorageError::InvalidType(file.content_type.clone()));
        }
        if file.data.is_empty() {
            return Err(StorageError::Empty);
        }
        if file.data.len() as u64 > self.config.max_file_size {
            return Err(StorageError::TooLarge(self.config.max_file_size));
        }

        self.ensure_dir().await?;

        let filename = format!(
            "{}.{}",
            Uuid::new_v4(),
            self.config.get_extension(&file.content_type)
        );
        fs::write(self.path_for(&filename), &file.data)
            .await
            .with_context(|| format!("Failed to save {}", file.filename))?;

        Ok(StoredFile {
            url: format!("{}/uploads/{}", self.public_url, filename),
            filename,
        })
    }

    /// Remove a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, filename: &str) -> anyhow::Result<()> {
        match fs::remove_file(self.path_for(filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", filename)),
        }
    }

    /// Stored names are generated, but strip any directory part anyway
    fn path_for(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        self.config.path.join(name)
    }

    async fn ensure_dir(&self) -> anyhow::Result<()> {
        if !self.config.path.exists() {
            fs::create_dir_all(&self.config.path)
                .await
                .context("Failed to create upload dir")?;
        }
        Ok(())
    }
}
