// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Document persistence.
//!
//! Every store is a single JSON [`Document`] that is rewritten wholesale on
//! each mutation. The [`Storage`] trait abstracts where the bytes live:
//!
//! - [`JsonFileStorage`]: one file per document under a data directory, plus
//!   an `uploads/` directory for product images.
//! - [`MemoryStorage`]: in-process maps, used by tests and benchmarks. It can
//!   be told to reject writes to a document to exercise failure paths.
//!
//! A document that has never been written loads as its `Default` value.

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// URL prefix under which stored images are served.
pub const IMAGE_URL_PREFIX: &str = "/uploads/";

/// Directory (relative to the data directory) holding uploaded images.
pub const UPLOADS_DIR: &str = "uploads";

/// Low-level persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {document}: {source}")]
    Io {
        document: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed document {document}: {source}")]
    Malformed {
        document: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid image name {0:?}")]
    InvalidImageName(String),

    #[error("write rejected for {0}")]
    WriteRejected(String),
}

/// A store that is persisted as one JSON document.
pub trait Document: Serialize + DeserializeOwned + Default + Clone {
    /// File name of the backing document, e.g. `users.json`.
    const FILE_NAME: &'static str;
}

/// Byte-level backend for documents and images.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Returns `None` when the document has never been written.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the whole document.
    fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError>;

    fn put_image(&self, file_name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Returns whether an image was actually removed.
    fn remove_image(&self, file_name: &str) -> Result<bool, StorageError>;
}

/// Loads a document, falling back to its default when absent.
pub fn load<D: Document>(storage: &dyn Storage) -> Result<D, StorageError> {
    match storage.read(D::FILE_NAME)? {
        Some(bytes) => {
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Malformed {
                document: D::FILE_NAME.to_string(),
                source,
            })
        }
        None => Ok(D::default()),
    }
}

/// Serializes and rewrites a document.
pub fn save<D: Document>(storage: &dyn Storage, document: &D) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(document).map_err(|source| StorageError::Malformed {
        document: D::FILE_NAME.to_string(),
        source,
    })?;
    storage.write(D::FILE_NAME, &bytes)
}

/// Builds the public URL for a stored image.
pub fn image_url(file_name: &str) -> String {
    format!("{IMAGE_URL_PREFIX}{file_name}")
}

/// Extracts the stored file name from an image URL produced by [`image_url`].
///
/// Returns `None` for references that do not point into the uploads directory.
pub fn image_file_name(url: &str) -> Option<&str> {
    url.strip_prefix(IMAGE_URL_PREFIX)
        .filter(|name| is_plain_file_name(name))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

// =============================================================================
// JSON files on disk
// =============================================================================

/// Stores each document as `<root>/<name>` and images under `<root>/uploads`.
///
/// Documents are written to `<root>/.<name>.tmp` and renamed into place, so a
/// failed write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    root: PathBuf,
    uploads: PathBuf,
}

impl JsonFileStorage {
    /// Opens (and creates if needed) a data directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let uploads = root.join(UPLOADS_DIR);
        fs::create_dir_all(&uploads).map_err(|source| StorageError::Io {
            document: uploads.display().to_string(),
            source,
        })?;
        Ok(Self { root, uploads })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    fn image_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_file_name(file_name) {
            return Err(StorageError::InvalidImageName(file_name.to_string()));
        }
        Ok(self.uploads.join(file_name))
    }
}

impl Storage for JsonFileStorage {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.root.join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                document: name.to_string(),
                source,
            }),
        }
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        let io_error = |source: io::Error| StorageError::Io {
            document: name.to_string(),
            source,
        };
        let staged = self.root.join(format!(".{name}.tmp"));
        fs::write(&staged, contents).map_err(io_error)?;
        fs::rename(&staged, self.root.join(name)).map_err(|source| {
            let _ = fs::remove_file(&staged);
            io_error(source)
        })
    }

    fn put_image(&self, file_name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.image_path(file_name)?;
        fs::write(path, bytes).map_err(|source| StorageError::Io {
            document: file_name.to_string(),
            source,
        })
    }

    fn remove_image(&self, file_name: &str) -> Result<bool, StorageError> {
        let path = self.image_path(file_name)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io {
                document: file_name.to_string(),
                source,
            }),
        }
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

/// In-process storage backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: Mutex<HashMap<String, Vec<u8>>>,
    images: Mutex<HashMap<String, Vec<u8>>>,
    rejected: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write to `name` fail, or clears the fault with `None`.
    pub fn reject_writes_to(&self, name: Option<&str>) {
        *self.rejected.lock() = name.map(str::to_string);
    }

    /// Number of successful document writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw contents of a document, if it was ever written.
    pub fn document(&self, name: &str) -> Option<Vec<u8>> {
        self.documents.lock().get(name).cloned()
    }

    pub fn has_image(&self, file_name: &str) -> bool {
        self.images.lock().contains_key(file_name)
    }

    pub fn image_count(&self) -> usize {
        self.images.lock().len()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.documents.lock().get(name).cloned())
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        if self.rejected.lock().as_deref() == Some(name) {
            return Err(StorageError::WriteRejected(name.to_string()));
        }
        self.documents
            .lock()
            .insert(name.to_string(), contents.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn put_image(&self, file_name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if !is_plain_file_name(file_name) {
            return Err(StorageError::InvalidImageName(file_name.to_string()));
        }
        self.images
            .lock()
            .insert(file_name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove_image(&self, file_name: &str) -> Result<bool, StorageError> {
        Ok(self.images.lock().remove(file_name).is_some())
    }
}
