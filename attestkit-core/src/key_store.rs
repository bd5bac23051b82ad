//! Persistence of the enrolled key id.
//!
//! Only the opaque key id returned by the hardware provider is stored, never key
//! material. A key id must survive app restarts: losing it means enrolling a new
//! hardware key and abandoning the server-side record of the old one.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{AppAttestError, AppAttestResult};

/// Default service namespace for persisted key ids.
pub const DEFAULT_KEY_ID_SERVICE: &str = "attestkit.appattest.keyid";
/// Default account name for persisted key ids.
pub const DEFAULT_KEY_ID_ACCOUNT: &str = "default";

/// Durable storage for the enrolled key id.
#[uniffi::export(with_foreign)]
pub trait KeyIdStore: Send + Sync {
    /// Returns the stored key id, if any.
    ///
    /// Unreadable entries are reported as absent.
    fn load_key_id(&self) -> Option<String>;

    /// Stores `key_id`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn save_key_id(&self, key_id: String) -> AppAttestResult<()>;

    /// Removes the stored key id. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value cannot be removed.
    fn clear_key_id(&self) -> AppAttestResult<()>;
}

/// Atomic blob store for small binary files, provided by the host platform.
#[uniffi::export(with_foreign)]
pub trait AtomicBlobStore: Send + Sync {
    /// Reads the blob at `path`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read(&self, path: String) -> AppAttestResult<Option<Vec<u8>>>;

    /// Writes bytes atomically to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, path: String, bytes: Vec<u8>) -> AppAttestResult<()>;

    /// Deletes the blob at `path`. Deleting a missing blob succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, path: String) -> AppAttestResult<()>;
}

/// Key id store keeping the value in process memory.
///
/// Nothing survives a restart, so every launch re-enrolls. Intended for tests and
/// for hosts that deliberately want per-session keys.
#[derive(Debug, Default)]
pub struct InMemoryKeyIdStore {
    key_id: Mutex<Option<String>>,
}

impl InMemoryKeyIdStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `key_id`.
    #[must_use]
    pub const fn with_key_id(key_id: String) -> Self {
        Self {
            key_id: Mutex::new(Some(key_id)),
        }
    }
}

impl KeyIdStore for InMemoryKeyIdStore {
    fn load_key_id(&self) -> Option<String> {
        self.key_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save_key_id(&self, key_id: String) -> AppAttestResult<()> {
        *self.key_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(key_id);
        Ok(())
    }

    fn clear_key_id(&self) -> AppAttestResult<()> {
        self.key_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// Key id store persisting the value through the host's [`AtomicBlobStore`].
///
/// The `service`/`account` pair addresses the entry, so several independent
/// enrollments can share one blob store.
pub struct BlobKeyIdStore {
    blob_store: Arc<dyn AtomicBlobStore>,
    path: String,
}

impl BlobKeyIdStore {
    /// Creates a store for the given `service`/`account` pair.
    #[must_use]
    pub fn new(blob_store: Arc<dyn AtomicBlobStore>, service: &str, account: &str) -> Self {
        Self {
            blob_store,
            path: format!("{service}/{account}.keyid"),
        }
    }

    /// Path of the blob holding the key id.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl KeyIdStore for BlobKeyIdStore {
    fn load_key_id(&self) -> Option<String> {
        let bytes = match self.blob_store.read(self.path.clone()) {
            Ok(bytes) => bytes?,
            Err(e) => {
                log::warn!("[KeyIdStore] failed to read {}: {e}", self.path);
                return None;
            }
        };

        match String::from_utf8(bytes) {
            Ok(key_id) if !key_id.is_empty() => Some(key_id),
            Ok(_) => None,
            Err(_) => {
                log::warn!("[KeyIdStore] ignoring non UTF-8 entry at {}", self.path);
                None
            }
        }
    }

    fn save_key_id(&self, key_id: String) -> AppAttestResult<()> {
        self.blob_store
            .write_atomic(self.path.clone(), key_id.into_bytes())
            .map_err(into_storage_error)
    }

    fn clear_key_id(&self) -> AppAttestResult<()> {
        self.blob_store
            .delete(self.path.clone())
            .map_err(into_storage_error)
    }
}

fn into_storage_error(error: AppAttestError) -> AppAttestError {
    match error {
        AppAttestError::StorageError { .. } => error,
        other => AppAttestError::StorageError {
            error: other.to_string(),
        },
    }
}

/// Creates a key id store kept in process memory.
#[uniffi::export]
#[must_use]
pub fn in_memory_key_id_store() -> Arc<dyn KeyIdStore> {
    Arc::new(InMemoryKeyIdStore::new())
}

/// Creates a key id store backed by the host's blob store.
///
/// When absent, `service` and `account` fall back to [`DEFAULT_KEY_ID_SERVICE`] and
/// [`DEFAULT_KEY_ID_ACCOUNT`].
#[uniffi::export]
#[must_use]
pub fn blob_key_id_store(
    blob_store: Arc<dyn AtomicBlobStore>,
    service: Option<String>,
    account: Option<String>,
) -> Arc<dyn KeyIdStore> {
    Arc::new(BlobKeyIdStore::new(
        blob_store,
        service.as_deref().unwrap_or(DEFAULT_KEY_ID_SERVICE),
        account.as_deref().unwrap_or(DEFAULT_KEY_ID_ACCOUNT),
    ))
}
