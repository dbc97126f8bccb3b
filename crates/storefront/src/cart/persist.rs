//! Cart persistence.
//!
//! The durable part of the cart is stored as a versioned JSON envelope under
//! [`STORAGE_KEY`]. Anything that fails to load is discarded with a warning
//! and the cart starts empty.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::state::PersistedCart;

/// Namespace key the cart is stored under.
pub const STORAGE_KEY: &str = "shopify-cart";

/// Current envelope version.
pub const STORAGE_VERSION: u32 = 1;

/// Errors from reading or writing persisted cart state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid persisted cart: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unsupported persisted cart version {0}")]
    UnsupportedVersion(u32),
}

/// Raw key-value storage for the serialized cart.
pub trait CartStorage: Send + Sync + 'static {
    /// Read the stored payload, `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn write(&self, payload: &str) -> Result<(), StorageError>;
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    state: T,
}

/// Serialize a cart into its storage envelope.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(cart: &PersistedCart) -> Result<String, StorageError> {
    Ok(serde_json::to_string(&Envelope {
        version: STORAGE_VERSION,
        state: cart,
    })?)
}

/// Parse a storage envelope.
///
/// # Errors
///
/// Returns an error for malformed JSON or an unknown version.
pub fn decode(payload: &str) -> Result<PersistedCart, StorageError> {
    #[derive(Deserialize)]
    struct Header {
        version: u32,
    }

    let header: Header = serde_json::from_str(payload)?;
    if header.version != STORAGE_VERSION {
        return Err(StorageError::UnsupportedVersion(header.version));
    }

    let envelope: Envelope<PersistedCart> = serde_json::from_str(payload)?;
    Ok(envelope.state)
}

/// Load the persisted cart, discarding anything unreadable.
pub fn load<S: CartStorage>(storage: &S) -> Option<PersistedCart> {
    let payload = match storage.read() {
        Ok(payload) => payload?,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted cart");
            return None;
        }
    };

    match decode(&payload) {
        Ok(cart) => Some(cart),
        Err(e) => {
            warn!(error = %e, "Discarding persisted cart");
            None
        }
    }
}

/// Write the cart through to storage. Failures are logged only.
pub fn save<S: CartStorage>(storage: &S, cart: &PersistedCart) {
    if let Err(e) = encode(cart).and_then(|payload| storage.write(&payload)) {
        warn!(error = %e, "Failed to persist cart");
    }
}

// =============================================================================
// JSON file storage
// =============================================================================

/// Stores the cart as `<dir>/shopify-cart.json`.
///
/// Writes go to a temporary file that is renamed into place, so readers never
/// see a partial payload.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// Path of the cart file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStorage for JsonFileStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, payload: &str) -> Result<(), StorageError> {
        let dir = self
            .path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let temp_path = dir.join(format!(".{STORAGE_KEY}.json.tmp-{}", std::process::id()));
        std::fs::write(&temp_path, payload)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

// =============================================================================
// In-memory storage
// =============================================================================

/// In-memory storage. Clones share the same slot, so a second store built
/// from a clone sees what the first one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-loaded with a raw payload.
    #[must_use]
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(payload.into()))),
        }
    }

    /// Current raw payload.
    #[must_use]
    pub fn payload(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CartStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.payload())
    }

    fn write(&self, payload: &str) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload.to_string());
        Ok(())
    }
}
