//! # Overlay Store
//!
//! Keyed persistence for mined overlays.
//!
//! All access goes through an [`OverlayLease`]: acquiring one takes the
//! store's I/O lock, reads and writes happen while it is held, and the
//! lock is released when the lease drops. A staged write that was never
//! committed is flushed on drop, so no exit path loses progress silently.
//!
//! Persisted bytes that fail to decode, or that were written for a
//! different parameter tuple, are discarded with a warning and the caller
//! starts from a fresh overlay.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lithos_procedural::{Catalog, Chunk, CoverVariant};
use parking_lot::{Mutex, MutexGuard};

use crate::codec;
use crate::error::{MiningError, MiningResult};
use crate::key::OverlayKey;
use crate::overlay::MinedOverlay;

/// Extension of overlay files written by [`FileBackend`].
const OVERLAY_EXTENSION: &str = "ovl";

/// Raw byte storage behind an [`OverlayStore`].
pub trait OverlayBackend: Send + Sync {
    /// Reads the bytes stored for `key`, if any.
    ///
    /// # Errors
    ///
    /// Fails if the storage medium cannot be read.
    fn read(&self, key: &OverlayKey) -> MiningResult<Option<Vec<u8>>>;

    /// Replaces the bytes stored for `key`.
    ///
    /// # Errors
    ///
    /// Fails if the storage medium cannot be written.
    fn write(&self, key: &OverlayKey, bytes: &[u8]) -> MiningResult<()>;

    /// Deletes whatever is stored for `key`. Deleting nothing is not an error.
    ///
    /// # Errors
    ///
    /// Fails if the storage medium cannot be modified.
    fn remove(&self, key: &OverlayKey) -> MiningResult<()>;
}

/// In-process backend; contents live as long as the backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<[u8; 32], Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored overlays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl OverlayBackend for MemoryBackend {
    fn read(&self, key: &OverlayKey) -> MiningResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(&key.fingerprint()).cloned())
    }

    fn write(&self, key: &OverlayKey, bytes: &[u8]) -> MiningResult<()> {
        self.entries.lock().insert(key.fingerprint(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &OverlayKey) -> MiningResult<()> {
        self.entries.lock().remove(&key.fingerprint());
        Ok(())
    }
}

/// One file per overlay, named by the key fingerprint.
///
/// Writes go to a temporary file that is synced and then renamed over the
/// target, so a crash leaves either the old or the new overlay.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Opens (creating if needed) an overlay directory.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> MiningResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| MiningError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the overlay files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `key`.
    #[must_use]
    pub fn path_for(&self, key: &OverlayKey) -> PathBuf {
        self.dir.join(format!("{}.{OVERLAY_EXTENSION}", key.hex()))
    }
}

impl OverlayBackend for FileBackend {
    fn read(&self, key: &OverlayKey) -> MiningResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MiningError::Io { path, source }),
        }
    }

    fn write(&self, key: &OverlayKey, bytes: &[u8]) -> MiningResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{OVERLAY_EXTENSION}.tmp"));
        let io = |source| MiningError::Io {
            path: tmp.clone(),
            source,
        };

        let mut file = fs::File::create(&tmp).map_err(io)?;
        file.write_all(bytes).map_err(io)?;
        file.sync_all().map_err(io)?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|source| MiningError::Io { path, source })
    }

    fn remove(&self, key: &OverlayKey) -> MiningResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MiningError::Io { path, source }),
        }
    }
}

/// Leased access to persisted overlays.
pub struct OverlayStore {
    backend: Box<dyn OverlayBackend>,
    catalog: Arc<Catalog>,
    /// Held for the lifetime of each lease.
    io: Mutex<()>,
}

impl OverlayStore {
    /// Creates a store over any backend.
    ///
    /// `catalog` validates restored overlays.
    #[must_use]
    pub fn new(backend: impl OverlayBackend + 'static, catalog: Arc<Catalog>) -> Self {
        Self {
            backend: Box::new(backend),
            catalog,
            io: Mutex::new(()),
        }
    }

    /// Store backed by process memory.
    #[must_use]
    pub fn in_memory(catalog: Arc<Catalog>) -> Self {
        Self::new(MemoryBackend::new(), catalog)
    }

    /// Store backed by one file per overlay under `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn on_disk(dir: impl Into<PathBuf>, catalog: Arc<Catalog>) -> MiningResult<Self> {
        Ok(Self::new(FileBackend::new(dir)?, catalog))
    }

    /// Acquires exclusive access to the overlay stored under `key`.
    ///
    /// Blocks while another lease is live.
    pub fn lease(&self, key: &OverlayKey) -> OverlayLease<'_> {
        OverlayLease {
            store: self,
            key: key.clone(),
            fingerprint: key.fingerprint(),
            staged: None,
            _io: self.io.lock(),
        }
    }

    /// Restores the overlay for `key` or creates and persists a fresh one.
    ///
    /// `cover` is only consulted when a fresh overlay is needed.
    ///
    /// # Errors
    ///
    /// Fails only on storage I/O errors; unreadable persisted state is
    /// replaced.
    pub fn restore_or_initialize(
        &self,
        key: &OverlayKey,
        chunk: &Chunk,
        cover: impl FnOnce() -> CoverVariant,
    ) -> MiningResult<MinedOverlay> {
        let mut lease = self.lease(key);
        if let Some(overlay) = lease.load()? {
            match overlay.ensure_matches(chunk) {
                Ok(()) => {
                    tracing::info!(
                        "Restored overlay {} (frontier {}, {} revealed)",
                        key.hex(),
                        overlay.frontier(),
                        overlay.revealed_count()
                    );
                    return Ok(overlay);
                }
                Err(err) => tracing::warn!("Discarding overlay {}: {}", key.hex(), err),
            }
        }
        let overlay = MinedOverlay::initialize(chunk, cover());
        lease.stage(&overlay);
        lease.commit()?;
        Ok(overlay)
    }
}

/// Scoped access to one persisted overlay.
///
/// Holds the store's I/O lock until dropped.
pub struct OverlayLease<'s> {
    store: &'s OverlayStore,
    key: OverlayKey,
    fingerprint: [u8; 32],
    /// Encoded overlay waiting to be written.
    staged: Option<Vec<u8>>,
    _io: MutexGuard<'s, ()>,
}

impl OverlayLease<'_> {
    /// Key this lease covers.
    #[must_use]
    pub fn key(&self) -> &OverlayKey {
        &self.key
    }

    /// Reads the persisted overlay.
    ///
    /// Returns `None` when nothing usable is stored; corrupt or foreign
    /// data is removed.
    ///
    /// # Errors
    ///
    /// Fails only on storage I/O errors.
    pub fn load(&mut self) -> MiningResult<Option<MinedOverlay>> {
        let Some(bytes) = self.store.backend.read(&self.key)? else {
            return Ok(None);
        };
        let reason = match codec::decode(&bytes, &self.store.catalog) {
            Ok((fingerprint, overlay)) if fingerprint == self.fingerprint => return Ok(Some(overlay)),
            Ok(_) => MiningError::KeyMismatch,
            Err(err) => err,
        };
        tracing::warn!("Discarding persisted overlay {}: {}", self.key.hex(), reason);
        self.store.backend.remove(&self.key)?;
        Ok(None)
    }

    /// Encodes `overlay` for writing on [`commit`](Self::commit) or drop.
    pub fn stage(&mut self, overlay: &MinedOverlay) {
        self.staged = Some(codec::encode(overlay, &self.fingerprint));
    }

    /// Writes any staged overlay and releases the lease.
    ///
    /// # Errors
    ///
    /// Fails if the backend write fails; the staged bytes are dropped.
    pub fn commit(mut self) -> MiningResult<()> {
        match self.staged.take() {
            Some(bytes) => self.store.backend.write(&self.key, &bytes),
            None => Ok(()),
        }
    }

    /// Deletes the persisted overlay and anything staged.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot delete.
    pub fn discard(&mut self) -> MiningResult<()> {
        self.staged = None;
        self.store.backend.remove(&self.key)
    }
}

impl Drop for OverlayLease<'_> {
    fn drop(&mut self) {
        if let Some(bytes) = self.staged.take() {
            if let Err(err) = self.store.backend.write(&self.key, &bytes) {
                tracing::warn!("Failed to write back overlay {} on release: {}", self.key.hex(), err);
            }
        }
    }
}
