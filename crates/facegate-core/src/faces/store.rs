use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

#[cfg(unix)]
use nix::fcntl::{Flock, FlockArg};

use crate::errors::{AppError, AppResult};
use crate::faces::embedding::EmbeddingVector;

pub const STORE_VERSION: u32 = 1;
pub const STORE_KEY_LEN: usize = 32;
const SEALED_ALGORITHM: &str = "AES-256-GCM";
const SEALED_NONCE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub identity_id: String,
    pub display_name: String,
    pub embedding: EmbeddingVector,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub identity_id: String,
    pub display_name: String,
}

impl From<&EnrollmentRecord> for IdentitySummary {
    fn from(record: &EnrollmentRecord) -> Self {
        Self {
            identity_id: record.identity_id.clone(),
            display_name: record.display_name.clone(),
        }
    }
}

/// Records keyed by identity id. Iteration order is the key order.
pub type EnrollmentMap = BTreeMap<String, EnrollmentRecord>;

/// The full persisted unit: every record plus the store's fixed dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub version: u32,
    pub dimension: Option<usize>,
    pub records: EnrollmentMap,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            dimension: None,
            records: EnrollmentMap::new(),
        }
    }
}

/// Durable backing for an [`EnrollmentStore`].
///
/// `load` on a store that was never written returns an empty document.
/// `save` replaces the whole document atomically; `delete` is idempotent.
pub trait FaceStore: Send + Sync {
    fn load(&self) -> AppResult<StoreDocument>;
    fn save(&self, document: &StoreDocument) -> AppResult<()>;
    fn delete(&self) -> AppResult<()>;

    /// Excludes other processes for the span of one load-modify-save cycle.
    /// Backends with nothing shared across processes keep the default.
    fn lock_exclusive(&self) -> AppResult<StoreLock> {
        Ok(StoreLock::default())
    }
}

/// Held advisory lock; released on drop.
#[derive(Default)]
pub struct StoreLock {
    #[cfg(unix)]
    _file: Option<Flock<fs::File>>,
}

/// AES-256-GCM key used to seal the store at rest.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreKey([u8; STORE_KEY_LEN]);

impl StoreKey {
    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        let key: [u8; STORE_KEY_LEN] = bytes.try_into().map_err(|_| {
            AppError::Encryption(format!(
                "store key must be {STORE_KEY_LEN} bytes, found {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    pub fn from_base64(encoded: &str) -> AppResult<Self> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|err| AppError::Encryption(format!("invalid store key encoding: {err}")))?;
        Self::from_bytes(&bytes)
    }

    /// Reads a base64-encoded key from `path`.
    pub fn read_from(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| AppError::StoreRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_base64(&contents)
    }

    pub fn generate() -> Self {
        let mut key = [0u8; STORE_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(<redacted>)")
    }
}

/// Single JSON file, optionally sealed with a [`StoreKey`].
#[derive(Debug, Clone)]
pub struct FilesystemFaceStore {
    path: PathBuf,
    key: Option<StoreKey>,
}

impl FilesystemFaceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: None,
        }
    }

    pub fn with_key(path: impl Into<PathBuf>, key: Option<StoreKey>) -> Self {
        Self {
            path: path.into(),
            key,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_sealed(&self) -> bool {
        self.key.is_some()
    }

    /// Sibling file that carries the advisory lock. Never renamed, so every
    /// process locks the same inode.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn ensure_parent(&self) -> AppResult<&Path> {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|source| AppError::StoreWrite {
            path: parent.to_path_buf(),
            source,
        })?;
        Ok(parent)
    }

    /// Writes and syncs the document to a temporary file next to the store.
    /// Nothing is visible to readers until [`StagedWrite::commit`].
    pub(crate) fn stage(&self, document: &StoreDocument) -> AppResult<StagedWrite> {
        let parent = self.ensure_parent()?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(|source| self.write_error(source))?;
        let serialized = match &self.key {
            Some(key) => seal_document(document, key)?,
            None => serde_json::to_vec_pretty(document)?,
        };

        {
            let file = tmp.as_file_mut();
            {
                let mut writer = BufWriter::new(&mut *file);
                writer
                    .write_all(&serialized)
                    .and_then(|_| writer.write_all(b"\n"))
                    .and_then(|_| writer.flush())
                    .map_err(|source| self.write_error(source))?;
            }
            restrict_permissions(file).map_err(|source| self.write_error(source))?;
            file.sync_all().map_err(|source| self.write_error(source))?;
        }

        Ok(StagedWrite {
            tmp,
            target: self.path.clone(),
        })
    }

    fn write_error(&self, source: io::Error) -> AppError {
        AppError::StoreWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl FaceStore for FilesystemFaceStore {
    fn load(&self) -> AppResult<StoreDocument> {
        read_store_document(&self.path, self.key.as_ref())
    }

    fn save(&self, document: &StoreDocument) -> AppResult<()> {
        self.stage(document)?.commit()
    }

    fn delete(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed enrollment store");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.write_error(source)),
        }
    }

    #[cfg(unix)]
    fn lock_exclusive(&self) -> AppResult<StoreLock> {
        self.ensure_parent()?;
        let lock_path = self.lock_path();
        let lock_error = |source: io::Error| AppError::StoreWrite {
            path: lock_path.clone(),
            source,
        };
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(lock_error)?;
        restrict_permissions(&file).map_err(lock_error)?;
        let held = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| lock_error(io::Error::from(errno)))?;
        Ok(StoreLock { _file: Some(held) })
    }
}

/// A fully written temporary file awaiting its atomic rename over the store.
pub(crate) struct StagedWrite {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub(crate) fn commit(self) -> AppResult<()> {
        let target = self.target;
        self.tmp
            .persist(&target)
            .map_err(|err| AppError::StoreWrite {
                path: target.clone(),
                source: err.error,
            })?;
        debug!(path = %target.display(), "committed enrollment store");
        Ok(())
    }

    /// Leaves the temporary file on disk without committing it, as a crash would.
    #[cfg(test)]
    pub(crate) fn abandon(self) -> PathBuf {
        self.tmp
            .into_temp_path()
            .keep()
            .expect("temporary file can be kept")
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = file.metadata()?.permissions();
    perms.set_mode(0o600);
    file.set_permissions(perms)
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

pub fn read_store_document(path: &Path, key: Option<&StoreKey>) -> AppResult<StoreDocument> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "enrollment store absent; treating as empty");
            return Ok(StoreDocument::default());
        }
        Err(source) => {
            return Err(AppError::StoreRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let document = if let Ok(sealed) = serde_json::from_slice::<SealedStore>(&data) {
        open_sealed_store(path, sealed, key)?
    } else {
        serde_json::from_slice(&data).map_err(|err| AppError::InvalidStoreFile {
            path: path.to_path_buf(),
            message: format!("invalid store contents: {err}"),
        })?
    };

    validate_document(path, &document)?;
    Ok(document)
}

fn validate_document(path: &Path, document: &StoreDocument) -> AppResult<()> {
    let invalid = |message: String| AppError::InvalidStoreFile {
        path: path.to_path_buf(),
        message,
    };

    if document.version != STORE_VERSION {
        return Err(invalid(format!(
            "unsupported store version {}",
            document.version
        )));
    }

    if document.records.is_empty() {
        return Ok(());
    }

    let dimension = document
        .dimension
        .ok_or_else(|| invalid("records present but dimension missing".into()))?;
    for (key, record) in &document.records {
        if key != &record.identity_id {
            return Err(invalid(format!(
                "record key '{key}' does not match identity id '{}'",
                record.identity_id
            )));
        }
        if record.embedding.dimension() != dimension {
            return Err(invalid(format!(
                "record '{key}' has {} values, store dimension is {dimension}",
                record.embedding.dimension()
            )));
        }
    }

    Ok(())
}

fn seal_document(document: &StoreDocument, key: &StoreKey) -> AppResult<Vec<u8>> {
    let plaintext = serde_json::to_vec(document)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| AppError::Encryption("invalid AES-GCM key length".into()))?;
    let mut nonce = [0u8; SEALED_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
        .map_err(|err| AppError::Encryption(format!("failed to seal enrollment store: {err}")))?;
    let sealed = SealedStore {
        version: STORE_VERSION,
        algorithm: SEALED_ALGORITHM.to_string(),
        nonce: general_purpose::STANDARD.encode(nonce),
        ciphertext: general_purpose::STANDARD.encode(ciphertext),
    };
    serde_json::to_vec_pretty(&sealed).map_err(AppError::from)
}

fn open_sealed_store(
    path: &Path,
    sealed: SealedStore,
    key: Option<&StoreKey>,
) -> AppResult<StoreDocument> {
    if sealed.algorithm != SEALED_ALGORITHM {
        return Err(AppError::Encryption(format!(
            "unsupported store algorithm '{}'",
            sealed.algorithm
        )));
    }
    if sealed.version != STORE_VERSION {
        return Err(AppError::Encryption(format!(
            "unsupported sealed store version {}",
            sealed.version
        )));
    }

    let key = key.ok_or_else(|| AppError::EncryptedStoreRequiresKey {
        path: path.to_path_buf(),
    })?;

    let nonce = general_purpose::STANDARD
        .decode(sealed.nonce.trim())
        .map_err(|err| AppError::Encryption(format!("invalid nonce encoding: {err}")))?;
    if nonce.len() != SEALED_NONCE_LEN {
        return Err(AppError::Encryption(format!(
            "expected nonce of {SEALED_NONCE_LEN} bytes but found {}",
            nonce.len()
        )));
    }
    let ciphertext = general_purpose::STANDARD
        .decode(sealed.ciphertext.trim())
        .map_err(|err| AppError::Encryption(format!("invalid ciphertext encoding: {err}")))?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| AppError::Encryption("invalid AES-GCM key length".into()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|err| AppError::Encryption(format!("failed to open enrollment store: {err}")))?;

    serde_json::from_slice(&plaintext).map_err(|err| AppError::InvalidStoreFile {
        path: path.to_path_buf(),
        message: format!("invalid sealed store contents: {err}"),
    })
}

#[derive(Serialize, Deserialize)]
struct SealedStore {
    version: u32,
    algorithm: String,
    nonce: String,
    ciphertext: String,
}

/// Identity records over a [`FaceStore`] backend.
///
/// Mutations hold the write lock, plus the backend's cross-process lock, for
/// the whole load-modify-save cycle, so concurrent writers never interleave. Readers hold the read lock while
/// taking their snapshot and never see a half-applied write.
pub struct EnrollmentStore<S = FilesystemFaceStore> {
    backend: S,
    dimension: Option<usize>,
    lock: RwLock<()>,
}

impl EnrollmentStore<FilesystemFaceStore> {
    pub fn open(path: impl Into<PathBuf>, key: Option<StoreKey>) -> Self {
        Self::new(FilesystemFaceStore::with_key(path, key))
    }
}

impl<S: FaceStore> EnrollmentStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            dimension: None,
            lock: RwLock::new(()),
        }
    }

    /// Pins the embedding dimensionality instead of inferring it from the first record.
    pub fn with_dimension(mut self, dimension: Option<usize>) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn load(&self) -> AppResult<EnrollmentMap> {
        Ok(self.snapshot()?.records)
    }

    /// Reads the current document under the read lock.
    pub fn snapshot(&self) -> AppResult<StoreDocument> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.read_checked()
    }

    pub fn configured_dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn dimension(&self) -> AppResult<Option<usize>> {
        if self.dimension.is_some() {
            return Ok(self.dimension);
        }
        Ok(self.snapshot()?.dimension)
    }

    pub fn put(
        &self,
        identity_id: &str,
        display_name: &str,
        embedding: &EmbeddingVector,
    ) -> AppResult<EnrollmentRecord> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = self.backend.lock_exclusive()?;
        let mut document = self.read_checked()?;
        let record = self.insert_record(&mut document, identity_id, display_name, embedding)?;
        self.backend.save(&document)?;
        Ok(record)
    }

    fn insert_record(
        &self,
        document: &mut StoreDocument,
        identity_id: &str,
        display_name: &str,
        embedding: &EmbeddingVector,
    ) -> AppResult<EnrollmentRecord> {
        let dimension = self
            .dimension
            .or(document.dimension)
            .unwrap_or(embedding.dimension());
        embedding.ensure_dimension(dimension)?;

        let record = EnrollmentRecord {
            identity_id: identity_id.to_string(),
            display_name: display_name.to_string(),
            embedding: embedding.normalized()?,
            created_at: Utc::now(),
        };
        let replaced = document
            .records
            .insert(record.identity_id.clone(), record.clone())
            .is_some();
        document.dimension = Some(dimension);
        debug!(
            identity_id,
            replaced,
            records = document.records.len(),
            "stored enrollment record"
        );
        Ok(record)
    }

    pub fn remove(&self, identity_id: &str) -> AppResult<bool> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = self.backend.lock_exclusive()?;
        let mut document = self.read_checked()?;
        if document.records.remove(identity_id).is_none() {
            return Ok(false);
        }
        if document.records.is_empty() {
            document.dimension = None;
        }
        self.backend.save(&document)?;
        debug!(identity_id, "removed enrollment record");
        Ok(true)
    }

    pub fn remove_all(&self) -> AppResult<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = self.backend.lock_exclusive()?;
        self.backend.delete()
    }

    pub fn list(&self) -> AppResult<Vec<IdentitySummary>> {
        Ok(self
            .load()?
            .values()
            .map(IdentitySummary::from)
            .collect())
    }

    fn read_checked(&self) -> AppResult<StoreDocument> {
        let document = self.backend.load()?;
        if let (Some(expected), Some(found)) = (self.dimension, document.dimension) {
            if !document.records.is_empty() && expected != found {
                return Err(AppError::ShapeMismatch { expected, found });
            }
        }
        Ok(document)
    }
}

#[cfg(test)]
impl EnrollmentStore<FilesystemFaceStore> {
    /// Runs `put` up to the point where the new document is staged on disk,
    /// then stops as a crash would. Returns the orphaned temporary file.
    fn put_interrupted(
        &self,
        identity_id: &str,
        display_name: &str,
        embedding: &EmbeddingVector,
    ) -> AppResult<PathBuf> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = self.backend.lock_exclusive()?;
        let mut document = self.read_checked()?;
        self.insert_record(&mut document, identity_id, display_name, embedding)?;
        Ok(self.backend.stage(&document)?.abandon())
    }
}
