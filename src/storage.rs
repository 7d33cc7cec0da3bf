//! Key-value blob storage behind a narrow get/put interface, plus the two
//! stores built on it: per-tile references and shareable save rooms.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;
use tracing::info;

/// Alphabet for room codes; no 0/O or 1/I so codes survive being read aloud.
pub const ROOM_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;
pub const DEFAULT_MAX_BLOB_BYTES: usize = 512 * 1024;
const ROOM_CODE_ATTEMPTS: usize = 16;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error("blob of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("could not find a free room code after {0} attempts")]
    CodesExhausted(usize),
    #[error("room `{0}` does not exist")]
    UnknownRoom(String),
    #[error("stored value under `{0}` is not valid UTF-8")]
    NotText(String),
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
}

pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&mut self, key: &str, blob: &[u8]) -> Result<(), StorageError>;

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        check_key(key)?;
        Ok(self.blobs.get(key).cloned())
    }

    fn put(&mut self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        check_key(key)?;
        self.blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}

/// One file per key under `root`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_key(key)?;
        Ok(self.root.join(format!("{key}.blob")))
    }
}

impl BlobStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(path) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&mut self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::write(path, blob)?;
        Ok(())
    }
}

/// Asset references keyed by tile coordinate.
pub struct TileStore<S> {
    inner: S,
}

impl<S: BlobStore> TileStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn key(x: i32, y: i32) -> String {
        format!("tile_{x}_{y}").replace('-', "m")
    }

    pub fn get(&self, x: i32, y: i32) -> Result<Option<String>, StorageError> {
        let key = Self::key(x, y);
        match self.inner.get(&key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::NotText(key)),
            None => Ok(None),
        }
    }

    pub fn put(&mut self, x: i32, y: i32, reference: &str) -> Result<(), StorageError> {
        self.inner.put(&Self::key(x, y), reference.as_bytes())
    }
}

/// Saved games shared under short room codes.
pub struct RoomStore<S> {
    inner: S,
    max_blob_bytes: usize,
}

impl<S: BlobStore> RoomStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_BLOB_BYTES)
    }

    pub fn with_limit(inner: S, max_blob_bytes: usize) -> Self {
        Self {
            inner,
            max_blob_bytes,
        }
    }

    pub fn max_blob_bytes(&self) -> usize {
        self.max_blob_bytes
    }

    /// Store `blob` under a fresh room code and return the code.
    pub fn create<R: Rng>(&mut self, blob: &[u8], rng: &mut R) -> Result<String, StorageError> {
        self.check_size(blob)?;
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let code = generate_code(rng);
            if self.inner.contains(&room_key(&code))? {
                continue;
            }
            self.inner.put(&room_key(&code), blob)?;
            info!(room = %code, bytes = blob.len(), "room created");
            return Ok(code);
        }
        Err(StorageError::CodesExhausted(ROOM_CODE_ATTEMPTS))
    }

    /// Overwrite an existing room.
    pub fn save(&mut self, code: &str, blob: &[u8]) -> Result<(), StorageError> {
        self.check_size(blob)?;
        let key = room_key(&normalize_code(code)?);
        if !self.inner.contains(&key)? {
            return Err(StorageError::UnknownRoom(code.to_string()));
        }
        self.inner.put(&key, blob)
    }

    pub fn load(&self, code: &str) -> Result<Vec<u8>, StorageError> {
        let key = room_key(&normalize_code(code)?);
        self.inner
            .get(&key)?
            .ok_or_else(|| StorageError::UnknownRoom(code.to_string()))
    }

    fn check_size(&self, blob: &[u8]) -> Result<(), StorageError> {
        if blob.len() > self.max_blob_bytes {
            return Err(StorageError::TooLarge {
                size: blob.len(),
                max: self.max_blob_bytes,
            });
        }
        Ok(())
    }
}

fn room_key(code: &str) -> String {
    format!("room_{code}")
}

pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_ALPHABET[rng.gen_range(0..ROOM_ALPHABET.len())] as char)
        .collect()
}

/// Upper-case and check a user-typed room code.
pub fn normalize_code(code: &str) -> Result<String, StorageError> {
    let code = code.trim().to_ascii_uppercase();
    let valid = code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_ALPHABET.contains(&b));
    if valid {
        Ok(code)
    } else {
        Err(StorageError::InvalidKey(code))
    }
}
