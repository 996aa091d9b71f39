//! Content-addressed blob storage with compression and cross-revision dedup

use crate::error::Error;
use crate::hash::{hash_bytes, ContentHash};
use anyhow::Result;
use dashmap::DashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Blob header format (version 1)
///
/// Layout: magic "SOSB" (4), flags (1), orig_len u64 LE (8),
/// stored_len u64 LE (8) - 21 bytes, payload follows.
#[derive(Debug, Clone)]
struct BlobHeader {
    flags: u8,
    orig_len: u64,
    stored_len: u64,
}

impl BlobHeader {
    const MAGIC: [u8; 4] = *b"SOSB";
    const LEN: usize = 21;
    const FLAG_COMPRESSED: u8 = 0b0000_0001;

    fn new(orig_len: u64, stored_len: u64, compressed: bool) -> Self {
        let flags = if compressed { Self::FLAG_COMPRESSED } else { 0 };
        Self {
            flags,
            orig_len,
            stored_len,
        }
    }

    fn is_compressed(&self) -> bool {
        (self.flags & Self::FLAG_COMPRESSED) != 0
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::LEN);
        bytes.extend_from_slice(&Self::MAGIC);
        bytes.push(self.flags);
        bytes.extend_from_slice(&self.orig_len.to_le_bytes());
        bytes.extend_from_slice(&self.stored_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < Self::LEN {
            return Err(format!(
                "header too short: expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ));
        }
        if bytes[0..4] != Self::MAGIC {
            return Err(format!("bad magic bytes {:?}", &bytes[0..4]));
        }
        let flags = bytes[4];
        let orig_len = u64::from_le_bytes(bytes[5..13].try_into().unwrap());
        let stored_len = u64::from_le_bytes(bytes[13..21].try_into().unwrap());
        Ok(Self {
            flags,
            orig_len,
            stored_len,
        })
    }
}

/// Encode a blob (header + optionally compressed payload)
fn encode_blob(data: &[u8], compress: bool) -> Vec<u8> {
    let orig_len = data.len() as u64;

    // Compression only pays off above a few KB, and only when it shrinks.
    let (stored, compressed) = if compress && data.len() > 4096 {
        match zstd::encode_all(data, 3) {
            Ok(encoded) if encoded.len() < data.len() => (encoded, true),
            _ => (data.to_vec(), false),
        }
    } else {
        (data.to_vec(), false)
    };

    let header = BlobHeader::new(orig_len, stored.len() as u64, compressed);
    let mut out = header.to_bytes();
    out.extend_from_slice(&stored);
    out
}

/// Decode a blob file back to its original bytes
fn decode_blob(serialized: &[u8], hash: &ContentHash) -> Result<Vec<u8>> {
    let corrupt = |reason: String| Error::CorruptBlob {
        hash: hash.to_hex(),
        reason,
    };

    let header = BlobHeader::from_bytes(serialized).map_err(corrupt)?;

    let data_start = BlobHeader::LEN;
    let data_end = data_start + header.stored_len as usize;
    if serialized.len() < data_end {
        return Err(corrupt(format!(
            "truncated payload: expected {} bytes, got {}",
            data_end,
            serialized.len()
        ))
        .into());
    }
    let stored = &serialized[data_start..data_end];

    let data = if header.is_compressed() {
        let decompressed =
            zstd::decode_all(stored).map_err(|e| corrupt(format!("decompression failed: {e}")))?;
        if decompressed.len() != header.orig_len as usize {
            return Err(corrupt(format!(
                "decompressed size mismatch: expected {}, got {}",
                header.orig_len,
                decompressed.len()
            ))
            .into());
        }
        decompressed
    } else {
        stored.to_vec()
    };

    // Verify digest so silent disk corruption is caught on read.
    let actual = hash_bytes(&data);
    if actual != *hash {
        return Err(corrupt(format!("digest mismatch: stored content hashes to {actual}")).into());
    }

    Ok(data)
}

/// Content-addressed blob store over an ordered chain of revision folders.
///
/// `folders[0]` is the writable head (the commit folder being built); the
/// rest are the read-only history, nearest first: the current branch's
/// earlier revisions, then the parent branch's folders from its fork
/// revision down, recursively. Blob files are named by their hex hash.
///
/// Identical content is stored once: `put` is a no-op when the hash is
/// already present anywhere on the chain.
pub struct ContentStore {
    folders: Vec<PathBuf>,
    compress: bool,
    /// hash -> folder that holds it (lookup cache)
    locations: DashMap<ContentHash, PathBuf>,
}

impl ContentStore {
    /// Open a store over a folder chain. `folders[0]` receives new blobs.
    pub fn open(folders: Vec<PathBuf>, compress: bool) -> Self {
        debug_assert!(!folders.is_empty());
        Self {
            folders,
            compress,
            locations: DashMap::new(),
        }
    }

    /// Store `data`, returning its content hash.
    ///
    /// Idempotent: a second call with identical bytes writes nothing.
    pub fn put(&self, data: &[u8]) -> Result<ContentHash> {
        let hash = hash_bytes(data);
        if self.find(&hash).is_some() {
            return Ok(hash);
        }

        let head = &self.folders[0];
        fs::create_dir_all(head).map_err(|e| Error::io(head, e))?;

        let final_path = head.join(hash.to_hex());
        let tmp_path = head.join(format!(".tmp-{}", hash.to_hex()));
        let serialized = encode_blob(data, self.compress);

        // Atomic write pattern: write to temp, fsync, rename.
        let mut tmp = fs::File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
        tmp.write_all(&serialized)
            .map_err(|e| Error::io(&tmp_path, e))?;
        tmp.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
        drop(tmp);
        fs::rename(&tmp_path, &final_path).map_err(|e| Error::io(&final_path, e))?;

        self.locations.insert(hash, head.clone());
        Ok(hash)
    }

    /// Read and decode the blob for `hash`, searching the chain.
    pub fn get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let path = self
            .find(hash)
            .ok_or_else(|| Error::NotFound(hash.to_hex()))?;

        let serialized = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        decode_blob(&serialized, hash)
    }

    /// Check if `hash` is present anywhere on the chain
    pub fn exists(&self, hash: &ContentHash) -> bool {
        self.find(hash).is_some()
    }

    fn find(&self, hash: &ContentHash) -> Option<PathBuf> {
        if let Some(folder) = self.locations.get(hash) {
            return Some(folder.join(hash.to_hex()));
        }
        let name = hash.to_hex();
        for folder in &self.folders {
            let candidate = folder.join(&name);
            if candidate.exists() {
                self.locations.insert(*hash, folder.clone());
                return Some(candidate);
            }
        }
        None
    }
}

/// List the blob hashes physically stored in one revision folder
pub fn blobs_in_folder(folder: &Path) -> Result<Vec<ContentHash>> {
    let mut hashes = Vec::new();
    let entries = fs::read_dir(folder).map_err(|e| Error::io(folder, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(folder, e))?;
        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if let Ok(hash) = ContentHash::from_hex(name) {
                hashes.push(hash);
            }
        }
    }
    Ok(hashes)
}
