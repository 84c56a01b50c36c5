//! Binary collection file codec.
//!
//! File format:
//! - 8 bytes: magic "TOOLSIFT"
//! - 4 bytes: format version (u32 LE)
//! - 32 bytes: SHA256 of everything after this field
//! - 8 bytes: header length (u64 LE)
//! - N bytes: JSON header (collection header + entry texts and metadata)
//! - M bytes: embeddings (f32 LE, row-major, num_entries x embedding_dim)

use crate::error::{AppError, Result};
use crate::persistence::{EntryMetadata, IndexEntry};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Index file format version. Increment when format changes.
pub const INDEX_VERSION: u32 = 1;

/// Magic bytes to identify valid index files.
pub const INDEX_MAGIC: &[u8; 8] = b"TOOLSIFT";

pub const INDEX_EXTENSION: &str = "tsidx";

const PREAMBLE_LEN: usize = 8 + 4 + 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionHeader {
    pub collection: String,
    /// Identity of the embedding provider that produced every vector
    pub model_id: String,
    pub embedding_dim: usize,
    pub num_entries: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StoredHeader {
    header: CollectionHeader,
    entries: Vec<IndexEntry>,
}

/// One fully materialized collection: header, entries and their vectors.
///
/// Rows of `embeddings` are L2-normalised at construction, so a dot product
/// with a normalised query is cosine similarity.
#[derive(Debug, Clone)]
pub struct IndexedCollection {
    pub header: CollectionHeader,
    pub entries: Vec<IndexEntry>,
    pub embeddings: Array2<f32>,
}

impl IndexedCollection {
    pub fn new(
        collection: &str,
        model_id: &str,
        embedding_dim: usize,
        entries: Vec<(String, EntryMetadata)>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if entries.len() != vectors.len() {
            return Err(AppError::ModelError(format!(
                "Provider returned {} embeddings for {} texts",
                vectors.len(),
                entries.len()
            )));
        }

        let mut data = Vec::with_capacity(entries.len() * embedding_dim);
        for mut vector in vectors {
            if vector.len() != embedding_dim {
                return Err(AppError::ModelError(format!(
                    "Embedding has {} dimensions, expected {}",
                    vector.len(),
                    embedding_dim
                )));
            }
            normalize(&mut vector);
            data.extend(vector);
        }

        let embeddings = Array2::from_shape_vec((entries.len(), embedding_dim), data)
            .map_err(|e| AppError::ModelError(format!("Failed to shape embeddings: {}", e)))?;

        let entries: Vec<IndexEntry> = entries
            .into_iter()
            .map(|(text, metadata)| IndexEntry { text, metadata })
            .collect();

        Ok(Self {
            header: CollectionHeader {
                collection: collection.to_string(),
                model_id: model_id.to_string(),
                embedding_dim,
                num_entries: entries.len(),
                created_at: Utc::now(),
            },
            entries,
            embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cosine similarity of `query` against every entry, in insertion order.
    pub fn scores(&self, query: &[f32]) -> Vec<f32> {
        let mut query = query.to_vec();
        normalize(&mut query);
        self.embeddings.dot(&Array1::from_vec(query)).to_vec()
    }

    /// Serialize to bytes in the index file format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let stored = StoredHeader {
            header: self.header.clone(),
            entries: self.entries.clone(),
        };
        let header_json = serde_json::to_vec(&stored)
            .map_err(|e| AppError::IndexCorrupt(format!("Failed to serialize header: {}", e)))?;

        let data = self.embeddings.as_slice().ok_or_else(|| {
            AppError::IndexCorrupt("Embeddings array not contiguous".to_string())
        })?;

        let mut payload = Vec::with_capacity(8 + header_json.len() + data.len() * 4);
        payload.extend_from_slice(&(header_json.len() as u64).to_le_bytes());
        payload.extend_from_slice(&header_json);
        for &val in data {
            payload.extend_from_slice(&val.to_le_bytes());
        }

        let checksum: [u8; 32] = Sha256::digest(&payload).into();

        let mut bytes = Vec::with_capacity(PREAMBLE_LEN + payload.len());
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&checksum);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Parse bytes in the index file format, verifying every structural field.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PREAMBLE_LEN + 8 {
            return Err(AppError::IndexCorrupt("File is truncated".to_string()));
        }

        if &bytes[..8] != INDEX_MAGIC {
            return Err(AppError::IndexCorrupt("Invalid magic bytes".to_string()));
        }

        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if version != INDEX_VERSION {
            return Err(AppError::IndexCorrupt(format!(
                "Unsupported format version {} (expected {})",
                version, INDEX_VERSION
            )));
        }

        let payload = &bytes[PREAMBLE_LEN..];
        let checksum: [u8; 32] = Sha256::digest(payload).into();
        if checksum[..] != bytes[12..PREAMBLE_LEN] {
            return Err(AppError::IndexCorrupt("Checksum mismatch".to_string()));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&payload[..8]);
        let header_len = u64::from_le_bytes(len_bytes) as usize;
        let body = &payload[8..];
        if header_len > body.len() {
            return Err(AppError::IndexCorrupt(
                "Header length exceeds file size".to_string(),
            ));
        }

        let stored: StoredHeader = serde_json::from_slice(&body[..header_len])
            .map_err(|e| AppError::IndexCorrupt(format!("Unreadable header: {}", e)))?;
        let header = stored.header;

        if header.num_entries != stored.entries.len() {
            return Err(AppError::IndexCorrupt(format!(
                "Header declares {} entries but lists {}",
                header.num_entries,
                stored.entries.len()
            )));
        }

        let vector_bytes = &body[header_len..];
        let expected = header
            .num_entries
            .checked_mul(header.embedding_dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| AppError::IndexCorrupt("Embedding size overflows".to_string()))?;
        if vector_bytes.len() != expected {
            return Err(AppError::IndexCorrupt(format!(
                "Expected {} bytes of embeddings, found {}",
                expected,
                vector_bytes.len()
            )));
        }

        let data: Vec<f32> = vector_bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let embeddings = Array2::from_shape_vec((header.num_entries, header.embedding_dim), data)
            .map_err(|e| AppError::IndexCorrupt(format!("Failed to reshape embeddings: {}", e)))?;

        Ok(Self {
            header,
            entries: stored.entries,
            embeddings,
        })
    }

    /// Write to `path` atomically: a uniquely named temp file in the same
    /// directory is written, synced, then renamed over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.encode()?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let write_result = (|| -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            writer.write_all(&bytes)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        })();

        if let Err(e) = write_result.and_then(|_| fs::rename(&tmp_path, path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::info!(
            path = %path.display(),
            num_entries = self.header.num_entries,
            embedding_dim = self.header.embedding_dim,
            size_bytes = bytes.len(),
            "Collection saved"
        );

        Ok(())
    }

    /// Read from `path`. Returns None if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Collection file does not exist");
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::IndexCorrupt(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let collection = Self::decode(&bytes)?;

        tracing::info!(
            path = %path.display(),
            collection = %collection.header.collection,
            model_id = %collection.header.model_id,
            num_entries = collection.header.num_entries,
            "Collection loaded"
        );

        Ok(Some(collection))
    }
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}
