//! Compressed binary cache for parsed latency matrices.
//!
//! Parsing a full pairwise dataset is the slowest part of start-up, so the
//! parsed matrix can be stored as zstd-compressed bincode and reloaded.
//! Every cache carries the [`CacheKey`] it was built from; a cache whose key
//! differs from the one requested is stale and must be rebuilt.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::matrix::{IndexBase, LatencyError, LatencyMatrix};

const COMPRESSION_LEVEL: i32 = 3;

fn io_error(path: &Path, source: std::io::Error) -> LatencyError {
    LatencyError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Parse parameters and dataset fingerprint a cached matrix was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    pub size: usize,
    pub index_base: IndexBase,
    pub threshold: f64,
    /// Dataset length in bytes
    pub dataset_len: u64,
    /// Dataset modification time since the epoch, when the platform has one
    pub dataset_modified: Option<Duration>,
}

impl CacheKey {
    /// Fingerprint `dataset` as it is on disk now.
    pub fn for_dataset(
        dataset: &Path,
        size: usize,
        index_base: IndexBase,
        threshold: f64,
    ) -> Result<Self, LatencyError> {
        let metadata = std::fs::metadata(dataset).map_err(|e| io_error(dataset, e))?;
        let dataset_modified = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok());

        Ok(Self {
            size,
            index_base,
            threshold,
            dataset_len: metadata.len(),
            dataset_modified,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    key: CacheKey,
    matrix: LatencyMatrix,
}

/// Write `matrix` and the key it was parsed with to `path`.
pub fn save_cache(key: &CacheKey, matrix: &LatencyMatrix, path: &Path) -> Result<(), LatencyError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL)
        .map_err(|e| io_error(path, e))?;
    let entry = CacheFile {
        key: key.clone(),
        matrix: matrix.clone(),
    };
    bincode::serialize_into(&mut encoder, &entry)
        .map_err(|e| LatencyError::Cache(e.to_string()))?;
    encoder.finish().map_err(|e| io_error(path, e))?;

    log::info!("Cached {}x{} latency matrix to {}", matrix.size(), matrix.size(), path.display());
    Ok(())
}

/// Read a cache previously written by [`save_cache`], returning its key and
/// matrix. A matrix whose shape does not match its declared size is rejected.
pub fn load_cache(path: &Path) -> Result<(CacheKey, LatencyMatrix), LatencyError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let decoder = zstd::stream::read::Decoder::new(BufReader::new(file))
        .map_err(|e| io_error(path, e))?;
    let entry: CacheFile =
        bincode::deserialize_from(decoder).map_err(|e| LatencyError::Cache(e.to_string()))?;
    entry.matrix.check_shape()?;

    log::debug!(
        "Loaded cached latency matrix of size {} from {}",
        entry.matrix.size(),
        path.display()
    );
    Ok((entry.key, entry.matrix))
}

/// Load the cache at `path` if it was built with `expected`; `None` when the
/// cache is stale.
pub fn load_matching_cache(
    path: &Path,
    expected: &CacheKey,
) -> Result<Option<LatencyMatrix>, LatencyError> {
    let (key, matrix) = load_cache(path)?;
    if &key != expected {
        log::warn!(
            "Latency cache {} was built with {:?}, expected {:?}; rebuilding",
            path.display(),
            key,
            expected
        );
        return Ok(None);
    }
    Ok(Some(matrix))
}
