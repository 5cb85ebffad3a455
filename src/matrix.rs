//! Matrix Store (C1)
//!
//! Loads dense `f64` matrices and vectors from textual CSV, maintaining a
//! binary side-cache keyed by source path so that later requests skip the
//! textual parse entirely (§4.1). The cache is process-wide state, published
//! once and shared read-only across jobs — the same "publish-once map, hot
//! reads, rare writes" shape the teacher crate uses for its SRS
//! (`static SRS_INITIALIZED: OnceLock<bool>` in `tinyzkp_api.rs`), generalized
//! here to a real value cache instead of a boolean flag.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A dense, row-major matrix of doubles. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Build a matrix from row-major data, enforcing `rows * cols ==
    /// data.len()` and `rows * cols > 0` (§3 invariant).
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, AppError> {
        if rows == 0 || cols == 0 {
            return Err(AppError::Malformed("matrix has zero rows or cols".into()));
        }
        if data.len() != rows * cols {
            return Err(AppError::Malformed(format!(
                "matrix data length {} does not match {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.cols;
        &self.data[start..start + self.cols]
    }

    /// `H * v`, length `rows`. Row-major traversal of `H` (§4.4.3).
    pub fn mul(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.cols);
        let mut out = vec![0.0; self.rows];
        for i in 0..self.rows {
            let row = self.row(i);
            let mut acc = 0.0;
            for j in 0..self.cols {
                acc += row[j] * v[j];
            }
            out[i] = acc;
        }
        out
    }

    /// `Hᵀ * v`, length `cols`. Never materializes `Hᵀ` — accumulates into
    /// the output column-indexed vector while scanning `H` row by row (§4.4.3,
    /// §9 re-architecture note).
    pub fn transpose_mul(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.rows);
        let mut out = vec![0.0; self.cols];
        for i in 0..self.rows {
            let vi = v[i];
            if vi == 0.0 {
                continue;
            }
            let row = self.row(i);
            for j in 0..self.cols {
                out[j] += row[j] * vi;
            }
        }
        out
    }

    /// Dense `M * N` matrix-matrix product. Used only by the offline
    /// validator (C8); the solver's hot path never needs it.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix, AppError> {
        if self.cols != other.rows {
            return Err(AppError::DimensionMismatch(format!(
                "{}x{} * {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut data = vec![0.0; self.rows * other.cols];
        for i in 0..self.rows {
            let a_row = self.row(i);
            for k in 0..self.cols {
                let a_ik = a_row[k];
                if a_ik == 0.0 {
                    continue;
                }
                let b_row = other.row(k);
                let out_row = &mut data[i * other.cols..(i + 1) * other.cols];
                for j in 0..other.cols {
                    out_row[j] += a_ik * b_row[j];
                }
            }
        }
        Matrix::from_row_major(self.rows, other.cols, data)
    }
}

/// On-disk shape of the binary side-cache: a contiguous block of
/// little-endian doubles preceded by shape metadata (§6 binary side-cache
/// format). `bincode`'s default little-endian, fixed-width encoding gives us
/// this for free.
#[derive(Serialize, Deserialize)]
struct CachedArray {
    rows: u64,
    cols: u64,
    data: Vec<f64>,
}

const CACHE_EXT: &str = "bin";

fn sibling_cache_path(source: &Path) -> PathBuf {
    source.with_extension(CACHE_EXT)
}

fn parse_csv_rows(path: &Path, delimiter: char) -> Result<Vec<Vec<f64>>, AppError> {
    let file = File::open(path).map_err(|_| AppError::NotFound(path.display().to_string()))?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AppError::Internal(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = Vec::new();
        for tok in line.split(|c: char| c == delimiter || c == ',' || c == ';') {
            let tok = tok.trim();
            if tok.is_empty() {
                continue;
            }
            let v: f64 = tok.parse().map_err(|_| {
                AppError::Malformed(format!(
                    "linha {} de {}: token não-numérico `{}`",
                    lineno + 1,
                    path.display(),
                    tok
                ))
            })?;
            fields.push(v);
        }
        if !fields.is_empty() {
            rows.push(fields);
        }
    }
    Ok(rows)
}

fn write_cache_atomically(cache_path: &Path, arr: &CachedArray) {
    let tmp_path = cache_path.with_extension(format!("{CACHE_EXT}.tmp-{}", std::process::id()));
    let result = (|| -> std::io::Result<()> {
        let payload = bincode::serialize(arr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let mut f = File::create(&tmp_path)?;
        f.write_all(&payload)?;
        f.flush()?;
        fs::rename(&tmp_path, cache_path)?;
        Ok(())
    })();
    if let Err(e) = result {
        // I/O failure writing the cache is non-fatal (§4.1 Errors).
        tracing::warn!(path = %cache_path.display(), error = %e, "failed to write matrix side-cache");
        let _ = fs::remove_file(&tmp_path);
    }
}

fn read_cache(cache_path: &Path) -> Option<CachedArray> {
    let bytes = fs::read(cache_path).ok()?;
    bincode::deserialize(&bytes).ok()
}

/// Process-wide, publish-once cache of parsed matrices/vectors, keyed by
/// source CSV path. Reads are lock-free once an entry is published; writes
/// (first-time loads) are serialized per path so concurrent requests for the
/// same file can't corrupt the side-cache (§4.1 Concurrency, §5 Shared
/// state).
pub struct MatrixCache {
    published: RwLock<HashMap<PathBuf, Arc<Matrix>>>,
    /// One lock per in-flight first-load, so concurrent loads of *different*
    /// paths don't serialize against each other.
    inflight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl MatrixCache {
    fn new() -> Self {
        Self {
            published: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide singleton (§9 "Global state" design note).
    pub fn global() -> &'static MatrixCache {
        static CACHE: OnceLock<MatrixCache> = OnceLock::new();
        CACHE.get_or_init(MatrixCache::new)
    }

    fn path_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().unwrap();
        inflight
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load a matrix, serving from the cache when possible (§4.1 Fast path).
    /// `delimiter` is the CSV field separator for a first-time textual parse.
    pub fn load_matrix(&self, path: &Path, delimiter: char) -> Result<Arc<Matrix>, AppError> {
        if let Some(m) = self.published.read().unwrap().get(path) {
            return Ok(m.clone());
        }

        let lock = self.path_lock(path);
        let _guard = lock.lock().unwrap();

        // Another thread may have published while we waited for the lock.
        if let Some(m) = self.published.read().unwrap().get(path) {
            return Ok(m.clone());
        }

        let cache_path = sibling_cache_path(path);
        let matrix = if let Some(cached) = read_cache(&cache_path) {
            Matrix::from_row_major(cached.rows as usize, cached.cols as usize, cached.data)?
        } else {
            let rows = parse_csv_rows(path, delimiter)?;
            if rows.is_empty() {
                return Err(AppError::Malformed(format!(
                    "{} não contém linhas numéricas",
                    path.display()
                )));
            }
            let cols = rows[0].len();
            let mut data = Vec::with_capacity(rows.len() * cols);
            for (i, r) in rows.iter().enumerate() {
                if r.len() != cols {
                    return Err(AppError::Malformed(format!(
                        "linha {} tem {} colunas, esperado {}",
                        i + 1,
                        r.len(),
                        cols
                    )));
                }
                data.extend_from_slice(r);
            }
            let m = Matrix::from_row_major(rows.len(), cols, data)?;
            write_cache_atomically(
                &cache_path,
                &CachedArray {
                    rows: m.rows as u64,
                    cols: m.cols as u64,
                    data: m.data.clone(),
                },
            );
            m
        };

        let matrix = Arc::new(matrix);
        self.published
            .write()
            .unwrap()
            .insert(path.to_path_buf(), matrix.clone());
        Ok(matrix)
    }

    /// Load a vector: same fast path as `load_matrix`, but flattens every
    /// parsed row regardless of row length (rows may be ragged) instead of
    /// enforcing a rectangular shape — mirrors
    /// `original_source/server-python/servidor_pure.py`'s `achatar_lista`.
    pub fn load_vector(&self, path: &Path, delimiter: char) -> Result<Arc<Vec<f64>>, AppError> {
        // Vectors reuse the same binary side-cache machinery, stored as a
        // 1xN matrix (§3: "vectors are treated as 1xL for storage").
        let matrix = self.load_vector_as_matrix(path, delimiter)?;
        Ok(Arc::new(matrix.data.clone()))
    }

    fn load_vector_as_matrix(&self, path: &Path, delimiter: char) -> Result<Arc<Matrix>, AppError> {
        if let Some(m) = self.published.read().unwrap().get(path) {
            return Ok(m.clone());
        }
        let lock = self.path_lock(path);
        let _guard = lock.lock().unwrap();
        if let Some(m) = self.published.read().unwrap().get(path) {
            return Ok(m.clone());
        }

        let cache_path = sibling_cache_path(path);
        let matrix = if let Some(cached) = read_cache(&cache_path) {
            Matrix::from_row_major(cached.rows as usize, cached.cols as usize, cached.data)?
        } else {
            let rows = parse_csv_rows(path, delimiter)?;
            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            if flat.is_empty() {
                return Err(AppError::Malformed(format!(
                    "{} não contém valores numéricos",
                    path.display()
                )));
            }
            let m = Matrix::from_row_major(1, flat.len(), flat)?;
            write_cache_atomically(
                &cache_path,
                &CachedArray {
                    rows: 1,
                    cols: m.cols as u64,
                    data: m.data.clone(),
                },
            );
            m
        };

        let matrix = Arc::new(matrix);
        self.published
            .write()
            .unwrap()
            .insert(path.to_path_buf(), matrix.clone());
        Ok(matrix)
    }
}
