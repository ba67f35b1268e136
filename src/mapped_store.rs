//! Large-file access layer: memory-mapped reads with a lazily populated line index.
//!
//! Grounded on rustscout's `memmap2`-backed file access, generalized from a search-only reader
//! into a store that also serves `read_whole`/`read_lines` for the replace path, and wrapped in
//! a `worker::BlockingPool` so indexing a large file never blocks the dispatch loop (§4.1).

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use memmap2::Mmap;

use crate::encoding::{self, Encoding};
use crate::error::{EngineError, EngineResult};
use crate::worker::BlockingPool;

/// A mapped file plus its lazily built line-start index.
struct MappedFile {
    // Kept alive for the lifetime of `mmap`; mmap borrows this file's descriptor implicitly via
    // the OS mapping, not via a Rust borrow, so both fields are owned independently.
    _file: File,
    mmap: Option<Mmap>,
    /// Used instead of `mmap` for files too small/empty to map safely.
    inline: Vec<u8>,
    size: u64,
    line_offsets: Option<Vec<usize>>,
}

impl MappedFile {
    fn bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(m) => &m[..],
            None => &self.inline[..],
        }
    }
}

pub struct MappedFileStore {
    files: Mutex<HashMap<PathBuf, MappedFile>>,
    pool: BlockingPool,
}

impl MappedFileStore {
    pub fn new(pool: BlockingPool) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            pool,
        }
    }

    /// Map `path` read-only if it is not already open. Safe for empty files: they get an
    /// in-memory empty buffer instead of a zero-length mapping, which is fragile on several
    /// platforms.
    pub async fn open(&self, path: &Path) -> EngineResult<()> {
        let path = path.to_path_buf();
        {
            let files = self.files.lock().unwrap();
            if files.contains_key(&path) {
                return Ok(());
            }
        }

        let opened = self
            .pool
            .run_blocking({
                let path = path.clone();
                move || -> EngineResult<MappedFile> {
                    if !path.exists() {
                        return Err(EngineError::NotFound(path));
                    }
                    let file = File::open(&path)?;
                    let size = file.metadata()?.len();
                    if size == 0 {
                        return Ok(MappedFile {
                            _file: file,
                            mmap: None,
                            inline: Vec::new(),
                            size: 0,
                            line_offsets: Some(vec![0]),
                        });
                    }
                    // SAFETY: the file is opened read-only and owned exclusively by this store
                    // for the lifetime of the mapping; callers only ever see byte slices handed
                    // out through this module, never the mapping itself.
                    let mmap = unsafe { Mmap::map(&file)? };
                    Ok(MappedFile {
                        _file: file,
                        mmap: Some(mmap),
                        inline: Vec::new(),
                        size,
                        line_offsets: None,
                    })
                }
            })
            .await?;

        let mut files = self.files.lock().unwrap();
        files.entry(path).or_insert(opened);
        Ok(())
    }

    /// Build the line-start offset index in a single scan if it hasn't been built yet.
    async fn ensure_index(&self, path: &Path) -> EngineResult<()> {
        let needs_index = {
            let files = self.files.lock().unwrap();
            match files.get(path) {
                Some(f) => f.line_offsets.is_none(),
                None => return Err(EngineError::NotFound(path.to_path_buf())),
            }
        };
        if !needs_index {
            return Ok(());
        }

        let bytes = {
            let files = self.files.lock().unwrap();
            let file = files.get(path).unwrap();
            file.bytes().to_vec()
        };
        let offsets = self
            .pool
            .run_blocking(move || Ok(build_line_offsets(&bytes)))
            .await?;

        let mut files = self.files.lock().unwrap();
        if let Some(f) = files.get_mut(path) {
            f.line_offsets = Some(offsets);
        }
        Ok(())
    }

    pub async fn line_count(&self, path: &Path) -> EngineResult<usize> {
        self.open(path).await?;
        self.ensure_index(path).await?;
        let files = self.files.lock().unwrap();
        Ok(files
            .get(path)
            .and_then(|f| f.line_offsets.as_ref())
            .map(|o| o.len())
            .unwrap_or(0))
    }

    /// Read the whole file, decoding with `encoding` if given, otherwise the detected encoding.
    pub async fn read_whole(
        &self,
        path: &Path,
        encoding: Option<Encoding>,
    ) -> EngineResult<String> {
        self.open(path).await?;
        let files = self.files.lock().unwrap();
        let file = files.get(path).ok_or_else(|| EngineError::NotFound(path.to_path_buf()))?;
        let bytes = file.bytes();
        let enc = encoding.unwrap_or_else(|| encoding::detect_encoding(bytes));
        Ok(encoding::decode_lossy(bytes, enc))
    }

    /// Read lines `[start, end]` inclusive (0-indexed), clamped to the file's range.
    pub async fn read_lines(
        &self,
        path: &Path,
        start: usize,
        end: usize,
        encoding: Option<Encoding>,
    ) -> EngineResult<String> {
        self.open(path).await?;
        self.ensure_index(path).await?;

        let files = self.files.lock().unwrap();
        let file = files.get(path).ok_or_else(|| EngineError::NotFound(path.to_path_buf()))?;
        let offsets = file.line_offsets.as_ref().unwrap();
        let bytes = file.bytes();
        let line_count = offsets.len();

        if line_count == 0 {
            return Ok(String::new());
        }

        let s = start.min(line_count - 1);
        let e = end.min(line_count - 1);
        let from = offsets[s];
        let to = if e + 1 < line_count {
            offsets[e + 1]
        } else {
            file.size as usize
        };

        let slice = &bytes[from.min(bytes.len())..to.min(bytes.len())];
        let enc = encoding.unwrap_or_else(|| encoding::detect_encoding(bytes));
        Ok(encoding::decode_lossy(slice, enc))
    }

    /// Release the mapping for `path`, if any. A no-op if it was never opened.
    pub fn release(&self, path: &Path) {
        self.files.lock().unwrap().remove(path);
    }
}

/// Record offset 0, then every byte position one past a `\n`.
fn build_line_offsets(bytes: &[u8]) -> Vec<usize> {
    let mut offsets = vec![0usize];
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' && i + 1 < bytes.len() {
            offsets.push(i + 1);
        }
    }
    offsets
}

/// Shared constructor used by the handler; keeps `BlockingPool` construction in one place.
pub fn new_store(pool: BlockingPool) -> Arc<MappedFileStore> {
    Arc::new(MappedFileStore::new(pool))
}
