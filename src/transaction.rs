//! The atomic transactional file layer: OS-level locks, pre-image capture, temp-file staging,
//! and crash-safe commit/rollback.
//!
//! Grounded on two sources. The commit/rollback shape — temp file in the same directory, then
//! `fs::rename` as the single commit point, `Drop` sweeping up an uncommitted temp file — is
//! `tools/editing.rs`'s `EditingTransaction`. The transaction *table* — one id maps to a set of
//! locked files, a single mutex guards lookup/insert/remove rather than the I/O itself, and
//! terminal-state transitions are rejected — is `flux_mcp/core/transaction_manager.py`, adapted
//! from `asyncio.Lock` + `fcntl.flock` to `std::sync::Mutex` + `fs2::FileExt::try_lock_exclusive`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

enum PreImage {
    Existed(Vec<u8>),
    Absent,
}

struct FileHandle {
    file: File,
    temp_path: PathBuf,
    pre_image: PreImage,
    staged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Open,
    Committed,
    RolledBack,
}

struct Txn {
    state: TxnState,
    files: HashMap<PathBuf, FileHandle>,
}

/// Tracks every in-flight transaction. One mutex guards only the table (insert, lookup-then-
/// mutate, remove); the actual file I/O happens outside the lock, matching §5's policy that a
/// slow fsync must not stall unrelated transactions.
pub struct TransactionManager {
    table: Mutex<HashMap<String, Txn>>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn begin(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut table = self.table.lock().unwrap();
        table.insert(
            id.clone(),
            Txn {
                state: TxnState::Open,
                files: HashMap::new(),
            },
        );
        debug!(transaction = %id, "transaction begun");
        id
    }

    /// Lock `path` for exclusive access under `id`, capturing its pre-image and opening a temp
    /// file beside it for later staging.
    pub fn acquire(&self, id: &str, path: &Path) -> EngineResult<()> {
        self.require_open(id)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive()
            .map_err(|_| EngineError::TransactionConflict(path.to_path_buf()))?;

        let pre_image = if existed {
            PreImage::Existed(fs::read(path)?)
        } else {
            PreImage::Absent
        };

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("structedit");
        let temp_name = format!(".{file_name}.{}.tmp", Uuid::new_v4().simple());
        let temp_path = path.with_file_name(temp_name);

        let mut table = self.table.lock().unwrap();
        let txn = table
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownTransaction(id.to_string()))?;
        txn.files.insert(
            path.to_path_buf(),
            FileHandle {
                file,
                temp_path,
                pre_image,
                staged: false,
            },
        );
        Ok(())
    }

    /// Write `bytes` to the acquired temp file for `path` and force them to disk.
    pub fn stage(&self, id: &str, path: &Path, bytes: &[u8]) -> EngineResult<()> {
        self.require_open(id)?;

        let temp_path = {
            let table = self.table.lock().unwrap();
            let txn = table
                .get(id)
                .ok_or_else(|| EngineError::UnknownTransaction(id.to_string()))?;
            let handle = txn
                .files
                .get(path)
                .ok_or_else(|| EngineError::IoFailure(format!("no lock held for {path:?}")))?;
            handle.temp_path.clone()
        };

        fs::write(&temp_path, bytes)?;
        let temp_file = File::open(&temp_path)?;
        temp_file.sync_all()?;

        let mut table = self.table.lock().unwrap();
        if let Some(txn) = table.get_mut(id) {
            if let Some(handle) = txn.files.get_mut(path) {
                handle.staged = true;
            }
        }
        Ok(())
    }

    /// Rename every staged temp file over its target, release every lock, and retire the
    /// transaction. Order across files is unspecified; callers must not rely on cross-file
    /// atomicity (§4.3).
    pub fn commit(&self, id: &str) -> EngineResult<()> {
        self.require_open(id)?;

        let mut table = self.table.lock().unwrap();
        let txn = table
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownTransaction(id.to_string()))?;

        for (path, handle) in txn.files.iter() {
            if handle.staged {
                fs::rename(&handle.temp_path, path)?;
            }
            let _ = FileExt::unlock(&handle.file);
        }
        txn.state = TxnState::Committed;
        debug!(transaction = %id, "transaction committed");
        Ok(())
    }

    /// Restore every acquired file's pre-image, drop staged temp files, release locks.
    pub fn rollback(&self, id: &str) -> EngineResult<()> {
        self.require_open(id)?;

        let mut table = self.table.lock().unwrap();
        let txn = table
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownTransaction(id.to_string()))?;

        for (path, handle) in txn.files.iter() {
            match &handle.pre_image {
                PreImage::Existed(bytes) => {
                    if let Err(e) = fs::write(path, bytes) {
                        warn!(path = ?path, error = %e, "failed to restore pre-image during rollback");
                    }
                }
                PreImage::Absent => {
                    let _ = fs::remove_file(path);
                }
            }
            if handle.temp_path.exists() {
                let _ = fs::remove_file(&handle.temp_path);
            }
            let _ = FileExt::unlock(&handle.file);
        }
        txn.state = TxnState::RolledBack;
        warn!(transaction = %id, "transaction rolled back");
        Ok(())
    }

    /// Drop the transaction's bookkeeping once a caller is done inspecting it. Safe to call on
    /// already-terminal transactions; a no-op on unknown ids.
    pub fn forget(&self, id: &str) {
        self.table.lock().unwrap().remove(id);
    }

    fn require_open(&self, id: &str) -> EngineResult<()> {
        let table = self.table.lock().unwrap();
        match table.get(id) {
            None => Err(EngineError::UnknownTransaction(id.to_string())),
            Some(txn) if txn.state != TxnState::Open => {
                Err(EngineError::TransactionFinished(id.to_string()))
            }
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_replaces_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "old").unwrap();

        let mgr = TransactionManager::new();
        let id = mgr.begin();
        mgr.acquire(&id, &path).unwrap();
        mgr.stage(&id, &path, b"new").unwrap();
        mgr.commit(&id).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn rollback_restores_pre_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "old").unwrap();

        let mgr = TransactionManager::new();
        let id = mgr.begin();
        mgr.acquire(&id, &path).unwrap();
        mgr.stage(&id, &path, b"new").unwrap();
        mgr.rollback(&id).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn rollback_removes_file_that_did_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");

        let mgr = TransactionManager::new();
        let id = mgr.begin();
        mgr.acquire(&id, &path).unwrap();
        mgr.stage(&id, &path, b"content").unwrap();
        mgr.rollback(&id).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_on_locked_file_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "old").unwrap();

        let mgr = TransactionManager::new();
        let first = mgr.begin();
        mgr.acquire(&first, &path).unwrap();

        let second = mgr.begin();
        let err = mgr.acquire(&second, &path).unwrap_err();
        assert!(matches!(err, EngineError::TransactionConflict(_)));

        mgr.rollback(&first).unwrap();
    }

    #[test]
    fn operations_after_commit_fail_with_transaction_finished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "old").unwrap();

        let mgr = TransactionManager::new();
        let id = mgr.begin();
        mgr.acquire(&id, &path).unwrap();
        mgr.stage(&id, &path, b"new").unwrap();
        mgr.commit(&id).unwrap();

        let err = mgr.commit(&id).unwrap_err();
        assert!(matches!(err, EngineError::TransactionFinished(_)));
    }

    #[test]
    fn unknown_transaction_id_is_reported() {
        let mgr = TransactionManager::new();
        let err = mgr.acquire("not-a-real-id", Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, EngineError::UnknownTransaction(_)));
    }
}
