//! A bounded wrapper around `tokio::task::spawn_blocking`.
//!
//! mmap scanning, line indexing, fsync, and big decodes are all CPU- or syscall-bound and must
//! not run on the cooperative dispatch thread. `BlockingPool` caps how many such jobs may be
//! in flight at once so a burst of large-file requests can't starve the rest of the process.

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{EngineError, EngineResult};

#[derive(Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
}

impl BlockingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Run `f` on the blocking thread pool, holding one of this pool's permits for the
    /// duration. This is the suspension point a caller should treat as a cancellation point.
    pub async fn run_blocking<F, T>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce() -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Cancelled)?;
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await?;
        result
    }
}
