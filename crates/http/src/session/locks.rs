//! Named locks shared between session contexts
//!
//! A [`LockManager`] is the lock namespace every coordinating session
//! shares, the way all tabs of a browser share one lock namespace. Each name
//! maps to an async mutex; holders are served in FIFO order.
//!
//! On top of plain mutual exclusion the manager offers single-flight
//! execution: callers that queued up while another holder ran the same
//! flight join that result instead of repeating the work.
//!
//! Processes sharing a state directory coordinate through a lock directory:
//! the leader of a flight additionally holds an exclusive advisory lock on
//! `<dir>/<name>.lock`, so at most one process runs work under a name at a
//! time. Joining only happens within a process; work run under the file
//! lock has to re-check shared state before acting.

use fs4::fs_std::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Outcome of [`LockManager::single_flight`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flight<T> {
    /// This caller held the lock and ran the operation
    Led(T),
    /// Another holder completed the same flight while this caller waited
    Joined,
}

impl<T> Flight<T> {
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined)
    }
}

#[derive(Default)]
struct NamedLock {
    mutex: tokio::sync::Mutex<()>,
    /// Completed runs per flight
    completions: Mutex<HashMap<&'static str, u64>>,
}

impl NamedLock {
    fn completions(&self, flight: &'static str) -> u64 {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(flight)
            .copied()
            .unwrap_or(0)
    }

    fn complete(&self, flight: &'static str) {
        *self
            .completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(flight)
            .or_insert(0) += 1;
    }
}

/// Exclusive advisory lock on a file, released when dropped
struct FileLock {
    _file: File,
}

impl FileLock {
    /// Block until the lock at `path` is acquired
    fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { _file: file })
    }
}

/// Registry of named async locks
#[derive(Clone, Default)]
pub struct LockManager {
    locks: Arc<Mutex<HashMap<String, Arc<NamedLock>>>>,
    lock_dir: Option<PathBuf>,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("LockManager")
            .field("locks", &names)
            .field("lock_dir", &self.lock_dir)
            .finish()
    }
}

impl LockManager {
    /// Locks shared by the clones of this manager only
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks that also exclude other processes using the same `dir`
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            locks: Arc::default(),
            lock_dir: Some(dir.into()),
        }
    }

    fn named(&self, name: &str) -> Arc<NamedLock> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Take the file lock for `name`, if this manager has a lock directory
    ///
    /// Failing to lock degrades to in-process exclusion only.
    async fn lock_file(&self, name: &str) -> Option<FileLock> {
        let path = self.lock_dir.as_ref()?.join(format!("{name}.lock"));
        let acquired = tokio::task::spawn_blocking({
            let path = path.clone();
            move || FileLock::acquire(&path)
        })
        .await
        .map_err(io::Error::other)
        .and_then(|result| result);

        match acquired {
            Ok(lock) => Some(lock),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to take cross-process lock");
                None
            }
        }
    }

    /// Run `f` under lock `name` unless another holder finished `flight`
    /// while this caller was queued
    ///
    /// Distinct flights under one name exclude each other but never stand in
    /// for each other.
    pub async fn single_flight<F, Fut, T>(&self, name: &str, flight: &'static str, f: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.named(name);
        let seen = lock.completions(flight);
        let _guard = lock.mutex.lock().await;

        if lock.completions(flight) != seen {
            debug!(lock = name, flight, "Joined completed flight");
            return Flight::Joined;
        }

        let _file_lock = self.lock_file(name).await;
        let output = f().await;
        lock.complete(flight);
        Flight::Led(output)
    }
}
