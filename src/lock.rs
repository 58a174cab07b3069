// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Writer-priority async reader-writer lock.
//!
//! Many readers or one writer. Once a writer is waiting, newly arriving
//! readers back off until it has run, so a steady stream of readers cannot
//! starve updates.
//!
//! # Mechanics
//!
//! - `admission`: a counting semaphore with `max_readers` permits. Each
//!   reader holds one; a writer drains all of them.
//! - `exclusive`: a binary semaphore. Held either by one writer or,
//!   collectively, by the current group of readers (taken by the first
//!   reader in, returned by the last reader out).
//! - `writers_waiting`: bumped by a writer before it queues; readers that
//!   see it non-zero give their admission permit back and yield.
//!
//! Every acquisition is cancel-safe: dropping the future at any await point
//! leaves all counters as they were before the attempt.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::LockError;

/// Reader capacity standing in for "effectively unbounded".
pub const DEFAULT_MAX_READERS: usize = 10_000;

/// Largest reader capacity a writer can drain in one acquisition.
pub const MAX_READERS_LIMIT: usize = if (u32::MAX as usize) < Semaphore::MAX_PERMITS {
    u32::MAX as usize
} else {
    Semaphore::MAX_PERMITS
};

/// A reader-writer lock that favors waiting writers.
pub struct PriorityRwLock<T> {
    admission: Semaphore,
    exclusive: Semaphore,
    writers_waiting: AtomicUsize,
    /// Active readers. The mutex serializes first-in/last-out transitions
    /// so the exclusive permit changes hands exactly once per reader group.
    readers: Mutex<usize>,
    max_readers: usize,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is mediated by the guards below. Shared guards
// only exist while no exclusive guard does, so `T: Sync` covers concurrent
// readers and `T: Send` covers handing the value to a writer on another
// thread.
unsafe impl<T: Send> Send for PriorityRwLock<T> {}
unsafe impl<T: Send + Sync> Sync for PriorityRwLock<T> {}

impl<T> PriorityRwLock<T> {
    pub fn new(value: T) -> Self {
        Self::with_max_readers(value, DEFAULT_MAX_READERS)
    }

    /// Panics if `max_readers` is zero or above [`MAX_READERS_LIMIT`].
    pub fn with_max_readers(value: T, max_readers: usize) -> Self {
        assert!(
            (1..=MAX_READERS_LIMIT).contains(&max_readers),
            "max_readers {} outside 1..={}",
            max_readers,
            MAX_READERS_LIMIT
        );
        PriorityRwLock {
            admission: Semaphore::new(max_readers),
            exclusive: Semaphore::new(1),
            writers_waiting: AtomicUsize::new(0),
            readers: Mutex::new(0),
            max_readers,
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire shared access.
    pub async fn read(&self) -> Result<ReadGuard<'_, T>, LockError> {
        loop {
            let permit = self.admission.acquire().await?;
            if self.writers_waiting.load(Ordering::Acquire) == 0 && self.join_readers() {
                permit.forget();
                return Ok(ReadGuard { lock: self });
            }
            drop(permit);
            tokio::task::yield_now().await;
        }
    }

    /// Acquire exclusive access.
    pub async fn write(&self) -> Result<WriteGuard<'_, T>, LockError> {
        let _waiting = WaitingMark::new(&self.writers_waiting);
        let exclusive = self.exclusive.acquire().await?;
        let drained = self.admission.acquire_many(self.max_readers as u32).await?;
        exclusive.forget();
        drained.forget();
        Ok(WriteGuard { lock: self })
    }

    /// Like [`read`](Self::read), giving up after `timeout`.
    pub async fn read_timeout(&self, timeout: Duration) -> Result<ReadGuard<'_, T>, LockError> {
        match tokio::time::timeout(timeout, self.read()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "read lock acquisition timed out");
                Err(LockError::Timeout(timeout))
            }
        }
    }

    /// Like [`write`](Self::write), giving up after `timeout`.
    pub async fn write_timeout(&self, timeout: Duration) -> Result<WriteGuard<'_, T>, LockError> {
        match tokio::time::timeout(timeout, self.write()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, waiting = self.writers_waiting(), "write lock acquisition timed out");
                Err(LockError::Timeout(timeout))
            }
        }
    }

    /// Acquire shared access, honoring an optional deadline.
    pub async fn read_within(&self, timeout: Option<Duration>) -> Result<ReadGuard<'_, T>, LockError> {
        match timeout {
            Some(timeout) => self.read_timeout(timeout).await,
            None => self.read().await,
        }
    }

    /// Acquire exclusive access, honoring an optional deadline.
    pub async fn write_within(&self, timeout: Option<Duration>) -> Result<WriteGuard<'_, T>, LockError> {
        match timeout {
            Some(timeout) => self.write_timeout(timeout).await,
            None => self.write().await,
        }
    }

    /// Mutable access without locking; the borrow checker proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Readers currently holding the lock.
    pub fn reader_count(&self) -> usize {
        *self.lock_readers()
    }

    /// Writers that have announced themselves and not yet been granted.
    pub fn writers_waiting(&self) -> usize {
        self.writers_waiting.load(Ordering::Acquire)
    }

    /// Admission permits not held by readers or a writer.
    pub fn available_read_permits(&self) -> usize {
        self.admission.available_permits()
    }

    pub fn max_readers(&self) -> usize {
        self.max_readers
    }

    fn lock_readers(&self) -> std::sync::MutexGuard<'_, usize> {
        // The count is only ever updated in one step, so a poisoned value is
        // still consistent.
        self.readers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count this reader in. The first reader must take the exclusive permit
    /// without waiting: blocking on it while holding an admission permit
    /// could deadlock against a writer that is draining admission.
    fn join_readers(&self) -> bool {
        let mut readers = self.lock_readers();
        if *readers == 0 {
            match self.exclusive.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(_) => return false,
            }
        }
        *readers += 1;
        true
    }

    fn release_read(&self) {
        {
            let mut readers = self.lock_readers();
            *readers -= 1;
            if *readers == 0 {
                self.exclusive.add_permits(1);
            }
        }
        self.admission.add_permits(1);
    }

    fn release_write(&self) {
        self.admission.add_permits(self.max_readers);
        self.exclusive.add_permits(1);
    }
}

impl<T: Default> Default for PriorityRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for PriorityRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityRwLock")
            .field("readers", &self.reader_count())
            .field("writers_waiting", &self.writers_waiting())
            .field("available_read_permits", &self.available_read_permits())
            .finish()
    }
}

/// Marks a writer as waiting for as long as it lives.
struct WaitingMark<'a>(&'a AtomicUsize);

impl<'a> WaitingMark<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        WaitingMark(counter)
    }
}

impl Drop for WaitingMark<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Shared access to the value in a [`PriorityRwLock`].
pub struct ReadGuard<'a, T> {
    lock: &'a PriorityRwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a read guard exists only while the reader group holds the
        // exclusive permit, so no write guard can alias this borrow.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive access to the value in a [`PriorityRwLock`].
pub struct WriteGuard<'a, T> {
    lock: &'a PriorityRwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the writer holds the exclusive permit and every admission
        // permit; no other guard exists.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`, and `&mut self` rules out a second borrow
        // through this guard.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: fmt::Debug> fmt::Debug for WriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn readers_share() {
        let lock = PriorityRwLock::new(5);
        let a = lock.read().await.unwrap();
        let b = lock.read().await.unwrap();
        assert_eq!(*a + *b, 10);
        assert_eq!(lock.reader_count(), 2);
        assert_eq!(lock.available_read_permits(), DEFAULT_MAX_READERS - 2);
        drop(a);
        drop(b);
        assert_eq!(lock.reader_count(), 0);
        assert_eq!(lock.available_read_permits(), DEFAULT_MAX_READERS);
    }

    #[tokio::test]
    async fn writer_mutates() {
        let lock = PriorityRwLock::new(Vec::new());
        lock.write().await.unwrap().push(1);
        lock.write().await.unwrap().push(2);
        assert_eq!(*lock.read().await.unwrap(), vec![1, 2]);
        assert_eq!(lock.available_read_permits(), DEFAULT_MAX_READERS);
        assert_eq!(lock.writers_waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn writer_waits_for_readers() {
        let lock = PriorityRwLock::new(0);
        let reader = lock.read().await.unwrap();
        let result = lock.write_timeout(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(LockError::Timeout(_))));
        assert_eq!(lock.writers_waiting(), 0);
        assert_eq!(lock.reader_count(), 1);
        drop(reader);
        assert!(lock.write_timeout(Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn reader_waits_for_writer() {
        let lock = PriorityRwLock::new(0);
        let writer = lock.write().await.unwrap();
        let result = lock.read_timeout(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(LockError::Timeout(_))));
        assert_eq!(lock.reader_count(), 0);
        drop(writer);
        assert_eq!(lock.available_read_permits(), DEFAULT_MAX_READERS);
        assert!(lock.read_timeout(Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test]
    async fn pending_writer_blocks_new_readers() {
        let lock = Arc::new(PriorityRwLock::new(0));
        let reader = lock.read().await.unwrap();

        let writer_lock = lock.clone();
        let writer = tokio::spawn(async move {
            *writer_lock.write().await.unwrap() += 1;
        });
        while lock.writers_waiting() == 0 {
            tokio::task::yield_now().await;
        }

        // A writer is queued behind the active reader; a fresh reader must
        // not jump ahead of it.
        let late = lock.read_timeout(Duration::from_millis(20)).await;
        assert!(matches!(late, Err(LockError::Timeout(_))));

        drop(reader);
        writer.await.unwrap();
        assert_eq!(*lock.read().await.unwrap(), 1);
        assert_eq!(lock.writers_waiting(), 0);
    }

    #[tokio::test]
    async fn cancelled_write_rolls_back() {
        let lock = PriorityRwLock::new(0);
        let reader = lock.read().await.unwrap();
        {
            let pending = lock.write();
            tokio::pin!(pending);
            let poll = futures_poll_once(pending.as_mut()).await;
            assert!(poll.is_none());
            assert_eq!(lock.writers_waiting(), 1);
        }
        assert_eq!(lock.writers_waiting(), 0);
        drop(reader);
        assert_eq!(lock.available_read_permits(), DEFAULT_MAX_READERS);
        assert!(lock.write().await.is_ok());
    }

    /// Poll a future exactly once.
    async fn futures_poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
        let mut fut = fut;
        std::future::poll_fn(|cx| {
            std::task::Poll::Ready(match std::pin::Pin::new(&mut fut).poll(cx) {
                std::task::Poll::Ready(output) => Some(output),
                std::task::Poll::Pending => None,
            })
        })
        .await
    }

    #[tokio::test]
    async fn guards_debug_as_value() {
        let lock = PriorityRwLock::new(vec![1, 2]);
        assert_eq!(format!("{:?}", lock.read().await.unwrap()), "[1, 2]");
        assert_eq!(format!("{:?}", lock.write().await.unwrap()), "[1, 2]");

        // Results holding guards can be unwrapped on either side.
        let reader = lock.read().await.unwrap();
        let err = lock.write_timeout(Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, LockError::Timeout(_)));
        drop(reader);
    }

    #[test]
    fn get_mut_and_into_inner() {
        let mut lock = PriorityRwLock::with_max_readers(String::from("a"), 4);
        lock.get_mut().push('b');
        assert_eq!(lock.max_readers(), 4);
        assert_eq!(lock.into_inner(), "ab");
    }
}
