use std::ops::{Deref, DerefMut};
use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard};

use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit};

/// Readers-writer lock with reader preference.
///
/// Exclusive access is a single semaphore permit. A writer holds the permit
/// for the length of its [`WriteGuard`]. Readers share it: the first reader
/// of a group takes the permit on behalf of everyone, later readers just bump
/// the reader count, and the last reader to leave gives the permit back.
///
/// `entry` serializes readers that are still joining, so while the first
/// reader waits on a writer no other reader can slip into the group without
/// the permit.
///
/// The value itself sits in a tokio `RwLock` that is only ever taken with
/// `try_read`/`try_write` once the permit discipline has granted access, so
/// those calls never contend. Waiting and fairness are decided by the permit.
///
/// A writer cannot interleave with an active read group. If readers keep
/// arriving before the group drains, writers wait indefinitely.
pub struct ReaderPreferringLock<T> {
    entry: Mutex<()>,
    readers: StdMutex<usize>,
    resource: Semaphore,
    data: RwLock<T>,
}

impl<T> ReaderPreferringLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            entry: Mutex::new(()),
            readers: StdMutex::new(0),
            resource: Semaphore::new(1),
            data: RwLock::new(value),
        }
    }

    /// Enter a read section. Dropping the guard ends it.
    pub async fn read(&self) -> ReadGuard<'_, T> {
        let _entry = self.entry.lock().await;
        {
            let mut readers = self.reader_count();
            if *readers > 0 {
                *readers += 1;
                return self.read_guard();
            }
        }

        // No group is active: take exclusive access for the group that starts now.
        self.resource
            .acquire()
            .await
            .expect("lock semaphore is never closed")
            .forget();
        *self.reader_count() += 1;
        self.read_guard()
    }

    /// Enter a write section, excluding all readers and other writers.
    /// Dropping the guard ends it.
    pub async fn write(&self) -> WriteGuard<'_, T> {
        let permit = self
            .resource
            .acquire()
            .await
            .expect("lock semaphore is never closed");
        WriteGuard {
            value: self
                .data
                .try_write()
                .expect("write permit held but value is still borrowed"),
            _permit: permit,
        }
    }

    /// Number of readers currently inside a read section.
    pub fn active_readers(&self) -> usize {
        *self.reader_count()
    }

    /// Called with the reader already counted in, so the group owns the permit.
    fn read_guard(&self) -> ReadGuard<'_, T> {
        ReadGuard {
            value: self
                .data
                .try_read()
                .expect("read group holds the permit but a writer has the value"),
            _exit: ReadExit { lock: self },
        }
    }

    fn reader_count(&self) -> StdMutexGuard<'_, usize> {
        // The count is only ever updated by complete statements, so a
        // poisoned value is still accurate.
        self.readers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn leave_read(&self) {
        let mut readers = self.reader_count();
        *readers -= 1;
        if *readers == 0 {
            self.resource.add_permits(1);
        }
    }
}

impl<T> std::fmt::Debug for ReaderPreferringLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderPreferringLock")
            .field("active_readers", &self.active_readers())
            .finish_non_exhaustive()
    }
}

/// Shared access to the protected value. Ends the read section on drop.
///
/// Fields drop in order: the borrow of the value is released before the
/// reader leaves the group and possibly hands the permit to a writer.
pub struct ReadGuard<'a, T> {
    value: RwLockReadGuard<'a, T>,
    _exit: ReadExit<'a, T>,
}

struct ReadExit<'a, T> {
    lock: &'a ReaderPreferringLock<T>,
}

impl<T> Drop for ReadExit<'_, T> {
    fn drop(&mut self) {
        self.lock.leave_read();
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Exclusive access to the protected value. Ends the write section on drop.
///
/// The value is released before the permit, same as [`ReadGuard`].
pub struct WriteGuard<'a, T> {
    value: RwLockWriteGuard<'a, T>,
    _permit: SemaphorePermit<'a>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
