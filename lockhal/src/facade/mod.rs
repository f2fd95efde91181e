// Copyright 2024 tison <wander4096@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The portable lock API.
//!
//! Every operation resolves the active backend of a [`Registry`] and forwards to it. If no backend
//! is registered, or the backend lacks the operation, the call fails with [`Error::Unsupported`]
//! without reaching any backend. Nothing here retries or queues: blocking and timeouts are left
//! to the backend.
//!
//! The free functions use [`Registry::global`].

use std::fmt;
use std::time::Duration;
use std::time::Instant;

use crate::backend::Operations;
use crate::DestroyError;
use crate::Error;
use crate::LockHandle;
use crate::LockResult;
use crate::LockStatus;
use crate::Registry;


/// A `timed_lock` timeout that never expires; such a call behaves like `lock`.
pub const WAIT_FOREVER: u32 = u32::MAX;

/// Converts a relative timeout into the absolute deadline handed to backends.
///
/// `None` means no deadline.
pub fn deadline_after(timeout_ms: u32) -> Option<Instant> {
    if timeout_ms == WAIT_FOREVER {
        return None;
    }
    Instant::now().checked_add(Duration::from_millis(u64::from(timeout_ms)))
}

impl Registry {
    /// Creates a new, unlocked lock.
    pub fn init(&self) -> Result<LockHandle, Error> {
        self.resolve(Operations::INIT)?.init()
    }

    /// Destroys a lock. The handle and all of its clones must not be used afterwards.
    ///
    /// Destroying a lock that is held, or that another thread waits on, is backend-defined. On
    /// failure the handle comes back inside the [`DestroyError`].
    pub fn destroy(&self, handle: LockHandle) -> Result<(), DestroyError> {
        match self.resolve(Operations::DESTROY) {
            Ok(backend) => backend.destroy(handle),
            Err(err) => Err(DestroyError::new(err, handle)),
        }
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `Ok(LockStatus::Failure)` if the lock is held, by any thread.
    pub fn try_lock(&self, handle: &LockHandle) -> LockResult {
        self.resolve(Operations::TRY_LOCK)?.try_lock(handle)
    }

    /// Acquires the lock, blocking the current thread until it is able to do so.
    ///
    /// Acquiring a lock the current thread already holds is not supported and may deadlock.
    pub fn lock(&self, handle: &LockHandle) -> LockResult {
        self.resolve(Operations::LOCK)?.lock(handle)
    }

    /// Acquires the lock, blocking the current thread for at most `timeout_ms` milliseconds.
    ///
    /// [`WAIT_FOREVER`] waits without bound. Returns `Ok(LockStatus::Failure)` if the timeout
    /// expires first.
    pub fn timed_lock(&self, handle: &LockHandle, timeout_ms: u32) -> LockResult {
        let backend = self.resolve(Operations::TIMED_LOCK)?;
        backend.timed_lock(handle, deadline_after(timeout_ms))
    }

    /// Releases a lock held by the caller.
    ///
    /// Releasing a lock the caller does not hold is a contract violation; backends may report it as
    /// a failure, or may not notice.
    pub fn unlock(&self, handle: &LockHandle) -> LockResult {
        self.resolve(Operations::UNLOCK)?.unlock(handle)
    }

    /// Acquires the lock and returns a guard releasing it when dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockhal::backend::NativeBackend;
    /// use lockhal::LockStatus;
    /// use lockhal::Registry;
    ///
    /// static NATIVE: NativeBackend = NativeBackend;
    ///
    /// let registry = Registry::new();
    /// registry.register(&NATIVE).unwrap();
    /// let handle = registry.init().unwrap();
    /// {
    ///     let _guard = registry.lock_guard(&handle).unwrap();
    ///     assert_eq!(registry.try_lock(&handle), Ok(LockStatus::Failure));
    /// }
    /// assert_eq!(registry.try_lock(&handle), Ok(LockStatus::Success));
    /// ```
    pub fn lock_guard<'a>(&'a self, handle: &'a LockHandle) -> Result<HandleGuard<'a>, Error> {
        match self.lock(handle)? {
            LockStatus::Success => Ok(HandleGuard {
                registry: self,
                handle,
            }),
            LockStatus::Failure => Err(Error::Generic),
        }
    }

    /// Attempts to acquire the lock without blocking, returning `None` if it is held.
    pub fn try_lock_guard<'a>(
        &'a self,
        handle: &'a LockHandle,
    ) -> Result<Option<HandleGuard<'a>>, Error> {
        Ok(match self.try_lock(handle)? {
            LockStatus::Success => Some(HandleGuard {
                registry: self,
                handle,
            }),
            LockStatus::Failure => None,
        })
    }
}

/// Releases the lock it was created for when dropped.
#[must_use = "if unused the lock will immediately unlock"]
pub struct HandleGuard<'a> {
    registry: &'a Registry,
    handle: &'a LockHandle,
}

impl HandleGuard<'_> {
    /// Returns the handle of the held lock.
    pub fn handle(&self) -> &LockHandle {
        self.handle
    }
}

impl fmt::Debug for HandleGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleGuard")
            .field("handle", self.handle)
            .finish_non_exhaustive()
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        match self.registry.unlock(self.handle) {
            Ok(LockStatus::Success) => {}
            Ok(LockStatus::Failure) => {
                log::error!("{:?} was not held when its guard dropped", self.handle)
            }
            Err(err) => log::error!("failed to release {:?}: {err}", self.handle),
        }
    }
}

/// Creates a new lock through the process-wide registry.
pub fn init() -> Result<LockHandle, Error> {
    Registry::global().init()
}

/// Destroys a lock through the process-wide registry.
pub fn destroy(handle: LockHandle) -> Result<(), DestroyError> {
    Registry::global().destroy(handle)
}

/// Attempts to acquire a lock through the process-wide registry, without blocking.
pub fn try_lock(handle: &LockHandle) -> LockResult {
    Registry::global().try_lock(handle)
}

/// Acquires a lock through the process-wide registry.
pub fn lock(handle: &LockHandle) -> LockResult {
    Registry::global().lock(handle)
}

/// Acquires a lock through the process-wide registry, waiting at most `timeout_ms` milliseconds.
pub fn timed_lock(handle: &LockHandle, timeout_ms: u32) -> LockResult {
    Registry::global().timed_lock(handle, timeout_ms)
}

/// Releases a lock through the process-wide registry.
pub fn unlock(handle: &LockHandle) -> LockResult {
    Registry::global().unlock(handle)
}
