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

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use slab::Slab;

use super::native::NativeMutex;
use super::LockBackend;
use crate::DestroyError;
use crate::Error;
use crate::LockHandle;
use crate::LockResult;
use crate::LockStatus;

/// A backend handing out locks from a fixed-capacity pool.
///
/// Handles are [`LockHandle::Slot`] indices. `init` fails with [`Error::OutOfMemory`] once
/// `capacity` locks are alive; `destroy` returns the slot to the pool, and a later `init` may hand
/// the same index out again.
///
/// The pool can live in a `static`:
///
/// ```
/// use lockhal::backend::PoolBackend;
/// use lockhal::Registry;
///
/// static POOL: PoolBackend = PoolBackend::new(16);
///
/// let registry = Registry::new();
/// registry.register(&POOL).unwrap();
/// let handle = registry.init().unwrap();
/// assert_eq!(handle.slot(), Some(0));
/// ```
pub struct PoolBackend {
    capacity: usize,
    slots: Mutex<Slab<Arc<NativeMutex>>>,
}

impl PoolBackend {
    /// Creates an empty pool holding at most `capacity` locks.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: parking_lot::const_mutex(Slab::new()),
        }
    }

    /// Returns the maximum number of live locks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of live locks.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns `true` if no lock is alive.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    // The mutex is cloned out so that blocking never happens under the pool lock.
    fn slot(&self, handle: &LockHandle) -> Option<Arc<NativeMutex>> {
        let index = handle.slot()?;
        self.slots.lock().get(index).cloned()
    }

    fn with_slot<F>(&self, handle: &LockHandle, f: F) -> LockResult
    where
        F: FnOnce(&NativeMutex) -> LockStatus,
    {
        Ok(match self.slot(handle) {
            Some(mutex) => f(&mutex),
            None => LockStatus::Failure,
        })
    }
}

impl fmt::Debug for PoolBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBackend")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl LockBackend for PoolBackend {
    fn name(&self) -> &'static str {
        "pool"
    }

    fn init(&self) -> Result<LockHandle, Error> {
        let mut slots = self.slots.lock();
        if slots.len() >= self.capacity {
            log::debug!("lock pool exhausted (capacity {})", self.capacity);
            return Err(Error::OutOfMemory);
        }
        let index = slots.insert(Arc::new(NativeMutex::new()));
        Ok(LockHandle::Slot(index))
    }

    fn destroy(&self, handle: LockHandle) -> Result<(), DestroyError> {
        let mut slots = self.slots.lock();
        let locked = handle
            .slot()
            .and_then(|index| slots.get(index))
            .map(|mutex| mutex.is_locked());
        match (handle.slot(), locked) {
            (Some(index), Some(false)) => {
                slots.remove(index);
                Ok(())
            }
            (Some(index), Some(true)) => {
                log::warn!("refusing to destroy held pool lock {index}");
                Err(DestroyError::new(Error::Generic, handle))
            }
            _ => Err(DestroyError::new(Error::InvalidArgument, handle)),
        }
    }

    fn try_lock(&self, handle: &LockHandle) -> LockResult {
        self.with_slot(handle, NativeMutex::try_lock)
    }

    fn lock(&self, handle: &LockHandle) -> LockResult {
        self.with_slot(handle, NativeMutex::lock)
    }

    fn timed_lock(&self, handle: &LockHandle, deadline: Option<Instant>) -> LockResult {
        self.with_slot(handle, |mutex| mutex.lock_until(deadline))
    }

    fn unlock(&self, handle: &LockHandle) -> LockResult {
        self.with_slot(handle, NativeMutex::unlock)
    }
}
