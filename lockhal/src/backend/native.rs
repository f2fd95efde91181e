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

//! The reference backend: every lock is a heap-allocated native mutex.
//!
//! The primitives are available both as free functions (collected in [`TABLE`]) and through the
//! [`NativeBackend`] type.

use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;

use super::LockBackend;
use super::OpsTable;
use crate::DestroyError;
use crate::Error;
use crate::LockHandle;
use crate::LockResult;
use crate::LockStatus;

/// The native backend as a function table with every slot filled.
pub const TABLE: OpsTable = OpsTable {
    name: "native",
    init: Some(init),
    destroy: Some(destroy),
    try_lock: Some(try_lock),
    lock: Some(lock),
    timed_lock: Some(timed_lock),
    unlock: Some(unlock),
};

/// Backend mapping every lock onto its own native mutex.
///
/// `init` allocates, `destroy` releases. A handle that was not produced by this backend makes every
/// primitive fail.
///
/// Locks carry no owner: `unlock` releases a held lock whichever thread calls it. Releasing a lock
/// the caller does not hold is still a contract violation, see [`Guarded`](super::Guarded) for a
/// backend that reports it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl LockBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn init(&self) -> Result<LockHandle, Error> {
        init()
    }

    fn destroy(&self, handle: LockHandle) -> Result<(), DestroyError> {
        destroy(handle)
    }

    fn try_lock(&self, handle: &LockHandle) -> LockResult {
        try_lock(handle)
    }

    fn lock(&self, handle: &LockHandle) -> LockResult {
        lock(handle)
    }

    fn timed_lock(&self, handle: &LockHandle, deadline: Option<Instant>) -> LockResult {
        timed_lock(handle, deadline)
    }

    fn unlock(&self, handle: &LockHandle) -> LockResult {
        unlock(handle)
    }
}

/// Allocates a new, unlocked native mutex.
pub fn init() -> Result<LockHandle, Error> {
    Ok(LockHandle::native(NativeMutex::new()))
}

/// Releases a native mutex.
///
/// Refuses with [`Error::Generic`] if the mutex is held, handing the handle back so the lock can
/// still be released and destroyed later.
pub fn destroy(handle: LockHandle) -> Result<(), DestroyError> {
    match handle
        .downcast_native::<NativeMutex>()
        .map(NativeMutex::is_locked)
    {
        None => Err(DestroyError::new(Error::InvalidArgument, handle)),
        Some(true) => {
            log::warn!("refusing to destroy a held native lock: {handle:?}");
            Err(DestroyError::new(Error::Generic, handle))
        }
        Some(false) => Ok(()),
    }
}

pub fn try_lock(handle: &LockHandle) -> LockResult {
    Ok(with_mutex(handle, NativeMutex::try_lock))
}

pub fn lock(handle: &LockHandle) -> LockResult {
    Ok(with_mutex(handle, NativeMutex::lock))
}

pub fn timed_lock(handle: &LockHandle, deadline: Option<Instant>) -> LockResult {
    Ok(with_mutex(handle, |mutex| mutex.lock_until(deadline)))
}

pub fn unlock(handle: &LockHandle) -> LockResult {
    Ok(with_mutex(handle, NativeMutex::unlock))
}

fn with_mutex<F>(handle: &LockHandle, f: F) -> LockStatus
where
    F: FnOnce(&NativeMutex) -> LockStatus,
{
    match handle.downcast_native::<NativeMutex>() {
        Some(mutex) => f(mutex),
        None => LockStatus::Failure,
    }
}

/// A bare binary lock, guarding no data.
///
/// The held flag only changes under `state`, so two racing releases cannot both succeed.
pub(crate) struct NativeMutex {
    state: Mutex<bool>,
    released: Condvar,
}

impl NativeMutex {
    pub(crate) const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(false),
            released: Condvar::new(),
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        *self.state.lock()
    }

    pub(crate) fn try_lock(&self) -> LockStatus {
        let mut locked = self.state.lock();
        if *locked {
            return LockStatus::Failure;
        }
        *locked = true;
        LockStatus::Success
    }

    pub(crate) fn lock(&self) -> LockStatus {
        let mut locked = self.state.lock();
        while *locked {
            self.released.wait(&mut locked);
        }
        *locked = true;
        LockStatus::Success
    }

    pub(crate) fn lock_until(&self, deadline: Option<Instant>) -> LockStatus {
        let Some(deadline) = deadline else {
            return self.lock();
        };
        let mut locked = self.state.lock();
        while *locked {
            if self.released.wait_until(&mut locked, deadline).timed_out() && *locked {
                return LockStatus::Failure;
            }
        }
        *locked = true;
        LockStatus::Success
    }

    pub(crate) fn unlock(&self) -> LockStatus {
        let mut locked = self.state.lock();
        if !*locked {
            return LockStatus::Failure;
        }
        *locked = false;
        drop(locked);
        self.released.notify_one();
        LockStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_lifecycle() {
        let handle = init().unwrap();
        assert_eq!(try_lock(&handle), Ok(LockStatus::Success));
        assert_eq!(try_lock(&handle), Ok(LockStatus::Failure));
        assert_eq!(unlock(&handle), Ok(LockStatus::Success));
        destroy(handle).unwrap();
    }

    #[test]
    fn test_unlock_unlocked_fails() {
        let handle = init().unwrap();
        assert_eq!(unlock(&handle), Ok(LockStatus::Failure));
        assert_eq!(lock(&handle), Ok(LockStatus::Success));
        assert_eq!(unlock(&handle), Ok(LockStatus::Success));
        assert_eq!(unlock(&handle), Ok(LockStatus::Failure));
    }

    #[test]
    fn test_destroy_held_lock_refused() {
        let handle = init().unwrap();
        assert_eq!(lock(&handle), Ok(LockStatus::Success));

        let err = destroy(handle).unwrap_err();
        assert_eq!(err.error(), Error::Generic);
        let handle = err.into_handle();
        assert_eq!(try_lock(&handle), Ok(LockStatus::Failure));

        assert_eq!(unlock(&handle), Ok(LockStatus::Success));
        destroy(handle).unwrap();
    }

    #[test]
    fn test_unlock_from_other_thread() {
        let handle = init().unwrap();
        assert_eq!(lock(&handle), Ok(LockStatus::Success));

        let released = {
            let handle = handle.clone();
            std::thread::spawn(move || unlock(&handle)).join().unwrap()
        };
        assert_eq!(released, Ok(LockStatus::Success));
        assert_eq!(try_lock(&handle), Ok(LockStatus::Success));

        // A waiter parked on the lock is woken by a release from a third thread.
        let waiter = {
            let handle = handle.clone();
            std::thread::spawn(move || {
                let status = lock(&handle);
                assert_eq!(unlock(&handle), Ok(LockStatus::Success));
                status
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        let releaser = {
            let handle = handle.clone();
            std::thread::spawn(move || unlock(&handle))
        };
        assert_eq!(releaser.join().unwrap(), Ok(LockStatus::Success));
        assert_eq!(waiter.join().unwrap(), Ok(LockStatus::Success));
        destroy(handle).unwrap();
    }

    #[test]
    fn test_racing_unlocks_release_once() {
        let handle = init().unwrap();
        for _ in 0..100 {
            assert_eq!(lock(&handle), Ok(LockStatus::Success));
            let barrier = Arc::new(std::sync::Barrier::new(4));
            let releasers: Vec<_> = (0..4)
                .map(|_| {
                    let handle = handle.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        unlock(&handle)
                    })
                })
                .collect();
            let released = releasers
                .into_iter()
                .map(|releaser| releaser.join().unwrap())
                .filter(|status| *status == Ok(LockStatus::Success))
                .count();
            assert_eq!(released, 1);
            assert!(!handle.downcast_native::<NativeMutex>().unwrap().is_locked());
        }
        destroy(handle).unwrap();
    }

    #[test]
    fn test_foreign_handle() {
        let slot = LockHandle::Slot(0);
        assert_eq!(try_lock(&slot), Ok(LockStatus::Failure));
        assert_eq!(lock(&slot), Ok(LockStatus::Failure));
        assert_eq!(unlock(&slot), Ok(LockStatus::Failure));
        let err = destroy(slot).unwrap_err();
        assert_eq!(err.error(), Error::InvalidArgument);
        assert_eq!(err.into_handle().slot(), Some(0));

        let other = LockHandle::native(0u8);
        assert_eq!(try_lock(&other), Ok(LockStatus::Failure));
    }

    #[test]
    fn test_timed_lock_expires() {
        let handle = init().unwrap();
        assert_eq!(lock(&handle), Ok(LockStatus::Success));

        let start = Instant::now();
        let deadline = start + Duration::from_millis(20);
        assert_eq!(timed_lock(&handle, Some(deadline)), Ok(LockStatus::Failure));
        assert!(start.elapsed() >= Duration::from_millis(20));

        assert_eq!(unlock(&handle), Ok(LockStatus::Success));
        assert_eq!(timed_lock(&handle, Some(Instant::now())), Ok(LockStatus::Success));
        assert_eq!(unlock(&handle), Ok(LockStatus::Success));
        assert_eq!(timed_lock(&handle, None), Ok(LockStatus::Success));
        assert_eq!(unlock(&handle), Ok(LockStatus::Success));
    }

    #[test]
    fn test_multi_thread() {
        struct Counter(std::cell::UnsafeCell<usize>);
        // SAFETY: the counter is only touched while the native lock is held.
        unsafe impl Sync for Counter {}

        let handle = init().unwrap();
        let counter = Arc::new(Counter(std::cell::UnsafeCell::new(0)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(lock(&handle), Ok(LockStatus::Success));
                        // SAFETY: the native lock serializes every access.
                        unsafe { *counter.0.get() += 1 };
                        assert_eq!(unlock(&handle), Ok(LockStatus::Success));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // SAFETY: every writer has been joined.
        assert_eq!(unsafe { *counter.0.get() }, 4000);
        destroy(handle).unwrap();
    }
}
