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

//! Lock backends.
//!
//! A backend implements the six lock primitives on top of some real synchronization object. The
//! facade never talks to a primitive directly: it looks the active backend up in a
//! [`Registry`](crate::Registry) and forwards to it. Backends own no global state, every call
//! receives the [`LockHandle`] it operates on.
//!
//! Bundled backends:
//!
//! * [`NativeBackend`]: one heap-allocated native mutex per lock.
//! * [`PoolBackend`]: a fixed-capacity pool of native mutexes addressed by index.
//! * [`OpsTable`]: a table of plain function pointers, for embedders that wire their own
//!   primitives.
//! * [`Guarded`]: wraps another backend and reports contract violations (behind the `guarded`
//!   feature, always available in tests).

use std::time::Instant;

use bitflags::bitflags;

use crate::DestroyError;
use crate::Error;
use crate::LockHandle;
use crate::LockResult;

#[cfg(any(test, feature = "guarded"))]
mod guarded;
#[cfg(any(test, feature = "guarded"))]
pub use guarded::Guarded;

pub mod native;
pub use native::NativeBackend;

mod pool;
pub use pool::PoolBackend;

mod table;
pub use table::OpsTable;


bitflags! {
    /// The set of primitives a backend implements.
    pub struct Operations: u8 {
        const INIT = 1 << 0;
        const DESTROY = 1 << 1;
        const TRY_LOCK = 1 << 2;
        const LOCK = 1 << 3;
        const TIMED_LOCK = 1 << 4;
        const UNLOCK = 1 << 5;

        /// The primitives every registered backend must provide.
        const REQUIRED = Self::INIT.bits | Self::TRY_LOCK.bits | Self::UNLOCK.bits;
    }
}

/// The operation table of a lock backend.
///
/// `init`, `try_lock` and `unlock` are mandatory. `destroy`, `lock` and `timed_lock` are optional:
/// a backend that lacks one leaves it out of [`LockBackend::operations`] and the facade refuses
/// the call with [`Error::Unsupported`] before reaching the backend.
///
/// None of the methods may panic on contention. `try_lock`, `lock`, `timed_lock` and `unlock`
/// report a primitive that refused the request as `Ok(LockStatus::Failure)`.
///
/// [`LockStatus::Failure`]: crate::LockStatus::Failure
pub trait LockBackend: Send + Sync {
    /// A short name used in diagnostics.
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Returns the primitives this backend implements.
    fn operations(&self) -> Operations {
        Operations::all()
    }

    /// Creates a new, unlocked lock.
    fn init(&self) -> Result<LockHandle, Error>;

    /// Releases the resources of a lock.
    ///
    /// Destroying a lock that is held, or that another thread waits on, is backend-defined. A
    /// refusal hands the handle back inside the [`DestroyError`] and leaves the lock usable.
    fn destroy(&self, handle: LockHandle) -> Result<(), DestroyError> {
        Err(DestroyError::new(Error::Unsupported, handle))
    }

    /// Attempts to acquire the lock without blocking.
    fn try_lock(&self, handle: &LockHandle) -> LockResult;

    /// Acquires the lock, blocking the current thread until it is able to do so.
    fn lock(&self, handle: &LockHandle) -> LockResult {
        let _ = handle;
        Err(Error::Unsupported)
    }

    /// Acquires the lock, blocking the current thread no later than `deadline`.
    ///
    /// `None` waits without bound.
    fn timed_lock(&self, handle: &LockHandle, deadline: Option<Instant>) -> LockResult {
        let _ = (handle, deadline);
        Err(Error::Unsupported)
    }

    /// Releases a lock held by the caller.
    fn unlock(&self, handle: &LockHandle) -> LockResult;
}
