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

//! Error and outcome types shared by the facade, the registry and the backends.

use std::fmt;

use crate::LockHandle;

/// Numeric code of a successful call.
pub const OK: i32 = 0;

/// The outcome of an acquisition or release attempt.
///
/// This is not an error: a lock that is already held yields [`LockStatus::Failure`] and the caller
/// decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockStatus {
    /// The lock could not be acquired (or released).
    Failure = 0,
    /// The lock was acquired (or released).
    Success = 1,
}

impl LockStatus {
    /// Returns `true` for [`LockStatus::Success`].
    pub const fn is_success(self) -> bool {
        matches!(self, LockStatus::Success)
    }

    /// Returns `1` for success and `0` for failure.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl From<bool> for LockStatus {
    fn from(acquired: bool) -> Self {
        if acquired {
            LockStatus::Success
        } else {
            LockStatus::Failure
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Success => write!(f, "lock succeeded"),
            LockStatus::Failure => write!(f, "lock failed"),
        }
    }
}

/// Result of `try_lock`, `lock`, `timed_lock` and `unlock`.
pub type LockResult = Result<LockStatus, Error>;

/// Folds a [`LockResult`] into its integer form: `1` on success, `0` otherwise.
pub fn status_code(result: &LockResult) -> i32 {
    match result {
        Ok(status) => status.code(),
        Err(_) => LockStatus::Failure.code(),
    }
}

/// A contract violation detected by the [`Guarded`](crate::backend::Guarded) backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Misuse {
    /// `unlock` on a lock that nobody holds.
    UnlockNotHeld,
    /// `unlock` from a thread other than the one that acquired the lock.
    UnlockByOtherThread,
    /// `lock` or `timed_lock` from the thread that already holds the lock.
    RecursiveLock,
    /// Any operation on a handle that was already destroyed.
    Destroyed,
    /// `destroy` on a lock that is currently held.
    DestroyWhileLocked,
    /// The handle was never returned by `init` of this backend.
    UnknownHandle,
}

impl fmt::Display for Misuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Misuse::UnlockNotHeld => "unlock of a lock that is not held",
            Misuse::UnlockByOtherThread => "unlock from a thread that does not hold the lock",
            Misuse::RecursiveLock => "recursive acquisition by the holding thread",
            Misuse::Destroyed => "use of a destroyed lock",
            Misuse::DestroyWhileLocked => "destroy of a held lock",
            Misuse::UnknownHandle => "handle unknown to this backend",
        };
        f.write_str(msg)
    }
}

/// Error type of every lock operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// Catch-all failure.
    Generic,
    /// Malformed registration or a handle the backend cannot use.
    InvalidArgument,
    /// No backend is registered, or the backend lacks the operation.
    Unsupported,
    /// The backend could not allocate a new lock.
    OutOfMemory,
    /// A contract violation caught by a checking backend.
    Misuse(Misuse),
}

impl Error {
    /// Returns the numeric code of this error.
    pub const fn code(&self) -> i32 {
        match self {
            Error::Generic => -1,
            Error::OutOfMemory => 0x100,
            Error::InvalidArgument => 0x101,
            Error::Misuse(_) => 0x102,
            Error::Unsupported => 0x106,
        }
    }

    /// Returns a stable, human-readable identifier of this error.
    pub const fn name(&self) -> &'static str {
        match self {
            Error::Generic => "Generic",
            Error::OutOfMemory => "OutOfMemory",
            Error::InvalidArgument => "InvalidArgument",
            Error::Misuse(_) => "Misuse",
            Error::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Generic => write!(f, "lock operation failed"),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::Unsupported => write!(f, "operation not supported by the lock backend"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::Misuse(misuse) => write!(f, "lock misuse: {misuse}"),
        }
    }
}

impl std::error::Error for Error {}

/// A refused `destroy`, carrying the handle back to the caller.
///
/// The lock behind the handle is untouched: a held lock can still be released through the returned
/// handle and destroyed again.
#[derive(Debug)]
pub struct DestroyError {
    error: Error,
    handle: LockHandle,
}

impl DestroyError {
    pub fn new(error: Error, handle: LockHandle) -> Self {
        Self { error, handle }
    }

    /// Returns why the lock was not destroyed.
    pub fn error(&self) -> Error {
        self.error
    }

    /// Returns the handle whose destruction was refused.
    pub fn handle(&self) -> &LockHandle {
        &self.handle
    }

    /// Takes the handle back.
    pub fn into_handle(self) -> LockHandle {
        self.handle
    }

    pub fn into_parts(self) -> (Error, LockHandle) {
        (self.error, self.handle)
    }
}

impl fmt::Display for DestroyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to destroy {:?}: {}", self.handle, self.error)
    }
}

impl std::error::Error for DestroyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<DestroyError> for Error {
    fn from(err: DestroyError) -> Self {
        err.error
    }
}

/// Maps a numeric code back to its name.
///
/// Returns `"OK"` for [`OK`] and `"ERROR"` for codes no [`Error`] produces.
pub fn name_of(code: i32) -> &'static str {
    const TABLE: [Error; 5] = [
        Error::Generic,
        Error::OutOfMemory,
        Error::InvalidArgument,
        Error::Misuse(Misuse::UnknownHandle),
        Error::Unsupported,
    ];

    if code == OK {
        return "OK";
    }
    TABLE
        .iter()
        .find(|err| err.code() == code)
        .map_or("ERROR", Error::name)
}
