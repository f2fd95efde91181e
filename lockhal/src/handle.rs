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

use std::any::Any;
use std::fmt;
use std::sync::Arc;
#[cfg(any(test, feature = "guarded"))]
use std::sync::Weak;

/// An opaque token identifying one lock instance.
///
/// A handle is produced by a backend's `init` and is owned by the caller until it is passed to
/// `destroy`. It is either a reference to a native object the backend allocated, or an index into
/// a pool the backend manages. Cloning a handle does not create a new lock: every clone names the
/// same lock.
#[derive(Clone)]
pub enum LockHandle {
    /// A backend-allocated native object.
    Native(NativeRef),
    /// An index into a backend-managed pool.
    Slot(usize),
}

impl LockHandle {
    /// Wraps a native object into a handle.
    pub fn native<T>(object: T) -> Self
    where
        T: Any + Send + Sync,
    {
        LockHandle::Native(NativeRef(Arc::new(object)))
    }

    /// Returns the native object if this handle wraps a `T`.
    pub fn downcast_native<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        match self {
            LockHandle::Native(native) => native.0.downcast_ref(),
            LockHandle::Slot(_) => None,
        }
    }

    /// Returns the pool index if this handle is a slot.
    pub fn slot(&self) -> Option<usize> {
        match self {
            LockHandle::Native(_) => None,
            LockHandle::Slot(index) => Some(*index),
        }
    }

    /// Returns a value that identifies the lock this handle names.
    ///
    /// Two handles with the same identity name the same lock as long as the lock is alive. Once a
    /// lock is destroyed its identity may be reused by a later `init`.
    pub fn identity(&self) -> HandleId {
        match self {
            LockHandle::Native(native) => HandleId::Native(native.addr()),
            LockHandle::Slot(index) => HandleId::Slot(*index),
        }
    }

    /// Returns a weak reference to the native object, which tells whether any handle to it is left.
    #[cfg(any(test, feature = "guarded"))]
    pub(crate) fn watch(&self) -> Option<Weak<dyn Any + Send + Sync>> {
        match self {
            LockHandle::Native(native) => Some(Arc::downgrade(&native.0)),
            LockHandle::Slot(_) => None,
        }
    }

    /// Returns `true` if both handles name the same lock.
    pub fn same_lock(&self, other: &LockHandle) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockHandle::Native(native) => f.debug_tuple("Native").field(native).finish(),
            LockHandle::Slot(index) => f.debug_tuple("Slot").field(index).finish(),
        }
    }
}

/// Shared, type-erased reference to a backend's native lock object.
#[derive(Clone)]
pub struct NativeRef(Arc<dyn Any + Send + Sync>);

impl NativeRef {
    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

/// Identity of a lock, see [`LockHandle::identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleId {
    /// Address of the native object.
    Native(usize),
    /// Pool index.
    Slot(usize),
}
