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

use parking_lot::RwLock;

use crate::backend::LockBackend;
use crate::backend::Operations;
use crate::Error;

#[cfg(test)]
mod tests;

static GLOBAL: Registry = Registry::new();

/// Holds the active lock backend.
///
/// A registry starts empty. [`Registry::register`] installs a backend; a later registration
/// replaces it and there is no way back to the empty state. The facade operations on
/// [`Registry`] all resolve the backend at call time, so replacing it changes the behavior of every
/// handle, including handles created under the previous backend. Register once, at startup, before
/// the first [`Registry::init`].
///
/// [`Registry::global`] is the process-wide instance behind the free functions of this crate.
/// Independent registries can coexist, which is what tests usually want.
pub struct Registry {
    active: RwLock<Option<&'static dyn LockBackend>>,
}

impl Registry {
    /// Creates a registry with no backend.
    pub const fn new() -> Self {
        Self {
            active: parking_lot::const_rwlock(None),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Installs `backend` as the active backend.
    ///
    /// Fails with [`Error::InvalidArgument`] if the backend does not implement `init`, `try_lock`
    /// and `unlock`; the previously registered backend, if any, stays active.
    pub fn register(&self, backend: &'static dyn LockBackend) -> Result<(), Error> {
        let ops = backend.operations();
        if !ops.contains(Operations::REQUIRED) {
            log::warn!(
                "rejecting lock backend {}: missing {:?}",
                backend.name(),
                Operations::REQUIRED - ops
            );
            return Err(Error::InvalidArgument);
        }

        let previous = self.active.write().replace(backend);
        match previous {
            Some(previous) => log::warn!(
                "lock backend {} replaced by {}; existing handles now resolve through the new backend",
                previous.name(),
                backend.name()
            ),
            None => log::debug!("lock backend {} registered", backend.name()),
        }
        Ok(())
    }

    /// Returns the active backend, if any.
    pub fn backend(&self) -> Option<&'static dyn LockBackend> {
        *self.active.read()
    }

    /// Returns `true` once a backend has been registered.
    pub fn is_registered(&self) -> bool {
        self.active.read().is_some()
    }

    /// Returns the active backend if it implements `op`.
    pub(crate) fn resolve(&self, op: Operations) -> Result<&'static dyn LockBackend, Error> {
        match self.backend() {
            Some(backend) if backend.operations().contains(op) => Ok(backend),
            Some(backend) => {
                log::trace!("lock backend {} does not implement {op:?}", backend.name());
                Err(Error::Unsupported)
            }
            None => {
                log::trace!("no lock backend registered for {op:?}");
                Err(Error::Unsupported)
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("backend", &self.backend().map(|backend| backend.name()))
            .finish()
    }
}

/// Installs `backend` in the process-wide registry, see [`Registry::register`].
pub fn register(backend: &'static dyn LockBackend) -> Result<(), Error> {
    Registry::global().register(backend)
}
