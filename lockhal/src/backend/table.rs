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
use std::time::Instant;

use super::LockBackend;
use super::Operations;
use crate::DestroyError;
use crate::Error;
use crate::LockHandle;
use crate::LockResult;

/// A backend described by plain function pointers.
///
/// A `None` slot is an operation the backend does not implement. Tables are usually `static`s so
/// they can be registered directly:
///
/// ```
/// use lockhal::backend::native;
/// use lockhal::backend::OpsTable;
/// use lockhal::Registry;
///
/// static NO_TIMEOUTS: OpsTable = OpsTable {
///     timed_lock: None,
///     ..native::TABLE
/// };
///
/// let registry = Registry::new();
/// registry.register(&NO_TIMEOUTS).unwrap();
/// let handle = registry.init().unwrap();
/// assert!(registry.timed_lock(&handle, 10).is_err());
/// ```
#[derive(Clone, Copy)]
pub struct OpsTable {
    pub name: &'static str,
    pub init: Option<fn() -> Result<LockHandle, Error>>,
    pub destroy: Option<fn(LockHandle) -> Result<(), DestroyError>>,
    pub try_lock: Option<fn(&LockHandle) -> LockResult>,
    pub lock: Option<fn(&LockHandle) -> LockResult>,
    pub timed_lock: Option<fn(&LockHandle, Option<Instant>) -> LockResult>,
    pub unlock: Option<fn(&LockHandle) -> LockResult>,
}

impl OpsTable {
    /// A table with every slot empty.
    pub const EMPTY: OpsTable = OpsTable {
        name: "table",
        init: None,
        destroy: None,
        try_lock: None,
        lock: None,
        timed_lock: None,
        unlock: None,
    };
}

impl fmt::Debug for OpsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpsTable")
            .field("name", &self.name)
            .field("operations", &self.operations())
            .finish()
    }
}

impl LockBackend for OpsTable {
    fn name(&self) -> &'static str {
        self.name
    }

    fn operations(&self) -> Operations {
        let mut ops = Operations::empty();
        ops.set(Operations::INIT, self.init.is_some());
        ops.set(Operations::DESTROY, self.destroy.is_some());
        ops.set(Operations::TRY_LOCK, self.try_lock.is_some());
        ops.set(Operations::LOCK, self.lock.is_some());
        ops.set(Operations::TIMED_LOCK, self.timed_lock.is_some());
        ops.set(Operations::UNLOCK, self.unlock.is_some());
        ops
    }

    fn init(&self) -> Result<LockHandle, Error> {
        let init = self.init.ok_or(Error::Unsupported)?;
        init()
    }

    fn destroy(&self, handle: LockHandle) -> Result<(), DestroyError> {
        match self.destroy {
            Some(destroy) => destroy(handle),
            None => Err(DestroyError::new(Error::Unsupported, handle)),
        }
    }

    fn try_lock(&self, handle: &LockHandle) -> LockResult {
        let try_lock = self.try_lock.ok_or(Error::Unsupported)?;
        try_lock(handle)
    }

    fn lock(&self, handle: &LockHandle) -> LockResult {
        let lock = self.lock.ok_or(Error::Unsupported)?;
        lock(handle)
    }

    fn timed_lock(&self, handle: &LockHandle, deadline: Option<Instant>) -> LockResult {
        let timed_lock = self.timed_lock.ok_or(Error::Unsupported)?;
        timed_lock(handle, deadline)
    }

    fn unlock(&self, handle: &LockHandle) -> LockResult {
        let unlock = self.unlock.ok_or(Error::Unsupported)?;
        unlock(handle)
    }
}
