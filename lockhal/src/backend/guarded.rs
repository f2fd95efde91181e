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
use std::collections::HashMap;
use std::fmt;
use std::sync::Weak;
use std::thread;
use std::thread::ThreadId;
use std::time::Instant;

use parking_lot::Mutex;

use super::LockBackend;
use super::Operations;
use crate::handle::HandleId;
use crate::DestroyError;
use crate::Error;
use crate::LockHandle;
use crate::LockResult;
use crate::LockStatus;
use crate::Misuse;

#[derive(Debug, Clone)]
enum State {
    Unlocked,
    Locked(ThreadId),
    /// Kept while handles to the destroyed lock survive. Native locks are watched so the entry can
    /// be dropped once the last handle is gone.
    Destroyed(Option<Weak<dyn Any + Send + Sync>>),
}

impl State {
    fn is_stale(&self) -> bool {
        matches!(self, State::Destroyed(Some(lock)) if lock.strong_count() == 0)
    }
}

/// A backend wrapper that detects contract violations.
///
/// Every handle created through the wrapper is tracked together with the thread holding it.
/// Unlocking a lock that is not held, unlocking from another thread, re-locking from the holding
/// thread and any use after `destroy` are refused with [`Error::Misuse`] instead of reaching the
/// wrapped backend.
///
/// Entries of destroyed native locks are pruned once no handle to them is left, so a recycled
/// address is never mistaken for a destroyed lock.
///
/// The bookkeeping takes an extra internal lock per call. Register the bare backend where that
/// cost matters.
pub struct Guarded<B> {
    inner: B,
    states: Mutex<HashMap<HandleId, State>>,
}

impl<B: LockBackend> Guarded<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Returns how many locks are currently tracked.
    pub fn tracked(&self) -> usize {
        self.states.lock().len()
    }

    /// Inspects the tracked state of `handle` and lets `f` decide whether the call may proceed.
    fn check<F>(&self, handle: &LockHandle, f: F) -> Result<(), Error>
    where
        F: FnOnce(&State, ThreadId) -> Result<Option<State>, Misuse>,
    {
        let mut states = self.states.lock();
        let state = states
            .get_mut(&handle.identity())
            .ok_or_else(|| report(handle, Misuse::UnknownHandle))?;
        if let State::Destroyed(_) = state {
            return Err(report(handle, Misuse::Destroyed));
        }
        match f(state, thread::current().id()) {
            Ok(Some(next)) => {
                *state = next;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(misuse) => Err(report(handle, misuse)),
        }
    }

    fn acquired(&self, handle: &LockHandle, result: LockResult) -> LockResult {
        if let Ok(LockStatus::Success) = result {
            let owner = thread::current().id();
            self.states
                .lock()
                .insert(handle.identity(), State::Locked(owner));
        }
        result
    }
}

fn report(handle: &LockHandle, misuse: Misuse) -> Error {
    log::error!("lock misuse on {handle:?}: {misuse}");
    Error::Misuse(misuse)
}

fn refuse_recursion(state: &State, me: ThreadId) -> Result<Option<State>, Misuse> {
    match state {
        State::Locked(owner) if *owner == me => Err(Misuse::RecursiveLock),
        _ => Ok(None),
    }
}

impl<B: LockBackend + fmt::Debug> fmt::Debug for Guarded<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("inner", &self.inner)
            .field("tracked", &self.tracked())
            .finish()
    }
}

impl<B: LockBackend> LockBackend for Guarded<B> {
    fn name(&self) -> &'static str {
        "guarded"
    }

    fn operations(&self) -> Operations {
        self.inner.operations()
    }

    fn init(&self) -> Result<LockHandle, Error> {
        let handle = self.inner.init()?;
        self.states.lock().insert(handle.identity(), State::Unlocked);
        Ok(handle)
    }

    fn destroy(&self, handle: LockHandle) -> Result<(), DestroyError> {
        let id = handle.identity();
        let mut states = self.states.lock();
        let misuse = match states.get(&id) {
            None => Some(Misuse::UnknownHandle),
            Some(State::Destroyed(_)) => Some(Misuse::Destroyed),
            Some(State::Locked(_)) => Some(Misuse::DestroyWhileLocked),
            Some(State::Unlocked) => None,
        };
        if let Some(misuse) = misuse {
            let error = report(&handle, misuse);
            return Err(DestroyError::new(error, handle));
        }

        let watch = handle.watch();
        self.inner.destroy(handle)?;
        states.retain(|_, state| !state.is_stale());
        match watch {
            Some(lock) if lock.strong_count() == 0 => {
                states.remove(&id);
            }
            lock => {
                states.insert(id, State::Destroyed(lock));
            }
        }
        Ok(())
    }

    fn try_lock(&self, handle: &LockHandle) -> LockResult {
        self.check(handle, |_, _| Ok(None))?;
        let result = self.inner.try_lock(handle);
        self.acquired(handle, result)
    }

    fn lock(&self, handle: &LockHandle) -> LockResult {
        self.check(handle, refuse_recursion)?;
        let result = self.inner.lock(handle);
        self.acquired(handle, result)
    }

    fn timed_lock(&self, handle: &LockHandle, deadline: Option<Instant>) -> LockResult {
        self.check(handle, refuse_recursion)?;
        let result = self.inner.timed_lock(handle, deadline);
        self.acquired(handle, result)
    }

    fn unlock(&self, handle: &LockHandle) -> LockResult {
        // Mark the lock free before releasing it, so the next holder's bookkeeping wins.
        self.check(handle, |state, me| match state {
            State::Locked(owner) if *owner == me => Ok(Some(State::Unlocked)),
            State::Locked(_) => Err(Misuse::UnlockByOtherThread),
            _ => Err(Misuse::UnlockNotHeld),
        })?;
        self.inner.unlock(handle)
    }
}
