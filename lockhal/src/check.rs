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

use crate::DestroyError;
use crate::Error;

/// Logs failed lock calls.
///
/// The lock operations never log on their own behalf; callers that want a record of every failure
/// route results through [`Check::check`], which emits an `error!` with `tag` as the log target.
///
/// ```
/// use lockhal::Check;
/// use lockhal::Registry;
///
/// let registry = Registry::new();
/// let result = registry.init().check("bootstrap");
/// assert!(result.is_err());
///
/// let refused = registry.destroy(lockhal::LockHandle::Slot(0)).check("teardown");
/// assert!(refused.is_err());
/// ```
pub trait Check: Sized {
    /// Logs the error under the `tag` target, if there is one, and returns `self` unchanged.
    fn check(self, tag: &str) -> Self;
}

impl<T> Check for Result<T, Error> {
    fn check(self, tag: &str) -> Self {
        if let Err(err) = &self {
            log::error!(
                target: tag,
                "an error occurred: {err} ({}, code {})",
                err.name(),
                err.code()
            );
        }
        self
    }
}

impl Check for Result<(), DestroyError> {
    fn check(self, tag: &str) -> Self {
        if let Err(err) = &self {
            log::error!(
                target: tag,
                "an error occurred: {err} ({}, code {})",
                err.error().name(),
                err.error().code()
            );
        }
        self
    }
}
