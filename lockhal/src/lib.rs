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

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! A pluggable lock abstraction layer.
//!
//! Portable code acquires and releases locks through a small facade (`init`, `destroy`,
//! `try_lock`, `lock`, `timed_lock`, `unlock`) and never names the synchronization primitive
//! underneath. Platform bootstrap code registers one [`LockBackend`](backend::LockBackend) that
//! implements the primitives.
//!
//! # Examples
//!
//! ```
//! use lockhal::backend::NativeBackend;
//! use lockhal::LockStatus;
//! use lockhal::Registry;
//!
//! static NATIVE: NativeBackend = NativeBackend;
//!
//! let registry = Registry::new();
//! registry.register(&NATIVE).unwrap();
//!
//! let handle = registry.init().unwrap();
//! assert_eq!(registry.try_lock(&handle), Ok(LockStatus::Success));
//! assert_eq!(registry.try_lock(&handle), Ok(LockStatus::Failure));
//! assert_eq!(registry.unlock(&handle), Ok(LockStatus::Success));
//! registry.destroy(handle).unwrap();
//! ```

mod check;
mod error;
mod handle;

pub mod backend;
pub mod facade;
pub mod registry;

pub use check::Check;
pub use error::name_of;
pub use error::status_code;
pub use error::DestroyError;
pub use error::Error;
pub use error::LockResult;
pub use error::LockStatus;
pub use error::Misuse;
pub use error::OK;
pub use facade::destroy;
pub use facade::init;
pub use facade::lock;
pub use facade::timed_lock;
pub use facade::try_lock;
pub use facade::unlock;
pub use facade::HandleGuard;
pub use facade::WAIT_FOREVER;
pub use handle::HandleId;
pub use handle::LockHandle;
pub use handle::NativeRef;
pub use registry::register;
pub use registry::Registry;
