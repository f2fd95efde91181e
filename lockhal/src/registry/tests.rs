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

use super::*;
use crate::backend::native;
use crate::backend::NativeBackend;
use crate::backend::OpsTable;
use crate::backend::PoolBackend;
use crate::LockStatus;

static NATIVE: NativeBackend = NativeBackend;
static POOL: PoolBackend = PoolBackend::new(8);

static NO_INIT: OpsTable = OpsTable {
    init: None,
    ..native::TABLE
};
static NO_TRY_LOCK: OpsTable = OpsTable {
    try_lock: None,
    ..native::TABLE
};
static NO_UNLOCK: OpsTable = OpsTable {
    unlock: None,
    ..native::TABLE
};
static MINIMAL: OpsTable = OpsTable {
    name: "minimal",
    destroy: None,
    lock: None,
    timed_lock: None,
    ..native::TABLE
};

fn active_name(registry: &Registry) -> Option<&'static str> {
    registry.backend().map(|backend| backend.name())
}

#[test]
fn test_register() {
    let registry = Registry::new();
    assert!(!registry.is_registered());
    assert_eq!(active_name(&registry), None);

    registry.register(&NATIVE).unwrap();
    assert!(registry.is_registered());
    assert_eq!(active_name(&registry), Some("native"));
}

#[test]
fn test_optional_operations_may_be_missing() {
    let registry = Registry::new();
    registry.register(&MINIMAL).unwrap();
    assert_eq!(active_name(&registry), Some("minimal"));
}

#[test]
fn test_missing_required_operation_is_rejected() {
    for table in [&NO_INIT, &NO_TRY_LOCK, &NO_UNLOCK] {
        let registry = Registry::new();
        assert_eq!(registry.register(table), Err(Error::InvalidArgument));
        assert!(!registry.is_registered());

        registry.register(&NATIVE).unwrap();
        assert_eq!(registry.register(table), Err(Error::InvalidArgument));
        assert_eq!(active_name(&registry), Some("native"));
    }

    let registry = Registry::new();
    assert_eq!(registry.register(&OpsTable::EMPTY), Err(Error::InvalidArgument));
}

#[test]
fn test_last_registration_wins() {
    let registry = Registry::new();
    registry.register(&NATIVE).unwrap();
    registry.register(&POOL).unwrap();
    assert_eq!(active_name(&registry), Some("pool"));

    let handle = registry.init().unwrap();
    assert!(handle.slot().is_some());
    registry.destroy(handle).unwrap();
}

#[test]
fn test_switching_backends_affects_existing_handles() {
    let registry = Registry::new();
    registry.register(&NATIVE).unwrap();
    let handle = registry.init().unwrap();
    assert_eq!(registry.try_lock(&handle), Ok(LockStatus::Success));
    assert_eq!(registry.unlock(&handle), Ok(LockStatus::Success));

    // The native handle now resolves through the pool, which does not know it.
    registry.register(&POOL).unwrap();
    assert_eq!(registry.try_lock(&handle), Ok(LockStatus::Failure));
    let err = registry.destroy(handle).unwrap_err();
    assert_eq!(err.error(), Error::InvalidArgument);
    let handle = err.into_handle();

    registry.register(&NATIVE).unwrap();
    assert_eq!(registry.try_lock(&handle), Ok(LockStatus::Success));
    assert_eq!(registry.unlock(&handle), Ok(LockStatus::Success));
    registry.destroy(handle).unwrap();
}

#[test]
fn test_registries_are_independent() {
    let native = Registry::new();
    let pool = Registry::new();
    native.register(&NATIVE).unwrap();
    pool.register(&POOL).unwrap();

    let a = native.init().unwrap();
    let b = pool.init().unwrap();
    assert!(a.downcast_native::<()>().is_none());
    assert!(a.slot().is_none());
    assert!(b.slot().is_some());

    native.destroy(a).unwrap();
    pool.destroy(b).unwrap();
}

// The only test touching the process-wide registry.
#[test]
fn test_global_registry() {
    assert!(std::ptr::eq(Registry::global(), Registry::global()));

    crate::register(&NATIVE).unwrap();
    assert_eq!(active_name(Registry::global()), Some("native"));

    let handle = crate::init().unwrap();
    assert_eq!(crate::try_lock(&handle), Ok(LockStatus::Success));
    assert_eq!(crate::try_lock(&handle), Ok(LockStatus::Failure));
    assert_eq!(crate::timed_lock(&handle, 0), Ok(LockStatus::Failure));
    assert_eq!(crate::unlock(&handle), Ok(LockStatus::Success));
    assert_eq!(crate::lock(&handle), Ok(LockStatus::Success));
    assert_eq!(crate::unlock(&handle), Ok(LockStatus::Success));
    crate::destroy(handle).unwrap();
}
