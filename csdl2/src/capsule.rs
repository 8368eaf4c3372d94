// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Process-wide registry of named tables shared between extensions.
//!
//! An extension publishes a `'static` table under a dotted name, and other
//! extensions import it by that name without linking against the publisher.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::host::lock;
use crate::{Error, Result};

type Table = &'static (dyn Any + Send + Sync);

static REGISTRY: Mutex<BTreeMap<&'static str, Table>> = Mutex::new(BTreeMap::new());

/// Publishes `table` under `name`.
///
/// Publishing the same table twice is a no-op.
///
/// # Errors
///
/// Returns [`Error::Contract`] if a different table is already published
/// under `name`.
pub fn publish<T: Any + Send + Sync>(name: &'static str, table: &'static T) -> Result<()> {
    let mut registry = lock(&REGISTRY);
    match registry.get(name).copied() {
        Some(existing) if std::ptr::addr_eq(existing as *const (dyn Any + Send + Sync), table) => {
            Ok(())
        }
        Some(_) => Err(Error::Contract(format!(
            "capsule \"{name}\" is already published"
        ))),
        None => {
            registry.insert(name, table);
            tracing::debug!(name, "published capsule");
            Ok(())
        }
    }
}

/// Looks up the table published under `name`.
///
/// # Errors
///
/// Returns [`Error::InvalidArg`] if nothing is published under `name` or the
/// published table is not a `T`.
pub fn import<T: Any + Send + Sync>(name: &str) -> Result<&'static T> {
    let table = lock(&REGISTRY)
        .get(name)
        .copied()
        .ok_or_else(|| Error::InvalidArg(format!("capsule \"{name}\" is not published")))?;
    table
        .downcast_ref::<T>()
        .ok_or_else(|| Error::InvalidArg(format!("capsule \"{name}\" has an unexpected type")))
}

#[cfg(test)]
mod tests {
    use super::*;

    static FIRST: u32 = 1;
    static SECOND: u32 = 2;

    #[test]
    fn publish_then_import() {
        publish("tests.first", &FIRST).unwrap();
        publish("tests.first", &FIRST).unwrap();
        assert_eq!(*import::<u32>("tests.first").unwrap(), 1);
        assert!(matches!(
            publish("tests.first", &SECOND),
            Err(Error::Contract(_))
        ));
    }

    #[test]
    fn unknown_name_and_wrong_type_are_rejected() {
        assert!(matches!(import::<u32>("tests.missing"), Err(Error::InvalidArg(_))));
        publish("tests.typed", &SECOND).unwrap();
        assert!(matches!(import::<u64>("tests.typed"), Err(Error::InvalidArg(_))));
    }
}
