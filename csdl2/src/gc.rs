// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Cycle-collector integration.
//!
//! Wrappers that keep host objects alive (callbacks, user data, render
//! targets) implement [`Traverse`] so the host's collector can see those
//! references and break cycles through them. Clearing host references never
//! releases native memory; that stays with the wrapper's own teardown.

use crate::host::HostRef;

/// Participation in the host's cycle collector.
pub trait Traverse {
    /// Calls `visit` once per host reference held. Never follows native memory.
    fn traverse(&self, visit: &mut dyn FnMut(&HostRef));

    /// Drops every held host reference. Must be idempotent and safe to call
    /// after the native resource has been released.
    fn clear(&self);
}

/// Returns the host references `object` currently holds.
pub fn reachable(object: &dyn Traverse) -> Vec<HostRef> {
    let mut found = Vec::new();
    object.traverse(&mut |r| found.push(r.clone()));
    found
}

/// Runs a collection pass over `object`: traverses it, then clears it.
///
/// Returns the number of host references that were released.
pub fn collect(object: &dyn Traverse) -> usize {
    let mut count = 0;
    object.traverse(&mut |_| count += 1);
    object.clear();
    tracing::trace!(released = count, "collected host references");
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::lock;
    use std::sync::Mutex;

    struct Holder(Mutex<Vec<HostRef>>);

    impl Traverse for Holder {
        fn traverse(&self, visit: &mut dyn FnMut(&HostRef)) {
            lock(&self.0).iter().for_each(visit);
        }

        fn clear(&self) {
            lock(&self.0).clear();
        }
    }

    #[test]
    fn collect_clears_and_is_idempotent() {
        let shared = HostRef::new("userdata");
        let holder = Holder(Mutex::new(vec![shared.clone(), HostRef::new(1u32)]));
        assert_eq!(shared.strong_count(), 2);
        assert!(reachable(&holder)[0].ptr_eq(&shared));

        assert_eq!(collect(&holder), 2);
        assert_eq!(shared.strong_count(), 1);
        assert_eq!(collect(&holder), 0);
    }
}
