// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Weak back-references from dependents to the wrapper that owns their memory.
//!
//! A wrapper that hands out dependents (buffer views over its pixels, textures
//! of a renderer, a pixel format of a surface) keeps a [`WeakBacklinkRegistry`].
//! Each dependent holds a [`Backlink`] registered with it. When the owner is
//! torn down it calls [`WeakBacklinkRegistry::release_all`] before freeing any
//! native memory, and every dependent observes its link as dead from then on.
//!
//! Links never keep the owner alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::host::lock;
use crate::{Error, Result};

struct LinkSlot {
    live: AtomicBool,
}

/// A dependent's weak link to its owner.
#[derive(Clone)]
pub struct Backlink {
    slot: Arc<LinkSlot>,
    kind: &'static str,
}

impl Backlink {
    /// A link that is dead from the start.
    pub fn dead(kind: &'static str) -> Self {
        Self {
            slot: Arc::new(LinkSlot {
                live: AtomicBool::new(false),
            }),
            kind,
        }
    }

    /// Returns `true` until the owner releases its registry.
    pub fn is_live(&self) -> bool {
        self.slot.live.load(Ordering::Acquire)
    }

    /// Fails with [`Error::InvalidHandle`] naming the owner once it is gone.
    pub fn check(&self) -> Result<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(Error::InvalidHandle(self.kind))
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl std::fmt::Debug for Backlink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backlink")
            .field("kind", &self.kind)
            .field("live", &self.is_live())
            .finish()
    }
}

/// The owner's side: every link it handed out.
pub struct WeakBacklinkRegistry {
    kind: &'static str,
    slots: Mutex<Vec<Weak<LinkSlot>>>,
    released: AtomicBool,
}

impl WeakBacklinkRegistry {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        }
    }

    /// Hands out a new link. After [`release_all`](Self::release_all) the link
    /// is dead from the start.
    pub fn register(&self) -> Backlink {
        let mut slots = lock(&self.slots);
        if self.released.load(Ordering::Acquire) {
            return Backlink::dead(self.kind);
        }
        slots.retain(|slot| slot.strong_count() > 0);
        let slot = Arc::new(LinkSlot {
            live: AtomicBool::new(true),
        });
        slots.push(Arc::downgrade(&slot));
        Backlink {
            slot,
            kind: self.kind,
        }
    }

    /// Marks every registered link dead. Idempotent.
    pub fn release_all(&self) {
        let mut slots = lock(&self.slots);
        self.released.store(true, Ordering::Release);
        let count = slots.len();
        for slot in slots.drain(..).filter_map(|slot| slot.upgrade()) {
            slot.live.store(false, Ordering::Release);
        }
        if count > 0 {
            tracing::trace!(kind = self.kind, count, "backlinks released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Number of links whose dependents are still alive.
    pub fn live_links(&self) -> usize {
        lock(&self.slots)
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }
}

/// A backlink that can also reach the owning wrapper while it is alive.
///
/// Used where a dependent needs the owner itself, not just its liveness
/// (a pixel format's palette, a texture's renderer).
pub struct WeakRef<T> {
    link: Backlink,
    target: Weak<T>,
}

impl<T> WeakRef<T> {
    pub fn new(registry: &WeakBacklinkRegistry, target: &Arc<T>) -> Self {
        Self {
            link: registry.register(),
            target: Arc::downgrade(target),
        }
    }

    /// Returns the owner if it is neither released nor dropped.
    pub fn upgrade(&self) -> Result<Arc<T>> {
        self.link.check()?;
        self.target
            .upgrade()
            .ok_or(Error::InvalidHandle(self.link.kind()))
    }

    pub fn link(&self) -> &Backlink {
        &self.link
    }
}

impl<T> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            target: self.target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_kills_every_link() {
        let registry = WeakBacklinkRegistry::new("owner");
        let a = registry.register();
        let b = registry.register();
        assert!(a.is_live() && b.is_live());
        assert_eq!(registry.live_links(), 2);

        registry.release_all();
        assert!(!a.is_live());
        assert_eq!(b.check(), Err(Error::InvalidHandle("owner")));

        registry.release_all();
        assert!(!registry.register().is_live());
    }

    #[test]
    fn dropped_dependents_are_pruned() {
        let registry = WeakBacklinkRegistry::new("owner");
        drop(registry.register());
        let kept = registry.register();
        assert_eq!(registry.live_links(), 1);
        drop(kept);
        assert_eq!(registry.live_links(), 0);
    }

    #[test]
    fn weak_ref_does_not_keep_the_owner() {
        let registry = WeakBacklinkRegistry::new("owner");
        let owner = Arc::new(5);
        let weak = WeakRef::new(&registry, &owner);
        assert_eq!(*weak.upgrade().unwrap(), 5);
        drop(owner);
        assert_eq!(weak.upgrade(), Err(Error::InvalidHandle("owner")));
    }
}
