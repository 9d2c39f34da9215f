// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change-listener registry shared by the gate, the scroll engine and the
//! position adapter.

use std::rc::Rc;

/// Identifies a registered change listener.
///
/// Ids are assigned monotonically per registry and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Ordered set of listeners of type `F`.
///
/// Notification works on a snapshot, so a listener may add or remove
/// listeners (including itself) while being called.
pub(crate) struct ListenerSet<F: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerId, Rc<F>)>,
}

impl<F: ?Sized> ListenerSet<F> {
    pub(crate) const fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, listener: Rc<F>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<F>> {
        self.entries.iter().map(|(_, f)| Rc::clone(f)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<F: ?Sized> core::fmt::Debug for ListenerSet<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut set: ListenerSet<dyn Fn()> = ListenerSet::new();
        let a = set.add(Rc::new(|| {}));
        assert!(set.remove(a), "first removal succeeds");
        assert!(!set.remove(a), "second removal is a no-op");
        let b = set.add(Rc::new(|| {}));
        assert_ne!(a, b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let mut set: ListenerSet<dyn Fn() -> u8> = ListenerSet::new();
        set.add(Rc::new(|| 1));
        set.add(Rc::new(|| 2));
        set.add(Rc::new(|| 3));
        let order: Vec<u8> = set.snapshot().iter().map(|f| f()).collect();
        assert_eq!(order, [1, 2, 3]);
    }
}
