// SPDX-License-Identifier: MPL-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

struct Shared<V> {
    id: ViewId,
    state: Mutex<V>,
    mounted: AtomicBool,
    /// Bumped on every mutation; renderers watch it to know when to redraw.
    revision: watch::Sender<u64>,
}

/// Display-only state for one screen.
pub struct ViewHandle<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for ViewHandle<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> ViewHandle<V> {
    pub fn new(state: V) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                id: ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed)),
                state: Mutex::new(state),
                mounted: AtomicBool::new(true),
                revision,
            }),
        }
    }

    pub fn id(&self) -> ViewId {
        self.shared.id
    }

    pub fn read<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let state = self.shared.state.lock().expect("view lock poisoned");
        f(&state)
    }

    /// Mutate the state and schedule a re-render.
    pub fn update<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        let result = {
            let mut state = self.shared.state.lock().expect("view lock poisoned");
            f(&mut state)
        };
        self.shared.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub fn revision(&self) -> u64 {
        *self.shared.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Called when the screen is torn down. Late completions stop touching it.
    pub fn unmount(&self) {
        self.shared.mounted.store(false, Ordering::Release);
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.mounted.load(Ordering::Acquire)
    }

    pub fn downgrade(&self) -> WeakView<V> {
        WeakView {
            id: self.shared.id,
            shared: Arc::downgrade(&self.shared),
        }
    }
}

/// Reference held by in-flight work. Upgrades only while the view is alive and mounted.
pub struct WeakView<V> {
    id: ViewId,
    shared: Weak<Shared<V>>,
}

impl<V> Clone for WeakView<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<V> WeakView<V> {
    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn upgrade(&self) -> Option<ViewHandle<V>> {
        let shared = self.shared.upgrade()?;
        if !shared.mounted.load(Ordering::Acquire) {
            return None;
        }
        Some(ViewHandle { shared })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_bumps_revision() {
        let view = ViewHandle::new(0u32);
        let rx = view.subscribe();
        view.update(|n| *n += 5);
        assert_eq!(view.read(|n| *n), 5);
        assert_eq!(view.revision(), 1);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_read_does_not_bump_revision() {
        let view = ViewHandle::new(String::from("x"));
        let len = view.read(|s| s.len());
        assert_eq!(len, 1);
        assert_eq!(view.revision(), 0);
    }

    #[test]
    fn test_weak_view_respects_unmount() {
        let view = ViewHandle::new(());
        let weak = view.downgrade();
        assert!(weak.upgrade().is_some());
        view.unmount();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_weak_view_after_drop() {
        let view = ViewHandle::new(());
        let weak = view.downgrade();
        drop(view);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ViewHandle::new(());
        let b = ViewHandle::new(());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
        assert_eq!(a.downgrade().id(), a.id());
    }
}
