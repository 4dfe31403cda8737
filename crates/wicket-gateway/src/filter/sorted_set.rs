//! A sorted, deduplicated allow-list with match-all-when-empty semantics.

use std::sync::Mutex;

/// Thread-safe set of comparable items kept sorted for binary-search
/// matching. An empty set means "no restriction": `matches` accepts
/// everything until the first item is added.
///
/// Each instance has its own lock; nothing here ever takes another
/// component's lock.
pub struct SortedSetFilter<T> {
    items: Mutex<Vec<T>>,
}

impl<T: Ord + Clone> SortedSetFilter<T> {
    pub fn new(seed: Vec<T>) -> Self {
        let mut items = seed;
        items.sort();
        items.dedup();
        Self {
            items: Mutex::new(items),
        }
    }

    /// Merge new items in, keeping the sequence sorted and deduplicated.
    /// The incoming batch is sorted once, then folded in with a single
    /// linear merge.
    pub fn add(&self, new_items: &[T]) {
        if new_items.is_empty() {
            return;
        }
        let mut incoming = new_items.to_vec();
        incoming.sort();
        incoming.dedup();

        let mut items = self.items.lock().unwrap();
        let old = std::mem::take(&mut *items);
        let mut merged = Vec::with_capacity(old.len() + incoming.len());
        let mut a = old.into_iter().peekable();
        let mut b = incoming.into_iter().peekable();
        loop {
            match (a.peek(), b.peek()) {
                (Some(x), Some(y)) => {
                    if x <= y {
                        merged.push(a.next().unwrap());
                    } else {
                        merged.push(b.next().unwrap());
                    }
                }
                (Some(_), None) => merged.push(a.next().unwrap()),
                (None, Some(_)) => merged.push(b.next().unwrap()),
                (None, None) => break,
            }
        }
        merged.dedup();
        *items = merged;
    }

    /// Drop every listed item that is present. Both sequences are sorted,
    /// so one co-sorted scan suffices; absent items are ignored.
    pub fn remove(&self, dead_items: &[T]) {
        if dead_items.is_empty() {
            return;
        }
        let mut dead = dead_items.to_vec();
        dead.sort();
        dead.dedup();

        let mut items = self.items.lock().unwrap();
        let old = std::mem::take(&mut *items);
        let mut kept = Vec::with_capacity(old.len());
        let mut d = 0;
        for item in old {
            while d < dead.len() && dead[d] < item {
                d += 1;
            }
            if d < dead.len() && dead[d] == item {
                continue;
            }
            kept.push(item);
        }
        *items = kept;
    }

    /// Snapshot of the current items, in order.
    pub fn items(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }

    /// Empty means unrestricted; otherwise membership by binary search.
    pub fn matches(&self, candidate: &T) -> bool {
        let items = self.items.lock().unwrap();
        items.is_empty() || items.binary_search(candidate).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}
