//! Id-indexed arena of shared resources.
//!
//! - lookup is O(1) by slot index
//! - removal never moves other entries, so live ids stay valid
//! - a removed slot keeps a weak reference and is reused only once every
//!   outstanding handle to its old resource has been dropped

use std::marker::PhantomData;
use std::rc::{Rc, Weak};

/// Typed id backed by a slot index.
pub trait PoolKey: Copy {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

enum Slot<T> {
    Live(Rc<T>),
    /// Freed by the owner; `Weak` tracks whether handles are still around.
    Retired(Weak<T>),
}

pub struct Pool<K, T> {
    slots: Vec<Slot<T>>,
    /// Retired slot indices, candidates for reuse.
    free: Vec<usize>,
    _key: PhantomData<K>,
}

impl<K: PoolKey, T> Default for Pool<K, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _key: PhantomData,
        }
    }
}

impl<K: PoolKey, T> Pool<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` and returns its id.
    ///
    /// Prefers a retired slot whose previous occupant has no handles left.
    pub fn insert(&mut self, value: Rc<T>) -> K {
        let reusable = self.free.iter().position(|&i| match &self.slots[i] {
            Slot::Retired(weak) => weak.strong_count() == 0,
            Slot::Live(_) => false,
        });

        if let Some(pos) = reusable {
            let index = self.free.swap_remove(pos);
            self.slots[index] = Slot::Live(value);
            return K::from_index(index);
        }

        self.slots.push(Slot::Live(value));
        K::from_index(self.slots.len() - 1)
    }

    pub fn get(&self, key: K) -> Option<&Rc<T>> {
        match self.slots.get(key.index())? {
            Slot::Live(value) => Some(value),
            Slot::Retired(_) => None,
        }
    }

    /// Drops the pool's reference and retires the slot.
    ///
    /// Returns the pool's reference so callers can decide when it dies.
    pub fn remove(&mut self, key: K) -> Option<Rc<T>> {
        let slot = self.slots.get_mut(key.index())?;
        let Slot::Live(value) = &*slot else {
            return None;
        };
        let value = Rc::clone(value);
        *slot = Slot::Retired(Rc::downgrade(&value));
        self.free.push(key.index());
        Some(value)
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &Rc<T>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Live(value) => Some((K::from_index(i), value)),
            Slot::Retired(_) => None,
        })
    }

    /// Drops every pool reference. Outstanding handles stay valid.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
