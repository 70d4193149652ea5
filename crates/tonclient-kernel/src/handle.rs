//! Generational handle table
//!
//! Maps small integer handles to live resources. Every slot carries a
//! generation counter so a handle to a retired slot stays invalid after the
//! slot is reused, and every table carries an owner id so handles issued by
//! one table never resolve in another.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

/// Lightweight handle to an engine context owned by one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle {
    owner: u32,
    index: u32,
    generation: u32,
}

impl ContextHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}v{}", self.owner, self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of values addressed by [`ContextHandle`].
pub struct HandleTable<T> {
    owner: u32,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a value, reusing a retired slot when one is free.
    pub fn insert(&mut self, value: T) -> ContextHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return ContextHandle {
                owner: self.owner,
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ContextHandle {
            owner: self.owner,
            index,
            generation: 0,
        }
    }

    fn slot(&self, handle: &ContextHandle) -> Option<&Slot<T>> {
        if handle.owner != self.owner {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    pub fn get(&self, handle: &ContextHandle) -> Option<&T> {
        self.slot(handle).and_then(|slot| slot.value.as_ref())
    }

    pub fn contains(&self, handle: &ContextHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Retire a handle. The slot generation advances so the handle, and any
    /// copy of it, stops resolving.
    pub fn remove(&mut self, handle: &ContextHandle) -> Option<T> {
        if handle.owner != self.owner {
            return None;
        }
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Remove every live value, returning them with their handles.
    pub fn drain(&mut self) -> Vec<(ContextHandle, T)> {
        let owner = self.owner;
        let mut drained = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                drained.push((
                    ContextHandle {
                        owner,
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                ));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        drained
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
