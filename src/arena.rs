//! Generational slot arena used to store pending events.
//!
//! Removed slots go on a free list and are reused. Every reuse bumps the slot generation, so a stale
//! [`ArenaIndex`] never resolves to a newer value stored in the same slot.

use std::fmt;

/// An index into an [`Arena`] carrying the generation of the slot it was issued for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    #[cfg(test)]
    pub(crate) fn slot(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next_free: Option<u32>, generation: u32 },
}

#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, value: T) -> ArenaIndex {
        self.len += 1;
        match self.free_head {
            Some(free) => {
                let slot = &mut self.slots[free as usize];
                let (next_free, generation) = match slot {
                    Slot::Vacant { next_free, generation } => (*next_free, *generation),
                    Slot::Occupied { .. } => unreachable!("free list pointed to occupied slot"),
                };
                self.free_head = next_free;
                *slot = Slot::Occupied { value, generation };
                ArenaIndex {
                    index: free,
                    generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("event arena overflow");
                self.slots.push(Slot::Occupied { value, generation: 0 });
                ArenaIndex { index, generation: 0 }
            }
        }
    }

    /// Removes the value at `index`, returning `None` for stale or vacant indices.
    pub(crate) fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let slot = self.slots.get_mut(index.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == index.generation => {
                let vacant = Slot::Vacant {
                    next_free: self.free_head,
                    generation: generation.wrapping_add(1),
                };
                self.free_head = Some(index.index);
                self.len -= 1;
                match std::mem::replace(slot, vacant) {
                    Slot::Occupied { value, .. } => Some(value),
                    Slot::Vacant { .. } => unreachable!(),
                }
            }
            _ => None,
        }
    }

    pub(crate) fn get(&self, index: ArenaIndex) -> Option<&T> {
        match self.slots.get(index.index as usize)? {
            Slot::Occupied { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        match self.slots.get_mut(index.index as usize)? {
            Slot::Occupied { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, index: ArenaIndex) -> bool {
        self.get(index).is_some()
    }
}
