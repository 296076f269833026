//! Generational slab for scheduled events
//!
//! Slots are recycled through a free list. Every slot carries a generation
//! counter that is bumped when the slot is released, so a handle kept past its
//! event's lifetime (executed, reclaimed, or from a previous iteration) can
//! never resolve to the slot's new occupant.

use crate::core::{ActorId, SimTime};

/// Stable, non-owning reference to a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    index: u32,
    generation: u32,
}

impl EventHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Event record stored in an occupied slot
#[derive(Debug, Clone)]
pub(crate) struct EventRecord<E> {
    pub payload: E,
    /// Time of the live wheel entry for this record
    pub time: SimTime,
    /// Deferred effective time, applied when the wheel entry surfaces
    pub reschedule_time: Option<SimTime>,
    pub owner: Option<ActorId>,
    pub canceled: bool,
    /// Sequence number of the live wheel entry; older entries are stale
    pub seq: u64,
}

impl<E> EventRecord<E> {
    /// Effective execution time
    pub fn occurs(&self) -> SimTime {
        self.reschedule_time.unwrap_or(self.time)
    }
}

#[derive(Debug, Clone)]
struct Slot<E> {
    generation: u32,
    record: Option<EventRecord<E>>,
}

#[derive(Debug, Clone)]
pub(crate) struct EventArena<E> {
    slots: Vec<Slot<E>>,
    free: Vec<u32>,
    live: usize,
}

impl<E> Default for EventArena<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<E> EventArena<E> {
    pub fn insert(&mut self, record: EventRecord<E>) -> EventHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return EventHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        EventHandle {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, handle: EventHandle) -> Option<&EventRecord<E>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.record.as_ref()
    }

    pub fn get_mut(&mut self, handle: EventHandle) -> Option<&mut EventRecord<E>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.record.as_mut()
    }

    /// Release a slot back to the free list, invalidating outstanding handles
    pub fn remove(&mut self, handle: EventHandle) -> Option<EventRecord<E>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(record)
    }

    /// Visit every occupied slot
    pub fn for_each_mut(&mut self, mut f: impl FnMut(EventHandle, &mut EventRecord<E>)) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let generation = slot.generation;
            if let Some(record) = slot.record.as_mut() {
                f(
                    EventHandle {
                        index: index as u32,
                        generation,
                    },
                    record,
                );
            }
        }
    }

    /// Release everything while keeping capacity
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.record.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        self.live = 0;
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: u32) -> EventRecord<u32> {
        EventRecord {
            payload,
            time: SimTime::ZERO,
            reschedule_time: None,
            owner: None,
            canceled: false,
            seq: 0,
        }
    }

    #[test]
    fn test_slots_are_reused() {
        let mut arena = EventArena::default();
        let a = arena.insert(record(1));
        arena.remove(a);
        let b = arena.insert(record(2));
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert_eq!(arena.capacity(), 1);
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut arena = EventArena::default();
        let a = arena.insert(record(1));
        arena.remove(a);
        let _b = arena.insert(record(2));
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_clear_invalidates_all_handles() {
        let mut arena = EventArena::default();
        let handles: Vec<_> = (0..5).map(|i| arena.insert(record(i))).collect();
        arena.clear();
        assert_eq!(arena.len(), 0);
        assert!(handles.iter().all(|h| arena.get(*h).is_none()));
        let again = arena.insert(record(9));
        assert_eq!(again.index(), 0, "free list hands out low slots first");
        assert_eq!(arena.capacity(), 5);
    }
}
