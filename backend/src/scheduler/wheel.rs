//! Timing wheel with an overflow heap
//!
//! Buckets cover `granularity` each; the wheel spans `buckets × granularity`
//! from the cursor. Entries inside the span go to their bucket, kept sorted
//! by `(time, seq)` so pops are exact and FIFO on ties. Entries beyond the span
//! sit in a min-heap and migrate into the wheel as the cursor advances. When
//! the wheel runs dry the cursor jumps straight to the heap's minimum.
//!
//! Buckets that received entries are remembered, so `clear` only touches
//! those and an iteration reset costs what the iteration scheduled.

use super::arena::EventHandle;
use crate::core::SimTime;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub(crate) struct WheelEntry {
    pub time: SimTime,
    pub seq: u64,
    pub handle: EventHandle,
}

impl PartialEq for WheelEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for WheelEntry {}

impl PartialOrd for WheelEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WheelEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TimingWheel {
    granularity: i64,
    buckets: Vec<VecDeque<WheelEntry>>,
    mask: i64,
    /// Absolute slot index of the earliest bucket
    cursor: i64,
    overflow: BinaryHeap<Reverse<WheelEntry>>,
    /// Entries currently held in buckets
    in_wheel: usize,
    /// Indices of buckets filled since the last clear (may repeat)
    touched: Vec<usize>,
}

impl TimingWheel {
    pub fn new(granularity: SimTime, horizon: SimTime) -> Self {
        let granularity = granularity.as_nanos().max(1);
        let wanted = (horizon.as_nanos() / granularity).max(1) as usize;
        let size = wanted.next_power_of_two();
        Self {
            granularity,
            buckets: (0..size).map(|_| VecDeque::new()).collect(),
            mask: size as i64 - 1,
            cursor: 0,
            overflow: BinaryHeap::new(),
            in_wheel: 0,
            touched: Vec::new(),
        }
    }

    fn slot_of(&self, time: SimTime) -> i64 {
        time.as_nanos().div_euclid(self.granularity)
    }

    fn bucket_index(&self, slot: i64) -> usize {
        (slot & self.mask) as usize
    }

    fn span(&self) -> i64 {
        self.mask + 1
    }

    pub fn len(&self) -> usize {
        self.in_wheel + self.overflow.len()
    }

    pub fn push(&mut self, entry: WheelEntry) {
        // Entries earlier than the cursor still belong in the cursor bucket;
        // sorted insertion keeps them ahead of everything else there.
        let slot = self.slot_of(entry.time).max(self.cursor);
        if slot - self.cursor >= self.span() {
            self.overflow.push(Reverse(entry));
            return;
        }
        self.insert_at(slot, entry);
    }

    fn insert_at(&mut self, slot: i64, entry: WheelEntry) {
        let index = self.bucket_index(slot);
        let bucket = &mut self.buckets[index];
        if bucket.is_empty() {
            self.touched.push(index);
        }
        let position = bucket
            .iter()
            .rposition(|existing| *existing <= entry)
            .map_or(0, |p| p + 1);
        bucket.insert(position, entry);
        self.in_wheel += 1;
    }

    /// Move overflow entries that now fall inside the span into their buckets
    fn migrate(&mut self) {
        let limit = self.cursor + self.span();
        while let Some(Reverse(head)) = self.overflow.peek() {
            if self.slot_of(head.time) >= limit {
                break;
            }
            if let Some(Reverse(entry)) = self.overflow.pop() {
                let slot = self.slot_of(entry.time).max(self.cursor);
                self.insert_at(slot, entry);
            }
        }
    }

    /// Advance the cursor to the first non-empty bucket and return its head
    pub fn peek(&mut self) -> Option<WheelEntry> {
        loop {
            if self.len() == 0 {
                return None;
            }
            if self.in_wheel == 0 {
                if let Some(Reverse(head)) = self.overflow.peek() {
                    self.cursor = self.cursor.max(self.slot_of(head.time));
                }
                self.migrate();
            }
            let index = self.bucket_index(self.cursor);
            if let Some(front) = self.buckets[index].front() {
                return Some(*front);
            }
            self.cursor += 1;
            self.migrate();
        }
    }

    /// Remove the entry returned by the last `peek`
    pub fn pop(&mut self) -> Option<WheelEntry> {
        self.peek()?;
        let index = self.bucket_index(self.cursor);
        let entry = self.buckets[index].pop_front();
        if entry.is_some() {
            self.in_wheel -= 1;
        }
        entry
    }

    pub fn clear(&mut self) {
        for index in self.touched.drain(..) {
            self.buckets[index].clear();
        }
        self.overflow.clear();
        self.cursor = 0;
        self.in_wheel = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::arena::{EventArena, EventRecord};

    fn entries(times_ms: &[i64]) -> Vec<WheelEntry> {
        let mut arena: EventArena<()> = EventArena::default();
        times_ms
            .iter()
            .enumerate()
            .map(|(seq, ms)| {
                let time = SimTime::from_millis(*ms);
                let handle = arena.insert(EventRecord {
                    payload: (),
                    time,
                    reschedule_time: None,
                    owner: None,
                    canceled: false,
                    seq: seq as u64,
                });
                WheelEntry {
                    time,
                    seq: seq as u64,
                    handle,
                }
            })
            .collect()
    }

    #[test]
    fn test_clear_only_visits_filled_buckets() {
        let mut wheel = TimingWheel::new(SimTime::from_millis(1), SimTime::from_secs(4));
        assert_eq!(wheel.buckets.len(), 4096);
        for entry in entries(&[5, 5, 700, 3_000]) {
            wheel.push(entry);
        }
        assert_eq!(wheel.touched.len(), 3);

        wheel.clear();
        assert!(wheel.touched.is_empty());
        assert_eq!(wheel.len(), 0);
        assert!(wheel.buckets.iter().all(VecDeque::is_empty));
    }

    #[test]
    fn test_reuse_after_clear_keeps_order() {
        let mut wheel = TimingWheel::new(SimTime::from_millis(1), SimTime::from_millis(64));
        for entry in entries(&[10, 40, 500]) {
            wheel.push(entry);
        }
        assert_eq!(wheel.pop().map(|e| e.time), Some(SimTime::from_millis(10)));
        wheel.clear();

        for entry in entries(&[40, 10, 9_000]) {
            wheel.push(entry);
        }
        let times: Vec<i64> = std::iter::from_fn(|| wheel.pop())
            .map(|e| e.time.as_nanos() / 1_000_000)
            .collect();
        assert_eq!(times, vec![10, 40, 9_000]);
    }
}
