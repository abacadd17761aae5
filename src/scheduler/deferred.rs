/*
 *  scheduler/deferred.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Deferred update queue - update work parked while animations run
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A parked `update()` call: which producer to refresh and how urgently.
///
/// Plain data rather than a callable so the queue stays inert; the main
/// loop executes drained tasks against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredTask {
    pub producer_id: String,

    /// Lower number drains first
    pub priority: u8,

    /// Enqueue sequence; ties on priority drain FIFO
    pub seq: u64,
}

impl Ord for DeferredTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the lowest (priority, seq)
        // pair pops first
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for DeferredTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority of the current producer's own deferred refresh
pub const PRIORITY_CURRENT: u8 = 1;

/// Priority of the periodic background refresh sweep
pub const PRIORITY_REFRESH: u8 = 5;

/// Queue of update work held back while a producer animates.
///
/// One pending task per producer: re-enqueueing the same producer keeps
/// the more urgent of the two entries.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    heap: BinaryHeap<DeferredTask>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Park an update for `producer_id`. Deduplicates per producer.
    pub fn push(&mut self, producer_id: &str, priority: u8) {
        if let Some(existing) = self.heap.iter().find(|t| t.producer_id == producer_id) {
            if existing.priority <= priority {
                return;
            }
            // more urgent now; rebuild without the stale entry
            let keep: Vec<DeferredTask> = self
                .heap
                .drain()
                .filter(|t| t.producer_id != producer_id)
                .collect();
            self.heap = keep.into_iter().collect();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(DeferredTask {
            producer_id: producer_id.to_string(),
            priority,
            seq,
        });
    }

    /// Remove and return all pending tasks in drain order
    pub fn drain(&mut self) -> Vec<DeferredTask> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(task) = self.heap.pop() {
            out.push(task);
        }
        out
    }

    /// Forget any task parked for a producer (it was unloaded)
    pub fn discard(&mut self, producer_id: &str) {
        let keep: Vec<DeferredTask> = self
            .heap
            .drain()
            .filter(|t| t.producer_id != producer_id)
            .collect();
        self.heap = keep.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drains_by_priority_then_fifo() {
        let mut q = DeferredQueue::new();
        q.push("slow", PRIORITY_REFRESH);
        q.push("urgent", PRIORITY_CURRENT);
        q.push("also-slow", PRIORITY_REFRESH);

        let order: Vec<String> = q.drain().into_iter().map(|t| t.producer_id).collect();
        assert_eq!(order, vec!["urgent", "slow", "also-slow"]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_dedupe_keeps_most_urgent() {
        let mut q = DeferredQueue::new();
        q.push("clock", PRIORITY_REFRESH);
        q.push("clock", PRIORITY_CURRENT);
        q.push("clock", PRIORITY_REFRESH);

        assert_eq!(q.len(), 1);
        let tasks = q.drain();
        assert_eq!(tasks[0].priority, PRIORITY_CURRENT);
    }

    #[test]
    fn test_discard_removes_only_that_producer() {
        let mut q = DeferredQueue::new();
        q.push("a", PRIORITY_REFRESH);
        q.push("b", PRIORITY_REFRESH);

        q.discard("a");
        let order: Vec<String> = q.drain().into_iter().map(|t| t.producer_id).collect();
        assert_eq!(order, vec!["b"]);
    }
}
