//! # Priority Queue Set
//!
//! Five FIFO buckets, one per [`Priority`], sharing one capacity bound.
//!
//! ## Selection
//!
//! - `Priority`: front of the most urgent non-empty bucket.
//! - `Fifo`: the bucket front with the lowest sequence number. Each bucket is
//!   already sequence-ordered (retries go back to the front with their old
//!   sequence number), so comparing fronts finds the global minimum.
//! - `Deadline`: earliest effective deadline, ties broken by sequence number.
//!   Retries break the per-bucket ordering here, so all events are scanned.
//!
//! ## Invariants
//!
//! - `len() <= capacity()` at all times.
//! - Every event lives in exactly one bucket: the one for its priority.

use super::event::Event;
use super::priority::{Priority, ProcessingStrategy, PRIORITY_COUNT};
use crate::error::BusError;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct PriorityQueueSet {
    buckets: [VecDeque<Event>; PRIORITY_COUNT],
    capacity: usize,
    len: usize,
}

impl PriorityQueueSet {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: Default::default(),
            capacity,
            len: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.len)
    }

    #[must_use]
    pub fn depth(&self, priority: Priority) -> usize {
        self.buckets[priority.index()].len()
    }

    /// Append to the tail of the event's bucket.
    ///
    /// # Errors
    ///
    /// `QueueFull` when the set is at capacity.
    pub fn push_back(&mut self, event: Event) -> Result<(), BusError> {
        if self.len >= self.capacity {
            return Err(BusError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.buckets[event.priority.index()].push_back(event);
        self.len += 1;
        Ok(())
    }

    /// Put an event back at the head of its bucket so it runs before peers
    /// queued after it.
    ///
    /// Hands the event back when there is no room.
    pub fn push_front(&mut self, event: Event) -> Result<(), Event> {
        if self.len >= self.capacity {
            return Err(event);
        }
        self.buckets[event.priority.index()].push_front(event);
        self.len += 1;
        Ok(())
    }

    /// Remove and return the next event under `strategy`.
    ///
    /// `only` restricts selection to one bucket.
    pub fn pop_next(
        &mut self,
        strategy: ProcessingStrategy,
        only: Option<Priority>,
    ) -> Option<Event> {
        let (bucket, position) = self.locate_next(strategy, only)?;
        let event = self.buckets[bucket].remove(position)?;
        self.len -= 1;
        Some(event)
    }

    fn locate_next(
        &self,
        strategy: ProcessingStrategy,
        only: Option<Priority>,
    ) -> Option<(usize, usize)> {
        let candidates: &[Priority] = match &only {
            Some(p) => std::slice::from_ref(p),
            None => &Priority::ALL,
        };

        match strategy {
            ProcessingStrategy::Priority => candidates
                .iter()
                .map(|p| p.index())
                .find(|&b| !self.buckets[b].is_empty())
                .map(|b| (b, 0)),
            ProcessingStrategy::Fifo => candidates
                .iter()
                .map(|p| p.index())
                .filter_map(|b| self.buckets[b].front().map(|e| (b, e.sequence_number)))
                .min_by_key(|&(_, seq)| seq)
                .map(|(b, _)| (b, 0)),
            ProcessingStrategy::Deadline => candidates
                .iter()
                .map(|p| p.index())
                .flat_map(|b| {
                    self.buckets[b].iter().enumerate().map(move |(i, e)| {
                        ((e.effective_deadline(), e.sequence_number), (b, i))
                    })
                })
                .min_by_key(|&(key, _)| key)
                .map(|(_, at)| at),
        }
    }

    /// Drop every queued event, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
        dropped
    }
}
