//! # Replay Recorder
//!
//! Circular history of the most recently published events. When full, the
//! oldest entry is overwritten.

use super::event::Event;
use crate::DEFAULT_REPLAY_HISTORY_DEPTH;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct ReplayRecorder {
    history: VecDeque<Event>,
    depth: usize,
    recording: bool,
}

impl ReplayRecorder {
    /// Recorder holding at most `depth` events. Storage grows on demand
    /// past the default depth.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(depth.min(DEFAULT_REPLAY_HISTORY_DEPTH)),
            depth,
            recording: true,
        }
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Toggle capture. Existing history is kept.
    pub fn set_recording(&mut self, enabled: bool) {
        self.recording = enabled;
    }

    /// Copy `event` into history if recording.
    pub fn record(&mut self, event: &Event) {
        if !self.recording || self.depth == 0 {
            return;
        }
        if self.history.len() == self.depth {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.history.iter().cloned().collect()
    }

    /// Copies of `[start, start + count)`, oldest-first indexing.
    ///
    /// `None` when the window runs past the end.
    #[must_use]
    pub fn window(&self, start: usize, count: usize) -> Option<Vec<Event>> {
        let end = start.checked_add(count)?;
        if end > self.history.len() {
            return None;
        }
        Some(self.history.range(start..end).cloned().collect())
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
