//! Global event stream and its temporal windows.
//!
//! Windows are data-driven: a window opens at its first event and collects
//! every following event with `ts < start + duration`. The first event at
//! or past that boundary opens the next window, so quiet periods produce no
//! empty windows and the final window may be shorter than the duration.

use mopred_core::DetectionEvent;
use serde::{Deserialize, Serialize};
use std::iter::Peekable;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Window {
    pub index: usize,
    pub start_ts: i64,
    /// Timestamp of the last event in the window.
    pub end_ts: i64,
    pub events: Vec<DetectionEvent>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Lazily partitions a time-sorted stream into windows.
///
/// Consumes its input; iterate again by building a new windower.
pub struct TemporalWindower<I: Iterator<Item = DetectionEvent>> {
    events: Peekable<I>,
    duration_ms: i64,
    next_index: usize,
}

impl<I: Iterator<Item = DetectionEvent>> TemporalWindower<I> {
    pub fn new(events: impl IntoIterator<IntoIter = I>, duration_ms: i64) -> Self {
        Self {
            events: events.into_iter().peekable(),
            duration_ms: duration_ms.max(1),
            next_index: 0,
        }
    }
}

impl<I: Iterator<Item = DetectionEvent>> Iterator for TemporalWindower<I> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let first = self.events.next()?;
        let start_ts = first.timestamp_ms;
        let boundary = start_ts + self.duration_ms;
        let mut end_ts = start_ts;
        let mut events = vec![first];

        while let Some(e) = self.events.next_if(|e| e.timestamp_ms < boundary) {
            debug_assert!(e.timestamp_ms >= end_ts, "stream must be time-sorted");
            end_ts = e.timestamp_ms;
            events.push(e);
        }

        let index = self.next_index;
        self.next_index += 1;
        Some(Window {
            index,
            start_ts,
            end_ts,
            events,
        })
    }
}
