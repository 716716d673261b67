//! Bounded event timeline
//!
//! The bus appends every published event to a FIFO buffer capped at the
//! configured retention. [`Timeline`] is an immutable snapshot of that buffer
//! that can be iterated any number of times.

use crate::notifications::event::{CorrelationId, Event};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct TimelineBuffer {
    events: VecDeque<Arc<Event>>,
    retention: usize,
    evicted: u64,
}

impl TimelineBuffer {
    pub(crate) fn new(retention: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(retention.min(1024)),
            retention,
            evicted: 0,
        }
    }

    pub(crate) fn push(&mut self, event: Arc<Event>) {
        if self.retention == 0 {
            self.evicted += 1;
            return;
        }
        while self.events.len() >= self.retention {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(event);
    }

    pub(crate) fn snapshot(&self) -> Timeline {
        Timeline {
            events: self.events.iter().cloned().collect(),
            evicted: self.evicted,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }
}

/// Snapshot of historical events in publication order
#[derive(Debug, Clone)]
pub struct Timeline {
    events: Arc<[Arc<Event>]>,
    evicted: u64,
}

impl Timeline {
    /// Iterate oldest to newest. Each call starts from the beginning.
    pub fn iter(&self) -> TimelineIter<'_> {
        TimelineIter {
            inner: self.events.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events dropped by retention since the bus was created
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Events produced by one invocation
    pub fn for_correlation(&self, correlation_id: CorrelationId) -> impl Iterator<Item = &Event> {
        self.iter()
            .filter(move |event| event.correlation_id == Some(correlation_id))
    }

    /// Event names in order; handy for assertions and diagnostics
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|event| event.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Event;
    type IntoIter = TimelineIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`Timeline`]
#[derive(Debug, Clone)]
pub struct TimelineIter<'a> {
    inner: std::slice::Iter<'a, Arc<Event>>,
}

impl<'a> Iterator for TimelineIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|event| event.as_ref())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for TimelineIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|event| event.as_ref())
    }
}

impl ExactSizeIterator for TimelineIter<'_> {}
