//! Outbound message queue
//!
//! Envelopes submitted while the channel is not open (or whose transmission
//! failed) wait here until the next successful open, where they are flushed
//! strictly in arrival order. Heartbeat traffic never enters the queue.
//!
//! The queue is unbounded by default. With a capacity set, pushing onto a
//! full queue evicts the oldest entry.

use rentwire_core::Envelope;
use std::collections::VecDeque;

/// FIFO buffer of envelopes awaiting transmission
#[derive(Debug, Default)]
pub(crate) struct MessageQueue {
    entries: VecDeque<Envelope>,
    capacity: Option<usize>,
}

impl MessageQueue {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append to the tail; returns the evicted head when at capacity
    pub(crate) fn push(&mut self, envelope: Envelope) -> Option<Envelope> {
        let evicted = match self.capacity {
            Some(cap) if self.entries.len() >= cap => self.entries.pop_front(),
            _ => None,
        };
        self.entries.push_back(envelope);
        evicted
    }

    /// Put envelopes back at the head, keeping their order
    ///
    /// They were submitted before anything still queued, so they go out
    /// first. Returns how many of the oldest entries a capacity evicted.
    pub(crate) fn restore(&mut self, envelopes: Vec<Envelope>) -> usize {
        for envelope in envelopes.into_iter().rev() {
            self.entries.push_front(envelope);
        }
        let mut evicted = 0;
        if let Some(cap) = self.capacity {
            while self.entries.len() > cap {
                self.entries.pop_front();
                evicted += 1;
            }
        }
        evicted
    }

    /// Flush in FIFO order through `send`
    ///
    /// Stops at the first envelope `send` rejects. That envelope goes back to
    /// the head, so the remaining backlog keeps its original order. Returns
    /// the number of envelopes sent.
    pub(crate) fn flush<F, E>(&mut self, mut send: F) -> Result<usize, E>
    where
        F: FnMut(&Envelope) -> Result<(), E>,
    {
        let mut sent = 0;
        while let Some(envelope) = self.entries.pop_front() {
            if let Err(e) = send(&envelope) {
                self.entries.push_front(envelope);
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
