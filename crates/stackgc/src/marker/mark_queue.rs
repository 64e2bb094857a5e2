//! Mark Queue - Marking Worklist
//!
//! Holds candidate addresses whose objects still have to be marked and
//! scanned. Collection runs on one thread, so the queue is a plain stack:
//! popping the most recent push gives a depth-first traversal, which keeps
//! the queue short on long linked chains.

/// MarkQueue - worklist of addresses awaiting marking
#[derive(Debug, Default)]
pub struct MarkQueue {
    queue: Vec<usize>,

    /// Counters for statistics
    enqueued_count: usize,
    processed_count: usize,
    peak_len: usize,
}

impl MarkQueue {
    /// Create new mark queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue with room for `capacity` addresses
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Push an address to mark
    pub fn push(&mut self, object: usize) {
        self.queue.push(object);
        self.enqueued_count += 1;
        self.peak_len = self.peak_len.max(self.queue.len());
    }

    /// Pop the most recently pushed address
    pub fn pop(&mut self) -> Option<usize> {
        let object = self.queue.pop();
        if object.is_some() {
            self.processed_count += 1;
        }
        object
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Get statistics
    pub fn stats(&self) -> MarkQueueStats {
        MarkQueueStats {
            enqueued: self.enqueued_count,
            processed: self.processed_count,
            peak_len: self.peak_len,
            pending: self.queue.len(),
        }
    }
}

/// MarkQueueStats - worklist counters for one marking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkQueueStats {
    pub enqueued: usize,
    pub processed: usize,
    pub peak_len: usize,
    pub pending: usize,
}
