use std::collections::VecDeque;

/// Bounded FIFO of messages waiting for a connection.
///
/// When full, pushing evicts the oldest entry (drop-oldest backpressure). The queue itself is
/// not synchronized; the manager keeps it behind its own lock.
#[derive(Debug)]
pub(crate) struct PendingQueue<M> {
    items: VecDeque<M>,
    capacity: usize,
}

impl<M> PendingQueue<M> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Appends `message`, returning the evicted entry if the queue was at capacity.
    pub(crate) fn push_back(&mut self, message: M) -> Option<M> {
        if self.capacity == 0 {
            return Some(message);
        }

        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(message);
        evicted
    }

    /// Returns a message to the head of the queue after a failed hand-off.
    ///
    /// At capacity the returned message is itself the oldest entry, so it is the one dropped:
    /// `Some(message)` hands it back to the caller.
    pub(crate) fn push_front(&mut self, message: M) -> Option<M> {
        if self.items.len() >= self.capacity {
            return Some(message);
        }

        self.items.push_front(message);
        None
    }

    pub(crate) fn pop_front(&mut self) -> Option<M> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &M> {
        self.items.iter()
    }
}
