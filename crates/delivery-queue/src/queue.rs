//! Sparse-index FIFO queue.

use std::collections::HashMap;

/// Items that carry a stable identifier for duplicate detection.
pub trait Identified {
    /// Unique identifier of the item.
    fn queue_id(&self) -> &str;
}

/// Ordered buffer with insertion at the tail and removal from the head.
///
/// Positions are monotonically increasing `head`/`tail` cursors into a map
/// from position to item. `head == tail` means empty.
#[derive(Debug, Clone)]
pub struct DeliveryQueue<T> {
    items: HashMap<u64, T>,
    head: u64,
    tail: u64,
}

impl<T> Default for DeliveryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeliveryQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            head: 0,
            tail: 0,
        }
    }

    /// Insert an item at the tail.
    pub fn enqueue(&mut self, item: T) {
        self.items.insert(self.tail, item);
        self.tail += 1;
    }

    /// Remove and return the item at the head, or `None` when empty.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.items.remove(&self.head);
        self.head += 1;
        item
    }

    /// Borrow the item at the head without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.items.get(&self.head)
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Number of items currently queued (`tail - head`).
    pub fn size(&self) -> usize {
        (self.tail - self.head) as usize
    }

    /// Alias for [`DeliveryQueue::size`].
    pub fn len(&self) -> usize {
        self.size()
    }

    /// Reset both cursors and drop every stored item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
        self.tail = 0;
    }

    /// Iterate from head to tail without consuming anything.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            queue: self,
            position: self.head,
        }
    }
}

impl<T: Identified> DeliveryQueue<T> {
    /// Linear scan from head to tail for an item with the given id.
    ///
    /// O(n); depth is bounded by reconnect latency, not message volume.
    pub fn is_duplicate(&self, id: &str) -> bool {
        self.iter().any(|item| item.queue_id() == id)
    }
}

/// Head-to-tail iterator over a [`DeliveryQueue`].
pub struct Iter<'a, T> {
    queue: &'a DeliveryQueue<T>,
    position: u64,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position < self.queue.tail {
            let current = self.position;
            self.position += 1;
            if let Some(item) = self.queue.items.get(&current) {
                return Some(item);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.queue.tail - self.position) as usize;
        (0, Some(remaining))
    }
}

impl<'a, T> IntoIterator for &'a DeliveryQueue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
