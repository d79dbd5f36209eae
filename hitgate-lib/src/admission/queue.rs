//! FIFO queue whose head can be removed conditionally.
//!
//! Appends and removals are guarded by separate locks. Records are appended in
//! enqueue-time order, so with a constant window the head is always the record
//! that expires first and a sweep only ever needs to look at the head.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Concurrent FIFO with a conditional pop.
pub trait ConditionalQueue<T>: Send + Sync {
    /// Append `item` at the tail.
    fn enqueue(&self, item: T);

    /// Remove and return the head if `predicate` holds for it.
    ///
    /// Returns `None` without removing anything when the queue is empty or the
    /// predicate rejects the head. Never blocks waiting for items.
    fn dequeue_if(&self, predicate: &mut dyn FnMut(&T) -> bool) -> Option<T>;

    /// Pop until the queue is observed empty.
    fn drain(&self) {
        while self.dequeue_if(&mut |_| true).is_some() {}
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Node<T> {
    value: Mutex<Option<T>>,
    next: Mutex<Option<Arc<Node<T>>>>,
}

impl<T> Node<T> {
    fn new(value: Option<T>) -> Arc<Self> {
        Arc::new(Self { value: Mutex::new(value), next: Mutex::new(None) })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Nothing in here panics while holding a lock; recover rather than poison the queue forever.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Two-lock linked queue.
///
/// `head` points at a placeholder node whose successor is the first element;
/// `tail` points at the last node. `enqueue` only takes the tail lock and
/// `dequeue_if` only takes the head lock, except when the queue holds exactly
/// one element: that node is then both the head's successor and the tail, and
/// `enqueue` takes the head lock first so the append is fully serialized with
/// any concurrent removal.
///
/// Lock order is always head, then tail.
pub struct TwoLockQueue<T> {
    head: Mutex<Arc<Node<T>>>,
    tail: Mutex<Arc<Node<T>>>,
    len: AtomicUsize,
}

impl<T> TwoLockQueue<T> {
    pub fn new() -> Self {
        let placeholder = Node::new(None);
        Self {
            head: Mutex::new(Arc::clone(&placeholder)),
            tail: Mutex::new(placeholder),
            len: AtomicUsize::new(0),
        }
    }

    fn push_back(&self, item: T) {
        let node = Node::new(Some(item));
        let mut tail = lock(&self.tail);
        // Count before linking so a concurrent pop never decrements below zero.
        self.len.fetch_add(1, Ordering::AcqRel);
        *lock(&tail.next) = Some(Arc::clone(&node));
        *tail = node;
    }
}

impl<T> Default for TwoLockQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConditionalQueue<T> for TwoLockQueue<T> {
    fn enqueue(&self, item: T) {
        if self.len.load(Ordering::Acquire) == 1 {
            let _head = lock(&self.head);
            self.push_back(item);
        } else {
            self.push_back(item);
        }
    }

    fn dequeue_if(&self, predicate: &mut dyn FnMut(&T) -> bool) -> Option<T> {
        let mut head = lock(&self.head);
        let first = lock(&head.next).clone()?;

        let item = {
            let mut value = lock(&first.value);
            if !value.as_ref().is_some_and(|v| predicate(v)) {
                return None;
            }
            value.take()
        };

        // The popped node becomes the new placeholder.
        *head = first;
        self.len.fetch_sub(1, Ordering::AcqRel);
        item
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}

impl<T> Drop for TwoLockQueue<T> {
    fn drop(&mut self) {
        // Unlink iteratively so long queues don't recurse through `Arc` drops.
        let mut cursor = lock(&lock(&self.head).next).take();
        while let Some(node) = cursor {
            cursor = lock(&node.next).take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = TwoLockQueue::new();
        for i in 0..5 {
            queue.enqueue(i);
        }
        let popped: Vec<i32> = std::iter::from_fn(|| queue.dequeue_if(&mut |_| true)).collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_on_empty_returns_none() {
        let queue: TwoLockQueue<u64> = TwoLockQueue::new();
        assert_eq!(queue.dequeue_if(&mut |_| true), None);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_rejected_head_stays() {
        let queue = TwoLockQueue::new();
        queue.enqueue(10);
        queue.enqueue(20);

        assert_eq!(queue.dequeue_if(&mut |v| *v > 10), None);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue_if(&mut |v| *v == 10), Some(10));
        assert_eq!(queue.dequeue_if(&mut |v| *v == 20), Some(20));
    }

    #[test]
    fn test_predicate_only_sees_head() {
        let queue = TwoLockQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);

        let mut seen = Vec::new();
        let _ = queue.dequeue_if(&mut |v| {
            seen.push(*v);
            false
        });
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_enqueue_after_emptying() {
        let queue = TwoLockQueue::new();
        queue.enqueue("a");
        assert_eq!(queue.dequeue_if(&mut |_| true), Some("a"));
        queue.enqueue("b");
        queue.enqueue("c");
        assert_eq!(queue.dequeue_if(&mut |_| true), Some("b"));
        assert_eq!(queue.dequeue_if(&mut |_| true), Some("c"));
        assert_eq!(queue.dequeue_if(&mut |_| true), None);
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = TwoLockQueue::new();
        for i in 0..100 {
            queue.enqueue(i);
        }
        queue.drain();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue_if(&mut |_| true), None);
    }

    #[test]
    fn test_drop_long_queue() {
        let queue = TwoLockQueue::new();
        for i in 0..200_000u32 {
            queue.enqueue(i);
        }
        drop(queue);
    }
}
