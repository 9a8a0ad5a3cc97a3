// Bounded FIFO queue that remembers when its oldest pending item arrived
//
// Producers block while the queue is at capacity; consumers block while it is
// empty. The first-pending timestamp is set when an item lands in an empty
// queue and cleared when the last item leaves.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    first_pending: Option<Instant>,
}

/// Thread-safe aging queue. A capacity of `0` means unbounded.
#[derive(Debug)]
pub struct AgingQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> AgingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                first_pending: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an item, waiting for room if the queue is full.
    pub fn enqueue(&self, item: T) {
        let mut state = self.state.lock();
        while self.at_capacity(&state) {
            self.not_full.wait(&mut state);
        }

        if state.items.is_empty() {
            state.first_pending = Some(Instant::now());
        }
        state.items.push_back(item);
        drop(state);

        self.not_empty.notify_one();
    }

    /// Remove the oldest item, waiting until one is available.
    pub fn dequeue(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = Self::pop_front(&mut state) {
                drop(state);
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Remove the oldest item if there is one.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = Self::pop_front(&mut state);
        drop(state);

        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Time since the oldest pending item arrived, zero when empty.
    pub fn age(&self) -> Duration {
        self.state
            .lock()
            .first_pending
            .map(|since| since.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        self.at_capacity(&state)
    }

    fn at_capacity(&self, state: &QueueState<T>) -> bool {
        self.capacity > 0 && state.items.len() >= self.capacity
    }

    fn pop_front(state: &mut QueueState<T>) -> Option<T> {
        let item = state.items.pop_front()?;
        if state.items.is_empty() {
            state.first_pending = None;
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order_and_size() {
        let queue = AgingQueue::unbounded();
        for i in 0..5 {
            queue.enqueue(i);
        }
        assert_eq!(queue.size(), 5);

        assert_eq!(queue.dequeue(), 0);
        assert_eq!(queue.dequeue(), 1);
        assert_eq!(queue.size(), 3);

        queue.enqueue(5);
        let rest: Vec<_> = (0..4).map(|_| queue.dequeue()).collect();
        assert_eq!(rest, vec![2, 3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_age_is_zero_when_empty() {
        let queue: AgingQueue<u8> = AgingQueue::unbounded();
        assert_eq!(queue.age(), Duration::ZERO);

        queue.enqueue(1);
        thread::sleep(Duration::from_millis(5));
        assert!(queue.age() > Duration::ZERO);

        queue.dequeue();
        assert_eq!(queue.age(), Duration::ZERO);
    }

    #[test]
    fn test_age_tracks_first_pending_item() {
        let queue = AgingQueue::unbounded();
        queue.enqueue("a");
        thread::sleep(Duration::from_millis(20));
        let before = queue.age();

        // Adding to a non-empty queue keeps the original timestamp
        queue.enqueue("b");
        let after = queue.age();
        assert!(after >= before);
        assert!(after >= Duration::from_millis(20));

        // Partial drain keeps the timestamp too
        queue.dequeue();
        assert!(queue.age() >= Duration::from_millis(20));
    }

    #[test]
    fn test_age_resets_after_queue_empties() {
        let queue = AgingQueue::unbounded();
        queue.enqueue(1);
        thread::sleep(Duration::from_millis(30));
        queue.dequeue();

        queue.enqueue(2);
        assert!(queue.age() < Duration::from_millis(30));
    }

    #[test]
    fn test_try_dequeue_on_empty() {
        let queue: AgingQueue<i32> = AgingQueue::new(2);
        assert_eq!(queue.try_dequeue(), None);
        queue.enqueue(7);
        assert_eq!(queue.try_dequeue(), Some(7));
        assert_eq!(queue.age(), Duration::ZERO);
    }

    #[test]
    fn test_enqueue_blocks_at_capacity() {
        let queue = Arc::new(AgingQueue::new(2));
        queue.enqueue(1);
        queue.enqueue(2);
        assert!(queue.is_full());

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue(3))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.size(), 2);

        assert_eq!(queue.dequeue(), 1);
        producer.join().unwrap();
        assert_eq!(queue.size(), 2);
        assert_eq!(queue.dequeue(), 2);
        assert_eq!(queue.dequeue(), 3);
    }

    #[test]
    fn test_dequeue_blocks_until_item_arrives() {
        let queue = Arc::new(AgingQueue::unbounded());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(20));
        queue.enqueue("late");
        assert_eq!(consumer.join().unwrap(), "late");
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let queue = Arc::new(AgingQueue::unbounded());
        let handles: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(p * 1000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.size(), 1000);
        let mut drained: Vec<_> = (0..1000).map(|_| queue.dequeue()).collect();
        drained.sort_unstable();
        drained.dedup();
        assert_eq!(drained.len(), 1000);
    }
}
