//! Thread-safe FIFO handing samples from acquisition tasks to the consumer.
//!
//! `ValueQueue` is a cheap-to-clone handle around a shared `VecDeque`. Any number
//! of producers may push concurrently; samples from one producer keep their
//! order. Neither side ever waits on the other beyond the short internal lock.
//!
//! With a capacity set the queue keeps only the newest samples: a push into a
//! full queue discards the oldest entry and bumps [`ValueQueue::dropped`].

use super::normalize::Sample;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Inner {
    samples: Mutex<VecDeque<Sample>>,
    capacity: Option<usize>,
    dropped: AtomicU64,
}

#[derive(Clone, Debug)]
pub struct ValueQueue {
    inner: Arc<Inner>,
}

impl ValueQueue {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self::with_capacity_limit(None)
    }

    /// Create a queue that holds at most `capacity` samples.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity_limit(Some(capacity))
    }

    /// Bounded when `capacity` is set; a zero capacity is raised to one.
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                samples: Mutex::new(VecDeque::new()),
                capacity: capacity.map(|c| c.max(1)),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Append a sample. Never blocks on the consumer and never fails.
    pub fn push(&self, sample: Sample) {
        let mut samples = self.inner.samples.lock();
        if let Some(capacity) = self.inner.capacity {
            while samples.len() >= capacity {
                samples.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        samples.push_back(sample);
    }

    /// Take the oldest sample, or `None` if nothing arrived since the last poll.
    pub fn try_pop(&self) -> Option<Sample> {
        self.inner.samples.lock().pop_front()
    }

    /// Take every queued sample, oldest first.
    pub fn drain(&self) -> Vec<Sample> {
        self.inner.samples.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.lock().is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Samples discarded because the bounded queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Default for ValueQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = ValueQueue::new();
        for v in [1.0, 2.0, 3.0] {
            queue.push(Sample::new(v));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop(), Some(Sample::new(1.0)));
        assert_eq!(queue.try_pop(), Some(Sample::new(2.0)));
        assert_eq!(queue.try_pop(), Some(Sample::new(3.0)));
        assert_eq!(queue.try_pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_bounded_keeps_newest() {
        let queue = ValueQueue::bounded(2);
        for v in [1.0, 2.0, 3.0, 4.0] {
            queue.push(Sample::new(v));
        }
        assert_eq!(queue.capacity(), Some(2));
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.drain(), vec![Sample::new(3.0), Sample::new(4.0)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let producer = ValueQueue::new();
        let consumer = producer.clone();
        producer.push(Sample::new(7.0));
        assert_eq!(consumer.try_pop(), Some(Sample::new(7.0)));
        assert_eq!(producer.try_pop(), None);
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        let queue = ValueQueue::new();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        queue.push(Sample::new((p * 1000 + i) as f32));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let samples = queue.drain();
        assert_eq!(samples.len(), 2000);
        for p in 0..4 {
            let own: Vec<f32> = samples
                .iter()
                .map(|s| s.value())
                .filter(|v| (*v as i32) / 1000 == p)
                .collect();
            let expected: Vec<f32> = (0..500).map(|i| (p * 1000 + i) as f32).collect();
            assert_eq!(own, expected);
        }
    }
}
