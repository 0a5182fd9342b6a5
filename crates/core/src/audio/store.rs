use std::{
    fmt,
    sync::{
        atomic::{AtomicI16, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;

/// Fixed-capacity ring of signed 16-bit samples shared between the capture
/// thread (single writer) and the frame loop (single reader).
///
/// Block writes and reads only take the shared side of the lock, so a read
/// never waits on the capture source and may observe a block that is only
/// partially written. [`SampleStore::resize`] takes the exclusive side and
/// therefore waits for an in-flight block write to drain before swapping the
/// ring; the capture thread resumes with the next block.
#[derive(Clone)]
pub struct SampleStore {
    ring: Arc<RwLock<Ring>>,
}

struct Ring {
    samples: Box<[AtomicI16]>,
    /// Index the next sample is written to, which is also the oldest sample.
    head: AtomicUsize,
}

impl SampleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(RwLock::new(Ring::zeroed(capacity))),
        }
    }

    pub fn len(&self) -> usize {
        self.ring.read().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a block, overwriting the oldest samples.
    pub fn write(&self, block: &[i16]) {
        let ring = self.ring.read();
        let len = ring.samples.len();
        if len == 0 {
            return;
        }

        // Only the newest `len` samples of an oversized block survive.
        let block = &block[block.len().saturating_sub(len)..];
        let mut head = ring.head.load(Ordering::Relaxed);
        for &sample in block {
            ring.samples[head].store(sample, Ordering::Relaxed);
            head += 1;
            if head == len {
                head = 0;
            }
        }
        ring.head.store(head, Ordering::Release);
    }

    /// Copies the whole ring into `out`, oldest sample first.
    pub fn snapshot(&self, out: &mut Vec<i16>) {
        let ring = self.ring.read();
        ring.copy_latest(ring.samples.len(), out);
    }

    /// Copies the newest `count` samples into `out`, oldest first. Fewer are
    /// copied when the store is smaller than `count`.
    pub fn latest(&self, count: usize, out: &mut Vec<i16>) {
        let ring = self.ring.read();
        ring.copy_latest(count, out);
    }

    /// Changes the capacity, keeping the newest samples. Newly added room is
    /// zero-filled and reads as the oldest part of the ring.
    pub fn resize(&self, capacity: usize) {
        let mut ring = self.ring.write();
        if ring.samples.len() == capacity {
            return;
        }

        let mut kept = Vec::with_capacity(capacity);
        ring.copy_latest(capacity, &mut kept);

        let resized = Ring::zeroed(capacity);
        let offset = capacity - kept.len();
        for (slot, sample) in resized.samples[offset..].iter().zip(kept) {
            slot.store(sample, Ordering::Relaxed);
        }
        *ring = resized;
    }
}

impl Ring {
    fn zeroed(capacity: usize) -> Self {
        Self {
            samples: (0..capacity).map(|_| AtomicI16::new(0)).collect(),
            head: AtomicUsize::new(0),
        }
    }

    fn copy_latest(&self, count: usize, out: &mut Vec<i16>) {
        out.clear();
        let len = self.samples.len();
        let count = count.min(len);
        if count == 0 {
            return;
        }

        let head = self.head.load(Ordering::Acquire);
        let start = (head + len - count) % len;
        out.extend(
            (0..count).map(|i| self.samples[(start + i) % len].load(Ordering::Relaxed)),
        );
    }
}

impl fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStore")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(store: &SampleStore) -> Vec<i16> {
        let mut out = Vec::new();
        store.snapshot(&mut out);
        out
    }

    #[test]
    fn keeps_newest_samples_in_order() {
        let store = SampleStore::new(4);
        store.write(&[1, 2, 3]);
        assert_eq!(contents(&store), vec![0, 1, 2, 3]);

        store.write(&[4, 5]);
        assert_eq!(contents(&store), vec![2, 3, 4, 5]);
    }

    #[test]
    fn oversized_block_keeps_its_tail() {
        let store = SampleStore::new(3);
        store.write(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(contents(&store), vec![5, 6, 7]);
    }

    #[test]
    fn latest_returns_tail_window() {
        let store = SampleStore::new(5);
        store.write(&[1, 2, 3, 4, 5, 6]);

        let mut out = Vec::new();
        store.latest(2, &mut out);
        assert_eq!(out, vec![5, 6]);

        store.latest(10, &mut out);
        assert_eq!(out, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn resize_keeps_newest_samples() {
        let store = SampleStore::new(4);
        store.write(&[1, 2, 3, 4, 5]);

        store.resize(2);
        assert_eq!(contents(&store), vec![4, 5]);

        store.resize(4);
        assert_eq!(contents(&store), vec![0, 0, 4, 5]);

        store.write(&[6]);
        assert_eq!(contents(&store), vec![0, 4, 5, 6]);
    }

    #[test]
    fn empty_store_ignores_writes() {
        let store = SampleStore::new(0);
        store.write(&[1, 2]);
        assert!(store.is_empty());
        assert!(contents(&store).is_empty());
    }

    #[test]
    fn reader_is_not_blocked_by_concurrent_writer() {
        let store = SampleStore::new(1024);
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                let block = [7_i16; 220];
                for _ in 0..2_000 {
                    store.write(&block);
                }
            })
        };

        let mut out = Vec::new();
        for _ in 0..2_000 {
            store.snapshot(&mut out);
            assert_eq!(out.len(), 1024);
            assert!(out.iter().all(|&s| s == 0 || s == 7));
        }
        writer.join().unwrap();
        store.snapshot(&mut out);
        assert!(out.iter().all(|&s| s == 7));
    }
}
