//! Lock-free single-producer/single-consumer ring
//!
//! Fixed capacity, allocated once before any critical path runs. Exactly one
//! thread may write and exactly one thread may read; the published element
//! count is the only variable both sides touch. All writes to a slot
//! happen-before the release store that bumps the count, and every read of a
//! slot happens-after the acquire load that observed it, so slot access
//! itself needs no atomics.

use crossbeam_utils::CachePadded;
use std::cell::{Cell, UnsafeCell};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded SPSC ring of `T`.
///
/// The producer never blocks: writing more than `capacity` unread elements
/// overruns the ring, which is a sizing bug the integration must prevent.
/// Callers that can burst should consult [`SpscRing::size`] first.
pub struct SpscRing<T> {
    slots: Box<[UnsafeCell<T>]>,
    /// Elements published but not yet consumed; the synchronising variable.
    count: CachePadded<AtomicUsize>,
    /// Producer-owned cursor.
    write: Cell<usize>,
    /// Consumer-owned cursor.
    read: Cell<usize>,
}

// One thread per cursor is the contract of this type; under it, the count
// protocol makes slot handoff safe.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T: Default> SpscRing<T> {
    /// Ring of `capacity` default-initialized slots.
    ///
    /// # Panics
    /// Panics on zero capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SpscRing capacity must be non-zero");
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            count: CachePadded::new(AtomicUsize::new(0)),
            write: Cell::new(0),
            read: Cell::new(0),
        }
    }
}

impl<T> SpscRing<T> {
    /// Slot the producer may fill next. Producer thread only.
    ///
    /// The slot is not visible to the consumer until [`SpscRing::commit_write`].
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub fn next_write(&self) -> &mut T {
        debug_assert!(
            self.size() < self.slots.len(),
            "SpscRing overrun: ring is mis-sized for its producer"
        );
        // Producer-owned slot: the consumer cannot observe it before the
        // count is bumped with release ordering.
        unsafe { &mut *self.slots[self.write.get()].get() }
    }

    /// Publish the slot handed out by the last [`SpscRing::next_write`].
    #[inline]
    pub fn commit_write(&self) {
        let next = (self.write.get() + 1) % self.slots.len();
        self.write.set(next);
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Next unread element, or `None` when empty. Consumer thread only.
    #[inline]
    pub fn next_read(&self) -> Option<&T> {
        if self.size() == 0 {
            return None;
        }
        // The acquire load in size() ordered this slot's contents before us.
        Some(unsafe { &*self.slots[self.read.get()].get() })
    }

    /// Release the slot handed out by the last [`SpscRing::next_read`].
    #[inline]
    pub fn commit_read(&self) {
        let next = (self.read.get() + 1) % self.slots.len();
        self.read.set(next);
        let prev = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(prev != 0, "SpscRing commit_read on an empty ring");
    }

    /// Number of published, unconsumed elements.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Total slot count.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;

    #[test]
    fn empty_ring_reads_none() {
        let ring: SpscRing<u64> = SpscRing::new(4);
        assert_eq!(ring.size(), 0);
        assert!(ring.next_read().is_none());
    }

    #[test]
    fn publishes_in_fifo_order() {
        let ring: SpscRing<u64> = SpscRing::new(8);
        for v in 1..=5u64 {
            *ring.next_write() = v;
            ring.commit_write();
        }
        assert_eq!(ring.size(), 5);
        for v in 1..=5u64 {
            assert_eq!(*ring.next_read().unwrap(), v);
            ring.commit_read();
        }
        assert!(ring.next_read().is_none());
    }

    #[rstest]
    #[case(2)]
    #[case(7)]
    #[case(64)]
    fn wraps_around_capacity(#[case] capacity: usize) {
        let ring: SpscRing<usize> = SpscRing::new(capacity);
        // push/pop far past one lap
        for v in 0..capacity * 3 {
            *ring.next_write() = v;
            ring.commit_write();
            assert_eq!(*ring.next_read().unwrap(), v);
            ring.commit_read();
        }
        assert_eq!(ring.size(), 0);
    }

    #[test]
    fn two_threads_transfer_everything_in_order() {
        const N: u64 = 100_000;
        let ring: Arc<SpscRing<u64>> = Arc::new(SpscRing::new(1024));
        let rx = Arc::clone(&ring);

        let consumer = std::thread::spawn(move || {
            let mut expected = 0u64;
            while expected < N {
                if let Some(v) = rx.next_read() {
                    assert_eq!(*v, expected);
                    rx.commit_read();
                    expected += 1;
                }
            }
        });

        let mut sent = 0u64;
        while sent < N {
            if ring.size() < ring.capacity() {
                *ring.next_write() = sent;
                ring.commit_write();
                sent += 1;
            }
        }
        consumer.join().unwrap();
        assert_eq!(ring.size(), 0);
    }
}
