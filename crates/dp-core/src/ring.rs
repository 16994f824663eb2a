/// Fixed-capacity FIFO ring. Pushing onto a full ring evicts the oldest entry.
///
/// Storage is allocated once up to `capacity` and never grows past it.
///
/// # Example
/// ```
/// use dp_core::ring::RingBuffer;
/// let mut ring = RingBuffer::with_capacity(2);
/// assert_eq!(ring.push(1), None);
/// assert_eq!(ring.push(2), None);
/// assert_eq!(ring.push(3), Some(1));
/// assert_eq!(ring.to_vec(), vec![2, 3]);
/// ```
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the oldest entry once the ring is full.
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty ring.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Insert `value`, returning the evicted oldest entry when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.buf.len() < self.capacity {
            self.buf.push(value);
            return None;
        }
        let evicted = std::mem::replace(&mut self.buf[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Entries in insertion order, oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> + '_ {
        let len = self.buf.len();
        (0..len).map(move |i| &self.buf[(self.head + i) % len])
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        if self.buf.is_empty() {
            return None;
        }
        let idx = (self.head + self.buf.len() - 1) % self.buf.len();
        self.buf.get(idx)
    }

    /// Oldest entry.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.buf.get(self.head)
    }

    /// Number of stored entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` if nothing has been pushed since creation or the last `clear`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// `true` once `len() == capacity()`.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Maximum number of entries.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// A full ring where every slot holds `value`.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn filled(capacity: usize, value: T) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");
        Self {
            buf: vec![value; capacity],
            capacity,
            head: 0,
        }
    }

    /// Copy of the contents, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_entries_in_order_after_overflow() {
        let mut ring = RingBuffer::with_capacity(100);
        for i in 0..150 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 100);
        let kept = ring.to_vec();
        assert_eq!(kept.first(), Some(&50));
        assert_eq!(kept.last(), Some(&149));
        assert!(kept.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(ring.first(), Some(&50));
        assert_eq!(ring.last(), Some(&149));
    }

    #[test]
    fn filled_ring_is_full_and_evicts_prefill() {
        let mut ring = RingBuffer::filled(3, 0.0_f64);
        assert!(ring.is_full());
        assert_eq!(ring.push(1.0), Some(0.0));
        assert_eq!(ring.to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn clear_resets_order() {
        let mut ring = RingBuffer::with_capacity(2);
        ring.push('a');
        ring.push('b');
        ring.push('c');
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.last(), None);
        ring.push('d');
        assert_eq!(ring.to_vec(), vec!['d']);
    }

    #[test]
    #[should_panic(expected = "ring capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = RingBuffer::<u8>::with_capacity(0);
    }
}
