use dp_core::frame::ShiftSample;
use dp_core::ring::RingBuffer;

/// Moving average of raw Doppler shifts, plus a bounded diagnostic log.
///
/// The history is pre-filled with zeros, so the average is always taken over
/// the full window: the first reading after a reset comes out as `raw / window`.
///
/// # Example
/// ```
/// use dp_audio::smoothing::ShiftSmoother;
/// let mut smoother = ShiftSmoother::new(5, 100);
/// assert!((smoother.push(20.0, 0.0) - 4.0).abs() < 1e-12);
/// assert!((smoother.push(20.0, 0.05) - 8.0).abs() < 1e-12);
/// ```
pub struct ShiftSmoother {
    history: RingBuffer<f64>,
    log: RingBuffer<ShiftSample>,
}

impl ShiftSmoother {
    /// Create a smoother averaging `window` readings and logging up to `log_capacity` of them.
    ///
    /// # Panics
    /// Panics if `window` or `log_capacity` is 0.
    #[must_use]
    pub fn new(window: usize, log_capacity: usize) -> Self {
        Self {
            history: RingBuffer::filled(window, 0.0),
            log: RingBuffer::with_capacity(log_capacity),
        }
    }

    /// Insert a raw shift and return the new moving average.
    pub fn push(&mut self, raw_shift: f64, timestamp: f64) -> f64 {
        self.history.push(raw_shift);
        let smoothed = self.smoothed();
        self.log.push(ShiftSample {
            timestamp,
            shift: smoothed,
        });
        smoothed
    }

    /// Mean of the current history.
    #[must_use]
    pub fn smoothed(&self) -> f64 {
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    /// History contents, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<f64> {
        self.history.to_vec()
    }

    /// The (timestamp, smoothed shift) log.
    #[must_use]
    pub fn log(&self) -> &RingBuffer<ShiftSample> {
        &self.log
    }

    /// Copy of the log, oldest first.
    #[must_use]
    pub fn log_snapshot(&self) -> Vec<ShiftSample> {
        self.log.to_vec()
    }

    /// Averaging window length.
    #[must_use]
    pub fn window(&self) -> usize {
        self.history.capacity()
    }

    /// Back to the zero-filled history and an empty log.
    pub fn reset(&mut self) {
        self.history = RingBuffer::filled(self.history.capacity(), 0.0);
        self.log.clear();
    }

    /// Change window or log capacity. A new window restarts from zeros; a new
    /// log capacity keeps the most recent entries that still fit.
    pub fn resize(&mut self, window: usize, log_capacity: usize) {
        if window != self.history.capacity() {
            self.history = RingBuffer::filled(window, 0.0);
        }
        if log_capacity != self.log.capacity() {
            let mut log = RingBuffer::with_capacity(log_capacity);
            for sample in self.log.iter() {
                log.push(*sample);
            }
            self.log = log;
        }
    }
}
