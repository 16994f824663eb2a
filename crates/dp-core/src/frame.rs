use std::fmt;

use serde::{Deserialize, Serialize};

/// One block of mono samples captured from the microphone.
///
/// Produced by the capture callback, read by the tracker for a single cycle.
///
/// # Example
/// ```
/// use dp_core::frame::AudioFrame;
/// let frame = AudioFrame::silent(2048, 44100);
/// assert_eq!(frame.len(), 2048);
/// assert!(!frame.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioFrame {
    /// Mono samples, normalised to [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Wrap existing samples.
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A frame of `len` zero samples.
    #[must_use]
    pub fn silent(len: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    /// Pure sine of `freq` Hz and `amplitude`, starting at phase zero.
    ///
    /// Used to synthesise test frames and by the benchmarks.
    ///
    /// # Example
    /// ```
    /// use dp_core::frame::AudioFrame;
    /// let frame = AudioFrame::tone(18_000.0, 0.1, 2048, 44100);
    /// assert!(frame.samples.iter().all(|s| s.abs() <= 0.1 + 1e-6));
    /// ```
    #[must_use]
    pub fn tone(freq: f64, amplitude: f32, len: usize, sample_rate: u32) -> Self {
        let rate = f64::from(sample_rate);
        let samples = (0..len)
            .map(|i| {
                let t = i as f64 / rate;
                amplitude * (2.0 * std::f64::consts::PI * freq * t).sin() as f32
            })
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` if the frame holds no samples.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Strongest spectral bin inside the search band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralPeak {
    /// Bin centre frequency in Hz.
    pub frequency: f64,
    /// Square root of the bin power. Informational only.
    pub amplitude: f64,
}

impl SpectralPeak {
    /// Signed offset from the emitted tone. Positive = blue-shift = approaching.
    ///
    /// # Example
    /// ```
    /// use dp_core::frame::SpectralPeak;
    /// let peak = SpectralPeak { frequency: 18_021.5, amplitude: 1.0 };
    /// assert!((peak.shift_from(18_000.0) - 21.5).abs() < 1e-9);
    /// ```
    #[inline]
    #[must_use]
    pub fn shift_from(&self, emission_freq: f64) -> f64 {
        self.frequency - emission_freq
    }
}

/// A timestamped shift reading (seconds since tracker start, Hz).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShiftSample {
    /// Monotonic timestamp in seconds.
    pub timestamp: f64,
    /// Signed shift in Hz.
    pub shift: f64,
}

/// Accepted movement direction relative to the microphone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Hand approaching (positive shift).
    Toward,
    /// Hand receding (negative shift).
    Away,
}

impl Direction {
    /// Direction implied by the sign of a shift. Zero counts as `Away`.
    #[inline]
    #[must_use]
    pub fn from_shift(shift: f64) -> Self {
        if shift > 0.0 {
            Self::Toward
        } else {
            Self::Away
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toward => f.write_str("TOWARD"),
            Self::Away => f.write_str("AWAY"),
        }
    }
}

/// Event handed to the command dispatcher once classification accepts a direction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectionEvent {
    /// Accepted direction.
    pub direction: Direction,
    /// Tracker time of acceptance, seconds.
    pub timestamp: f64,
    /// Smoothed shift that triggered the event, Hz.
    pub smoothed_shift: f64,
}
