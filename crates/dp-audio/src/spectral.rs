use std::ops::RangeInclusive;
use std::sync::Arc;

use dp_core::config::SpectralParams;
use dp_core::frame::{AudioFrame, SpectralPeak};
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::AudioError;
use crate::filter::BandPass;

/// Prototype order of the band-pass (8 poles once transformed to a band).
pub const BANDPASS_ORDER: usize = 4;

/// Band-pass + periodogram peak picker around the emitted tone.
///
/// Filter coefficients, FFT plan and scratch buffers are built once per
/// parameter set and reused for every frame.
///
/// # Example
/// ```
/// use dp_audio::spectral::SpectralEstimator;
/// use dp_core::config::TrackerConfig;
/// use dp_core::frame::AudioFrame;
///
/// let params = TrackerConfig::default().spectral_params();
/// let mut estimator = SpectralEstimator::new(params).unwrap();
/// let frame = AudioFrame::tone(18_020.0, 0.1, 2048, 44100);
/// let peak = estimator.estimate(&frame).unwrap();
/// assert!((peak.shift_from(18_000.0) - 20.0).abs() < 22.0);
/// ```
pub struct SpectralEstimator {
    params: SpectralParams,
    filter: BandPass,
    plan: Arc<dyn RealToComplex<f64>>,
    input_buf: Vec<f64>,
    spectrum_buf: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    /// One-sided power spectral density of the last processed frame.
    psd: Vec<f64>,
    /// Bins whose centre frequency lies in the search band. None if the band holds no bin.
    band: Option<RangeInclusive<usize>>,
}

impl SpectralEstimator {
    /// Build the estimator for `params`.
    ///
    /// # Errors
    /// Returns `AudioError::FilterDesign` if the search band cannot be filtered
    /// at this sample rate or the frame length is 0.
    pub fn new(params: SpectralParams) -> Result<Self, AudioError> {
        if params.frame_length == 0 {
            return Err(AudioError::FilterDesign("frame_length nul".into()));
        }
        let rate = f64::from(params.sample_rate);
        let filter =
            BandPass::butterworth(BANDPASS_ORDER, params.low_cut(), params.high_cut(), rate)?;

        let mut planner = RealFftPlanner::<f64>::new();
        let plan = planner.plan_fft_forward(params.frame_length);
        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let psd = vec![0.0; spectrum_buf.len()];

        let band = search_band(&params, spectrum_buf.len());
        if band.is_none() {
            log::warn!(
                "Aucun bin FFT dans [{:.1}, {:.1}] Hz (résolution {:.2} Hz)",
                params.low_cut(),
                params.high_cut(),
                rate / params.frame_length as f64
            );
        }

        Ok(Self {
            params,
            filter,
            plan,
            input_buf,
            spectrum_buf,
            scratch,
            psd,
            band,
        })
    }

    /// Rebuild coefficients and plan if `params` differ from the current ones.
    ///
    /// Returns `true` when a rebuild happened. On error the previous state is kept.
    ///
    /// # Errors
    /// Same as [`SpectralEstimator::new`].
    pub fn reconfigure(&mut self, params: SpectralParams) -> Result<bool, AudioError> {
        if params == self.params {
            return Ok(false);
        }
        let only_floor_changed = SpectralParams {
            min_amplitude: self.params.min_amplitude,
            ..params
        } == self.params;
        if only_floor_changed {
            self.params.min_amplitude = params.min_amplitude;
            return Ok(false);
        }
        *self = Self::new(params)?;
        log::info!(
            "Estimateur reconfiguré : {} Hz ± {} Hz, {} échantillons @ {} Hz",
            params.emission_freq,
            params.search_range,
            params.frame_length,
            params.sample_rate
        );
        Ok(true)
    }

    /// Current parameters.
    #[must_use]
    pub fn params(&self) -> &SpectralParams {
        &self.params
    }

    /// Frequency resolution in Hz.
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        f64::from(self.params.sample_rate) / self.params.frame_length as f64
    }

    /// Power spectral density of the last processed frame (N/2+1 bins).
    #[must_use]
    pub fn power_spectrum(&self) -> &[f64] {
        &self.psd
    }

    /// Strongest in-band bin of the band-passed frame, or `None` if the band
    /// holds no bin, the maximum power does not exceed `min_amplitude`, or
    /// the frame does not match the configured length and rate.
    pub fn estimate(&mut self, frame: &AudioFrame) -> Option<SpectralPeak> {
        if frame.len() != self.params.frame_length
            || frame.sample_rate != self.params.sample_rate
        {
            log::debug!(
                "Frame ignorée : {} échantillons @ {} Hz (attendu {} @ {})",
                frame.len(),
                frame.sample_rate,
                self.params.frame_length,
                self.params.sample_rate
            );
            return None;
        }
        let band = self.band.clone()?;

        // Filter from rest on every frame.
        for (slot, &s) in self.input_buf.iter_mut().zip(frame.samples.iter()) {
            *slot = f64::from(s);
        }
        self.filter.reset();
        self.filter.process_in_place(&mut self.input_buf);

        // Constant detrend
        let n = self.input_buf.len();
        let mean = self.input_buf.iter().sum::<f64>() / n as f64;
        for v in &mut self.input_buf {
            *v -= mean;
        }

        if let Err(e) =
            self.plan
                .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
        {
            log::warn!("FFT échouée : {e}");
            return None;
        }

        // One-sided density: |X|² / (fs·N), doubled except DC and an even-length Nyquist bin.
        let scale = 1.0 / (f64::from(self.params.sample_rate) * n as f64);
        let last = self.psd.len() - 1;
        for (k, (p, c)) in self.psd.iter_mut().zip(self.spectrum_buf.iter()).enumerate() {
            let doubled = k != 0 && !(k == last && n % 2 == 0);
            *p = c.norm_sqr() * scale * if doubled { 2.0 } else { 1.0 };
        }

        let mut best_bin = *band.start();
        let mut best_power = self.psd[best_bin];
        for k in band {
            if self.psd[k] > best_power {
                best_power = self.psd[k];
                best_bin = k;
            }
        }

        if best_power > self.params.min_amplitude {
            Some(SpectralPeak {
                frequency: best_bin as f64 * self.bin_width(),
                amplitude: best_power.sqrt(),
            })
        } else {
            log::trace!("Pic sous le plancher de bruit : {best_power:e}");
            None
        }
    }
}

/// Bins `k` with `low <= k·fs/N <= high`, as an inclusive range.
fn search_band(params: &SpectralParams, bins: usize) -> Option<RangeInclusive<usize>> {
    let width = f64::from(params.sample_rate) / params.frame_length as f64;
    let mut in_band = (0..bins).filter(|&k| {
        let f = k as f64 * width;
        f >= params.low_cut() && f <= params.high_cut()
    });
    let first = in_band.next()?;
    let last = in_band.last().unwrap_or(first);
    Some(first..=last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_core::config::TrackerConfig;

    fn estimator() -> SpectralEstimator {
        SpectralEstimator::new(TrackerConfig::default().spectral_params()).unwrap()
    }

    #[test]
    fn approaching_tone_peaks_above_emission() {
        let mut est = estimator();
        let frame = AudioFrame::tone(18_020.0, 0.1, 2048, 44100);
        let peak = est.estimate(&frame).unwrap();
        // 44100 / 2048 = 21.53 Hz bins: 18020 Hz lands on bin 837.
        assert!((peak.frequency - 837.0 * est.bin_width()).abs() < 1e-9);
        assert!(peak.shift_from(18_000.0) > 5.0);
        assert!(peak.amplitude > 0.0);
    }

    #[test]
    fn receding_tone_peaks_below_emission() {
        let mut est = estimator();
        let frame = AudioFrame::tone(17_980.0, 0.1, 2048, 44100);
        let peak = est.estimate(&frame).unwrap();
        assert!(peak.shift_from(18_000.0) < -5.0);
    }

    #[test]
    fn peak_stays_inside_search_band() {
        let mut est = estimator();
        // Strong out-of-band tone plus a weak in-band one.
        let loud = AudioFrame::tone(15_000.0, 0.9, 2048, 44100);
        let quiet = AudioFrame::tone(18_100.0, 0.01, 2048, 44100);
        let mixed: Vec<f32> = loud
            .samples
            .iter()
            .zip(quiet.samples.iter())
            .map(|(a, b)| a + b)
            .collect();
        let peak = est.estimate(&AudioFrame::new(mixed, 44100)).unwrap();
        assert!(peak.frequency >= 17_800.0 && peak.frequency <= 18_200.0);
    }

    #[test]
    fn below_noise_floor_is_not_found() {
        let mut est = estimator();
        assert!(est.estimate(&AudioFrame::silent(2048, 44100)).is_none());
        assert!(est.estimate(&AudioFrame::tone(18_000.0, 1e-5, 2048, 44100)).is_none());
    }

    #[test]
    fn mismatched_frame_is_dropped() {
        let mut est = estimator();
        assert!(est.estimate(&AudioFrame::tone(18_020.0, 0.1, 1024, 44100)).is_none());
        assert!(est.estimate(&AudioFrame::tone(18_020.0, 0.1, 2048, 48000)).is_none());
    }

    #[test]
    fn psd_has_one_sided_length() {
        let mut est = estimator();
        let _ = est.estimate(&AudioFrame::tone(18_000.0, 0.1, 2048, 44100));
        assert_eq!(est.power_spectrum().len(), 1025);
        assert!(est.power_spectrum().iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn reconfigure_rebuilds_only_on_change() {
        let mut est = estimator();
        let mut params = *est.params();
        assert!(!est.reconfigure(params).unwrap());

        params.min_amplitude = 1.0;
        assert!(!est.reconfigure(params).unwrap());
        assert!(est.estimate(&AudioFrame::tone(18_020.0, 0.1, 2048, 44100)).is_none());

        params.min_amplitude = 1e-10;
        params.search_range = 400.0;
        assert!(est.reconfigure(params).unwrap());
        let peak = est.estimate(&AudioFrame::tone(18_300.0, 0.1, 2048, 44100)).unwrap();
        assert!(peak.shift_from(18_000.0) > 250.0);
    }

    #[test]
    fn invalid_reconfigure_keeps_previous_filter() {
        let mut est = estimator();
        let mut params = *est.params();
        params.emission_freq = 22_000.0;
        assert!(est.reconfigure(params).is_err());
        assert!((est.params().emission_freq - 18_000.0).abs() < f64::EPSILON);
        assert!(est.estimate(&AudioFrame::tone(18_020.0, 0.1, 2048, 44100)).is_some());
    }

    #[test]
    fn empty_band_never_finds_a_peak() {
        let params = SpectralParams {
            sample_rate: 44100,
            frame_length: 64,
            emission_freq: 18_000.0,
            search_range: 5.0,
            min_amplitude: 0.0,
        };
        // 689 Hz bins: nothing between 17995 and 18005 Hz.
        let mut est = SpectralEstimator::new(params).unwrap();
        assert!(est.estimate(&AudioFrame::tone(18_000.0, 0.5, 64, 44100)).is_none());
    }
}
