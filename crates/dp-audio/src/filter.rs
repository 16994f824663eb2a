use std::f64::consts::PI;

use realfft::num_complex::Complex;

use crate::error::AudioError;

/// One second-order section, `a0` normalised to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// Complex response at normalised angular frequency `w` (rad/sample).
    fn response(&self, w: f64) -> Complex<f64> {
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        (z1 * self.b1 + z2 * self.b2 + self.b0) / (z1 * self.a1 + z2 * self.a2 + 1.0)
    }
}

/// Butterworth band-pass as a cascade of biquads.
///
/// Designed like the classic `butter(order, [low, high], 'band')`: an analog
/// prototype of `order` poles, low-pass to band-pass transform (2·order poles),
/// then bilinear transform with pre-warped band edges. Each prototype pole
/// yields two second-order sections with one zero at DC and one at Nyquist.
///
/// The cascade runs in f64: poles of a narrow ultrasonic band sit very close
/// to the unit circle.
///
/// # Example
/// ```
/// use dp_audio::filter::BandPass;
/// let bp = BandPass::butterworth(4, 17_800.0, 18_200.0, 44_100.0).unwrap();
/// assert_eq!(bp.sections().len(), 4);
/// assert!((bp.magnitude_at(18_000.0) - 1.0).abs() < 0.05);
/// ```
#[derive(Clone, Debug)]
pub struct BandPass {
    sections: Vec<Biquad>,
    /// Transposed direct form II delay line per section.
    state: Vec<[f64; 2]>,
    sample_rate: f64,
}

impl BandPass {
    /// Design the filter.
    ///
    /// # Errors
    /// Returns `AudioError::FilterDesign` if `order` is 0 or the band is not
    /// strictly inside `(0, sample_rate / 2)`.
    pub fn butterworth(
        order: usize,
        low_hz: f64,
        high_hz: f64,
        sample_rate: f64,
    ) -> Result<Self, AudioError> {
        let nyquist = sample_rate / 2.0;
        if order == 0 {
            return Err(AudioError::FilterDesign("ordre nul".into()));
        }
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(AudioError::FilterDesign(format!(
                "bande [{low_hz}, {high_hz}] Hz hors de (0, {nyquist}) Hz"
            )));
        }

        // Pre-warped analog band edges.
        let fs2 = 2.0 * sample_rate;
        let w1 = fs2 * (PI * low_hz / sample_rate).tan();
        let w2 = fs2 * (PI * high_hz / sample_rate).tan();
        let w0_sq = w1 * w2;
        let half_bw = (w2 - w1) / 2.0;

        let bilinear = |s: Complex<f64>| (s + fs2) / (-s + fs2);
        let lp_to_bp = |p: Complex<f64>| {
            let a = p * half_bw;
            let d = (a * a - w0_sq).sqrt();
            (a + d, a - d)
        };

        let mut pole_pairs: Vec<(Complex<f64>, Complex<f64>)> = Vec::with_capacity(order);
        for k in 0..order {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            let p = Complex::from_polar(1.0, theta);
            let (s1, s2) = lp_to_bp(p);
            if p.im > 1e-12 {
                pole_pairs.push((bilinear(s1), bilinear(s1.conj())));
                pole_pairs.push((bilinear(s2), bilinear(s2.conj())));
            } else if p.im.abs() <= 1e-12 {
                // Real prototype pole (odd order): its two band-pass poles pair up.
                pole_pairs.push((bilinear(s1), bilinear(s2)));
            }
        }

        // Unit gain at the digital image of the geometric centre.
        let wc = 2.0 * (w0_sq.sqrt() / fs2).atan();
        let sections = pole_pairs
            .into_iter()
            .map(|(z1, z2)| {
                let mut section = Biquad {
                    b0: 1.0,
                    b1: 0.0,
                    b2: -1.0,
                    a1: -(z1 + z2).re,
                    a2: (z1 * z2).re,
                };
                let gain = section.response(wc).norm();
                if gain > f64::EPSILON {
                    section.b0 /= gain;
                    section.b2 /= gain;
                }
                section
            })
            .collect::<Vec<_>>();

        Ok(Self {
            state: vec![[0.0; 2]; sections.len()],
            sections,
            sample_rate,
        })
    }

    /// The second-order sections, in cascade order.
    #[must_use]
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Zero the delay lines.
    pub fn reset(&mut self) {
        for s in &mut self.state {
            *s = [0.0; 2];
        }
    }

    /// Filter `data` in place, continuing from the current delay-line state.
    pub fn process_in_place(&mut self, data: &mut [f64]) {
        for (section, st) in self.sections.iter().zip(self.state.iter_mut()) {
            let Biquad { b0, b1, b2, a1, a2 } = *section;
            for x in data.iter_mut() {
                let input = *x;
                let y = b0 * input + st[0];
                st[0] = b1 * input - a1 * y + st[1];
                st[1] = b2 * input - a2 * y;
                *x = y;
            }
        }
    }

    /// Magnitude response at `freq_hz`.
    #[must_use]
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / self.sample_rate;
        self.sections
            .iter()
            .map(|s| s.response(w))
            .fold(Complex::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design() -> BandPass {
        BandPass::butterworth(4, 17_800.0, 18_200.0, 44_100.0).unwrap()
    }

    #[test]
    fn band_edges_are_minus_three_db() {
        let bp = design();
        let edge = std::f64::consts::FRAC_1_SQRT_2;
        assert!((bp.magnitude_at(17_800.0) - edge).abs() < 0.02);
        assert!((bp.magnitude_at(18_200.0) - edge).abs() < 0.02);
    }

    #[test]
    fn stopband_is_strongly_attenuated() {
        let bp = design();
        assert!(bp.magnitude_at(10_000.0) < 1e-6);
        assert!(bp.magnitude_at(17_000.0) < 1e-2);
        assert!(bp.magnitude_at(19_000.0) < 1e-2);
    }

    #[test]
    fn sections_are_stable() {
        for s in design().sections() {
            // Both poles inside the unit circle.
            assert!(s.a2.abs() < 1.0);
            assert!(s.a1.abs() < 1.0 + s.a2);
        }
    }

    #[test]
    fn passes_in_band_tone_with_unit_gain() {
        let mut bp = design();
        let rate = 44_100.0;
        let mut data: Vec<f64> = (0..8192)
            .map(|i| (2.0 * PI * 18_000.0 * i as f64 / rate).sin())
            .collect();
        bp.process_in_place(&mut data);
        let tail = &data[4096..];
        let rms = (tail.iter().map(|v| v * v).sum::<f64>() / tail.len() as f64).sqrt();
        assert!((rms - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.05);
    }

    #[test]
    fn reset_clears_history() {
        let mut bp = design();
        let mut impulse = vec![0.0; 64];
        impulse[0] = 1.0;
        let mut first = impulse.clone();
        bp.process_in_place(&mut first);
        bp.reset();
        let mut second = impulse;
        bp.process_in_place(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn odd_order_design_is_supported() {
        let bp = BandPass::butterworth(3, 1_000.0, 2_000.0, 48_000.0).unwrap();
        assert_eq!(bp.sections().len(), 3);
        assert!((bp.magnitude_at(1_414.0) - 1.0).abs() < 0.05);
    }

    #[test]
    fn rejects_band_above_nyquist() {
        assert!(matches!(
            BandPass::butterworth(4, 21_000.0, 23_000.0, 44_100.0),
            Err(AudioError::FilterDesign(_))
        ));
        assert!(BandPass::butterworth(0, 100.0, 200.0, 44_100.0).is_err());
    }
}
