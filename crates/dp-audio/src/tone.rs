use std::f64::consts::TAU;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::capture::select_device;
use crate::error::AudioError;

/// Phase-accumulating sine oscillator.
///
/// The phase is kept in f64 and wrapped every sample, so the tone stays
/// continuous across callbacks for hours.
#[derive(Clone, Debug)]
pub struct ToneOscillator {
    phase: f64,
    step: f64,
    amplitude: f32,
}

impl ToneOscillator {
    #[must_use]
    pub fn new(frequency: f64, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / f64::from(sample_rate.max(1)),
            amplitude,
        }
    }

    /// Next mono sample.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let s = self.phase.sin() as f32 * self.amplitude;
        self.phase += self.step;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        s
    }

    /// Fill an interleaved buffer, same sample on every channel.
    pub fn fill_interleaved(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            let s = self.next_sample();
            frame.fill(s);
        }
    }
}

/// Continuous emission of the probe tone on an output device.
///
/// The tone plays until the emitter is dropped or stopped.
pub struct ToneEmitter {
    stream: cpal::Stream,
    frequency: f64,
    device_name: String,
}

impl ToneEmitter {
    /// Start emitting `frequency` Hz on the output device whose name contains
    /// `device`, or the default output device.
    ///
    /// # Errors
    /// Returns an error if no device matches, the device does not accept f32
    /// samples, or the stream cannot be opened at `sample_rate`.
    pub fn start(
        device: Option<&str>,
        frequency: f64,
        amplitude: f32,
        sample_rate: u32,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device {
            Some(wanted) => select_device(host.output_devices()?, wanted)
                .ok_or_else(|| AudioError::DeviceNotFound(wanted.to_string()))?,
            None => host
                .default_output_device()
                .ok_or(AudioError::NoOutputDevice)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "?".into());

        let default = device.default_output_config()?;
        if default.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(default.sample_format().to_string()).into());
        }
        let channels = default.channels();
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut osc = ToneOscillator::new(frequency, amplitude, sample_rate);
        let width = usize::from(channels);
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                osc.fill_interleaved(data, width);
            },
            |source| {
                log::error!(
                    "{}",
                    AudioError::StreamError {
                        direction: "sortie",
                        source
                    }
                );
            },
            None,
        )?;

        stream.play()?;
        log::info!("Émission {frequency:.0} Hz sur '{device_name}' @ {sample_rate} Hz");

        Ok(Self {
            stream,
            frequency,
            device_name,
        })
    }

    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Silence the output and release the stream.
    pub fn stop(self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Arrêt émission : {e}");
        }
        log::info!("Émission arrêtée");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillator_matches_closed_form_sine() {
        let rate = 44100;
        let mut osc = ToneOscillator::new(18000.0, 0.1, rate);
        for n in 0..5000_u32 {
            let expected = 0.1 * (TAU * 18000.0 * f64::from(n) / f64::from(rate)).sin();
            let got = f64::from(osc.next_sample());
            assert!((got - expected).abs() < 1e-5, "sample {n}");
        }
    }

    #[test]
    fn amplitude_is_bounded() {
        let mut osc = ToneOscillator::new(1000.0, 0.1, 48000);
        assert!((0..48000).all(|_| osc.next_sample().abs() <= 0.1 + 1e-6));
    }

    #[test]
    fn stereo_fill_duplicates_channels() {
        let mut osc = ToneOscillator::new(440.0, 0.5, 44100);
        let mut buf = vec![0.0_f32; 64];
        osc.fill_interleaved(&mut buf, 2);
        assert!(buf.chunks(2).all(|f| f[0] == f[1]));
        assert!(buf.iter().any(|&s| s != 0.0));
    }
}
