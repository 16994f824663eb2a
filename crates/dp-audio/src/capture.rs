use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use dp_core::frame::AudioFrame;
use dp_core::traits::FrameSource;
use triple_buffer::TripleBuffer;

use crate::error::AudioError;

/// Cuts an interleaved sample stream into mono frames of exactly `frame_length`.
///
/// Runs inside the cpal callback: one allocation per completed frame, none per block.
///
/// # Example
/// ```
/// use dp_audio::capture::FrameAssembler;
/// let mut asm = FrameAssembler::new(4, 2, 44100);
/// let mut frames = Vec::new();
/// asm.push_interleaved(&[1.0, 0.0, 1.0, 1.0, 0.0, 0.0, -1.0, -1.0, 0.5, 0.5], |f| frames.push(f));
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].samples, vec![0.5, 1.0, 0.0, -1.0]);
/// ```
pub struct FrameAssembler {
    frame_length: usize,
    channels: usize,
    sample_rate: u32,
    staging: Vec<f32>,
}

impl FrameAssembler {
    /// Assembler for `channels`-wide interleaved input.
    #[must_use]
    pub fn new(frame_length: usize, channels: usize, sample_rate: u32) -> Self {
        Self {
            frame_length: frame_length.max(1),
            channels: channels.max(1),
            sample_rate,
            staging: Vec::with_capacity(frame_length.max(1)),
        }
    }

    /// Downmix `data` to mono and hand every completed frame to `publish`.
    ///
    /// Returns the number of frames published.
    pub fn push_interleaved(&mut self, data: &[f32], mut publish: impl FnMut(AudioFrame)) -> usize {
        let mut published = 0;
        for chunk in data.chunks(self.channels) {
            let mono: f32 = chunk.iter().sum::<f32>() / self.channels as f32;
            self.staging.push(mono);
            if self.staging.len() == self.frame_length {
                let samples = std::mem::replace(
                    &mut self.staging,
                    Vec::with_capacity(self.frame_length),
                );
                publish(AudioFrame::new(samples, self.sample_rate));
                published += 1;
            }
        }
        published
    }

    /// Samples waiting for the current frame to complete.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.staging.len()
    }
}

/// Consumer side of the single-slot frame handoff.
///
/// The producer overwrites the slot; the consumer reads its own buffer, so a
/// frame can never be read while it is being written.
pub struct FrameReceiver {
    output: triple_buffer::Output<AudioFrame>,
}

impl FrameReceiver {
    /// Create a connected producer/consumer pair.
    #[must_use]
    pub fn channel() -> (triple_buffer::Input<AudioFrame>, Self) {
        let (input, output) = TripleBuffer::new(&AudioFrame::default()).split();
        (input, Self { output })
    }
}

impl FrameSource for FrameReceiver {
    fn latest(&mut self) -> Option<&AudioFrame> {
        if !self.output.updated() {
            return None;
        }
        Some(self.output.read())
    }
}

/// Microphone capture via cpal.
///
/// Publishes mono `frame_length`-sample frames into a triple buffer.
///
/// # Example
/// ```no_run
/// use dp_audio::capture::AudioCapture;
/// let (capture, frames) = AudioCapture::start(None, 44100, 2048).unwrap();
/// ```
pub struct AudioCapture {
    stream: cpal::Stream,
    sample_rate: u32,
    device_name: String,
}

impl AudioCapture {
    /// Start capturing from the input device whose name contains `device`,
    /// or the default input device.
    ///
    /// # Errors
    /// Returns an error if no device matches, the device does not deliver
    /// f32 samples, or the stream cannot be built at `sample_rate`.
    pub fn start(
        device: Option<&str>,
        sample_rate: u32,
        frame_length: usize,
    ) -> Result<(Self, FrameReceiver)> {
        let host = cpal::default_host();
        let device = match device {
            Some(wanted) => select_device(host.input_devices()?, wanted)
                .ok_or_else(|| AudioError::DeviceNotFound(wanted.to_string()))?,
            None => host
                .default_input_device()
                .ok_or(AudioError::NoInputDevice)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "?".into());

        let default = device.default_input_config()?;
        if default.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(default.sample_format().to_string()).into());
        }
        let channels = default.channels();
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (mut frame_input, receiver) = FrameReceiver::channel();
        let mut assembler = FrameAssembler::new(frame_length, usize::from(channels), sample_rate);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                assembler.push_interleaved(data, |frame| frame_input.write(frame));
            },
            |source| {
                log::error!(
                    "{}",
                    AudioError::StreamError {
                        direction: "entrée",
                        source
                    }
                );
            },
            None,
        )?;

        stream.play()?;
        log::info!("Capture démarrée : '{device_name}' @ {sample_rate} Hz, {channels} canal(aux)");

        Ok((
            Self {
                stream,
                sample_rate,
                device_name,
            },
            receiver,
        ))
    }

    /// Reference to the underlying cpal stream (kept alive for capture).
    pub fn stream(&self) -> &cpal::Stream {
        &self.stream
    }

    /// The sample rate of the capture stream.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Name of the device being captured.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Pause and release the stream.
    pub fn stop(self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Arrêt capture : {e}");
        }
        log::info!("Capture arrêtée : '{}'", self.device_name);
    }
}

/// First device whose name contains `wanted`.
pub(crate) fn select_device(
    devices: impl Iterator<Item = cpal::Device>,
    wanted: &str,
) -> Option<cpal::Device> {
    let mut devices = devices;
    devices.find(|d| d.name().is_ok_and(|n| n.contains(wanted)))
}

/// Names of the available input and output devices of the default host.
///
/// # Errors
/// Returns an error if the host cannot enumerate devices.
pub fn list_devices() -> Result<(Vec<String>, Vec<String>)> {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()?
        .filter_map(|d| d.name().ok())
        .collect();
    let outputs = host
        .output_devices()?
        .filter_map(|d| d.name().ok())
        .collect();
    Ok((inputs, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembler_spans_callback_boundaries() {
        let mut asm = FrameAssembler::new(3, 1, 8000);
        let mut frames = Vec::new();
        assert_eq!(asm.push_interleaved(&[1.0, 2.0], |f| frames.push(f)), 0);
        assert_eq!(asm.pending(), 2);
        assert_eq!(asm.push_interleaved(&[3.0, 4.0, 5.0, 6.0, 7.0], |f| frames.push(f)), 2);
        assert_eq!(asm.pending(), 1);
        assert_eq!(frames[0].samples, vec![1.0, 2.0, 3.0]);
        assert_eq!(frames[1].samples, vec![4.0, 5.0, 6.0]);
        assert!(frames.iter().all(|f| f.sample_rate == 8000));
    }

    #[test]
    fn receiver_reports_each_frame_once() {
        let (mut input, mut rx) = FrameReceiver::channel();
        assert!(rx.latest().is_none());
        input.write(AudioFrame::silent(4, 44100));
        assert_eq!(rx.latest().map(AudioFrame::len), Some(4));
        assert!(rx.latest().is_none());
    }

    #[test]
    fn receiver_sees_only_newest_frame() {
        let (mut input, mut rx) = FrameReceiver::channel();
        input.write(AudioFrame::new(vec![1.0], 44100));
        input.write(AudioFrame::new(vec![2.0], 44100));
        assert_eq!(rx.latest().map(|f| f.samples[0]), Some(2.0));
    }
}
