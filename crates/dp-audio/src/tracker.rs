use dp_core::config::TrackerConfig;
use dp_core::error::CoreError;
use dp_core::frame::{AudioFrame, DirectionEvent, ShiftSample};
use dp_core::traits::{CommandDispatcher, FrameSource};

use crate::classifier::DirectionClassifier;
use crate::cooldown::CooldownGate;
use crate::error::AudioError;
use crate::smoothing::ShiftSmoother;
use crate::spectral::SpectralEstimator;

/// What a single tracker cycle did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CycleOutcome {
    /// No new frame was ready; nothing ran.
    NoFrame,
    /// Frame length did not match the analysis length.
    Dropped,
    /// No in-band peak above the noise floor; history untouched.
    NoPeak,
    /// A shift was measured but no event fired.
    Shift {
        /// Peak frequency minus emission frequency, Hz.
        raw: f64,
        /// Moving average after this reading, Hz.
        smoothed: f64,
    },
    /// A direction was accepted and handed to the dispatcher.
    Event(DirectionEvent),
}

/// Frame → peak → shift → smoothed shift → debounced, cooled-down event.
///
/// Owns all per-cycle state; meant to be driven by a single thread.
pub struct TrackerLoop<D: CommandDispatcher> {
    estimator: SpectralEstimator,
    smoother: ShiftSmoother,
    classifier: DirectionClassifier,
    gate: CooldownGate,
    dispatcher: D,
    events: u64,
    cycles: u64,
}

impl<D: CommandDispatcher> TrackerLoop<D> {
    /// Build every stage from `config`.
    ///
    /// # Errors
    /// Returns an error if `smoothing_window` or `log_capacity` is 0, or the
    /// band-pass cannot be designed for the configured band.
    pub fn new(config: &TrackerConfig, dispatcher: D) -> Result<Self, AudioError> {
        check_capacities(config)?;
        Ok(Self {
            estimator: SpectralEstimator::new(config.spectral_params())?,
            smoother: ShiftSmoother::new(config.smoothing_window, config.log_capacity),
            classifier: DirectionClassifier::new(
                config.shift_threshold,
                config.consistency_requirement,
            ),
            gate: CooldownGate::new(config.cooldown_sec),
            dispatcher,
            events: 0,
            cycles: 0,
        })
    }

    /// Push a new configuration through every stage.
    ///
    /// The estimator is rebuilt only if its spectral parameters changed.
    ///
    /// # Errors
    /// Returns an error if `smoothing_window` or `log_capacity` is 0, in which
    /// case nothing is changed. If only the new band cannot be designed, the
    /// other stages are still updated and the previous filter stays in use.
    pub fn apply_config(&mut self, config: &TrackerConfig) -> Result<(), AudioError> {
        check_capacities(config)?;
        self.classifier.set_threshold(config.shift_threshold);
        self.classifier.set_required(config.consistency_requirement);
        self.gate.set_cooldown(config.cooldown_sec);
        self.smoother
            .resize(config.smoothing_window, config.log_capacity);
        self.estimator.reconfigure(config.spectral_params())?;
        Ok(())
    }

    /// Run one cycle on the latest frame from `source`, if any.
    ///
    /// Never waits: with no new frame the cycle is skipped.
    pub fn poll<S: FrameSource + ?Sized>(&mut self, source: &mut S, now: f64) -> CycleOutcome {
        match source.latest() {
            Some(frame) => self.cycle(frame, now),
            None => CycleOutcome::NoFrame,
        }
    }

    /// Run one cycle on `frame` at tracker time `now` (seconds).
    pub fn cycle(&mut self, frame: &AudioFrame, now: f64) -> CycleOutcome {
        self.cycles += 1;
        self.gate.report(now);

        let params = self.estimator.params();
        if frame.len() != params.frame_length {
            log::warn!(
                "{}",
                CoreError::FrameLength {
                    expected: params.frame_length,
                    got: frame.len()
                }
            );
            return CycleOutcome::Dropped;
        }
        if frame.sample_rate != params.sample_rate {
            log::warn!(
                "{}",
                CoreError::SampleRate {
                    expected: params.sample_rate,
                    got: frame.sample_rate
                }
            );
            return CycleOutcome::Dropped;
        }

        let Some(peak) = self.estimator.estimate(frame) else {
            return CycleOutcome::NoPeak;
        };

        let raw = peak.shift_from(self.estimator.params().emission_freq);
        let smoothed = self.smoother.push(raw, now);
        log::trace!(
            "pic {:.1} Hz (amp {:.3e}) → décalage {raw:+.1} Hz, lissé {smoothed:+.2} Hz",
            peak.frequency,
            peak.amplitude
        );

        let Some(direction) = self.classifier.classify(smoothed, now, &mut self.gate) else {
            return CycleOutcome::Shift { raw, smoothed };
        };

        let event = DirectionEvent {
            direction,
            timestamp: now,
            smoothed_shift: smoothed,
        };
        self.events += 1;
        log::info!(
            "Mouvement {direction} détecté (décalage {smoothed:+.1} Hz), envoi via '{}'",
            self.dispatcher.name()
        );
        if let Err(e) = self.dispatcher.dispatch(&event) {
            log::warn!("Dispatch {} échoué : {e:#}", self.dispatcher.name());
        }
        CycleOutcome::Event(event)
    }

    /// The smoothing stage.
    #[must_use]
    pub fn smoother(&self) -> &ShiftSmoother {
        &self.smoother
    }

    /// The classifier stage.
    #[must_use]
    pub fn classifier(&self) -> &DirectionClassifier {
        &self.classifier
    }

    /// The cooldown stage.
    #[must_use]
    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// The spectral stage.
    #[must_use]
    pub fn estimator(&self) -> &SpectralEstimator {
        &self.estimator
    }

    /// The dispatcher events are handed to.
    #[must_use]
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Copy of the shift log, oldest first.
    #[must_use]
    pub fn shift_log(&self) -> Vec<ShiftSample> {
        self.smoother.log_snapshot()
    }

    /// Events accepted so far.
    #[must_use]
    pub fn events_emitted(&self) -> u64 {
        self.events
    }

    /// Cycles run so far (frames received).
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// Ring buffers cannot hold zero entries.
fn check_capacities(config: &TrackerConfig) -> Result<(), AudioError> {
    for (name, value) in [
        ("smoothing_window", config.smoothing_window),
        ("log_capacity", config.log_capacity),
    ] {
        if value == 0 {
            return Err(CoreError::InvalidParameter { name, value: 0.0 }.into());
        }
    }
    Ok(())
}
