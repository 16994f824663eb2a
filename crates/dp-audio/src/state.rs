use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dp_core::config::{SpectralParams, TrackerConfig};
use dp_core::frame::ShiftSample;
use dp_core::run_state::RunState;
use dp_core::traits::{CommandDispatcher, FrameSource};

use crate::tracker::TrackerLoop;

/// What the tracker thread hands back when it stops.
#[derive(Clone, Debug, Default)]
pub struct TrackerReport {
    /// Smoothed-shift log, oldest first.
    pub shift_log: Vec<ShiftSample>,
    /// Accepted direction events.
    pub events: u64,
    /// Cycles run (frames seen).
    pub cycles: u64,
}

/// Spawn the tracker thread.
///
/// Polls `source` every `poll_interval_ms` until `run` leaves the running
/// phase, picking up new configurations from `config` between cycles.
/// Timestamps are seconds since the thread started, from a monotonic clock.
///
/// # Errors
/// Returns an error if the thread cannot be spawned.
pub fn spawn_tracker_thread<D, S>(
    tracker: TrackerLoop<D>,
    source: S,
    config: Arc<ArcSwap<TrackerConfig>>,
    run: Arc<RunState>,
) -> anyhow::Result<JoinHandle<TrackerReport>>
where
    D: CommandDispatcher + 'static,
    S: FrameSource + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("dp-tracker".to_string())
        .spawn(move || run_tracker_loop(tracker, source, &config, &run))?;
    Ok(handle)
}

/// Core tracker loop.
fn run_tracker_loop<D, S>(
    mut tracker: TrackerLoop<D>,
    mut source: S,
    config: &ArcSwap<TrackerConfig>,
    run: &RunState,
) -> TrackerReport
where
    D: CommandDispatcher,
    S: FrameSource,
{
    let stream = *tracker.estimator().params();
    let mut current = config.load_full();
    let clock = Instant::now();

    log::info!(
        "Tracker démarré : émission {:.0} Hz, bande ±{:.0} Hz, {} échantillons @ {} Hz",
        stream.emission_freq,
        stream.search_range,
        stream.frame_length,
        stream.sample_rate
    );

    while run.is_running() {
        let latest = config.load_full();
        if !Arc::ptr_eq(&latest, &current) {
            let pinned = pin_stream_params(&latest, &stream);
            match tracker.apply_config(&pinned) {
                Ok(()) => log::info!("Configuration du tracker mise à jour"),
                Err(e) => log::warn!("Configuration refusée, état précédent conservé : {e}"),
            }
            current = latest;
        }

        let now = clock.elapsed().as_secs_f64();
        tracker.poll(&mut source, now);

        thread::sleep(Duration::from_millis(current.poll_interval_ms));
    }

    log::info!(
        "Tracker arrêté après {} cycles, {} événement(s)",
        tracker.cycles(),
        tracker.events_emitted()
    );

    TrackerReport {
        shift_log: tracker.shift_log(),
        events: tracker.events_emitted(),
        cycles: tracker.cycles(),
    }
}

/// Copy of `next` with the parameters bound to the open audio streams put back.
///
/// Sample rate, frame length and emission frequency cannot change without
/// reopening the devices; a reload that touches them is logged and ignored
/// for those fields only.
#[must_use]
pub fn pin_stream_params(next: &TrackerConfig, stream: &SpectralParams) -> TrackerConfig {
    let mut pinned = next.clone();
    let touched = next.sample_rate != stream.sample_rate
        || next.frame_length != stream.frame_length
        || next.emission_freq.to_bits() != stream.emission_freq.to_bits();
    if touched {
        log::warn!(
            "sample_rate, frame_length et emission_freq nécessitent un redémarrage ; valeurs actuelles conservées"
        );
    }
    pinned.sample_rate = stream.sample_rate;
    pinned.frame_length = stream.frame_length;
    pinned.emission_freq = stream.emission_freq;
    pinned
}
