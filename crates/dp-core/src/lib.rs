/// Configuration, types, and shared structures for doppler-hand.
///
/// This crate contains the data model shared by the DSP pipeline, the audio
/// threads and the application glue.

pub mod config;
pub mod error;
pub mod frame;
pub mod ring;
pub mod run_state;
pub mod traits;

pub use config::TrackerConfig;
pub use error::CoreError;
pub use frame::{AudioFrame, Direction, DirectionEvent, ShiftSample, SpectralPeak};
pub use ring::RingBuffer;
pub use run_state::{RunPhase, RunState};
