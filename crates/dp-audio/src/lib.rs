// Ultrasonic Doppler capture, tone emission, and hand-direction tracking for doppler-hand.

pub mod capture;
pub mod classifier;
pub mod cooldown;
pub mod error;
pub mod filter;
pub mod smoothing;
pub mod spectral;
pub mod state;
pub mod tone;
pub mod tracker;
