use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// A numeric parameter outside of its usable range.
    #[error("Paramètre invalide : {name} = {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Frame length does not match the configured analysis length.
    #[error("Longueur de frame inattendue : {got} (attendu {expected})")]
    FrameLength {
        /// Configured frame length.
        expected: usize,
        /// Length of the received frame.
        got: usize,
    },

    /// Frame sample rate does not match the configured rate.
    #[error("Fréquence d'échantillonnage inattendue : {got} Hz (attendu {expected} Hz)")]
    SampleRate {
        /// Configured sample rate.
        expected: u32,
        /// Rate of the received frame.
        got: u32,
    },
}
