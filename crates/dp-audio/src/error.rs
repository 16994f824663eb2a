use thiserror::Error;

/// Errors originating from the audio module.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio input device found.
    #[error("Aucun périphérique audio d'entrée trouvé")]
    NoInputDevice,

    /// No audio output device found.
    #[error("Aucun périphérique audio de sortie trouvé")]
    NoOutputDevice,

    /// No device name contains the requested substring.
    #[error("Périphérique introuvable : {0}")]
    DeviceNotFound(String),

    /// Unsupported audio format.
    #[error("Format audio non supporté : {0}")]
    UnsupportedFormat(String),

    /// Error reported by a running cpal stream.
    #[error("Erreur de stream audio ({direction}) : {source}")]
    StreamError {
        /// "entrée" or "sortie".
        direction: &'static str,
        /// Backend error.
        source: cpal::StreamError,
    },

    /// Invalid tracker configuration.
    #[error(transparent)]
    Config(#[from] dp_core::error::CoreError),

    /// Band edges or order the filter cannot be designed for.
    #[error("Filtre invalide : {0}")]
    FilterDesign(String),
}
