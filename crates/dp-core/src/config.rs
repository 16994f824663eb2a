use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Configuration complète du tracker, hot-rechargeable.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use dp_core::config::TrackerConfig;
/// let config = TrackerConfig::default();
/// assert_eq!(config.sample_rate, 44100);
/// assert_eq!(config.consistency_requirement, 3);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TrackerConfig {
    // === Audio ===
    /// Capture and playback sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per analysis frame.
    pub frame_length: usize,
    /// Frequency of the emitted tone in Hz.
    pub emission_freq: f64,
    /// Half-width of the band-pass and peak search band in Hz.
    pub search_range: f64,
    /// Peak amplitude of the emitted sine [0.0, 1.0].
    pub tone_amplitude: f32,
    /// Substring of the input device name. None = default device.
    pub input_device: Option<String>,
    /// Substring of the output device name. None = default device.
    pub output_device: Option<String>,

    // === Détection ===
    /// Noise floor: in-band power must exceed this for a peak to count.
    pub min_amplitude: f64,
    /// Minimum |smoothed shift| in Hz for a reading to carry a direction.
    pub shift_threshold: f64,
    /// Number of raw shifts averaged by the smoother.
    pub smoothing_window: usize,
    /// Capacity of the diagnostic shift log.
    pub log_capacity: usize,
    /// Consecutive same-direction readings before an event fires.
    pub consistency_requirement: u32,
    /// Minimum seconds between two accepted events.
    pub cooldown_sec: f64,
    /// Tracker polling period in milliseconds.
    pub poll_interval_ms: u64,

    // === Dispatch ===
    /// Where accepted events go.
    pub dispatch: DispatchConfig,
}

/// Parameters the band-pass and spectrum depend on.
///
/// A change in any of them forces the estimator to rebuild its coefficients.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per frame.
    pub frame_length: usize,
    /// Emitted tone in Hz.
    pub emission_freq: f64,
    /// Search half-width in Hz.
    pub search_range: f64,
    /// Noise floor on bin power.
    pub min_amplitude: f64,
}

impl SpectralParams {
    /// Lower edge of the search band.
    #[inline]
    #[must_use]
    pub fn low_cut(&self) -> f64 {
        self.emission_freq - self.search_range
    }

    /// Upper edge of the search band.
    #[inline]
    #[must_use]
    pub fn high_cut(&self) -> f64 {
        self.emission_freq + self.search_range
    }
}

/// Dispatch backend selection.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Log the event only.
    #[default]
    Log,
    /// Trigger a keystroke on a remote machine over ssh.
    Ssh,
}

/// Action performed on the remote machine for a direction.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteAction {
    /// Cmd + C in the target application.
    Copy,
    /// Cmd + V in the target application.
    Paste,
    /// Open `DispatchConfig::url` in the browser.
    OpenUrl,
    /// Do nothing.
    #[default]
    None,
}

/// Remote command dispatch settings.
///
/// # Example
/// ```
/// use dp_core::config::{DispatchConfig, RemoteAction};
/// let d = DispatchConfig::default();
/// assert_eq!(d.toward_action, RemoteAction::Paste);
/// assert_eq!(d.away_action, RemoteAction::Copy);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DispatchConfig {
    /// Backend.
    pub mode: DispatchMode,
    /// Remote login.
    pub ssh_user: String,
    /// Remote host name or address.
    pub ssh_host: String,
    /// Application activated before sending a keystroke.
    pub target_app: String,
    /// Browser application used by `OpenUrl`.
    pub browser_app: String,
    /// URL opened by `OpenUrl`.
    pub url: String,
    /// Action on TOWARD.
    pub toward_action: RemoteAction,
    /// Action on AWAY.
    pub away_action: RemoteAction,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Log,
            ssh_user: String::new(),
            ssh_host: String::new(),
            target_app: "Notes".into(),
            browser_app: "Google Chrome".into(),
            url: "https://www.youtube.com".into(),
            toward_action: RemoteAction::Paste,
            away_action: RemoteAction::Copy,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_length: 2048,
            emission_freq: 18_000.0,
            search_range: 200.0,
            tone_amplitude: 0.1,
            input_device: None,
            output_device: None,
            min_amplitude: 1e-10,
            shift_threshold: 5.0,
            smoothing_window: 5,
            log_capacity: 100,
            consistency_requirement: 3,
            cooldown_sec: 10.0,
            poll_interval_ms: 50,
            dispatch: DispatchConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization and CLI overrides.
    pub fn clamp_all(&mut self) {
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        let nyquist = f64::from(self.sample_rate) / 2.0;
        self.search_range = self.search_range.clamp(1.0, nyquist / 4.0);
        self.emission_freq = self
            .emission_freq
            .clamp(self.search_range + 1.0, nyquist - self.search_range - 1.0);
        self.frame_length = self.frame_length.clamp(64, 65_536);
        self.tone_amplitude = self.tone_amplitude.clamp(0.0, 1.0);
        self.min_amplitude = self.min_amplitude.max(0.0);
        self.shift_threshold = self.shift_threshold.max(0.0);
        self.smoothing_window = self.smoothing_window.clamp(1, 64);
        self.log_capacity = self.log_capacity.clamp(2, 100_000);
        self.consistency_requirement = self.consistency_requirement.clamp(1, 100);
        self.cooldown_sec = self.cooldown_sec.clamp(0.0, 3600.0);
        self.poll_interval_ms = self.poll_interval_ms.clamp(1, 1000);
    }

    /// Reject values clamping cannot repair.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidParameter` for non-finite numbers and
    /// `CoreError::Config` for an ssh dispatcher without a host.
    pub fn validate(&self) -> Result<(), CoreError> {
        let floats = [
            ("emission_freq", self.emission_freq),
            ("search_range", self.search_range),
            ("min_amplitude", self.min_amplitude),
            ("shift_threshold", self.shift_threshold),
            ("cooldown_sec", self.cooldown_sec),
            ("tone_amplitude", f64::from(self.tone_amplitude)),
        ];
        if let Some(&(name, value)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CoreError::InvalidParameter { name, value });
        }
        if self.dispatch.mode == DispatchMode::Ssh && self.dispatch.ssh_host.is_empty() {
            return Err(CoreError::Config(
                "dispatch.mode = \"ssh\" requiert dispatch.ssh_host".into(),
            ));
        }
        Ok(())
    }

    /// Parameters the spectral estimator is built from.
    #[must_use]
    pub fn spectral_params(&self) -> SpectralParams {
        SpectralParams {
            sample_rate: self.sample_rate,
            frame_length: self.frame_length,
            emission_freq: self.emission_freq,
            search_range: self.search_range,
            min_amplitude: self.min_amplitude,
        }
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    audio: Option<AudioSection>,
    detection: Option<DetectionSection>,
    dispatch: Option<DispatchSection>,
}

/// Audio section, all fields optional for partial override.
#[derive(Deserialize)]
struct AudioSection {
    sample_rate: Option<u32>,
    frame_length: Option<usize>,
    emission_freq: Option<f64>,
    search_range: Option<f64>,
    tone_amplitude: Option<f32>,
    input_device: Option<String>,
    output_device: Option<String>,
}

/// Detection section, all fields optional.
#[derive(Deserialize)]
struct DetectionSection {
    min_amplitude: Option<f64>,
    shift_threshold: Option<f64>,
    smoothing_window: Option<usize>,
    log_capacity: Option<usize>,
    consistency_requirement: Option<u32>,
    cooldown_sec: Option<f64>,
    poll_interval_ms: Option<u64>,
}

/// Dispatch section, all fields optional.
#[derive(Deserialize)]
struct DispatchSection {
    mode: Option<DispatchMode>,
    ssh_user: Option<String>,
    ssh_host: Option<String>,
    target_app: Option<String>,
    browser_app: Option<String>,
    url: Option<String>,
    toward_action: Option<RemoteAction>,
    away_action: Option<RemoteAction>,
}

/// Parse TOML text and merge it over the defaults.
///
/// # Errors
/// Returns an error if the text is not valid TOML for this layout or fails validation.
///
/// # Example
/// ```
/// use dp_core::config::parse_config;
/// let config = parse_config("[detection]\ncooldown_sec = 4.0\n").unwrap();
/// assert!((config.cooldown_sec - 4.0).abs() < f64::EPSILON);
/// assert_eq!(config.frame_length, 2048);
/// ```
pub fn parse_config(content: &str) -> Result<TrackerConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = TrackerConfig::default();

    if let Some(a) = file.audio {
        if let Some(v) = a.sample_rate {
            config.sample_rate = v;
        }
        if let Some(v) = a.frame_length {
            config.frame_length = v;
        }
        if let Some(v) = a.emission_freq {
            config.emission_freq = v;
        }
        if let Some(v) = a.search_range {
            config.search_range = v;
        }
        if let Some(v) = a.tone_amplitude {
            config.tone_amplitude = v;
        }
        if a.input_device.is_some() {
            config.input_device = a.input_device;
        }
        if a.output_device.is_some() {
            config.output_device = a.output_device;
        }
    }

    if let Some(d) = file.detection {
        if let Some(v) = d.min_amplitude {
            config.min_amplitude = v;
        }
        if let Some(v) = d.shift_threshold {
            config.shift_threshold = v;
        }
        if let Some(v) = d.smoothing_window {
            config.smoothing_window = v;
        }
        if let Some(v) = d.log_capacity {
            config.log_capacity = v;
        }
        if let Some(v) = d.consistency_requirement {
            config.consistency_requirement = v;
        }
        if let Some(v) = d.cooldown_sec {
            config.cooldown_sec = v;
        }
        if let Some(v) = d.poll_interval_ms {
            config.poll_interval_ms = v;
        }
    }

    if let Some(s) = file.dispatch {
        let d = &mut config.dispatch;
        if let Some(v) = s.mode {
            d.mode = v;
        }
        if let Some(v) = s.ssh_user {
            d.ssh_user = v;
        }
        if let Some(v) = s.ssh_host {
            d.ssh_host = v;
        }
        if let Some(v) = s.target_app {
            d.target_app = v;
        }
        if let Some(v) = s.browser_app {
            d.browser_app = v;
        }
        if let Some(v) = s.url {
            d.url = v;
        }
        if let Some(v) = s.toward_action {
            d.toward_action = v;
        }
        if let Some(v) = s.away_action {
            d.away_action = v;
        }
    }

    config.validate()?;
    config.clamp_all();
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed or validated.
///
/// # Example
/// ```no_run
/// use dp_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Config invalide dans {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn partial_sections_override_only_given_fields() {
        let config = parse_config(
            r#"
            [audio]
            emission_freq = 19000.0

            [dispatch]
            mode = "ssh"
            ssh_host = "10.0.0.3"
            away_action = "openurl"
            "#,
        )
        .unwrap();
        assert!((config.emission_freq - 19_000.0).abs() < f64::EPSILON);
        assert!((config.search_range - 200.0).abs() < f64::EPSILON);
        assert_eq!(config.dispatch.mode, DispatchMode::Ssh);
        assert_eq!(config.dispatch.away_action, RemoteAction::OpenUrl);
        assert_eq!(config.dispatch.toward_action, RemoteAction::Paste);
    }

    #[test]
    fn ssh_without_host_is_rejected() {
        let err = parse_config("[dispatch]\nmode = \"ssh\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("ssh_host"));
    }

    #[test]
    fn clamp_keeps_band_below_nyquist() {
        let mut config = TrackerConfig {
            sample_rate: 16_000,
            emission_freq: 18_000.0,
            ..TrackerConfig::default()
        };
        config.clamp_all();
        assert!(config.emission_freq + config.search_range < 8_000.0);
        assert!(config.emission_freq - config.search_range > 0.0);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let config = TrackerConfig {
            cooldown_sec: f64::NAN,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidParameter { name: "cooldown_sec", .. })
        ));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(&path, "[detection]\nshift_threshold = 8.0\n").unwrap();
        let config = load_config(&path).unwrap();
        assert!((config.shift_threshold - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn load_missing_file_mentions_path() {
        let err = load_config(Path::new("/nonexistent/tracker.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tracker.toml"));
    }
}
