use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dp_core::config::{DispatchMode, TrackerConfig};

/// doppler-hand: ultrasonic Doppler hand-gesture tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Fréquence émise en Hz.
    #[arg(long)]
    pub emit_freq: Option<f64>,

    /// Seuil de décalage lissé en Hz.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Cooldown entre deux événements, en secondes.
    #[arg(long)]
    pub cooldown: Option<f64>,

    /// Dispatch : "log" ou "ssh".
    #[arg(long, value_parser = ["log", "ssh"])]
    pub dispatch: Option<String>,

    /// Cible ssh au format user@host (implique --dispatch ssh).
    #[arg(long)]
    pub ssh_target: Option<String>,

    /// Fichier d'export du journal de décalages (.csv ou .json).
    #[arg(long, default_value = "doppler_shifts.csv")]
    pub export: PathBuf,

    /// Ne pas exporter le journal à l'arrêt.
    #[arg(long, default_value_t = false)]
    pub no_export: bool,

    /// Sous-chaîne du nom du périphérique d'entrée.
    #[arg(long)]
    pub input_device: Option<String>,

    /// Sous-chaîne du nom du périphérique de sortie.
    #[arg(long)]
    pub output_device: Option<String>,

    /// Lister les périphériques audio et quitter.
    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Arrêt automatique après N secondes.
    #[arg(long)]
    pub duration: Option<f64>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    ///
    /// # Errors
    /// Returns an error if `--ssh-target` is malformed or the result fails validation.
    pub fn apply_overrides(&self, config: &mut TrackerConfig) -> Result<()> {
        if let Some(f) = self.emit_freq {
            config.emission_freq = f;
        }
        if let Some(t) = self.threshold {
            config.shift_threshold = t;
        }
        if let Some(c) = self.cooldown {
            config.cooldown_sec = c;
        }
        if let Some(ref name) = self.input_device {
            config.input_device = Some(name.clone());
        }
        if let Some(ref name) = self.output_device {
            config.output_device = Some(name.clone());
        }
        if let Some(ref target) = self.ssh_target {
            let (user, host) = parse_ssh_target(target)?;
            config.dispatch.ssh_user = user;
            config.dispatch.ssh_host = host;
            config.dispatch.mode = DispatchMode::Ssh;
        }
        if let Some(ref mode) = self.dispatch {
            config.dispatch.mode = match mode.as_str() {
                "ssh" => DispatchMode::Ssh,
                _ => DispatchMode::Log,
            };
        }

        config.validate()?;
        config.clamp_all();
        Ok(())
    }
}

/// Split `user@host`; a bare host keeps the user empty (ssh defaults apply).
///
/// # Errors
/// Returns an error on an empty host or user part.
pub fn parse_ssh_target(target: &str) -> Result<(String, String)> {
    match target.split_once('@') {
        Some((user, host)) if !user.is_empty() && !host.is_empty() => {
            Ok((user.to_string(), host.to_string()))
        }
        Some(_) => anyhow::bail!("Cible ssh invalide : '{target}' (attendu user@host)"),
        None if !target.is_empty() => Ok((String::new(), target.to_string())),
        None => anyhow::bail!("Cible ssh vide"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("doppler-hand").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_leave_config_untouched() {
        let cli = parse(&[]);
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
        assert_eq!(cli.log_level, "info");
        let mut config = TrackerConfig::default();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn numeric_overrides_apply() {
        let cli = parse(&["--emit-freq", "19000", "--threshold", "7.5", "--cooldown", "2"]);
        let mut config = TrackerConfig::default();
        cli.apply_overrides(&mut config).unwrap();
        assert!((config.emission_freq - 19_000.0).abs() < f64::EPSILON);
        assert!((config.shift_threshold - 7.5).abs() < f64::EPSILON);
        assert!((config.cooldown_sec - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ssh_target_selects_ssh_dispatch() {
        let cli = parse(&["--ssh-target", "alice@192.168.1.20"]);
        let mut config = TrackerConfig::default();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.dispatch.mode, DispatchMode::Ssh);
        assert_eq!(config.dispatch.ssh_user, "alice");
        assert_eq!(config.dispatch.ssh_host, "192.168.1.20");
    }

    #[test]
    fn ssh_without_host_is_rejected() {
        let cli = parse(&["--dispatch", "ssh"]);
        let mut config = TrackerConfig::default();
        assert!(cli.apply_overrides(&mut config).is_err());
    }

    #[test]
    fn unknown_dispatch_is_a_parse_error() {
        let args = ["doppler-hand", "--dispatch", "mail"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn ssh_target_forms() {
        assert_eq!(
            parse_ssh_target("mac.local").unwrap(),
            (String::new(), "mac.local".to_string())
        );
        assert!(parse_ssh_target("bob@").is_err());
        assert!(parse_ssh_target("@host").is_err());
        assert!(parse_ssh_target("").is_err());
    }
}
