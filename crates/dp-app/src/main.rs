use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;
use dp_app::{cli, dispatch, export, hotreload};
use dp_audio::capture::{self, AudioCapture};
use dp_audio::state::spawn_tracker_thread;
use dp_audio::tone::ToneEmitter;
use dp_audio::tracker::TrackerLoop;
use dp_core::config::TrackerConfig;
use dp_core::run_state::RunState;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    if cli.list_devices {
        return print_devices();
    }

    // 3. Charger la config + overrides CLI
    let mut config = resolve_config(&cli.config)?;
    cli.apply_overrides(&mut config)?;
    let config = Arc::new(ArcSwap::from_pointee(config));
    let cli = Arc::new(cli);

    // 4. Hot-reload (thread interne notify)
    let watcher = if cli.config.exists() {
        let overrides = Arc::clone(&cli);
        match hotreload::spawn_config_watcher(&cli.config, &config, move |c| {
            overrides.apply_overrides(c)
        }) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("Hot-reload indisponible : {e}");
                None
            }
        }
    } else {
        None
    };

    // 5. Ctrl+C → STOPPING
    let run = Arc::new(RunState::new());
    {
        let run = Arc::clone(&run);
        ctrlc::set_handler(move || {
            if run.request_stop() {
                log::info!("Arrêt demandé");
            }
        })
        .context("Impossible d'installer le handler Ctrl+C")?;
    }

    // 6. Audio : émission puis capture
    let initial = config.load_full();
    let tone = ToneEmitter::start(
        initial.output_device.as_deref(),
        initial.emission_freq,
        initial.tone_amplitude,
        initial.sample_rate,
    )
    .context("Impossible de démarrer l'émission")?;
    let (capture, frames) = AudioCapture::start(
        initial.input_device.as_deref(),
        initial.sample_rate,
        initial.frame_length,
    )
    .context("Impossible de démarrer la capture")?;

    // 7. Worker de dispatch
    let (tx, rx) = flume::bounded(dispatch::DISPATCH_QUEUE);
    let worker = dispatch::spawn_dispatch_worker(rx, dispatch::build_dispatcher(&initial.dispatch)?)?;

    // 8. Thread tracker
    let tracker = TrackerLoop::new(&initial, dispatch::ChannelDispatcher::new(tx))?;
    let tracker_thread =
        spawn_tracker_thread(tracker, frames, Arc::clone(&config), Arc::clone(&run))?;
    log::info!("En écoute. Ctrl+C pour arrêter.");

    // 9. Attente
    let started = Instant::now();
    while run.is_running() {
        if cli
            .duration
            .is_some_and(|d| started.elapsed().as_secs_f64() >= d)
        {
            run.request_stop();
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    // 10. Arrêt : tracker, flux, worker, export
    let report = tracker_thread
        .join()
        .map_err(|_| anyhow::anyhow!("Le thread tracker a paniqué"))?;
    capture.stop();
    tone.stop();
    let delivered = worker
        .join()
        .map_err(|_| anyhow::anyhow!("Le worker de dispatch a paniqué"))?;
    drop(watcher);

    if !cli.no_export
        && let Err(e) = export::export_shift_log(&report.shift_log, &cli.export)
    {
        log::error!("Export échoué : {e:#}");
    }

    run.mark_stopped();
    log::info!(
        "Terminé : {} cycles, {} événement(s), {delivered} dispatch(s) réussi(s)",
        report.cycles,
        report.events
    );
    Ok(())
}

/// Missing file → defaults with a warning.
fn resolve_config(path: &Path) -> Result<TrackerConfig> {
    if path.exists() {
        dp_core::config::load_config(path)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            path.display()
        );
        Ok(TrackerConfig::default())
    }
}

fn print_devices() -> Result<()> {
    let (inputs, outputs) = capture::list_devices()?;
    println!("Entrées :");
    for name in &inputs {
        println!("  {name}");
    }
    println!("Sorties :");
    for name in &outputs {
        println!("  {name}");
    }
    Ok(())
}
