use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dp_core::frame::ShiftSample;
use serde::Serialize;

/// Format d'export, déduit de l'extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// `.json` → JSON, anything else → CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// One exported point: seconds since the first log entry, smoothed shift in Hz.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ExportRow {
    pub elapsed_s: f64,
    pub shift_hz: f64,
}

/// Rebase timestamps on the first entry.
#[must_use]
pub fn to_rows(log: &[ShiftSample]) -> Vec<ExportRow> {
    let Some(origin) = log.first().map(|s| s.timestamp) else {
        return Vec::new();
    };
    log.iter()
        .map(|s| ExportRow {
            elapsed_s: s.timestamp - origin,
            shift_hz: s.shift,
        })
        .collect()
}

/// Write the shift log to `path` as CSV or JSON.
///
/// Returns `Ok(false)` without touching the filesystem when there are fewer
/// than 2 entries. The file is written next to its destination then renamed,
/// so a crash never leaves a truncated export behind.
///
/// # Errors
/// Returns an error if the file cannot be written.
///
/// # Example
/// ```no_run
/// use dp_app::export::export_shift_log;
/// use std::path::Path;
/// let written = export_shift_log(&[], Path::new("doppler_shifts.csv")).unwrap();
/// assert!(!written);
/// ```
pub fn export_shift_log(log: &[ShiftSample], path: &Path) -> Result<bool> {
    if log.len() < 2 {
        log::warn!(
            "Pas assez de données pour l'export ({} entrée(s)), {} non écrit",
            log.len(),
            path.display()
        );
        return Ok(false);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer {}", parent.display()))?;
    }

    let rows = to_rows(log);
    let partial = partial_path(path);
    {
        let file = fs::File::create(&partial)
            .with_context(|| format!("Impossible de créer {}", partial.display()))?;
        let mut out = BufWriter::new(file);
        match ExportFormat::from_path(path) {
            ExportFormat::Csv => write_csv(&mut out, &rows)?,
            ExportFormat::Json => serde_json::to_writer_pretty(&mut out, &rows)?,
        }
        out.flush()?;
    }
    fs::rename(&partial, path)
        .with_context(|| format!("Impossible de finaliser {}", path.display()))?;

    log::info!("Journal exporté : {} ({} points)", path.display(), rows.len());
    Ok(true)
}

fn write_csv(out: &mut impl Write, rows: &[ExportRow]) -> Result<()> {
    writeln!(out, "elapsed_s,shift_hz")?;
    for row in rows {
        writeln!(out, "{:.4},{:.4}", row.elapsed_s, row.shift_hz)?;
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
