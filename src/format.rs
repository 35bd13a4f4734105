//! Human-readable sizes, durations and progress lines.

use std::time::Duration;

/// Formats a byte count with binary units from B up to TB.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Formats a duration as "5.0s", "1m 05s" or "1h 01m 05s".
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        3600.. => format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        ),
        60.. => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}.{:01}s", secs, d.subsec_millis() / 100),
    }
}

/// What a progress line reports about the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Bytes received so far, and the total if the server sent one.
    Downloading { bytes: u64, total: Option<u64> },
    /// The job was not transferred.
    Skipping,
}

/// Renders `(index/total) Downloading|Skipping <filename> [(<done>/<size>)]`.
#[must_use]
pub fn progress_line(index: usize, total: usize, filename: &str, state: JobState) -> String {
    match state {
        JobState::Downloading {
            bytes,
            total: Some(size),
        } => format!(
            "({index}/{total}) Downloading {filename} ({}/{})",
            format_bytes(bytes),
            format_bytes(size)
        ),
        JobState::Downloading { bytes, total: None } => format!(
            "({index}/{total}) Downloading {filename} ({})",
            format_bytes(bytes)
        ),
        JobState::Skipping => format!("({index}/{total}) Skipping {filename}"),
    }
}
