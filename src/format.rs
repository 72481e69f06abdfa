// Human-readable formatting for sizes, durations and the transport time label

/// Format a byte count as `B`, `KB`, `MB` or `GB` (1024-based, one decimal).
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

/// Format milliseconds as `MM:SS`.
///
/// Minutes are not rolled over into hours: one hour renders as `60:00`.
pub fn format_duration(millis: u64) -> String {
    format!("{:02}:{:02}", millis / 60_000, (millis / 1000) % 60)
}

/// Transport label shown next to the seek bar, e.g. `01:05 / 12:00`.
pub fn format_position_label(position_millis: u64, duration_millis: u64) -> String {
    format!(
        "{} / {}",
        format_duration(position_millis),
        format_duration(duration_millis)
    )
}
