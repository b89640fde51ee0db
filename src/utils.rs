//! Shared formatting helpers for the console readout.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Scale a byte count into (value, unit), 1024 per step.
pub fn scale_bytes(bytes: f64) -> (f64, &'static str) {
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    (value, UNITS[unit])
}

/// "512 B", "1.5 KB", "3.2 GB".
pub fn format_bytes(bytes: f64) -> String {
    let (value, unit) = scale_bytes(bytes);
    if unit == "B" {
        format!("{value:.0} {unit}")
    } else {
        format!("{value:.1} {unit}")
    }
}

/// Throughput in bytes per second, e.g. "1.2 MB/s".
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// Battery time remaining; unknown (-1) or zero renders as "--".
pub fn format_minutes(minutes: i64) -> String {
    if minutes <= 0 {
        return "--".to_string();
    }
    let (h, m) = (minutes / 60, minutes % 60);
    if h > 0 {
        format!("{h}h{m:02}m")
    } else {
        format!("{m} min")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_scale_by_1024() {
        assert_eq!(format_bytes(0.0), "0 B");
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1536.0), "1.5 KB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0 * 1024.0), "3.0 GB");
    }

    #[test]
    fn huge_values_stay_in_largest_unit() {
        let (_, unit) = scale_bytes(1e18);
        assert_eq!(unit, "TB");
    }

    #[test]
    fn negative_bytes_read_as_zero() {
        assert_eq!(format_bytes(-5.0), "0 B");
    }

    #[test]
    fn rate_suffix() {
        assert_eq!(format_rate(2048.0), "2.0 KB/s");
    }

    #[test]
    fn minutes() {
        assert_eq!(format_minutes(-1), "--");
        assert_eq!(format_minutes(0), "--");
        assert_eq!(format_minutes(45), "45 min");
        assert_eq!(format_minutes(125), "2h05m");
    }
}
