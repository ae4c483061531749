//! Human-readable rendering of byte counts, rates, and durations.

use std::time::Duration;

/// Label used when a duration cannot be estimated.
pub const UNAVAILABLE: &str = "N/A";

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const OVERFLOW_UNIT: &str = "PB";
const STEP: f64 = 1024.0;

/// Render a byte count using the largest unit whose scaled value stays below 1024.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes_to_f64(bytes);
    for unit in BYTE_UNITS {
        if value < STEP {
            return format!("{value:.2} {unit}");
        }
        value /= STEP;
    }
    format!("{value:.2} {OVERFLOW_UNIT}")
}

/// Render a transfer rate in bytes per second.
#[must_use]
pub fn format_rate(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Render a duration as `Ns`, `Mm Ns`, or `Hh Mm Ns`; zero renders as [`UNAVAILABLE`].
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return UNAVAILABLE.to_string();
    }
    let total = duration.as_secs();
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pick_largest_unit_below_threshold() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
        assert_eq!(format_bytes(2 * 1024_u64.pow(4)), "2.00 TB");
        assert_eq!(format_bytes(3 * 1024_u64.pow(5)), "3.00 PB");
        assert_eq!(format_bytes(u64::MAX), "16384.00 PB");
    }

    #[test]
    fn bytes_scaled_value_is_always_below_step_until_petabytes() {
        for exponent in 0..5_u32 {
            for multiplier in [1_u64, 7, 512, 1023] {
                let bytes = multiplier * 1024_u64.pow(exponent);
                let rendered = format_bytes(bytes);
                let (number, unit) = rendered.split_once(' ').expect("value and unit");
                let value: f64 = number.parse().expect("numeric prefix");
                assert!(value < STEP, "{rendered}");
                assert_eq!(unit, BYTE_UNITS[exponent as usize]);
            }
        }
    }

    #[test]
    fn rate_appends_per_second() {
        assert_eq!(format_rate(2048), "2.00 KB/s");
    }

    #[test]
    fn durations_scale_units_with_magnitude() {
        assert_eq!(format_duration(Duration::ZERO), UNAVAILABLE);
        assert_eq!(format_duration(Duration::from_secs(1)), "1s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_duration(Duration::from_secs(3_599)), "59m 59s");
        assert_eq!(format_duration(Duration::from_secs(3_600)), "1h 0m 0s");
        assert_eq!(format_duration(Duration::from_secs(90_061)), "25h 1m 1s");
        assert_eq!(format_duration(Duration::from_millis(1_900)), "1s");
    }
}
