//! Playback time helpers shared by the sync engine and presentation code.

/// Positions closer than this are treated as already in sync.
pub const SEEK_TOLERANCE_SECONDS: f64 = 0.1;

/// Returns `true` when a handle at `current` must be moved to reach `target`.
///
/// # Example
/// ```
/// use worlds_engine::time::needs_seek;
///
/// assert!(!needs_seek(5.05, 5.0, 0.1));
/// assert!(needs_seek(5.2, 5.0, 0.1));
/// ```
pub fn needs_seek(current: f64, target: f64, tolerance: f64) -> bool {
    !current.is_finite() || (current - target).abs() > tolerance
}

/// Progress of `current_time` through `duration`, in percent.
///
/// Returns `0` for empty or unknown durations and clamps to `0..=100`.
///
/// # Example
/// ```
/// use worlds_engine::time::progress_percent;
///
/// assert!((progress_percent(5.0, 15.0) - 33.333).abs() < 1e-3);
/// assert_eq!(progress_percent(3.0, 0.0), 0.0);
/// ```
pub fn progress_percent(current_time: f64, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 || !current_time.is_finite() {
        return 0.0;
    }
    (current_time / duration * 100.0).clamp(0.0, 100.0)
}

/// Returns `duration` when the media reported a usable value, else `fallback`.
pub fn usable_duration(duration: f64, fallback: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        fallback
    }
}

/// Formats seconds as `MM:SS`.
///
/// # Example
/// ```
/// use worlds_engine::time::format_time;
///
/// assert_eq!(format_time(75.9), "01:15");
/// ```
pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{mins:02}:{secs:02}")
}

/// Formats seconds as `MM:SS.cc` for precise scrubber readouts.
///
/// # Example
/// ```
/// use worlds_engine::time::format_time_precise;
///
/// assert_eq!(format_time_precise(61.25), "01:01.25");
/// ```
pub fn format_time_precise(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let centis = ((seconds % 1.0) * 100.0).floor() as u64;
    format!("{}.{centis:02}", format_time(seconds))
}

#[cfg(test)]
mod tests {
    use super::{format_time, needs_seek, progress_percent, usable_duration};

    #[test]
    fn progress_clamps_past_the_end() {
        assert_eq!(progress_percent(20.0, 15.0), 100.0);
        assert_eq!(progress_percent(-1.0, 15.0), 0.0);
    }

    #[test]
    fn unknown_duration_yields_zero_progress() {
        assert_eq!(progress_percent(4.0, f64::NAN), 0.0);
    }

    #[test]
    fn non_finite_current_time_always_needs_seek() {
        assert!(needs_seek(f64::NAN, 0.0, 0.1));
    }

    #[test]
    fn usable_duration_falls_back_for_nan_and_zero() {
        assert_eq!(usable_duration(f64::NAN, 15.0), 15.0);
        assert_eq!(usable_duration(0.0, 15.0), 15.0);
        assert_eq!(usable_duration(12.5, 15.0), 12.5);
    }

    #[test]
    fn format_time_clamps_negative_values() {
        assert_eq!(format_time(-3.0), "00:00");
    }
}
