//! Human-readable durations for item and mix lengths
//!
//! Item lengths read as `M:SS`, mix totals past an hour as `H:MM:SS`. Sub-second
//! remainders are truncated, matching what players show in a track list.

const MS_PER_SECOND: u64 = 1_000;
const SECONDS_PER_HOUR: u64 = 3_600;

/// Format milliseconds as `M:SS` below one hour, `H:MM:SS` from one hour on
///
/// # Examples
///
/// ```
/// use mixtape_engine::human_time::format_duration_ms;
///
/// assert_eq!(format_duration_ms(0), "0:00");
/// assert_eq!(format_duration_ms(215_400), "3:35");
/// assert_eq!(format_duration_ms(3_600_000), "1:00:00");
/// assert_eq!(format_duration_ms(5_025_999), "1:23:45");
/// ```
pub fn format_duration_ms(ms: u64) -> String {
    let total_seconds = ms / MS_PER_SECOND;
    let hours = total_seconds / SECONDS_PER_HOUR;
    let minutes = (total_seconds % SECONDS_PER_HOUR) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Like [`format_duration_ms`], with `--:--` for unknown durations
pub fn format_duration_ms_opt(ms: Option<u64>) -> String {
    match ms {
        Some(ms) => format_duration_ms(ms),
        None => "--:--".to_string(),
    }
}
