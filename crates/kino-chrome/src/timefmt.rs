//! Timecode formatting
//!
//! Formats are colon-separated tokens of `h`, `m`, `s` and `f` (frames).
//! A doubled token (`mm`) pads to two digits.

/// Base format for the given display options
pub fn derive_time_format(always_show_hours: bool, show_frame_count: bool) -> String {
    let mut format = String::from(if always_show_hours { "hh:mm:ss" } else { "mm:ss" });
    if show_frame_count {
        format.push_str(":ff");
    }
    format
}

/// Upgrade `format` with an hours field once the duration reaches an hour
pub fn calculate_time_format(duration: f64, format: &str) -> String {
    if duration.is_finite() && duration >= 3600.0 && !format.contains('h') {
        let hours = if format.starts_with("mm") { "hh:" } else { "h:" };
        return format!("{}{}", hours, format);
    }
    format.to_string()
}

/// Render `seconds` with `format` at `fps` frames per second
pub fn seconds_to_timecode(seconds: f64, format: &str, fps: u32) -> String {
    let time = if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 };
    let whole = time.floor() as u64;
    let has_hours = format.contains('h');

    let hours = whole / 3600;
    let minutes = if has_hours { (whole / 60) % 60 } else { whole / 60 };
    let secs = whole % 60;
    let frames = ((time - time.floor()) * f64::from(fps)).floor() as u64;

    format
        .split(':')
        .map(|token| {
            let value = match token.chars().next() {
                Some('h') => hours,
                Some('m') => minutes,
                Some('s') => secs,
                Some('f') => frames,
                _ => return token.to_string(),
            };
            if token.len() >= 2 {
                format!("{:02}", value)
            } else {
                value.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_time_format() {
        assert_eq!(derive_time_format(false, false), "mm:ss");
        assert_eq!(derive_time_format(true, false), "hh:mm:ss");
        assert_eq!(derive_time_format(false, true), "mm:ss:ff");
    }

    #[test]
    fn test_hours_upgrade() {
        assert_eq!(calculate_time_format(3599.0, "mm:ss"), "mm:ss");
        assert_eq!(calculate_time_format(3600.0, "mm:ss"), "hh:mm:ss");
        assert_eq!(calculate_time_format(7200.0, "m:ss"), "h:m:ss");
        assert_eq!(calculate_time_format(f64::NAN, "mm:ss"), "mm:ss");
    }

    #[test]
    fn test_seconds_to_timecode() {
        assert_eq!(seconds_to_timecode(75.0, "mm:ss", 25), "01:15");
        assert_eq!(seconds_to_timecode(75.0, "m:ss", 25), "1:15");
        assert_eq!(seconds_to_timecode(3725.0, "hh:mm:ss", 25), "01:02:05");
        assert_eq!(seconds_to_timecode(1.5, "mm:ss:ff", 25), "00:01:12");
        assert_eq!(seconds_to_timecode(f64::NAN, "mm:ss", 25), "00:00");
    }
}
