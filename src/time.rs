//! Time tag values.
//!
//! Times are stored as seconds (`f64`) and written as `mm:ss.cc`. Parsing
//! also accepts the older `mm:ss:cc` spelling and plain `mm:ss`.

/// Slack added before truncating to centiseconds so that values parsed
/// from `cc/100` (e.g. `1.15`, stored as `1.1499999...`) format back to
/// the digits they came from.
const CENTISECOND_EPSILON: f64 = 1e-6;

/// Parse the inside of a time tag (`01:15.25`, `01:15`, `01:15:25`) into
/// seconds.
///
/// The fractional field counts centiseconds, so `01:15.25` is `75.25`.
/// Empty fields count as zero. Returns `None` when there is no `:` or a
/// field is not a number.
///
/// # Example
/// ```
/// use kara::time::parse_time;
///
/// assert_eq!(parse_time("01:15.25"), Some(75.25));
/// assert_eq!(parse_time("01:15"), Some(75.0));
/// assert_eq!(parse_time("75"), None);
/// ```
pub fn parse_time(s: &str) -> Option<f64> {
    if !s.contains(':') {
        return None;
    }

    let mut fields = s.split(':');
    let minutes = field_value(fields.next().unwrap_or(""))?;
    let seconds = fields.next().unwrap_or("");

    if let Some((whole, fraction)) = seconds.split_once('.') {
        let fraction = fraction.split('.').next().unwrap_or("");
        return Some(minutes * 60.0 + field_value(whole)? + field_value(fraction)? / 100.0);
    }

    let centiseconds = match fields.next() {
        Some(cs) => field_value(cs)?,
        None => 0.0,
    };
    Some(minutes * 60.0 + field_value(seconds)? + centiseconds / 100.0)
}

fn field_value(s: &str) -> Option<f64> {
    if s.is_empty() {
        return Some(0.0);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Format seconds as `mm:ss.cc`, truncating (not rounding) to centiseconds.
///
/// # Example
/// ```
/// use kara::time::format_time;
///
/// assert_eq!(format_time(75.256), "01:15.25");
/// assert_eq!(format_time(0.0), "00:00.00");
/// ```
pub fn format_time(seconds: f64) -> String {
    let total = (seconds.max(0.0) * 100.0 + CENTISECOND_EPSILON).floor() as u64;
    let centiseconds = total % 100;
    let whole = total / 100;
    format!("{:02}:{:02}.{:02}", whole / 60, whole % 60, centiseconds)
}

/// Format seconds as a bracketed time tag, `[mm:ss.cc]`.
pub fn format_time_tag(seconds: f64) -> String {
    format!("[{}]", format_time(seconds))
}
