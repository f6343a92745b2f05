use std::time::{Duration, SystemTime};

pub const UNAVAILABLE: &str = "unavailable";

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn gb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / GB)
}

pub fn mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MB)
}

/// One decimal, without the `%` sign so the value can feed both text and CSS widths.
pub fn percent(value: f64) -> String {
    format!("{:.1}", value)
}

pub fn mhz(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2} MHz", v),
        None => UNAVAILABLE.to_string(),
    }
}

pub fn uptime(duration: Duration) -> String {
    let secs = duration.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;
    let rest = secs % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, mins, rest)
    } else {
        format!("{}h {}m {}s", hours, mins, rest)
    }
}

pub fn timestamp(ts: SystemTime) -> String {
    humantime::format_rfc3339_seconds(ts).to_string()
}

/// Time-of-day part of [`timestamp`], e.g. `14:03:27`.
pub fn clock(ts: SystemTime) -> String {
    let full = timestamp(ts);
    full.split('T')
        .nth(1)
        .map(|t| t.trim_end_matches('Z').to_string())
        .unwrap_or(full)
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn byte_units() {
        assert_eq!(gb(16 * 1024 * 1024 * 1024), "16.00");
        assert_eq!(gb(1_610_612_736), "1.50");
        assert_eq!(mb(5 * 1024 * 1024 + 512 * 1024), "5.50 MB");
        assert_eq!(gb(0), "0.00");
    }

    #[test]
    fn percent_keeps_one_decimal() {
        assert_eq!(percent(42.5), "42.5");
        assert_eq!(percent(68.0), "68.0");
        assert_eq!(percent(55.3), "55.3");
        assert_eq!(percent(99.96), "100.0");
    }

    #[test]
    fn frequency_placeholder() {
        assert_eq!(mhz(Some(2400.456)), "2400.46 MHz");
        assert_eq!(mhz(None), "unavailable");
    }

    #[test]
    fn uptime_layout() {
        assert_eq!(uptime(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(uptime(Duration::from_secs(59)), "0h 0m 59s");
        assert_eq!(uptime(Duration::from_secs(2 * 86_400 + 7)), "2d 0h 0m 7s");
    }

    #[test]
    fn timestamps_are_utc_seconds() {
        let ts = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(timestamp(ts), "2023-11-14T22:13:20Z");
        assert_eq!(clock(ts), "22:13:20");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }
}
