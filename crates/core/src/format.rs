//! Display formatting for counters and durations.

use std::time::Duration;

const SUFFIXES: [&str; 5] = ["", "K", "M", "B", "T"];

/// Round to three significant digits and abbreviate with K/M/B/T.
/// Anything above 100T is shown in scientific notation.
pub fn human_format(num: f64) -> String {
    if !num.is_finite() {
        return "-".to_string();
    }
    let mut n = round_sig(num, 3);
    if n.abs() > 1e14 {
        return format!("{:.2e}", n);
    }
    let mut magnitude = 0;
    while n.abs() >= 1000.0 && magnitude < SUFFIXES.len() - 1 {
        magnitude += 1;
        n /= 1000.0;
    }
    let decimals = if n.abs() < 1.0 { 3 } else { 2 };
    let s = format!("{:.*}", decimals, n);
    let s = if s.contains('.') { s.trim_end_matches('0').trim_end_matches('.') } else { &s };
    format!("{}{}", s, SUFFIXES[magnitude])
}

fn round_sig(num: f64, digits: i32) -> f64 {
    if num == 0.0 {
        return 0.0;
    }
    let exp = digits - 1 - num.abs().log10().floor() as i32;
    if exp >= 0 {
        let scale = 10f64.powi(exp);
        (num * scale).round() / scale
    } else {
        // divide by an exact power of ten so large integers stay exact
        let step = 10f64.powi(-exp);
        (num / step).round() * step
    }
}

/// `HH:MM:SS`, prefixed with `N days, ` once a day has passed.
pub fn format_elapsed(d: Duration) -> String {
    let total = d.as_secs();
    let days = total / 86_400;
    let rest = total % 86_400;
    let hms = format!("{:02}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    if days > 0 {
        format!("{} days, {}", days, hms)
    } else {
        hms
    }
}

/// `D days, H hours, M minutes, S seconds`
pub fn format_time_saved(d: Duration) -> String {
    let total = d.as_secs();
    format!(
        "{} days, {} hours, {} minutes, {} seconds",
        total / 86_400,
        total % 86_400 / 3600,
        total % 3600 / 60,
        total % 60
    )
}
