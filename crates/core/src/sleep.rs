use std::time::Duration;

use rand::Rng;

/// `secs` seconds with +/-30% random jitter, never below 10ms.
pub fn jitter(secs: f64) -> Duration {
    let spread = secs.abs() * 0.3;
    let actual = if spread > 0.0 {
        secs + rand::thread_rng().gen_range(-spread..spread)
    } else {
        secs
    };
    Duration::from_secs_f64(actual.max(0.01))
}
