//! Periodic upload progress reporting.

use std::time::Duration;
use tarship_asyncutils::Progress;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Format a byte count with decimal (SI) units: `999 B`, `1.5 kB`, `12.0 MB`.
pub fn byte_count_decimal(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let (mut div, mut exp) = (UNIT, 0);
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = b"kMGTPE"[exp] as char;
    format!("{:.1} {prefix}B", bytes as f64 / div as f64)
}

/// Log transferred bytes and throughput every `every` until the transfer
/// completes.
///
/// Only reads the atomic counters behind `progress`, so aborting it at any
/// point leaves the upload untouched.
pub async fn report(progress: Progress, every: Duration) {
    let started = Instant::now();
    let mut interval = interval_at(started + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let snapshot = progress.snapshot();
        if snapshot.complete {
            return;
        }
        let elapsed = started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { (snapshot.bytes_transferred as f64 / elapsed) as u64 } else { 0 };
        tracing::info!(
            transferred = %byte_count_decimal(snapshot.bytes_transferred),
            rate = %format!("{}/s", byte_count_decimal(rate)),
            "Uploading"
        );
    }
}
