//! Periodic bucket discovery.
//!
//! Each pass asks every host for its bucket-directory listing through
//! `@<hex>` administrative keys and turns each listed entry into
//! feedback of `sqrt(count)`, so hosts that already hold a bucket's data
//! rise to the front of that bucket.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error};

use super::Shared;
use crate::bucket::bucket_width;

/// Listing records considered per response.
const MAX_LISTING_LINES: usize = 17;

/// Aborts the pass it holds when dropped, so aborting [`run`] also
/// stops a pass in flight.
struct PassGuard(JoinHandle<()>);

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run a check pass now and then every `interval`, until aborted.
pub(super) async fn run(shared: Arc<Shared>, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // A panicking pass must not take the loop down with it.
        let mut pass = PassGuard(tokio::spawn(check(shared.clone())));
        if let Err(e) = (&mut pass.0).await {
            if e.is_panic() {
                error!(error = %e, "discovery pass panicked");
            }
        }
    }
}

/// One discovery pass over every host.
async fn check(shared: Arc<Shared>) {
    let started = Instant::now();
    let probes = probe_keys(shared.bucket_count);

    for (i, host) in shared.hosts.iter().enumerate() {
        for probe in &probes {
            let body = match host.get(probe).await {
                Ok(Some(item)) if !item.body.is_empty() => item.body,
                Ok(_) => {
                    debug!(host = %host, key = %probe, "empty listing, skipped");
                    continue;
                }
                Err(e) => {
                    // The host is down or slow; leave it until the next pass.
                    debug!(host = %host, key = %probe, error = %e, "listing probe failed, skipping host");
                    break;
                }
            };

            let body = String::from_utf8_lossy(&body);
            for (name, count) in parse_listing(&body) {
                shared
                    .submit(i, &format!("{probe}{name}"), count.sqrt())
                    .await;
            }
        }
    }

    for b in 0..shared.bucket_count {
        let order: Vec<&str> = shared
            .published
            .load(b)
            .order
            .iter()
            .map(|&i| shared.hosts[i].addr())
            .collect();
        debug!(bucket = b, ?order, "bucket order");
    }

    *shared.last_check.lock().expect("last_check lock") = Some(Instant::now());
    debug!(
        hosts = shared.hosts.len(),
        probes = probes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "discovery pass complete"
    );
}

/// Listing keys to probe for a bucket space of `bucket_count` buckets.
///
/// Each probe names a bucket prefix one hex digit short of a full bucket
/// address; the listing supplies the final digit. Bucket spaces narrower
/// than two hex digits are covered by the single key `"@"`.
pub fn probe_keys(bucket_count: usize) -> Vec<String> {
    let digits = (bucket_width(bucket_count) / 4) as usize;
    if digits < 2 {
        return vec!["@".to_string()];
    }
    let digits = digits - 1;
    (0..16usize.pow(digits as u32))
        .map(|i| format!("@{i:0digits$x}"))
        .collect()
}

/// Parse a bucket-directory listing into `(name, count)` pairs.
///
/// Records look like `a/ 0 1234`: an entry name whose second byte is
/// `/`, a flags field, and a count. Anything else is ignored, as are
/// negative or unparseable counts.
pub fn parse_listing(body: &str) -> Vec<(&str, f64)> {
    body.splitn(MAX_LISTING_LINES, '\n')
        .filter_map(|line| {
            let spaces = line.bytes().filter(|&b| b == b' ').count();
            if spaces < 2 || line.as_bytes().get(1) != Some(&b'/') {
                return None;
            }
            let mut fields = line.splitn(3, ' ');
            let name = fields.next()?;
            let _flags = fields.next()?;
            let count: f64 = fields.next()?.trim().parse().ok()?;
            (count.is_finite() && count >= 0.0).then_some((name, count))
        })
        .collect()
}
