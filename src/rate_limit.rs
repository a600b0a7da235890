use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::metrics::TRACKED_CLIENTS;

// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    // minutes until the client's window resets, rounded up
    Reject { minutes_remaining: u64 },
}

// Usage record - requests counted in the current window for one client
struct UsageRecord {
    count: u32,
    window_reset_at: Instant,
}

// Fixed-window rate limiter keyed by client identity.
// One record per client; a window that elapses is forgotten entirely,
// never carried over or decayed.
pub struct RateLimiter {
    store: DashMap<String, UsageRecord>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            store: DashMap::new(),
            max_requests,
            window,
        }
    }

    // Check + count as a single step. The entry API holds the shard lock
    // across the read-modify-write, so two requests from the same client
    // can't both increment from the same count.
    pub fn check_and_record(&self, identity: &str, now: Instant) -> Decision {
        match self.store.entry(identity.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(UsageRecord {
                    count: 1,
                    window_reset_at: now + self.window,
                });
                Decision::Admit
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();

                // Window expired..? Start a fresh one, old count discarded
                if now > record.window_reset_at {
                    *record = UsageRecord {
                        count: 1,
                        window_reset_at: now + self.window,
                    };
                    return Decision::Admit;
                }

                // Under limit..? Count it
                if record.count < self.max_requests {
                    record.count += 1;
                    return Decision::Admit;
                }

                // Over limit - a rejected request never touches the record
                Decision::Reject {
                    minutes_remaining: minutes_until(record.window_reset_at, now),
                }
            }
        }
    }

    // Drop records that have sat expired for a full extra window with no
    // renewing traffic. Safe to run while other clients are being checked.
    pub fn sweep(&self, now: Instant) {
        self.store
            .retain(|_, record| now <= record.window_reset_at + self.window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }
}

// Whole minutes until reset, rounded up (0 only when reset is this instant)
fn minutes_until(reset_at: Instant, now: Instant) -> u64 {
    let millis = reset_at.saturating_duration_since(now).as_millis() as u64;
    millis.div_ceil(60_000)
}

// Background sweep task - runs on a fixed timer like the health checker
pub async fn sweep_task(limiter: Arc<RateLimiter>, every: Duration) {
    let mut ticker = interval(every);
    println!("Rate limiter sweep task started (interval: {:?})", every);

    loop {
        ticker.tick().await;
        limiter.sweep(Instant::now());
        TRACKED_CLIENTS.set(limiter.tracked_clients() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(300); // 5 minutes
    const MAX: u32 = 10;

    fn limiter() -> RateLimiter {
        RateLimiter::new(MAX, WINDOW)
    }

    fn state_of(l: &RateLimiter, id: &str) -> Option<(u32, Instant)> {
        l.store.get(id).map(|r| (r.count, r.window_reset_at))
    }

    fn minutes(d: Decision) -> u64 {
        match d {
            Decision::Reject { minutes_remaining } => minutes_remaining,
            Decision::Admit => panic!("expected Reject, got Admit"),
        }
    }

    #[test]
    fn admits_up_to_max_then_rejects() {
        let l = limiter();
        let t0 = Instant::now();

        for _ in 0..MAX {
            assert_eq!(l.check_and_record("a", t0), Decision::Admit);
        }
        assert!(matches!(
            l.check_and_record("a", t0),
            Decision::Reject { .. }
        ));
        assert_eq!(state_of(&l, "a"), Some((MAX, t0 + WINDOW)));
    }

    #[test]
    fn reject_never_mutates_the_record() {
        let l = limiter();
        let t0 = Instant::now();

        for _ in 0..MAX {
            l.check_and_record("a", t0);
        }
        let before = state_of(&l, "a");

        // repeated probing while throttled must leave state untouched
        for i in 0..50 {
            let probe = t0 + Duration::from_secs(i);
            assert!(matches!(
                l.check_and_record("a", probe),
                Decision::Reject { .. }
            ));
        }
        assert_eq!(state_of(&l, "a"), before);
    }

    #[test]
    fn expired_window_resets_to_one_regardless_of_prior_count() {
        let l = limiter();
        let t0 = Instant::now();

        for _ in 0..MAX {
            l.check_and_record("a", t0);
        }

        let later = t0 + WINDOW + Duration::from_secs(1);
        assert_eq!(l.check_and_record("a", later), Decision::Admit);
        assert_eq!(state_of(&l, "a"), Some((1, later + WINDOW)));
    }

    #[test]
    fn distinct_identities_do_not_interact() {
        let l = limiter();
        let t0 = Instant::now();

        for _ in 0..MAX {
            l.check_and_record("a", t0);
        }
        assert!(matches!(
            l.check_and_record("a", t0),
            Decision::Reject { .. }
        ));

        // "b" is untouched by "a" hitting its limit
        assert_eq!(l.check_and_record("b", t0), Decision::Admit);
        assert_eq!(state_of(&l, "b"), Some((1, t0 + WINDOW)));
    }

    #[test]
    fn minutes_remaining_rounds_up() {
        let l = limiter();
        let t0 = Instant::now();

        for _ in 0..MAX {
            l.check_and_record("a", t0);
        }

        // 4min 59s left -> 5 whole minutes
        let d = l.check_and_record("a", t0 + Duration::from_secs(1));
        assert_eq!(minutes(d), 5);

        // exactly 4min left -> 4
        let d = l.check_and_record("a", t0 + Duration::from_secs(60));
        assert_eq!(minutes(d), 4);
    }

    #[test]
    fn sweep_keeps_live_and_grace_period_records() {
        let l = limiter();
        let t0 = Instant::now();
        l.check_and_record("a", t0); // reset at t0+5min, grace through t0+10min

        l.sweep(t0 + Duration::from_secs(299));
        assert!(state_of(&l, "a").is_some());

        // expired but still inside the one-window grace
        l.sweep(t0 + Duration::from_secs(600));
        assert!(state_of(&l, "a").is_some());
    }

    #[test]
    fn sweep_removes_long_expired_records_and_is_idempotent() {
        let l = limiter();
        let t0 = Instant::now();
        l.check_and_record("a", t0);
        l.check_and_record("b", t0);
        // keep "b" alive into a fresh window
        l.check_and_record("b", t0 + Duration::from_secs(301));

        let t11 = t0 + Duration::from_secs(660);
        l.sweep(t11);
        assert!(state_of(&l, "a").is_none());
        assert!(state_of(&l, "b").is_some());
        assert_eq!(l.tracked_clients(), 1);

        // second sweep right after the first removes nothing more
        l.sweep(t11);
        assert_eq!(l.tracked_clients(), 1);
    }

    #[test]
    fn five_minute_window_scenario() {
        let l = limiter();
        let t0 = Instant::now();

        // 10 requests at t=0 all admit
        for _ in 0..10 {
            assert_eq!(l.check_and_record("a", t0), Decision::Admit);
        }
        assert_eq!(state_of(&l, "a"), Some((10, t0 + WINDOW)));

        // 11th at t=1min rejects with 4 minutes remaining
        let d = l.check_and_record("a", t0 + Duration::from_secs(60));
        assert_eq!(minutes(d), 4);

        // t=6min admits, count back to 1, window resets at t=11min
        let t6 = t0 + Duration::from_secs(360);
        assert_eq!(l.check_and_record("a", t6), Decision::Admit);
        assert_eq!(state_of(&l, "a"), Some((1, t6 + WINDOW)));
    }

    #[test]
    fn request_after_expiry_overwrites_stale_state_wholesale() {
        let l = limiter();
        let t0 = Instant::now();

        for _ in 0..MAX {
            l.check_and_record("a", t0);
        }

        // next window must grant a full fresh budget
        let t6 = t0 + Duration::from_secs(360);
        for _ in 0..MAX {
            assert_eq!(l.check_and_record("a", t6), Decision::Admit);
        }
        assert!(matches!(
            l.check_and_record("a", t6),
            Decision::Reject { .. }
        ));
    }
}
