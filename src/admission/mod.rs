use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Per-address rate-limit bookkeeping (§4.3).
#[derive(Debug, Clone)]
struct RateRecord {
    count: u32,
    window_started_at: DateTime<Utc>,
}

/// Gatekeeper for new WebSocket connections (§4.3): caps total concurrent
/// connections and limits connection attempts per source address.
///
/// Per §5 ("Admission controller maps: guarded by a read-write mutex;
/// reads take the read lock, writes take the write lock"), the rate-limit
/// map sits behind a `tokio::sync::RwLock`. The connection count itself is
/// a plain atomic since it's a single counter, not a map.
pub struct AdmissionController {
    max_connections: usize,
    max_attempts_per_minute: u32,
    stale_entry_age: Duration,
    connections: AtomicUsize,
    attempts: RwLock<HashMap<IpAddr, RateRecord>>,
}

impl AdmissionController {
    pub fn new(max_connections: usize, max_attempts_per_minute: u32, stale_entry_age: Duration) -> Self {
        Self {
            max_connections,
            max_attempts_per_minute,
            stale_entry_age,
            connections: AtomicUsize::new(0),
            attempts: RwLock::new(HashMap::new()),
        }
    }

    /// §4.3 `canConnect`: true iff the global connection count is below the
    /// configured ceiling. Does not itself reserve a slot — pair with
    /// `add_connection`.
    pub fn can_connect(&self) -> bool {
        self.connections.load(Ordering::SeqCst) < self.max_connections
    }

    /// §4.3 `checkRateLimit`: a fresh address gets a window starting now; an
    /// address whose last window began over a minute ago gets a fresh
    /// window; otherwise the attempt increments the current window's count,
    /// and the attempt is allowed iff the post-increment count is still
    /// within the limit.
    ///
    /// §8 property 5: the 11th attempt from one address within 60 seconds
    /// is rejected; an attempt 61 seconds after the first succeeds.
    pub async fn check_rate_limit(&self, addr: IpAddr, now: DateTime<Utc>) -> bool {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(&addr) {
            None => {
                attempts.insert(
                    addr,
                    RateRecord {
                        count: 1,
                        window_started_at: now,
                    },
                );
                true
            }
            Some(record) => {
                if now - record.window_started_at > chrono::Duration::minutes(1) {
                    record.count = 1;
                    record.window_started_at = now;
                    true
                } else {
                    record.count += 1;
                    record.count <= self.max_attempts_per_minute
                }
            }
        }
    }

    /// §4.3 `addConnection`.
    pub fn add_connection(&self) {
        self.connections.fetch_add(1, Ordering::SeqCst);
    }

    /// §4.3 `removeConnection`. Never goes below zero — a double-release
    /// (e.g. a session torn down twice) can't underflow the counter.
    pub fn remove_connection(&self) {
        let _ = self
            .connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                Some(c.saturating_sub(1))
            });
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// §4.3 `sweep`: drop rate-limit entries whose window is stale, so the
    /// map doesn't grow unbounded with one-off addresses. Intended to run
    /// on a periodic interval (e.g. every `stale_entry_age`) from the
    /// owning task.
    pub async fn sweep(&self, now: DateTime<Utc>) {
        let stale_after = chrono::Duration::from_std(self.stale_entry_age).unwrap_or(chrono::Duration::minutes(5));
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, record| now - record.window_started_at <= stale_after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[tokio::test]
    async fn allows_connections_under_the_ceiling() {
        let ctrl = AdmissionController::new(2, 10, Duration::from_secs(300));
        assert!(ctrl.can_connect());
        ctrl.add_connection();
        assert!(ctrl.can_connect());
        ctrl.add_connection();
        assert!(!ctrl.can_connect());
    }

    #[tokio::test]
    async fn remove_connection_never_underflows() {
        let ctrl = AdmissionController::new(5, 10, Duration::from_secs(300));
        ctrl.remove_connection();
        ctrl.remove_connection();
        assert_eq!(ctrl.connection_count(), 0);
    }

    #[tokio::test]
    async fn eleventh_attempt_within_a_minute_is_rejected() {
        let ctrl = AdmissionController::new(100, 10, Duration::from_secs(300));
        let a = addr();
        let t0 = Utc::now();
        for _ in 0..10 {
            assert!(ctrl.check_rate_limit(a, t0).await);
        }
        assert!(!ctrl.check_rate_limit(a, t0).await);
    }

    #[tokio::test]
    async fn window_resets_after_a_minute() {
        let ctrl = AdmissionController::new(100, 10, Duration::from_secs(300));
        let a = addr();
        let t0 = Utc::now();
        for _ in 0..10 {
            assert!(ctrl.check_rate_limit(a, t0).await);
        }
        assert!(!ctrl.check_rate_limit(a, t0).await);

        let t1 = t0 + chrono::Duration::seconds(61);
        assert!(ctrl.check_rate_limit(a, t1).await);
    }

    #[tokio::test]
    async fn sweep_drops_only_stale_entries() {
        let ctrl = AdmissionController::new(100, 10, Duration::from_secs(300));
        let fresh: IpAddr = "10.0.0.1".parse().unwrap();
        let stale: IpAddr = "10.0.0.2".parse().unwrap();
        let t0 = Utc::now();
        ctrl.check_rate_limit(fresh, t0).await;
        ctrl.check_rate_limit(stale, t0).await;

        let t1 = t0 + chrono::Duration::seconds(600);
        ctrl.check_rate_limit(fresh, t1).await;
        ctrl.sweep(t1).await;

        let attempts = ctrl.attempts.read().await;
        assert!(attempts.contains_key(&fresh));
        assert!(!attempts.contains_key(&stale));
    }
}
