//! Alert throttle - rate-shapes owner alerts per source
//!
//! Items are always stored; only the alert is held back. A source may raise
//! `max_per_window` alerts per window, the rest are counted and reported later
//! as a single digest line.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Throttle decision for one alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Deliver; `suppressed` alerts from the previous window were held back
    Send { suppressed: usize },
    /// Hold back
    Suppress,
}

/// Alerts held back for one source once its window closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressedDigest {
    pub key: String,
    pub count: usize,
}

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    sent: usize,
    suppressed: usize,
}

/// Per-source alert rate limiter
#[derive(Debug)]
pub struct AlertThrottle {
    window: Duration,
    max_per_window: usize,
    buckets: HashMap<String, Bucket>,
}

impl AlertThrottle {
    /// 3 alerts per source per minute
    pub fn new() -> Self {
        Self::with_limits(Duration::from_secs(60), 3)
    }

    pub fn with_limits(window: Duration, max_per_window: usize) -> Self {
        Self {
            window,
            max_per_window: max_per_window.max(1),
            buckets: HashMap::new(),
        }
    }

    pub fn check(&mut self, key: &str) -> ThrottleDecision {
        self.check_with_time(key, Instant::now())
    }

    /// Record an alert attempt (with explicit time, for tests)
    pub fn check_with_time(&mut self, key: &str, now: Instant) -> ThrottleDecision {
        let bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            sent: 0,
            suppressed: 0,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            let carried = bucket.suppressed;
            *bucket = Bucket {
                window_start: now,
                sent: 1,
                suppressed: 0,
            };
            return ThrottleDecision::Send { suppressed: carried };
        }

        if bucket.sent < self.max_per_window {
            bucket.sent += 1;
            ThrottleDecision::Send { suppressed: 0 }
        } else {
            bucket.suppressed += 1;
            ThrottleDecision::Suppress
        }
    }

    pub fn flush_expired(&mut self) -> Vec<SuppressedDigest> {
        self.flush_expired_with_time(Instant::now())
    }

    /// Drain closed windows, returning those that held alerts back
    pub fn flush_expired_with_time(&mut self, now: Instant) -> Vec<SuppressedDigest> {
        let window = self.window;
        let mut digests = Vec::new();
        self.buckets.retain(|key, bucket| {
            if now.duration_since(bucket.window_start) < window {
                return true;
            }
            if bucket.suppressed > 0 {
                digests.push(SuppressedDigest {
                    key: key.clone(),
                    count: bucket.suppressed,
                });
            }
            false
        });
        digests.sort_by(|a, b| a.key.cmp(&b.key));
        digests
    }
}

impl Default for AlertThrottle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit_then_suppresses() {
        let mut throttle = AlertThrottle::with_limits(Duration::from_secs(60), 2);
        let now = Instant::now();
        assert_eq!(throttle.check_with_time("email:a", now), ThrottleDecision::Send { suppressed: 0 });
        assert_eq!(throttle.check_with_time("email:a", now), ThrottleDecision::Send { suppressed: 0 });
        assert_eq!(throttle.check_with_time("email:a", now), ThrottleDecision::Suppress);
    }

    #[test]
    fn test_sources_are_independent() {
        let mut throttle = AlertThrottle::with_limits(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(matches!(throttle.check_with_time("a", now), ThrottleDecision::Send { .. }));
        assert!(matches!(throttle.check_with_time("b", now), ThrottleDecision::Send { .. }));
        assert_eq!(throttle.check_with_time("a", now), ThrottleDecision::Suppress);
    }

    #[test]
    fn test_new_window_reports_carried_suppressions() {
        let mut throttle = AlertThrottle::with_limits(Duration::from_secs(10), 1);
        let start = Instant::now();
        throttle.check_with_time("a", start);
        throttle.check_with_time("a", start);
        throttle.check_with_time("a", start);

        let later = start + Duration::from_secs(11);
        assert_eq!(throttle.check_with_time("a", later), ThrottleDecision::Send { suppressed: 2 });
    }

    #[test]
    fn test_flush_expired_returns_digests() {
        let mut throttle = AlertThrottle::with_limits(Duration::from_secs(10), 1);
        let start = Instant::now();
        throttle.check_with_time("a", start);
        throttle.check_with_time("a", start);
        throttle.check_with_time("b", start);

        assert!(throttle.flush_expired_with_time(start).is_empty());

        let digests = throttle.flush_expired_with_time(start + Duration::from_secs(10));
        assert_eq!(digests, vec![SuppressedDigest { key: "a".to_string(), count: 1 }]);
        // Flushed buckets start fresh
        assert_eq!(
            throttle.check_with_time("a", start + Duration::from_secs(11)),
            ThrottleDecision::Send { suppressed: 0 }
        );
    }
}
