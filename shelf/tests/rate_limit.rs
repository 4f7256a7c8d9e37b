use std::time::Duration;

use shelf::api::SearchMode;
use shelf::ratelimit::{RateLimitState, RateLimiter};
use tokio::time::{advance, Instant};

const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn every_mode_starts_with_full_quota() {
    let limiter = RateLimiter::new(MINUTE);
    for mode in SearchMode::ALL {
        let snap = limiter.snapshot(mode);
        assert_eq!(snap.remaining, mode.per_minute_quota());
        assert_eq!(snap.quota, mode.per_minute_quota());
        assert!(!snap.is_rate_limited);
        assert_eq!(snap.seconds_until_available, 0);
    }
}

#[test]
fn state_accessors_agree() {
    let t0 = Instant::now();
    let s = RateLimitState::new(3, MINUTE);
    assert_eq!(s.remaining_at(t0), 3);
    assert!(!s.is_rate_limited_at(t0));
    assert_eq!(s.seconds_until_available_at(t0), 0);
}

#[tokio::test(start_paused = true)]
async fn committed_permits_exhaust_the_window_then_reset() {
    let limiter = RateLimiter::new(MINUTE);
    for expected in (0..5).rev() {
        limiter.try_acquire(SearchMode::Semantic).expect("slot available").commit();
        assert_eq!(limiter.snapshot(SearchMode::Semantic).remaining, expected);
    }

    let snap = limiter.snapshot(SearchMode::Semantic);
    assert!(snap.is_rate_limited);
    assert_eq!(snap.seconds_until_available, 60);
    let retry = limiter.try_acquire(SearchMode::Semantic).err().expect("exhausted");
    assert_eq!(retry, 60);

    advance(Duration::from_secs(45)).await;
    let snap = limiter.snapshot(SearchMode::Semantic);
    assert!(snap.is_rate_limited);
    assert_eq!(snap.seconds_until_available, 15);

    advance(Duration::from_secs(15)).await;
    let snap = limiter.snapshot(SearchMode::Semantic);
    assert!(!snap.is_rate_limited);
    assert_eq!(snap.remaining, 5);
    assert_eq!(snap.seconds_until_available, 0);
    assert!(limiter.try_acquire(SearchMode::Semantic).is_ok());
}

#[tokio::test(start_paused = true)]
async fn dropped_permit_is_refunded() {
    let limiter = RateLimiter::new(MINUTE);
    {
        let _permit = limiter.try_acquire(SearchMode::Semantic).unwrap();
        assert_eq!(limiter.snapshot(SearchMode::Semantic).remaining, 4);
    }
    assert_eq!(limiter.snapshot(SearchMode::Semantic).remaining, 5);
}

#[test]
fn modes_do_not_share_counters() {
    let limiter = RateLimiter::new(MINUTE);
    limiter.try_acquire(SearchMode::Text).unwrap().commit();
    assert_eq!(limiter.snapshot(SearchMode::Text).remaining, 99);
    assert_eq!(limiter.snapshot(SearchMode::Semantic).remaining, 5);
}
