use ratelimit_decay::test_utilities::variants::Variant;
use ratelimit_decay::test_utilities::{drain, eventually};
use ratelimit_decay::{LimiterError, RateLimiter};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn accepts_capacity_then_rejects() {
    for v in Variant::ALL {
        let lim = v.limiter(5, Duration::from_secs(60));
        for i in 0..5 {
            assert!(lim.consume_async(), "{:?}: permit {} refused", v, i);
        }
        assert!(!lim.consume_async(), "{:?}: {:?}", v, lim);
        assert_eq!(5, lim.consumed());
    }
}

#[test]
fn starts_full() {
    let lim = RateLimiter::new(1, Duration::from_secs(1)).unwrap();
    assert!(lim.allowed());
    assert_eq!(1, lim.capacity());
    assert_eq!(0, lim.consumed());
}

#[test]
fn uniform_pressure_converges_to_rate() {
    // One permit per 100ms on top of a burst of 5:
    let lim = RateLimiter::new(5, Duration::from_millis(500)).unwrap();
    let interval = lim.refill_interval();
    let start = Instant::now();
    let mut admitted = 0u128;
    while start.elapsed() < Duration::from_millis(1500) {
        if lim.consume_async() {
            admitted += 1;
        }
        thread::sleep(Duration::from_millis(1));
    }
    let elapsed = start.elapsed();
    let refills = elapsed.as_nanos() / interval.as_nanos();
    assert!(admitted <= 5 + refills + 1, "admitted {} in {:?}", admitted, elapsed);
    assert!(admitted >= 5 + refills / 2, "admitted {} in {:?}", admitted, elapsed);
}

#[test]
fn bursty_pressure_never_exceeds_rate() {
    let lim = RateLimiter::new(5, Duration::from_millis(500)).unwrap();
    let interval = lim.refill_interval();
    let start = Instant::now();
    let mut admitted = 0u128;
    while start.elapsed() < Duration::from_millis(1500) {
        for _ in 0..20 {
            if lim.consume_async() {
                admitted += 1;
            }
        }
        thread::sleep(Duration::from_millis(250));
    }
    let refills = start.elapsed().as_nanos() / interval.as_nanos();
    assert!(admitted <= 5 + refills + 1, "admitted {}", admitted);
    assert!(admitted >= 5, "admitted {}", admitted);
}

#[test]
fn sequential_consumes_are_one_interval_apart() {
    let lim = RateLimiter::new(1, Duration::from_secs(1)).unwrap();
    let before = Instant::now();
    lim.consume().unwrap();
    let between = Instant::now();
    lim.consume().unwrap();
    let after = Instant::now();

    assert!(between - before < Duration::from_secs(1), "first permit was not free");
    assert!(after - before >= Duration::from_millis(990), "{:?}", after - before);
    assert!(after - before < Duration::from_millis(1100), "{:?}", after - before);
}

#[test]
fn allowed_does_not_consume() {
    let lim = RateLimiter::new(2, Duration::from_secs(60)).unwrap();
    for _ in 0..10 {
        assert!(lim.allowed());
    }
    assert_eq!(2, lim.remaining());
    drain(&lim);
    for _ in 0..10 {
        assert!(!lim.allowed());
    }
    assert_eq!(0, lim.remaining());
}

#[test]
fn refills_up_to_capacity_only() {
    let lim = RateLimiter::new(3, Duration::from_millis(30)).unwrap();
    assert_eq!(3, drain(&lim));
    assert!(eventually(Duration::from_secs(1), || lim.remaining() == 3));
    // The scheduler stalls on a full store rather than saving up ticks:
    thread::sleep(Duration::from_millis(100));
    assert_eq!(3, lim.remaining());
    assert_eq!(3, drain(&lim));
}

#[test]
fn consume_async_never_waits_on_a_blocked_consumer() {
    for v in Variant::ALL {
        let lim = Arc::new(v.static_limiter(1));
        lim.consume().unwrap();
        let waiter = {
            let lim = lim.clone();
            thread::spawn(move || lim.consume())
        };
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        assert!(!lim.consume_async());
        assert!(start.elapsed() < Duration::from_millis(100), "{:?}", v);

        lim.destroy().unwrap();
        assert_eq!(Err(LimiterError::Destroyed), waiter.join().unwrap());
    }
}

#[test]
fn destroy_stops_replenishment() {
    let lim = RateLimiter::new(3, Duration::from_millis(30)).unwrap();
    assert!(lim.scheduler_running());
    assert_eq!(3, drain(&lim));
    lim.destroy().unwrap();
    assert!(!lim.scheduler_running());

    thread::sleep(Duration::from_millis(100));
    assert_eq!(0, lim.remaining());
}

#[test]
fn consumers_fail_after_destroy() {
    let lim = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
    lim.destroy().unwrap();
    assert!(lim.is_destroyed());
    assert_eq!(Err(LimiterError::Destroyed), lim.consume());
    assert!(!lim.consume_async());
    assert!(!lim.allowed());
    // Observation keeps working:
    assert_eq!(2, lim.capacity());
    assert_eq!(0, lim.consumed());
    assert_eq!(Err(LimiterError::AlreadyDestroyed), lim.destroy());
}

#[test]
fn destroy_releases_every_waiter() {
    let lim = Arc::new(RateLimiter::new(1, Duration::from_secs(60)).unwrap());
    assert_eq!(1, drain(&*lim));
    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let lim = lim.clone();
            thread::spawn(move || lim.consume())
        })
        .collect();
    thread::sleep(Duration::from_millis(50));
    lim.destroy().unwrap();
    for waiter in waiters {
        assert_eq!(Err(LimiterError::Destroyed), waiter.join().unwrap());
    }
}
