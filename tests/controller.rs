use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;
use throttle::{
    clock::{Clock, FakeRelativeClock},
    state::{ExpiringStore, Freshness, MapStore},
    AccessCounter, Controller, Decision, Quota,
};

type FakeController = Controller<MapStore<AccessCounter, FakeRelativeClock>, FakeRelativeClock>;

const KEYS: &[&str] = &["throttle_1_a", "throttle_1_b"];

fn controller(limit: u64, window: Duration) -> (FakeRelativeClock, FakeController) {
    let clock = FakeRelativeClock::default();
    clock.advance(Duration::from_secs(1_000));
    let store = Arc::new(MapStore::with_clock(clock.clone()));
    let quota = Quota::new(limit.try_into().unwrap(), window).unwrap();
    let ctrl = Controller::with_clock(quota, store, clock.clone());
    (clock, ctrl)
}

#[test]
fn first_access_is_an_empty_fresh_counter() {
    let (clock, ctrl) = controller(3, Duration::from_secs(1));
    let counter = ctrl.access_count("nobody").unwrap();
    assert_eq!(counter.stored_count(), 0);
    assert_eq!(counter.start(), clock.now());
    assert_eq!(counter.duration(), Duration::from_secs(1));
    assert!(counter.is_fresh_at(clock.now()));
    assert!(!ctrl.denies_access("nobody").unwrap());
    // reading does not write anything.
    assert!(ctrl.store().is_empty());
}

#[test]
fn denies_after_limit_within_window() {
    let (clock, ctrl) = controller(3, Duration::from_secs(1));
    let ms = Duration::from_millis(1);

    for key in KEYS {
        for i in 1..=3 {
            ctrl.register_access(key).unwrap();
            assert_eq!(ctrl.denies_access(key).unwrap(), i == 3, "access {}", i);
            clock.advance(ms);
        }
        assert!(ctrl.denies_access(key).unwrap(), "Now: {:?}", clock.now());
    }
}

#[test]
fn l_accesses_allowed_then_denied() {
    let (clock, ctrl) = controller(4, Duration::from_millis(100));
    let key = "throttle_25000000_me";
    for i in 1..=4u64 {
        assert!(!ctrl.denies_access(key).unwrap(), "access {}", i);
        ctrl.register_access(key).unwrap();
        clock.advance(Duration::from_millis(5));
    }
    assert!(ctrl.denies_access(key).unwrap());
}

#[test]
fn window_resets_after_it_elapses() {
    let (clock, ctrl) = controller(2, Duration::from_millis(10));
    let key = KEYS[0];
    ctrl.register_access(key).unwrap();
    ctrl.register_access(key).unwrap();
    assert!(ctrl.denies_access(key).unwrap());
    assert_eq!(ctrl.remaining_limit(key).unwrap(), 0);

    clock.advance(Duration::from_millis(11));
    assert!(!ctrl.denies_access(key).unwrap());
    assert_eq!(ctrl.remaining_limit(key).unwrap(), 2);

    ctrl.register_access(key).unwrap();
    let counter = ctrl.access_count(key).unwrap();
    assert_eq!(counter.stored_count(), 1);
    assert_eq!(counter.start(), clock.now());
}

#[test]
fn remaining_limit_tracks_count() {
    let (clock, ctrl) = controller(5, Duration::from_secs(1));
    let key = KEYS[1];
    for _ in 0..5 {
        let count = ctrl.access_count(key).unwrap().count_at(clock.now());
        assert_eq!(ctrl.remaining_limit(key).unwrap(), 5 - count);
        ctrl.register_access(key).unwrap();
    }
    assert_eq!(ctrl.remaining_limit(key).unwrap(), 0);
}

#[test]
fn remaining_limit_saturates_past_the_limit() {
    let (_clock, ctrl) = controller(1, Duration::from_secs(1));
    let key = KEYS[0];
    for _ in 0..3 {
        ctrl.register_access(key).unwrap();
    }
    assert_eq!(ctrl.access_count(key).unwrap().stored_count(), 3);
    assert_eq!(ctrl.remaining_limit(key).unwrap(), 0);
    assert!(ctrl.denies_access(key).unwrap());
}

#[test]
fn retry_at_is_stable_within_a_window() {
    let (clock, ctrl) = controller(10, Duration::from_millis(50));
    let key = KEYS[0];
    ctrl.register_access(key).unwrap();
    let start = ctrl.access_count(key).unwrap().start();
    let retry = ctrl.retry_at(key).unwrap();
    assert_eq!(retry, start + Duration::from_millis(50));

    for _ in 0..5 {
        clock.advance(Duration::from_millis(3));
        ctrl.register_access(key).unwrap();
        assert_eq!(ctrl.retry_at(key).unwrap(), retry);
    }

    clock.advance(Duration::from_millis(50));
    ctrl.register_access(key).unwrap();
    assert_eq!(ctrl.retry_at(key).unwrap(), clock.now() + Duration::from_millis(50));
}

#[test]
fn check_and_register_does_not_count_denials() {
    let (clock, ctrl) = controller(2, Duration::from_secs(1));
    let key = KEYS[0];

    match ctrl.check_and_register(key).unwrap() {
        Decision::Allowed(s) => {
            assert_eq!(s.limit(), 2);
            assert_eq!(s.remaining(), 1);
            assert_eq!(s.reset_at(), clock.now() + Duration::from_secs(1));
        }
        d => panic!("unexpected {:?}", d),
    }
    assert!(ctrl.check_and_register(key).unwrap().is_allowed());
    for _ in 0..3 {
        let d = ctrl.check_and_register(key).unwrap();
        assert!(!d.is_allowed());
        assert_eq!(d.snapshot().remaining(), 0);
    }
    assert_eq!(ctrl.access_count(key).unwrap().stored_count(), 2);
}

#[test]
fn peek_does_not_change_the_decision() {
    let (clock, ctrl) = controller(2, Duration::from_secs(1));
    let ms = Duration::from_millis(1);

    for key in KEYS {
        for _ in 0..10 {
            clock.advance(ms);
            assert!(ctrl.peek(key).unwrap().is_allowed());
        }
        assert!(ctrl.check_and_register(key).unwrap().is_allowed());
        assert!(ctrl.peek(key).unwrap().is_allowed());
        assert!(ctrl.check_and_register(key).unwrap().is_allowed());
        for _ in 0..10 {
            clock.advance(ms);
            assert!(!ctrl.peek(key).unwrap().is_allowed());
        }
        clock.advance(ms * 1000);
        assert!(ctrl.peek(key).unwrap().is_allowed());
    }
}

#[test]
fn snapshot_matches_individual_queries() {
    let (_clock, ctrl) = controller(3, Duration::from_secs(1));
    let key = KEYS[1];
    ctrl.register_access(key).unwrap();
    let snapshot = ctrl.snapshot(key).unwrap();
    assert_eq!(snapshot.limit(), ctrl.quota().limit().get());
    assert_eq!(snapshot.remaining(), ctrl.remaining_limit(key).unwrap());
    assert_eq!(snapshot.reset_at(), ctrl.retry_at(key).unwrap());
}

#[test]
fn set_access_count_round_trips() {
    let (clock, ctrl) = controller(3, Duration::from_secs(1));
    let mut counter = ctrl.access_count(KEYS[0]).unwrap();
    counter.increment_at(clock.now());
    counter.increment_at(clock.now());
    ctrl.set_access_count(KEYS[0], &counter).unwrap();
    assert_eq!(ctrl.access_count(KEYS[0]).unwrap(), counter);
    assert_eq!(ctrl.remaining_limit(KEYS[0]).unwrap(), 1);
}

#[test]
fn quotas_with_nonzero_macro() {
    let store: Arc<MapStore> = Arc::new(MapStore::new());
    let ctrl = Controller::new(Quota::per_hour(nonzero!(1u64)), store);
    assert!(ctrl.check_and_register("k").unwrap().is_allowed());
    assert!(!ctrl.check_and_register("k").unwrap().is_allowed());
}
