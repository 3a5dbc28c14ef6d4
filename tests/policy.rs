use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;
use throttle::{
    clock::{Clock, FakeRelativeClock},
    state::{ExpiringStore, KeyValueStore, MapStore},
    AccessCounter, Decision, Policy, PolicyOptions, Quota,
};

type Store = MapStore<AccessCounter, FakeRelativeClock>;

fn setup() -> (FakeRelativeClock, Arc<Store>) {
    let clock = FakeRelativeClock::default();
    clock.advance(Duration::from_secs(1_700_000_000));
    let store = Arc::new(MapStore::with_clock(clock.clone()));
    (clock, store)
}

#[test]
fn one_per_ten_milliseconds() {
    let (clock, store) = setup();
    let quota = Quota::new(nonzero!(1u64), Duration::from_millis(10)).unwrap();
    let policy = Policy::with_clock(quota, store, PolicyOptions::default(), clock.clone());

    let first = policy.check("10.0.0.1").unwrap().unwrap();
    assert!(first.is_allowed());
    assert_eq!(first.snapshot().remaining(), 0);

    let second = policy.check("10.0.0.1").unwrap().unwrap();
    assert!(!second.is_allowed());

    clock.advance(Duration::from_millis(10));
    let third = policy.check("10.0.0.1").unwrap().unwrap();
    assert!(third.is_allowed());
}

#[test]
fn denial_carries_headers_and_rejection() {
    let (clock, store) = setup();
    let options = PolicyOptions {
        status_code: 503,
        message: "slow down".to_owned(),
        ..PolicyOptions::default()
    };
    let policy = Policy::with_clock(Quota::per_minute(nonzero!(2u64)), store, options, clock.clone());
    let reset = (clock.now() + Duration::from_secs(60)).as_unix_secs().to_string();

    policy.check("me").unwrap();
    policy.check("me").unwrap();
    match policy.check("me").unwrap() {
        Some(Decision::Denied(snapshot)) => {
            let headers = snapshot.headers();
            assert_eq!(headers[0], ("X-RateLimit-Limit", "2".to_owned()));
            assert_eq!(headers[1], ("X-RateLimit-Remaining", "0".to_owned()));
            assert_eq!(headers[2], ("X-RateLimit-Reset", reset));
            assert_eq!(snapshot.wait_time_from(clock.now()), Duration::from_secs(60));
        }
        other => panic!("expected a denial, got {:?}", other),
    }
    let rejection = policy.rejection();
    assert_eq!(rejection.status_code, 503);
    assert_eq!(rejection.message, "slow down");
}

#[test]
fn keys_are_prefixed_and_scoped_to_the_quota() {
    let (clock, store) = setup();
    let options = PolicyOptions {
        key_prefix: "api".to_owned(),
        ..PolicyOptions::default()
    };
    let quota = Quota::new(nonzero!(4u64), Duration::from_millis(100)).unwrap();
    let policy = Policy::with_clock(quota, Arc::clone(&store), options, clock);

    policy.check("client").unwrap();
    assert_eq!(policy.key("client"), "api_25000000_client");
    assert!(store.get("api_25000000_client").unwrap().is_some());
    assert_eq!(store.len(), 1);
}

#[test]
fn multiple_policies_share_a_store() {
    let (clock, store) = setup();
    let strict = Policy::with_clock(
        Quota::per_second(nonzero!(1u64)),
        Arc::clone(&store),
        PolicyOptions::default(),
        clock.clone(),
    );
    let lenient = Policy::with_clock(
        Quota::per_second(nonzero!(3u64)),
        Arc::clone(&store),
        PolicyOptions::default(),
        clock.clone(),
    );

    assert!(strict.check("me").unwrap().unwrap().is_allowed());
    assert!(!strict.check("me").unwrap().unwrap().is_allowed());
    for _ in 0..3 {
        assert!(lenient.check("me").unwrap().unwrap().is_allowed());
    }
    assert!(!lenient.check("me").unwrap().unwrap().is_allowed());
    assert_eq!(store.len(), 2);
}

#[test]
fn disabled_policies_admit_everything() {
    let (clock, store) = setup();
    let options = PolicyOptions {
        disabled: true,
        ..PolicyOptions::default()
    };
    let policy = Policy::with_clock(Quota::per_hour(nonzero!(1u64)), Arc::clone(&store), options, clock);
    for _ in 0..10 {
        assert_eq!(policy.check("me").unwrap(), None);
    }
    assert_eq!(policy.peek("me").unwrap(), None);
    assert_eq!(policy.inspect("me").unwrap(), None);
    policy.register("me").unwrap();
    assert!(store.is_empty());
}

#[test]
fn peek_inspect_and_register() {
    let (clock, store) = setup();
    let policy = Policy::with_clock(
        Quota::per_second(nonzero!(2u64)),
        store,
        PolicyOptions::default(),
        clock.clone(),
    );

    // skipping the access check still counts the access.
    policy.register("me").unwrap();
    policy.register("me").unwrap();
    policy.register("me").unwrap();
    let snapshot = policy.inspect("me").unwrap().unwrap();
    assert_eq!(snapshot.remaining(), 0);

    // skipping registration never counts.
    for _ in 0..5 {
        assert!(!policy.peek("me").unwrap().unwrap().is_allowed());
    }
    assert_eq!(
        policy.controller().access_count(&policy.key("me")).unwrap().stored_count(),
        3
    );

    clock.advance(Duration::from_secs(1));
    assert!(policy.peek("me").unwrap().unwrap().is_allowed());
    assert_eq!(policy.inspect("me").unwrap().unwrap().remaining(), 2);
}
