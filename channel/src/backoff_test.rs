use super::*;

#[test]
fn base_delay_doubles_to_the_cap() {
    assert_eq!(base_delay_ms(0), 500);
    assert_eq!(base_delay_ms(1), 1_000);
    assert_eq!(base_delay_ms(2), 2_000);
    assert_eq!(base_delay_ms(3), 4_000);
    assert_eq!(base_delay_ms(4), 8_000);
    assert_eq!(base_delay_ms(5), 10_000);
    assert_eq!(base_delay_ms(40), 10_000);
}

#[test]
fn jittered_delay_stays_within_bounds() {
    let mut backoff = Backoff::new();
    for attempt in 0..8 {
        let base = base_delay_ms(attempt);
        let delay = u64::try_from(backoff.next_delay().as_millis()).expect("fits");
        assert!(delay >= base, "attempt {attempt}: {delay} below base {base}");
        assert!(
            delay <= base + base / 2,
            "attempt {attempt}: {delay} above jitter ceiling"
        );
    }
}

#[test]
fn reset_restarts_the_schedule() {
    let mut backoff = Backoff::new();
    for _ in 0..5 {
        let _ = backoff.next_delay();
    }
    backoff.reset();
    let delay = u64::try_from(backoff.next_delay().as_millis()).expect("fits");
    assert!(delay <= 750, "first delay after reset should be near the floor");
}
