//! Alerting behaviour from a risk grid to the outbox.

use chrono::{DateTime, Duration, TimeZone, Utc};
use landslide_ews_core::core_types::Vec2;
use landslide_ews_core::grid::{FieldData, GridCoords};
use landslide_ews_core::risk::{
    find_alert_clusters, AlertConfig, AlertDispatcher, AlertOutcome, SmsComposer, SMS_MAX_CHARS,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 14, 2, 30, 0).unwrap()
}

/// Risk grid with `n` hot cells laid out row by row from (row0, col0).
fn hot_block(width: usize, height: usize, row0: usize, col0: usize, n: usize) -> FieldData {
    let mut risk = FieldData::with_value(width, height, 0.1);
    for i in 0..n {
        risk.set(col0 + i % 5, row0 + i / 5, 0.9);
    }
    risk
}

#[test]
fn test_cluster_size_threshold_is_inclusive() {
    let min_size = AlertConfig::default().min_cluster_size;

    let below = hot_block(40, 40, 10, 10, min_size - 1);
    assert!(find_alert_clusters(&below, 0.6, min_size).unwrap().is_empty());

    let exact = hot_block(40, 40, 10, 10, min_size);
    let clusters = find_alert_clusters(&exact, 0.6, min_size).unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].size(), min_size);
}

#[test]
fn test_cooldown_across_cycles() {
    let coords = GridCoords::regular(40, 40, 10.0);
    let risk = hot_block(40, 40, 20, 20, 15);
    let clusters = find_alert_clusters(&risk, 0.6, 10).unwrap();
    let mut dispatcher = AlertDispatcher::new(AlertConfig::default()).unwrap();

    let first = dispatcher.dispatch(&clusters, &coords, start()).unwrap();
    assert!(matches!(first, AlertOutcome::Sent(ref m) if m.len() == 1));

    let second = dispatcher
        .dispatch(&clusters, &coords, start() + Duration::minutes(15))
        .unwrap();
    assert_eq!(
        second,
        AlertOutcome::Suppressed {
            clusters: 1,
            remaining_seconds: 2700
        }
    );
    assert_eq!(dispatcher.outbox().len(), 1);

    // A clear cycle does not reset the cooldown
    let calm = FieldData::with_value(40, 40, 0.05);
    let none = find_alert_clusters(&calm, 0.6, 10).unwrap();
    assert_eq!(
        dispatcher
            .dispatch(&none, &coords, start() + Duration::minutes(30))
            .unwrap(),
        AlertOutcome::Clear
    );
    assert!(matches!(
        dispatcher
            .dispatch(&clusters, &coords, start() + Duration::minutes(45))
            .unwrap(),
        AlertOutcome::Suppressed { .. }
    ));

    let later = dispatcher
        .dispatch(&clusters, &coords, start() + Duration::hours(1))
        .unwrap();
    assert!(matches!(later, AlertOutcome::Sent(_)));

    let sent = dispatcher.drain_outbox();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].timestamp - sent[0].timestamp, Duration::hours(1));
    assert!(dispatcher.outbox().is_empty());
}

#[test]
fn test_every_cluster_gets_its_own_message() {
    let coords = GridCoords::regular(60, 60, 10.0);
    let mut risk = hot_block(60, 60, 5, 5, 12);
    for (row, col) in [(40, 40), (40, 41), (41, 40), (41, 41)] {
        // 4-cell blob stays below the size threshold
        risk.set(col, row, 0.95);
    }
    for i in 0..20 {
        risk.set(30 + i % 10, 50 + i / 10, 0.7);
    }

    let clusters = find_alert_clusters(&risk, 0.6, 10).unwrap();
    assert_eq!(clusters.len(), 2);

    let mut dispatcher = AlertDispatcher::new(AlertConfig::default()).unwrap();
    let AlertOutcome::Sent(messages) = dispatcher.dispatch(&clusters, &coords, start()).unwrap()
    else {
        panic!("expected messages to be sent");
    };
    assert_eq!(messages.len(), 2);
    for (message, cluster) in messages.iter().zip(&clusters) {
        assert!(message.ends_with(&format!("Info:CODE{}", cluster.label)));
    }
}

#[test]
fn test_messages_never_exceed_sms_limit() {
    let mut rng = StdRng::seed_from_u64(2024);
    let alphabet: Vec<char> = "ABCXYZ0189-_ äöüéßñ漢字".chars().collect();
    let risk = hot_block(50, 50, 0, 0, 10);
    let clusters = find_alert_clusters(&risk, 0.6, 10).unwrap();
    let cluster = &clusters[0];

    for _ in 0..500 {
        let code_len = rng.random_range(0..200);
        let district: String = (0..code_len)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())])
            .collect();
        let zones: Vec<String> = (0..rng.random_range(0..40))
            .map(|_| {
                (0..rng.random_range(1..12))
                    .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                    .collect()
            })
            .collect();
        let location = Vec2::new(
            rng.random_range(-180.0..180.0),
            rng.random_range(-90.0..90.0),
        );
        let timestamp = start() + Duration::minutes(rng.random_range(0..10_000));

        let composer = SmsComposer::new(district, SMS_MAX_CHARS);
        let message = composer.compose(cluster, location, &zones, timestamp);
        assert!(
            message.chars().count() <= SMS_MAX_CHARS,
            "{} chars: {message}",
            message.chars().count()
        );
    }
}
