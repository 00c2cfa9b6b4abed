mod support;

use std::sync::Arc;

use chrono::{Duration, Timelike, Utc};

use engine::{AuditAction, CurrencyCode, EngineError, Money, RateSettings};
use support::{OfflineRateSource, Script, Setup, admin, cafe_payload, count, logger};

fn code(s: &str) -> CurrencyCode {
    CurrencyCode::try_from(s).unwrap()
}

async fn harness() -> support::Harness {
    Setup::new(Script::Payload(cafe_payload())).build().await
}

#[tokio::test]
async fn seeding_the_catalog_is_idempotent() {
    let h = harness().await;
    let rates = h.engine.rates();

    assert_eq!(rates.seed_currency_catalog().await.unwrap(), 0);
    let all = rates.currencies(true).await.unwrap();
    assert_eq!(all.len(), 24);
    assert_eq!(rates.minor_units(&code("JPY")).await.unwrap(), 0);
    assert_eq!(rates.minor_units(&code("USD")).await.unwrap(), 2);

    let eur = rates.currency(&code("EUR")).await.unwrap();
    assert_eq!(eur.symbol, "€");
    assert!(matches!(
        rates.currency(&code("XYZ")).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn same_currency_conversion_is_exact_without_rates() {
    let h = harness().await;
    let amount = Money::new(12_345, 2);

    let conversion = h
        .engine
        .rates()
        .convert(amount, &code("EUR"), &code("EUR"))
        .await
        .unwrap();
    assert_eq!(conversion.amount, amount);
    assert_eq!(conversion.rate, 1.0);
    assert!(!conversion.stale);
}

#[tokio::test]
async fn conversion_goes_through_the_base_currency() {
    let h = harness().await;
    let rates = h.engine.rates();
    rates.refresh_rates().await.unwrap();

    let to_usd = rates
        .convert(Money::new(1250, 2), &code("EUR"), &code("USD"))
        .await
        .unwrap();
    assert!((to_usd.amount.minor() - 1350).abs() <= 1);
    assert!((to_usd.rate - 1.08).abs() < 1e-6);

    // Cross rate: EUR -> JPY is 1.08 * 150.
    let to_jpy = rates
        .convert(Money::new(1000, 2), &code("EUR"), &code("JPY"))
        .await
        .unwrap();
    assert_eq!(to_jpy.amount.scale(), 0);
    assert!((to_jpy.amount.minor() - 1620).abs() <= 1);

    let back = rates
        .convert(to_jpy.amount, &code("JPY"), &code("EUR"))
        .await
        .unwrap();
    assert!((back.amount.minor() - 1000).abs() <= 1);
}

#[tokio::test]
async fn missing_rate_is_reported() {
    let h = harness().await;
    let rates = h.engine.rates();

    assert!(matches!(
        rates
            .convert(Money::new(100, 2), &code("EUR"), &code("USD"))
            .await,
        Err(EngineError::RateUnavailable(_))
    ));

    let report = rates.refresh_rates().await.unwrap();
    assert!(report.missing.contains(&"CHF".to_string()));
    assert!(matches!(
        rates
            .convert(Money::new(100, 2), &code("CHF"), &code("USD"))
            .await,
        Err(EngineError::RateUnavailable(_))
    ));
}

#[tokio::test]
async fn refresh_within_the_window_inserts_nothing() {
    let h = harness().await;
    let rates = h.engine.rates();

    let first = rates.refresh_rates().await.unwrap();
    // USD plus the three quoted currencies.
    assert_eq!(first.inserted, 4);
    let stored = count(&h.db, "SELECT COUNT(*) AS n FROM exchange_rates").await;
    assert_eq!(stored, 4);

    let second = rates.refresh_rates().await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_recent, 4);
    assert_eq!(
        count(&h.db, "SELECT COUNT(*) AS n FROM exchange_rates").await,
        stored
    );

    let usd = rates.latest_rate(&code("USD")).await.unwrap().unwrap();
    assert_eq!(usd.rate_to_base, 1.0);
    assert_eq!(usd.rate_from_base, 1.0);
    assert_eq!(usd.source, "fixed");
}

#[tokio::test]
async fn concurrent_refreshes_do_not_duplicate_rows() {
    let h = harness().await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.rates().refresh_rates().await
        }));
    }
    let mut inserted = 0;
    for handle in handles {
        inserted += handle.await.unwrap().unwrap().inserted;
    }

    assert_eq!(inserted, 4);
    assert_eq!(
        count(
            &h.db,
            "SELECT COUNT(*) AS n FROM (SELECT currency_code FROM exchange_rates \
             GROUP BY currency_code HAVING COUNT(*) > 1)"
        )
        .await,
        0
    );
}

#[tokio::test]
async fn offline_source_keeps_existing_rates_usable() {
    let h = Setup::new(Script::Payload(cafe_payload()))
        .rate_source(Arc::new(OfflineRateSource))
        .build()
        .await;
    let rates = h.engine.rates();
    rates
        .record_rate(&code("EUR"), 1.0 / 1.08, "manual", Utc::now())
        .await
        .unwrap();

    assert!(!rates.refresh().await);
    assert!(matches!(
        rates.refresh_rates().await,
        Err(EngineError::RateUnavailable(_))
    ));

    let conversion = rates
        .convert(Money::new(1250, 2), &code("EUR"), &code("USD"))
        .await
        .unwrap();
    assert!((conversion.amount.minor() - 1350).abs() <= 1);
    assert_eq!(
        count(&h.db, "SELECT COUNT(*) AS n FROM exchange_rates").await,
        1
    );
}

#[tokio::test]
async fn old_rates_are_flagged_stale() {
    let h = harness().await;
    let rates = h.engine.rates();
    let observed = (Utc::now() - Duration::hours(100))
        .with_nanosecond(0)
        .unwrap();
    rates
        .record_rate(&code("EUR"), 1.0 / 1.08, "manual", observed)
        .await
        .unwrap();

    let conversion = rates
        .convert(Money::new(1250, 2), &code("EUR"), &code("USD"))
        .await
        .unwrap();
    assert!(conversion.stale);
    assert_eq!(conversion.rate_timestamp, observed);
    assert!(rates.is_stale(72).await.unwrap());
    assert!(!rates.is_stale(200).await.unwrap());
}

#[tokio::test]
async fn refresh_if_due_skips_fresh_rates() {
    let h = harness().await;
    let rates = h.engine.rates();

    let report = rates.refresh_if_due().await.unwrap();
    assert_eq!(report.map(|r| r.inserted), Some(4));
    assert!(rates.refresh_if_due().await.unwrap().is_none());
}

#[tokio::test]
async fn newest_observation_wins() {
    let h = Setup::new(Script::Payload(cafe_payload()))
        .rate_settings(RateSettings {
            refresh_threshold_hours: 1,
            ..RateSettings::default()
        })
        .build()
        .await;
    let rates = h.engine.rates();
    let now = Utc::now();
    rates
        .record_rate(&code("GBP"), 0.70, "manual", now - Duration::hours(5))
        .await
        .unwrap();
    rates
        .record_rate(&code("GBP"), 0.80, "manual", now)
        .await
        .unwrap();

    let latest = rates.latest_rate(&code("GBP")).await.unwrap().unwrap();
    assert_eq!(latest.rate_from_base, 0.80);
    let per_currency = rates.latest_rates().await.unwrap();
    assert_eq!(per_currency.len(), 1);
    assert_eq!(per_currency[0].rate_from_base, 0.80);
}

#[tokio::test]
async fn invalid_observations_are_rejected() {
    let h = harness().await;
    let rates = h.engine.rates();

    for (c, value) in [("USD", 2.0), ("EUR", 0.0), ("EUR", -1.0), ("EUR", f64::NAN)] {
        assert!(matches!(
            rates.record_rate(&code(c), value, "manual", Utc::now()).await,
            Err(EngineError::Validation(_))
        ));
    }
    assert_eq!(
        count(&h.db, "SELECT COUNT(*) AS n FROM exchange_rates").await,
        0
    );
}

#[tokio::test]
async fn refresh_through_the_engine_requires_admin() {
    let h = harness().await;

    assert!(matches!(
        h.engine.refresh_exchange_rates(&logger()).await,
        Err(EngineError::Permission(_))
    ));
    let report = h.engine.refresh_exchange_rates(&admin()).await.unwrap();
    assert_eq!(report.inserted, 4);

    let events = h.audit.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.action == AuditAction::RefreshExchangeRates));
    assert_eq!(events[1].resource_type, "exchange_rates");
    assert!(events[1].success);
}
