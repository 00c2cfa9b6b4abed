//! Periodic exchange rate refresh.

use std::sync::Arc;
use std::time::Duration;

use engine::{Engine, RateSettings};

/// Tick period of the refresh loop.
///
/// A tick only refreshes rates that are past the threshold, so the period is
/// capped at half the threshold: rates are never older than threshold + period.
pub fn check_interval(settings: &RateSettings) -> Duration {
    let threshold = u64::try_from(settings.refresh_threshold_hours).unwrap_or(0);
    let hours = settings
        .schedule_interval_hours
        .min(threshold / 2)
        .max(1);
    Duration::from_secs(hours * 3600)
}

/// Refresh rates once now, then on every tick of `every`.
///
/// Only refreshes when the stored rates are due; a manual refresh racing this
/// loop is serialized by the rate cache.
pub async fn run_rate_refresh(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match engine.rates().refresh_if_due().await {
            Ok(Some(report)) => tracing::info!(
                inserted = report.inserted,
                missing = ?report.missing,
                "scheduled rate refresh done"
            ),
            Ok(None) => tracing::debug!("scheduled rate refresh skipped, rates are fresh"),
            Err(err) => tracing::warn!(error = %err, "scheduled rate refresh failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn default_checks_hourly() {
        assert_eq!(check_interval(&RateSettings::default()), HOUR);
    }

    #[test]
    fn interval_is_capped_at_half_the_threshold() {
        let settings = RateSettings {
            schedule_interval_hours: 12,
            refresh_threshold_hours: 12,
            ..RateSettings::default()
        };
        assert_eq!(check_interval(&settings), 6 * HOUR);

        let settings = RateSettings {
            schedule_interval_hours: 0,
            refresh_threshold_hours: 1,
            ..RateSettings::default()
        };
        assert_eq!(check_interval(&settings), HOUR);
    }
}
