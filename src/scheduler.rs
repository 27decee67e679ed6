//! Recurring publication at fixed daily times.
//!
//! Firing times are `HH:MM` wall-clock times in Europe/Moscow. The loop sleeps
//! until the next firing, runs one full batch, then computes the next firing
//! from the current time. A firing that passes while a batch is still running
//! is skipped, so executions never overlap.

use crate::api::SummaryFetcher;
use crate::config::{Settings, parse_firing_time};
use crate::pipeline::run_batch;
use crate::telegram::Delivery;
use chrono::{DateTime, Duration as ChronoDuration, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::Moscow;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// The earliest firing strictly after `now`, as a UTC instant.
///
/// Returns `None` when `times` is empty.
pub fn next_firing(now: DateTime<Utc>, times: &[NaiveTime]) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&Moscow).date_naive();

    (0..=1)
        .flat_map(|offset| {
            let day = today + ChronoDuration::days(offset);
            times.iter().filter_map(move |time| {
                match Moscow.from_local_datetime(&day.and_time(*time)) {
                    LocalResult::Single(at) => Some(at.with_timezone(&Utc)),
                    LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
                    LocalResult::None => None,
                }
            })
        })
        .filter(|at| *at > now)
        .min()
}

/// Parse configured firing times, skipping (and logging) any that are invalid.
pub fn firing_times(settings: &Settings) -> Vec<NaiveTime> {
    let mut times: Vec<NaiveTime> = settings
        .schedule_times
        .iter()
        .filter_map(|raw| {
            let parsed = parse_firing_time(raw);
            if parsed.is_none() {
                warn!(time = %raw, "Ignoring invalid schedule time");
            }
            parsed
        })
        .collect();
    times.sort();
    times.dedup();
    times
}

/// Publish the scheduled topics at every firing time until Ctrl-C.
#[instrument(level = "info", skip_all)]
pub async fn run_schedule<F, D>(
    fetcher: &F,
    delivery: &D,
    topics: &[String],
    channel_tag: &str,
    settings: &Settings,
) where
    F: SummaryFetcher,
    D: Delivery,
{
    let times = firing_times(settings);
    let schedule = times
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect::<Vec<_>>();
    info!(
        times = ?schedule,
        topics = ?topics,
        "Schedule started (Europe/Moscow); press Ctrl-C to stop"
    );

    loop {
        let now = Utc::now();
        let Some(at) = next_firing(now, &times) else {
            warn!("No schedule times configured; nothing to do");
            return;
        };
        let wait = (at - now).to_std().unwrap_or_default();
        info!(
            next = %at.with_timezone(&Moscow).format("%d.%m.%Y %H:%M"),
            wait_secs = wait.as_secs(),
            "Waiting for next firing"
        );

        tokio::select! {
            _ = sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; schedule stopped");
                return;
            }
        }

        let report = run_batch(fetcher, delivery, topics, channel_tag, settings).await;
        info!(sent = report.sent, failed = report.failed, "Scheduled run finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_next_firing_later_today() {
        // 05:00 UTC is 08:00 in Moscow.
        let now = utc(2026, 10, 16, 5, 0);
        let next = next_firing(now, &[t(9, 0), t(18, 0)]).unwrap();
        assert_eq!(next, utc(2026, 10, 16, 6, 0));
    }

    #[test]
    fn test_next_firing_rolls_to_tomorrow() {
        // 16:00 UTC is 19:00 in Moscow, after both firings.
        let now = utc(2026, 10, 16, 16, 0);
        let next = next_firing(now, &[t(9, 0), t(18, 0)]).unwrap();
        assert_eq!(next, utc(2026, 10, 17, 6, 0));
    }

    #[test]
    fn test_next_firing_is_strictly_after_now() {
        let now = utc(2026, 10, 16, 6, 0);
        let next = next_firing(now, &[t(9, 0), t(18, 0)]).unwrap();
        assert_eq!(next, utc(2026, 10, 16, 15, 0));
    }

    #[test]
    fn test_next_firing_across_moscow_midnight() {
        // 22:30 UTC is already 01:30 the next day in Moscow.
        let now = utc(2026, 10, 16, 22, 30);
        let next = next_firing(now, &[t(0, 15), t(2, 0)]).unwrap();
        assert_eq!(next, utc(2026, 10, 16, 23, 0));
    }

    #[test]
    fn test_next_firing_without_times() {
        assert_eq!(next_firing(utc(2026, 10, 16, 0, 0), &[]), None);
    }

    #[test]
    fn test_firing_times_sorted_and_deduplicated() {
        let settings = Settings {
            schedule_times: vec!["18:00".into(), "09:00".into(), "18:00".into(), "bad".into()],
            ..Settings::default()
        };
        assert_eq!(firing_times(&settings), vec![t(9, 0), t(18, 0)]);
    }
}
