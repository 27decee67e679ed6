//! One publish cycle, and batches of cycles.
//!
//! A cycle runs fetch, parse, render and deliver strictly in sequence. A
//! failed fetch ends the cycle before anything is rendered or sent, so a
//! partial message never goes out.

use crate::api::SummaryFetcher;
use crate::config::{RenderMode, Settings};
use crate::errors::CycleError;
use crate::models::FetchResult;
use crate::outputs::flat::render_flat;
use crate::outputs::sections::render_sections;
use crate::outputs::{Envelope, RenderOptions};
use crate::parser::parse_sections;
use crate::telegram::Delivery;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Outcome counts for a batch of topics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Render a fetched digest with the variant `settings` selects.
pub fn render_message(
    fetched: &FetchResult,
    topic: &str,
    channel_tag: &str,
    settings: &Settings,
    now: DateTime<Utc>,
) -> String {
    let envelope = Envelope {
        topic: Some(topic),
        sources: &fetched.sources,
        timestamp: now,
        channel_tag,
    };

    let sections = match settings.render_mode {
        RenderMode::Flat => Vec::new(),
        RenderMode::Auto | RenderMode::Sections => parse_sections(&fetched.content),
    };

    if settings.render_mode == RenderMode::Sections && sections.is_empty() {
        warn!("No sections found; rendering flat digest instead");
    }

    if sections.is_empty() {
        info!("Rendering flat digest");
        render_flat(&fetched.content, &envelope, &RenderOptions::flat(settings))
    } else {
        info!(sections = sections.len(), "Rendering section digest");
        render_sections(&sections, &envelope, &RenderOptions::sections(settings))
    }
}

/// Fetch, render and deliver one digest for `topic`.
#[instrument(level = "info", skip(fetcher, delivery, settings, channel_tag))]
pub async fn run_cycle<F, D>(
    fetcher: &F,
    delivery: &D,
    topic: &str,
    channel_tag: &str,
    settings: &Settings,
) -> Result<(), CycleError>
where
    F: SummaryFetcher,
    D: Delivery,
{
    let t0 = Instant::now();
    let fetched = fetcher.fetch(topic, settings.recency).await?;
    let message = render_message(&fetched, topic, channel_tag, settings, Utc::now());
    delivery.deliver(&message).await?;

    info!(
        elapsed_ms = t0.elapsed().as_millis() as u64,
        chars = message.chars().count(),
        tokens = fetched.token_usage,
        "Cycle complete"
    );
    Ok(())
}

/// Run one cycle per topic, in order, pausing between topics.
///
/// The pause keeps the destination under its rate limits. A failed topic is
/// logged and the batch moves on.
#[instrument(level = "info", skip_all, fields(topics = topics.len()))]
pub async fn run_batch<F, D>(
    fetcher: &F,
    delivery: &D,
    topics: &[String],
    channel_tag: &str,
    settings: &Settings,
) -> BatchReport
where
    F: SummaryFetcher,
    D: Delivery,
{
    let mut report = BatchReport::default();
    let delay = Duration::from_secs(settings.topic_delay_secs);

    for (i, topic) in topics.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        match run_cycle(fetcher, delivery, topic, channel_tag, settings).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                error!(%topic, error = %e, "Cycle failed; skipping topic");
                report.failed += 1;
            }
        }
    }

    info!(sent = report.sent, failed = report.failed, "Batch complete");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DeliveryError, FetchError};
    use crate::models::{Recency, Source};
    use std::cell::{Cell, RefCell};

    /// Returns canned results in order, one per call.
    struct FakeFetcher {
        results: RefCell<Vec<Result<FetchResult, FetchError>>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(results: Vec<Result<FetchResult, FetchError>>) -> Self {
            Self {
                results: RefCell::new(results.into_iter().rev().collect()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl SummaryFetcher for FakeFetcher {
        async fn fetch(&self, topic: &str, _recency: Recency) -> Result<FetchResult, FetchError> {
            self.calls.borrow_mut().push(topic.to_string());
            self.results
                .borrow_mut()
                .pop()
                .unwrap_or(Err(FetchError::EmptyContent))
        }
    }

    #[derive(Default)]
    struct FakeDelivery {
        sent: RefCell<Vec<String>>,
        fail: Cell<bool>,
    }

    impl Delivery for FakeDelivery {
        async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
            if self.fail.get() {
                return Err(DeliveryError::Rejected("chat not found".to_string()));
            }
            self.sent.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    fn fetched(content: &str) -> FetchResult {
        FetchResult {
            content: content.to_string(),
            sources: vec![Source {
                url: "https://example.com/story".to_string(),
                title: "Story".to_string(),
            }],
            token_usage: 100,
        }
    }

    fn settings() -> Settings {
        Settings {
            topic_delay_secs: 0,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_delivery() {
        let fetcher = FakeFetcher::new(vec![Err(FetchError::Status {
            status: 500,
            body: "boom".to_string(),
        })]);
        let delivery = FakeDelivery::default();

        let err = run_cycle(&fetcher, &delivery, "world", "", &settings())
            .await
            .unwrap_err();

        assert!(matches!(err, CycleError::Fetch(FetchError::Status { status: 500, .. })));
        assert!(delivery.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_sectioned_digest_uses_section_renderer() {
        let fetcher = FakeFetcher::new(vec![Ok(fetched("🌍 World\n- Event one\n- Event two"))]);
        let delivery = FakeDelivery::default();

        run_cycle(&fetcher, &delivery, "world", "@digest", &settings())
            .await
            .unwrap();

        let sent = delivery.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("📰 <b>world</b>\n\n🌍 <b>World</b>\n- Event one\n- Event two"));
        assert!(sent[0].contains("<a href=\"https://example.com/story\">Story</a>"));
        assert!(sent[0].contains("📢 @digest"));
    }

    #[tokio::test]
    async fn test_unstructured_digest_falls_back_to_flat() {
        let fetcher = FakeFetcher::new(vec![Ok(fetched("Главное: рынки выросли"))]);
        let delivery = FakeDelivery::default();

        run_cycle(&fetcher, &delivery, "экономика", "", &settings())
            .await
            .unwrap();

        let sent = delivery.sent.borrow();
        assert!(sent[0].starts_with("📰 <b>экономика</b>\n\n<b>Главное:</b> рынки выросли"));
    }

    #[test]
    fn test_forced_flat_mode_ignores_sections() {
        let settings = Settings {
            render_mode: RenderMode::Flat,
            ..Settings::default()
        };
        let message = render_message(
            &fetched("World\n- one"),
            "news",
            "",
            &settings,
            Utc::now(),
        );
        assert!(message.contains("World\n— one"));
        assert!(!message.contains("<b>World</b>"));
    }

    #[test]
    fn test_forced_sections_without_structure_renders_flat_body() {
        let settings = Settings {
            render_mode: RenderMode::Sections,
            ..Settings::default()
        };
        let message = render_message(
            &fetched("Главное: рынки выросли"),
            "экономика",
            "",
            &settings,
            Utc::now(),
        );
        assert!(message.starts_with("📰 <b>экономика</b>\n\n<b>Главное:</b> рынки выросли"));
    }

    #[test]
    fn test_forced_sections_mode_uses_sections() {
        let settings = Settings {
            render_mode: RenderMode::Sections,
            ..Settings::default()
        };
        let message = render_message(&fetched("World\n- one"), "news", "", &settings, Utc::now());
        assert!(message.contains("<b>World</b>\n- one"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_reported() {
        let fetcher = FakeFetcher::new(vec![Ok(fetched("text"))]);
        let delivery = FakeDelivery::default();
        delivery.fail.set(true);

        let err = run_cycle(&fetcher, &delivery, "world", "", &settings())
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Delivery(DeliveryError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let fetcher = FakeFetcher::new(vec![
            Ok(fetched("one")),
            Err(FetchError::Timeout),
            Ok(fetched("three")),
        ]);
        let delivery = FakeDelivery::default();
        let topics = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let report = run_batch(&fetcher, &delivery, &topics, "", &settings()).await;

        assert_eq!(report, BatchReport { sent: 2, failed: 1 });
        assert_eq!(*fetcher.calls.borrow(), vec!["a", "b", "c"]);
        assert_eq!(delivery.sent.borrow().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_waits_between_topics() {
        let fetcher = FakeFetcher::new(vec![Ok(fetched("one")), Ok(fetched("two"))]);
        let delivery = FakeDelivery::default();
        let topics = vec!["a".to_string(), "b".to_string()];
        let settings = Settings {
            topic_delay_secs: 5,
            ..Settings::default()
        };

        let start = tokio::time::Instant::now();
        run_batch(&fetcher, &delivery, &topics, "", &settings).await;
        // One pause between two topics, none after the last.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(10));
    }
}
