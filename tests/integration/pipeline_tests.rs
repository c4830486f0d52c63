// Check pipeline behaviour across a whole product list

use super::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use pricewatch::config::ExtractorConfig;
use pricewatch::models::Product;
use pricewatch::pipeline::{AlertDecision, CheckPipeline};
use pricewatch::plugins::traits::NotificationKind;
use pricewatch::price_log::PriceLog;
use pricewatch::scraper::{Navigation, PageHandle};
use pricewatch::PriceExtractor;

fn amazon_page(price: &str) -> String {
    format!(
        r#"<html><body><span id="priceblock_ourprice">{}</span></body></html>"#,
        price
    )
}

fn pipeline_in(dir: &tempfile::TempDir) -> CheckPipeline {
    CheckPipeline::new(
        PriceExtractor::new(test_extractor_config()),
        PriceLog::new(dir.path().join("price_log.csv")),
    )
}

#[tokio::test]
async fn test_failed_product_does_not_stop_the_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let page = FixturePage::new()
        .with_page(FLIPKART_URL, &flipkart_page("₹16,499"))
        .failing(AMAZON_URL)
        .with_page(GENERIC_URL, &generic_page("₹2,100"));

    let pipeline = pipeline_in(&dir);
    let readings = pipeline.run(&products(), &page).await;

    assert_eq!(readings.len(), 3);
    assert_eq!(readings[0].product_id, "phone");
    assert_eq!(readings[0].price, Some(16499));
    assert_eq!(readings[1].product_id, "kettle");
    assert_eq!(readings[1].price, None);
    assert_eq!(readings[2].price, Some(2100));

    let logged = pipeline.log().read_all()?;
    assert_eq!(logged.len(), 3);
    assert_eq!(logged[1].product_id, "kettle");
    assert!(logged[1].price.is_none());
    Ok(())
}

#[tokio::test]
async fn test_price_equal_to_target_alerts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notifier = Arc::new(RecordingNotifier::default());
    let page = FixturePage::new()
        .with_page(FLIPKART_URL, &flipkart_page("₹15,000"))
        .with_page(AMAZON_URL, &amazon_page("₹1,001"))
        .with_page(GENERIC_URL, &generic_page("₹2,100"));

    let pipeline = pipeline_in(&dir).with_notifier(notifier.clone());
    let results = pipeline.run_detailed(&products(), &page).await;

    assert_eq!(results[0].decision, AlertDecision::Alert);
    assert!(results[0].notified);
    assert_eq!(results[1].decision, AlertDecision::AboveTarget);
    assert!(!results[1].notified);
    assert_eq!(results[2].decision, AlertDecision::NoTarget);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, NotificationKind::PriceAlert);
    assert_eq!(events[0].product_id, "phone");
    assert_eq!(events[0].price, Some(15000));
    assert_eq!(events[0].target_price, Some(15000));
    Ok(())
}

#[tokio::test]
async fn test_missing_price_sends_distinct_warning() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notifier = Arc::new(RecordingNotifier::default());
    let page = FixturePage::new()
        .with_page(FLIPKART_URL, "<html><body><p>Sold out</p></body></html>");

    let pipeline = pipeline_in(&dir).with_notifier(notifier.clone());
    let products = vec![Product::new("phone", "Phone", FLIPKART_URL).with_target(15000)];
    let results = pipeline.run_detailed(&products, &page).await;

    assert_eq!(results[0].decision, AlertDecision::NotFound);
    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, NotificationKind::ExtractionFailed);
    assert_ne!(events[0].render("₹"), "");
    assert!(events[0].render("₹").starts_with("Tracking warning"));
    Ok(())
}

#[tokio::test]
async fn test_informational_updates_are_opt_in() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let page = FixturePage::new()
        .with_page(AMAZON_URL, &amazon_page("₹1,299"))
        .with_page(GENERIC_URL, &generic_page("₹2,100"));
    let products = vec![
        Product::new("kettle", "Kettle", AMAZON_URL).with_target(1000),
        Product::new("lamp", "Lamp", GENERIC_URL),
    ];

    let quiet = Arc::new(RecordingNotifier::default());
    pipeline_in(&dir)
        .with_notifier(quiet.clone())
        .run(&products, &page)
        .await;
    assert!(quiet.events().is_empty());

    let chatty = Arc::new(RecordingNotifier::default());
    pipeline_in(&dir)
        .with_notifier(chatty.clone())
        .notify_above_target(true)
        .run(&products, &page)
        .await;
    let kinds: Vec<_> = chatty.events().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::PriceUpdate, NotificationKind::PriceUpdate]);
    Ok(())
}

#[tokio::test]
async fn test_notifier_failure_does_not_abort_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notifier = Arc::new(RecordingNotifier::failing());
    let page = FixturePage::new()
        .with_page(FLIPKART_URL, &flipkart_page("₹9,999"))
        .with_page(AMAZON_URL, &amazon_page("₹999"))
        .with_page(GENERIC_URL, &generic_page("₹2,100"));

    let pipeline = pipeline_in(&dir).with_notifier(notifier.clone());
    let results = pipeline.run_detailed(&products(), &page).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].decision, AlertDecision::Alert);
    assert_eq!(results[1].decision, AlertDecision::Alert);
    assert!(results.iter().all(|r| !r.notified));
    assert_eq!(notifier.events().len(), 2);
    assert_eq!(pipeline.log().read_all()?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_repeated_runs_append_rows() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let page = FixturePage::new()
        .with_page(FLIPKART_URL, &flipkart_page("₹16,499"))
        .with_page(AMAZON_URL, &amazon_page("₹1,299"))
        .with_page(GENERIC_URL, &generic_page("₹2,100"));

    let pipeline = pipeline_in(&dir);
    pipeline.run(&products(), &page).await;
    pipeline.run(&products(), &page).await;

    let logged = pipeline.log().read_all()?;
    assert_eq!(logged.len(), 6);
    for id in ["phone", "kettle", "lamp"] {
        assert_eq!(logged.iter().filter(|r| r.product_id == id).count(), 2);
    }

    let raw = std::fs::read_to_string(pipeline.log().path())?;
    assert_eq!(raw.matches("timestamp,product_id,product_name,price").count(), 1);
    Ok(())
}

/// Hangs when asked to load `stall_on`.
struct StallingPage {
    inner: FixturePage,
    stall_on: &'static str,
}

#[async_trait]
impl PageHandle for StallingPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> pricewatch::Result<Navigation> {
        if url == self.stall_on {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.navigate(url, timeout).await
    }

    async fn element_text(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> pricewatch::Result<Option<String>> {
        self.inner.element_text(selector, timeout).await
    }

    async fn content(&self) -> pricewatch::Result<String> {
        self.inner.content().await
    }

    async fn screenshot(&self) -> pricewatch::Result<Vec<u8>> {
        self.inner.screenshot().await
    }
}

#[tokio::test]
async fn test_product_deadline_marks_not_found_and_moves_on() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let page = StallingPage {
        inner: FixturePage::new()
            .with_page(FLIPKART_URL, &flipkart_page("₹16,499"))
            .with_page(GENERIC_URL, &generic_page("₹2,100")),
        stall_on: FLIPKART_URL,
    };

    let config = ExtractorConfig {
        product_timeout_secs: 1,
        ..test_extractor_config()
    };
    let pipeline = CheckPipeline::new(
        PriceExtractor::new(config),
        PriceLog::new(dir.path().join("price_log.csv")),
    );
    let products = vec![
        Product::new("phone", "Phone", FLIPKART_URL),
        Product::new("lamp", "Lamp", GENERIC_URL),
    ];

    let started = std::time::Instant::now();
    let wall_start = chrono::Utc::now();
    let readings = pipeline.run(&products, &page).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(readings[0].price, None);
    assert_eq!(readings[1].price, Some(2100));

    // Stamped when the attempt began, not when the deadline fired.
    assert!(readings[0].timestamp - wall_start < chrono::Duration::milliseconds(500));
    assert!(readings[1].timestamp - wall_start >= chrono::Duration::milliseconds(900));
    Ok(())
}

#[tokio::test]
async fn test_oversized_price_is_logged_as_read() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let page = FixturePage::new().with_page(
        FLIPKART_URL,
        r#"<html><body>
            <div class="_30jeq3 _16Jk6d">₹99999999999999999999999</div>
            <div class="_30jeq3">₹500</div>
        </body></html>"#,
    );
    let products = vec![Product::new("phone", "Phone", FLIPKART_URL).with_target(15000)];

    let pipeline = pipeline_in(&dir);
    let results = pipeline.run_detailed(&products, &page).await;

    let expected: pricewatch::price::Price = "99999999999999999999999".parse()?;
    assert_eq!(results[0].reading.price, Some(expected));
    assert_eq!(results[0].decision, AlertDecision::AboveTarget);

    let logged = pipeline.log().read_all()?;
    assert_eq!(logged[0].price, Some(expected));
    Ok(())
}
