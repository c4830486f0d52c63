// Shared fixtures for the integration tests: an in-memory page keyed by URL,
// a notifier that records what it was asked to send, and a session wrapper.

pub mod pipeline_tests;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pricewatch::config::ExtractorConfig;
use pricewatch::models::Product;
use pricewatch::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use pricewatch::scraper::{HtmlSnapshot, Navigation, PageHandle};
use pricewatch::session::Session;
use pricewatch::{AppError, Result};

pub fn test_extractor_config() -> ExtractorConfig {
    ExtractorConfig {
        navigation_timeout_secs: 5,
        settle_delay_ms: 0,
        element_timeout_ms: 200,
        retry_attempts: 1,
        retry_delay_ms: 0,
        product_timeout_secs: 5,
    }
}

/// Serves canned HTML per URL.
#[derive(Default)]
pub struct FixturePage {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    current: Mutex<Option<String>>,
    visits: Mutex<Vec<String>>,
}

impl FixturePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Navigation to `url` returns an error.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Navigation to `url` panics.
    pub fn panicking(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    fn current_html(&self) -> String {
        let current = self.current.lock().unwrap().clone();
        current
            .and_then(|url| self.pages.get(&url).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageHandle for FixturePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<Navigation> {
        self.visits.lock().unwrap().push(url.to_string());
        if self.panicking.contains(url) {
            panic!("renderer crashed on {}", url);
        }
        if self.failing.contains(url) {
            *self.current.lock().unwrap() = None;
            return Err(AppError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(Navigation::Loaded)
    }

    async fn element_text(&self, selector: &str, _timeout: Duration) -> Result<Option<String>> {
        HtmlSnapshot::select_text(&self.current_html(), selector)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.current_html())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG fixture".to_vec())
    }
}

/// Records every event; optionally fails each send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "Recording Notifier"
    }

    fn plugin_type(&self) -> &str {
        "recording"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(AppError::Notification {
                notifier: "recording".to_string(),
                message: "HTTP 502 Bad Gateway".to_string(),
            });
        }
        Ok(NotificationResult {
            success: true,
            message_id: Some(format!("msg-{}", event.product_id)),
        })
    }
}

/// A session over a fixture page that remembers whether it was closed.
pub struct FixtureSession {
    pub page: FixturePage,
    pub closed: AtomicBool,
}

impl FixtureSession {
    pub fn new(page: FixturePage) -> Self {
        Self {
            page,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for FixtureSession {
    fn page(&self) -> &dyn PageHandle {
        &self.page
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub const FLIPKART_URL: &str = "https://www.flipkart.com/phone/p/itm100";
pub const AMAZON_URL: &str = "https://www.amazon.in/kettle/dp/B0KETTLE";
pub const GENERIC_URL: &str = "https://shop.example.com/lamp";

pub fn flipkart_page(price: &str) -> String {
    format!(
        r#"<html><body><h1>Phone</h1><div class="_30jeq3 _16Jk6d">{}</div></body></html>"#,
        price
    )
}

pub fn generic_page(price: &str) -> String {
    format!(
        r#"<html><body><span class="price">{}</span></body></html>"#,
        price
    )
}

pub fn products() -> Vec<Product> {
    vec![
        Product::new("phone", "Phone", FLIPKART_URL).with_target(15000),
        Product::new("kettle", "Kettle", AMAZON_URL).with_target(1000),
        Product::new("lamp", "Lamp", GENERIC_URL),
    ]
}
