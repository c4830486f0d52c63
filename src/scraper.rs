use async_trait::async_trait;
use headless_chrome::Tab;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use ::scraper::{Html, Selector};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::utils::error::{AppError, Result};

/// How a navigation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Loaded,
    /// The load did not finish in time; whatever rendered so far is kept.
    TimedOut,
}

/// The rendered page the extractor works against.
///
/// One handle is reused for every product of a run and is never navigated
/// concurrently.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<Navigation>;

    /// Visible text of the first element matching `selector`.
    ///
    /// `Ok(None)` means nothing matched. Errors cover elements that vanish or
    /// reads that exceed `timeout`.
    async fn element_text(&self, selector: &str, timeout: Duration) -> Result<Option<String>>;

    /// Full serialized markup of the current document.
    async fn content(&self) -> Result<String>;

    /// Full-page PNG.
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

/// A `PageHandle` backed by a Chrome tab.
///
/// `headless_chrome` blocks the calling thread, so each call runs on the
/// blocking pool and the await is bounded with a timeout.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

async fn blocking_with_timeout<T, F>(operation: String, timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(joined) => joined?,
        Err(_) => Err(AppError::Timeout {
            operation,
            millis: timeout.as_millis(),
        }),
    }
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<Navigation> {
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        // The blocking wait inside gets the same budget; the outer bound only
        // trips if the browser stops answering entirely.
        let outer = timeout + Duration::from_secs(5);

        let result = blocking_with_timeout(format!("navigate to {}", url), outer, move || {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&target).map_err(|e| AppError::Navigation {
                url: target.clone(),
                message: e.to_string(),
            })?;
            match tab.wait_until_navigated() {
                Ok(_) => Ok(Navigation::Loaded),
                Err(e) if e.is::<headless_chrome::util::Timeout>() => Ok(Navigation::TimedOut),
                Err(e) => Err(AppError::Navigation {
                    url: target,
                    message: e.to_string(),
                }),
            }
        })
        .await;

        match result {
            Err(AppError::Timeout { .. }) => Ok(Navigation::TimedOut),
            other => other,
        }
    }

    async fn element_text(&self, selector: &str, timeout: Duration) -> Result<Option<String>> {
        let tab = Arc::clone(&self.tab);
        let selector_literal = serde_json::to_string(selector)?;
        let js = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
            selector_literal
        );

        blocking_with_timeout(format!("read text of {}", selector), timeout, move || {
            let remote = tab
                .evaluate(&js, false)
                .map_err(|e| AppError::Scraping(format!("selector evaluation failed: {}", e)))?;
            Ok(match remote.value {
                Some(serde_json::Value::String(text)) => Some(text),
                _ => None,
            })
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        blocking_with_timeout("read page content".to_string(), Duration::from_secs(30), move || {
            tab.get_content()
                .map_err(|e| AppError::Scraping(format!("failed to get page content: {}", e)))
        })
        .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let tab = Arc::clone(&self.tab);
        blocking_with_timeout("capture screenshot".to_string(), Duration::from_secs(30), move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| AppError::Scraping(format!("screenshot capture failed: {}", e)))
        })
        .await
    }
}

/// A `PageHandle` over a fixed HTML document.
///
/// Navigation only records the URL. Used by `probe` to run the selector table
/// against a saved page.
pub struct HtmlSnapshot {
    html: String,
    current_url: Mutex<Option<String>>,
}

impl HtmlSnapshot {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            current_url: Mutex::new(None),
        }
    }

    pub fn current_url(&self) -> Option<String> {
        self.current_url.lock().ok().and_then(|url| url.clone())
    }

    /// Text of the first element matching `selector`, whitespace-trimmed.
    pub fn select_text(html: &str, selector: &str) -> Result<Option<String>> {
        let css = Selector::parse(selector)
            .map_err(|e| AppError::Scraping(format!("invalid CSS selector '{}': {:?}", selector, e)))?;
        let document = Html::parse_document(html);
        Ok(document
            .select(&css)
            .next()
            .map(|element| element.text().collect::<Vec<_>>().join("").trim().to_string()))
    }
}

#[async_trait]
impl PageHandle for HtmlSnapshot {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<Navigation> {
        if let Ok(mut current) = self.current_url.lock() {
            *current = Some(url.to_string());
        }
        Ok(Navigation::Loaded)
    }

    async fn element_text(&self, selector: &str, _timeout: Duration) -> Result<Option<String>> {
        Self::select_text(&self.html, selector)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Err(AppError::Scraping("static documents cannot be screenshotted".to_string()))
    }
}
