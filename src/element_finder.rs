use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::price::{Price, normalize};
use crate::scraper::{Navigation, PageHandle};
use crate::utils::error::{AppError, Result};

/// Group of sites sharing the same price markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteFamily {
    Flipkart,
    Amazon,
    Generic,
}

/// One place a price may live in the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorSpec {
    Css(&'static str),
    /// Price split across two elements; the fraction is appended when present.
    WholeFraction {
        whole: &'static str,
        fraction: &'static str,
    },
}

const FLIPKART_SELECTORS: &[SelectorSpec] = &[
    SelectorSpec::Css("div._30jeq3._16Jk6d"),
    SelectorSpec::Css("div._30jeq3"),
    SelectorSpec::Css("div._25b18c"),
    SelectorSpec::Css("span._2dXhWJ"),
    SelectorSpec::Css("div.Nx9bqj.CxhGGd"),
    SelectorSpec::Css("div.Nx9bqj"),
];

const AMAZON_SELECTORS: &[SelectorSpec] = &[
    SelectorSpec::WholeFraction {
        whole: "span.a-price-whole",
        fraction: "span.a-price-fraction",
    },
    SelectorSpec::Css("#priceblock_ourprice"),
    SelectorSpec::Css("#priceblock_dealprice"),
    SelectorSpec::Css("span#priceblock_saleprice"),
    SelectorSpec::Css("span.a-offscreen"),
];

const GENERIC_SELECTORS: &[SelectorSpec] = &[
    SelectorSpec::Css("span.price"),
    SelectorSpec::Css("div.price"),
    SelectorSpec::Css("p.price"),
];

/// Currency symbol, literal or entity-encoded, followed by digits and commas.
const FALLBACK_PATTERN: &str = r"(?i)(₹|&#8377;|&#x20b9;)\s*([\d,]+)";

fn fallback_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FALLBACK_PATTERN).expect("fallback price pattern is valid"))
}

impl SiteFamily {
    pub fn classify(url: &str) -> Self {
        let url = url.to_lowercase();
        if url.contains("flipkart") {
            SiteFamily::Flipkart
        } else if url.contains("amazon.") {
            SiteFamily::Amazon
        } else {
            SiteFamily::Generic
        }
    }

    /// Candidates in rank order. Earlier entries are trusted more.
    pub fn selectors(self) -> &'static [SelectorSpec] {
        match self {
            SiteFamily::Flipkart => FLIPKART_SELECTORS,
            SiteFamily::Amazon => AMAZON_SELECTORS,
            SiteFamily::Generic => GENERIC_SELECTORS,
        }
    }
}

impl fmt::Display for SiteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteFamily::Flipkart => write!(f, "flipkart"),
            SiteFamily::Amazon => write!(f, "amazon"),
            SiteFamily::Generic => write!(f, "generic"),
        }
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorSpec::Css(css) => write!(f, "{}", css),
            SelectorSpec::WholeFraction { whole, fraction } => write!(f, "{} + {}", whole, fraction),
        }
    }
}

/// Scans raw markup for a currency-prefixed number.
pub fn scan_for_price(content: &str) -> Option<Price> {
    fallback_regex()
        .captures(content)
        .and_then(|caps| caps.get(2))
        .and_then(|m| normalize(m.as_str()))
}

/// Side effect run right after each navigation, whatever the extraction result.
#[async_trait]
pub trait PageHook: Send + Sync {
    async fn after_navigation(&self, page: &dyn PageHandle, product_id: &str);
}

enum AttemptError {
    NotFound,
    Failed(AppError),
}

pub struct PriceExtractor {
    config: ExtractorConfig,
}

impl PriceExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Loads `url` and returns the first price the strategy table yields.
    ///
    /// `Ok(None)` is the ordinary "no price on this page" outcome. Whole
    /// attempts are repeated per the retry policy; the delay between them is
    /// an await point, so an enclosing timeout cancels cleanly there.
    pub async fn extract(
        &self,
        page: &dyn PageHandle,
        url: &str,
        product_id: &str,
        hook: Option<&dyn PageHook>,
    ) -> Result<Option<Price>> {
        let retries = self.config.retry_attempts.saturating_sub(1) as usize;
        let strategy = FixedInterval::new(self.config.retry_delay()).take(retries);
        let mut attempt = 0u32;

        let outcome = Retry::spawn(strategy, || {
            attempt += 1;
            let n = attempt;
            async move {
                if n > 1 {
                    debug!("Retrying {} (attempt {})", url, n);
                }
                match self.attempt(page, url, product_id, hook).await {
                    Ok(Some(price)) => Ok(price),
                    Ok(None) => Err(AttemptError::NotFound),
                    Err(e) => {
                        warn!("Extraction attempt {} for {} failed: {}", n, url, e);
                        Err(AttemptError::Failed(e))
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(price) => Ok(Some(price)),
            Err(AttemptError::NotFound) => Ok(None),
            Err(AttemptError::Failed(e)) => Err(e),
        }
    }

    async fn attempt(
        &self,
        page: &dyn PageHandle,
        url: &str,
        product_id: &str,
        hook: Option<&dyn PageHook>,
    ) -> Result<Option<Price>> {
        debug!("Visiting {}", url);
        if page.navigate(url, self.config.navigation_timeout()).await? == Navigation::TimedOut {
            warn!("Navigation to {} timed out; continuing with partial content", url);
        }

        if let Some(hook) = hook {
            hook.after_navigation(page, product_id).await;
        }

        if !self.config.settle_delay().is_zero() {
            tokio::time::sleep(self.config.settle_delay()).await;
        }

        Ok(self.read_price(page, url).await)
    }

    /// Walks the selector table for `url`'s family, then the regex fallback.
    pub async fn read_price(&self, page: &dyn PageHandle, url: &str) -> Option<Price> {
        let family = SiteFamily::classify(url);
        let timeout = self.config.element_timeout();

        for spec in family.selectors() {
            match read_candidate(page, spec, timeout).await {
                Ok(Some(text)) => {
                    debug!("Selector {} text: {:?}", spec, text);
                    if let Some(price) = normalize(&text) {
                        debug!("Parsed price {} via {} ({})", price, spec, family);
                        return Some(price);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Selector {} error: {}", spec, e),
            }
        }

        match page.content().await {
            Ok(content) => {
                if let Some(price) = scan_for_price(&content) {
                    debug!("Regex fallback parsed price {}", price);
                    return Some(price);
                }
            }
            Err(e) => debug!("Regex fallback could not read content: {}", e),
        }

        debug!("All extraction strategies failed for {}", url);
        None
    }
}

async fn read_candidate(
    page: &dyn PageHandle,
    spec: &SelectorSpec,
    timeout: Duration,
) -> Result<Option<String>> {
    match spec {
        SelectorSpec::Css(css) => page.element_text(css, timeout).await,
        SelectorSpec::WholeFraction { whole, fraction } => {
            let Some(whole_text) = page.element_text(whole, timeout).await? else {
                return Ok(None);
            };
            let fraction_text = page.element_text(fraction, timeout).await.unwrap_or(None);
            Ok(Some(match fraction_text {
                Some(fraction_text) => format!("{}{}", whole_text.trim(), fraction_text.trim()),
                None => whole_text,
            }))
        }
    }
}
