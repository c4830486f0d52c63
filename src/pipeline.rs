use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::element_finder::{PageHook, PriceExtractor};
use crate::models::{PriceReading, Product};
use crate::plugins::traits::{NotificationEvent, NotificationKind, NotifierPlugin};
use crate::price::Price;
use crate::price_log::PriceLog;
use crate::scraper::PageHandle;

/// What a reading means for the product's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Price at or below target.
    Alert,
    AboveTarget,
    NoTarget,
    NotFound,
}

impl AlertDecision {
    pub fn decide(price: Option<Price>, target: Option<Price>) -> Self {
        match (price, target) {
            (None, _) => AlertDecision::NotFound,
            (Some(_), None) => AlertDecision::NoTarget,
            (Some(price), Some(target)) if price <= target => AlertDecision::Alert,
            (Some(_), Some(_)) => AlertDecision::AboveTarget,
        }
    }

    /// The message kind to send, if any. Informational updates are opt-in.
    pub fn notification(self, notify_above_target: bool) -> Option<NotificationKind> {
        match self {
            AlertDecision::Alert => Some(NotificationKind::PriceAlert),
            AlertDecision::NotFound => Some(NotificationKind::ExtractionFailed),
            AlertDecision::AboveTarget | AlertDecision::NoTarget => {
                notify_above_target.then_some(NotificationKind::PriceUpdate)
            }
        }
    }
}

/// Per-product result of one pass.
#[derive(Debug, Clone)]
pub struct ProductCheckResult {
    pub reading: PriceReading,
    pub decision: AlertDecision,
    pub notified: bool,
}

/// Checks products one at a time against a shared page.
pub struct CheckPipeline {
    extractor: PriceExtractor,
    log: PriceLog,
    notifier: Option<Arc<dyn NotifierPlugin>>,
    hook: Option<Box<dyn PageHook>>,
    notify_above_target: bool,
}

impl CheckPipeline {
    pub fn new(extractor: PriceExtractor, log: PriceLog) -> Self {
        Self {
            extractor,
            log,
            notifier: None,
            hook: None,
            notify_above_target: false,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotifierPlugin>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn PageHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn notify_above_target(mut self, enabled: bool) -> Self {
        self.notify_above_target = enabled;
        self
    }

    pub fn log(&self) -> &PriceLog {
        &self.log
    }

    /// One reading per product, in input order, including failures.
    pub async fn run(&self, products: &[Product], page: &dyn PageHandle) -> Vec<PriceReading> {
        self.run_detailed(products, page)
            .await
            .into_iter()
            .map(|result| result.reading)
            .collect()
    }

    pub async fn run_detailed(
        &self,
        products: &[Product],
        page: &dyn PageHandle,
    ) -> Vec<ProductCheckResult> {
        if self.notifier.is_none() {
            info!("Notifications not configured; results are logged only");
        }

        let mut results = Vec::with_capacity(products.len());
        for product in products {
            results.push(self.check_product(product, page).await);
        }
        results
    }

    pub async fn check_product(&self, product: &Product, page: &dyn PageHandle) -> ProductCheckResult {
        info!("Checking {}", product.name);
        let attempted_at = Utc::now();
        let price = self.fetch_price(product, page).await;

        let reading = PriceReading::new(product, price).attempted_at(attempted_at);
        match self.log.append(&reading) {
            Ok(()) => match price {
                Some(price) => info!("{} logged at {}", product.name, price),
                None => warn!("Could not extract price for {}; logged as not found", product.name),
            },
            Err(e) => warn!("Failed to append reading for {} to price log: {}", product.id, e),
        }

        let decision = AlertDecision::decide(price, product.target_price);
        let mut notified = false;
        if let Some(kind) = decision.notification(self.notify_above_target) {
            notified = self.dispatch(NotificationEvent::new(kind, product, price)).await;
        }

        ProductCheckResult {
            reading,
            decision,
            notified,
        }
    }

    /// Any failure, including a panic or the per-product deadline, counts as
    /// not found.
    async fn fetch_price(&self, product: &Product, page: &dyn PageHandle) -> Option<Price> {
        let deadline = self.extractor.config().product_timeout();
        let extraction = AssertUnwindSafe(self.extractor.extract(
            page,
            &product.url,
            &product.id,
            self.hook.as_deref(),
        ))
        .catch_unwind();

        match tokio::time::timeout(deadline, extraction).await {
            Ok(Ok(Ok(price))) => price,
            Ok(Ok(Err(e))) => {
                warn!("Extraction for {} failed: {}", product.id, e);
                None
            }
            Ok(Err(panic)) => {
                error!(
                    "Extraction for {} panicked: {}",
                    product.id,
                    panic_message(panic.as_ref())
                );
                None
            }
            Err(_) => {
                warn!(
                    "Extraction for {} exceeded {}s; treating as not found",
                    product.id,
                    deadline.as_secs()
                );
                None
            }
        }
    }

    async fn dispatch(&self, event: NotificationEvent) -> bool {
        let Some(notifier) = &self.notifier else {
            return false;
        };
        match notifier.notify(&event).await {
            Ok(_) => {
                info!("Sent {:?} for {} via {}", event.kind, event.product_id, notifier.plugin_type());
                true
            }
            Err(e) => {
                warn!("{} failed for {}: {}", notifier.name(), event.product_id, e);
                false
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
