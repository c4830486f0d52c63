use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Product;
use crate::price::{Price, format_price};
use crate::utils::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationKind {
    /// Price at or below target.
    PriceAlert,
    /// Price read but no alert warranted; informational only.
    PriceUpdate,
    /// No strategy produced a price; tracking for this product is broken.
    ExtractionFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub product_id: String,
    pub product_name: String,
    pub url: String,
    pub price: Option<Price>,
    pub target_price: Option<Price>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, product: &Product, price: Option<Price>) -> Self {
        Self {
            kind,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            url: product.url.clone(),
            price,
            target_price: product.target_price,
        }
    }

    /// Plain-text body shared by every transport.
    pub fn render(&self, currency_symbol: &str) -> String {
        let fmt = |p: Price| format_price(currency_symbol, p);
        match self.kind {
            NotificationKind::PriceAlert => format!(
                "Price alert: {} is now {} (target {})\n{}",
                self.product_name,
                self.price.map(fmt).unwrap_or_default(),
                self.target_price.map(fmt).unwrap_or_default(),
                self.url
            ),
            NotificationKind::PriceUpdate => format!(
                "Price update: {} is {} (target {})\n{}",
                self.product_name,
                self.price.map(fmt).unwrap_or_default(),
                self.target_price.map(fmt).unwrap_or_else(|| "not set".to_string()),
                self.url
            ),
            NotificationKind::ExtractionFailed => format!(
                "Tracking warning: could not read a price for {}. Check the screenshot and selectors.\n{}",
                self.product_name, self.url
            ),
        }
    }
}

/// An outbound message channel.
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult>;
}
