use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Product;
use crate::price::Price;

/// Outcome of one extraction attempt for one product.
///
/// Field order is the column order of the price log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceReading {
    pub timestamp: DateTime<Utc>,
    pub product_id: String,
    pub product_name: String,
    pub price: Option<Price>,
}

impl PriceReading {
    pub fn new(product: &Product, price: Option<Price>) -> Self {
        Self {
            timestamp: Utc::now(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            price,
        }
    }

    /// Stamps the reading with the instant the attempt started.
    pub fn attempted_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_found(&self) -> bool {
        self.price.is_some()
    }
}
