use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;
use validator::Validate;

use crate::price::Price;
use crate::utils::error::{AppError, Result};

/// A tracked product, immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub url: String,
    pub target_price: Option<Price>,
}

/// One entry of the `products` array as written by the user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductEntry {
    #[validate(length(min = 1, message = "product id cannot be empty"))]
    pub id: String,
    #[validate(length(min = 1, message = "product name cannot be empty"))]
    pub name: String,
    pub url: Option<String>,
    pub target_price: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductsFile {
    pub products: Vec<ProductEntry>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            target_price: None,
        }
    }

    pub fn with_target(mut self, target_price: Price) -> Self {
        self.target_price = Some(target_price);
        self
    }
}

impl ProductsFile {
    pub fn load(path: &Path) -> Result<Vec<Product>> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Validation(format!("cannot read product list {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    /// Parses and validates the product list.
    ///
    /// Entries without a usable `url` are dropped with a warning; empty ids or
    /// names and duplicate ids reject the whole file.
    pub fn parse(raw: &str) -> Result<Vec<Product>> {
        let file: ProductsFile = serde_json::from_str(raw)?;
        let mut seen = HashSet::new();
        let mut products = Vec::with_capacity(file.products.len());

        for entry in file.products {
            entry.validate()?;
            if !seen.insert(entry.id.clone()) {
                return Err(AppError::Validation(format!(
                    "duplicate product id '{}'",
                    entry.id
                )));
            }

            let url = match entry.url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => url.to_string(),
                _ => {
                    tracing::warn!("Skipping product '{}': no url configured", entry.id);
                    continue;
                }
            };
            if let Err(e) = Url::parse(&url) {
                tracing::warn!("Skipping product '{}': invalid url {}: {}", entry.id, url, e);
                continue;
            }

            products.push(Product {
                id: entry.id,
                name: entry.name,
                url,
                target_price: entry.target_price,
            });
        }

        Ok(products)
    }
}
