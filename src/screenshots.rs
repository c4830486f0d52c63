use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::element_finder::PageHook;
use crate::scraper::PageHandle;
use crate::utils::error::Result;

/// Saves a diagnostic screenshot after every navigation.
///
/// Failures are logged and swallowed.
pub struct ScreenshotHook {
    dir: PathBuf,
}

impl ScreenshotHook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{product_id}_{YYYYmmdd_HHMMSS}.png`, with path separators in the id replaced.
    pub fn file_name(product_id: &str, at: DateTime<Utc>) -> String {
        let safe_id: String = product_id
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        format!("{}_{}.png", safe_id, at.format("%Y%m%d_%H%M%S"))
    }

    async fn save(&self, page: &dyn PageHandle, product_id: &str) -> Result<PathBuf> {
        let png = page.screenshot().await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(product_id, Utc::now()));
        tokio::fs::write(&path, png).await?;
        Ok(path)
    }
}

#[async_trait]
impl PageHook for ScreenshotHook {
    async fn after_navigation(&self, page: &dyn PageHandle, product_id: &str) {
        match self.save(page, product_id).await {
            Ok(path) => debug!("Screenshot saved: {}", path.display()),
            Err(e) => warn!("Could not save screenshot for {}: {}", product_id, e),
        }
    }
}
