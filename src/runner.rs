use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::element_finder::PriceExtractor;
use crate::models::Product;
use crate::pipeline::{AlertDecision, CheckPipeline, ProductCheckResult, panic_message};
use crate::plugins::notifiers::TelegramNotifier;
use crate::price_log::PriceLog;
use crate::screenshots::ScreenshotHook;
use crate::session::{ChromeSession, Session, SessionState};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub checked: usize,
    pub priced: usize,
    pub not_found: usize,
    pub alerts: usize,
    pub notifications_sent: usize,
}

impl RunSummary {
    pub fn from_results(results: &[ProductCheckResult]) -> Self {
        let mut summary = RunSummary {
            checked: results.len(),
            ..Default::default()
        };
        for result in results {
            if result.reading.is_found() {
                summary.priced += 1;
            } else {
                summary.not_found += 1;
            }
            if result.decision == AlertDecision::Alert {
                summary.alerts += 1;
            }
            if result.notified {
                summary.notifications_sent += 1;
            }
        }
        summary
    }
}

/// Owns the browser for one pipeline pass.
pub struct RunOrchestrator {
    config: AppConfig,
}

impl RunOrchestrator {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Assembles the pipeline from configuration.
    pub fn build_pipeline(&self) -> Result<CheckPipeline> {
        let config = &self.config;
        let mut pipeline = CheckPipeline::new(
            PriceExtractor::new(config.extractor.clone()),
            PriceLog::new(&config.paths.price_log),
        )
        .notify_above_target(config.notifications.notify_above_target);

        match TelegramNotifier::from_config(&config.notifications)? {
            Some(notifier) => pipeline = pipeline.with_notifier(Arc::new(notifier)),
            None => warn!("Telegram not configured; alerts will not be sent"),
        }

        if config.screenshots.enabled {
            pipeline = pipeline.with_hook(Box::new(ScreenshotHook::new(&config.paths.screenshot_dir)));
        }

        Ok(pipeline)
    }

    /// Launches the browser, checks every product, and always tears down.
    ///
    /// Only setup failures are returned as errors; per-product failures are
    /// part of the results.
    pub async fn run(&self, products: &[Product]) -> Result<Vec<ProductCheckResult>> {
        let pipeline = self.build_pipeline()?;
        let state = SessionState::resolve(
            &self.config.paths.state_file,
            self.config.browser.session_state.as_deref(),
        );
        let session = ChromeSession::launch(&self.config.browser, state).await?;
        run_with_session(&session, &pipeline, products).await
    }
}

pub async fn run_with_session(
    session: &dyn Session,
    pipeline: &CheckPipeline,
    products: &[Product],
) -> Result<Vec<ProductCheckResult>> {
    info!("Starting check of {} products", products.len());
    let outcome = AssertUnwindSafe(pipeline.run_detailed(products, session.page()))
        .catch_unwind()
        .await;

    if let Err(e) = session.close().await {
        warn!("Browser teardown reported an error: {}", e);
    }

    match outcome {
        Ok(results) => {
            let summary = RunSummary::from_results(&results);
            info!(
                "Run completed: {} checked, {} priced, {} not found, {} alerts",
                summary.checked, summary.priced, summary.not_found, summary.alerts
            );
            Ok(results)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Check pipeline aborted: {}", message);
            Err(AppError::Internal(format!("check pipeline panicked: {}", message)))
        }
    }
}
