use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, LaunchOptions};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::models::Product;
use crate::scraper::{ChromePage, PageHandle};
use crate::utils::error::{AppError, Result};

/// A cookie as persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Seconds since the epoch; absent for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Saved browsing state, written by `record` and read by `run`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub cookies: Vec<StoredCookie>,
}

impl StoredCookie {
    fn from_cdp(cookie: &Network::Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            secure: cookie.secure,
            http_only: cookie.http_only,
            expires: (cookie.expires > 0.0).then_some(cookie.expires),
        }
    }

    fn to_cdp(&self) -> Result<Network::CookieParam> {
        let mut param = serde_json::json!({
            "name": self.name,
            "value": self.value,
            "domain": self.domain,
            "path": self.path,
            "secure": self.secure,
            "httpOnly": self.http_only,
        });
        if let Some(expires) = self.expires {
            param["expires"] = serde_json::json!(expires);
        }
        Ok(serde_json::from_value(param)?)
    }
}

impl SessionState {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// `Ok(None)` when no state has been recorded yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The state file wins; otherwise the pre-seeded JSON; otherwise nothing.
    /// Unreadable state is reported and ignored.
    pub fn resolve(path: &Path, seeded: Option<&str>) -> Option<Self> {
        match Self::load(path) {
            Ok(Some(state)) => {
                debug!("Using session state from {}", path.display());
                return Some(state);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable session state {}: {}", path.display(), e),
        }

        match seeded.map(Self::from_json) {
            Some(Ok(state)) => {
                debug!("Using pre-seeded session state");
                Some(state)
            }
            Some(Err(e)) => {
                warn!("Ignoring malformed pre-seeded session state: {}", e);
                None
            }
            None => None,
        }
    }

    fn merge(&mut self, cookies: impl IntoIterator<Item = StoredCookie>) {
        for cookie in cookies {
            self.cookies.retain(|c| {
                !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
            });
            self.cookies.push(cookie);
        }
    }
}

/// The browser side of a run: one process, one reusable page.
#[async_trait]
pub trait Session: Send + Sync {
    fn page(&self) -> &dyn PageHandle;

    /// Releases the page and the browser process.
    async fn close(&self) -> Result<()>;
}

pub struct ChromeSession {
    // Dropping the browser terminates the Chrome process.
    _browser: Browser,
    page: ChromePage,
}

impl ChromeSession {
    pub async fn launch(config: &BrowserConfig, state: Option<SessionState>) -> Result<Self> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || Self::launch_blocking(&config, state)).await?
    }

    fn launch_blocking(config: &BrowserConfig, state: Option<SessionState>) -> Result<Self> {
        let lang_arg = format!("--lang={}", config.locale);
        let mut args: Vec<&OsStr> = config.extra_args.iter().map(OsStr::new).collect();
        args.push(OsStr::new(&lang_arg));

        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(config.sandbox)
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(Duration::from_secs(60 * 60))
            .args(args)
            .build()
            .map_err(|e| AppError::Browser(format!("invalid launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Browser(format!("failed to launch browser: {}", e)))?;
        debug!("Chromium launched (headless: {})", config.headless);

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("failed to open tab: {}", e)))?;

        if let Some(user_agent) = &config.user_agent {
            tab.set_user_agent(user_agent, Some(&config.locale), None)
                .map_err(|e| AppError::Browser(format!("failed to set user agent: {}", e)))?;
        }

        match state {
            Some(state) if !state.cookies.is_empty() => {
                let params = state
                    .cookies
                    .iter()
                    .map(StoredCookie::to_cdp)
                    .collect::<Result<Vec<_>>>()?;
                match tab.set_cookies(params) {
                    Ok(()) => info!("Restored {} cookies from saved session", state.cookies.len()),
                    Err(e) => warn!("Could not restore session cookies, continuing fresh: {}", e),
                }
            }
            _ => info!("No saved session state; using a fresh session"),
        }

        Ok(Self {
            _browser: browser,
            page: ChromePage::new(tab),
        })
    }

    fn tab(&self) -> Arc<headless_chrome::Tab> {
        Arc::clone(self.page.tab())
    }

    /// Cookies the browser holds for `urls`.
    pub async fn cookies_for(&self, urls: Vec<String>) -> Result<Vec<StoredCookie>> {
        let tab = self.tab();
        tokio::task::spawn_blocking(move || {
            let returned = tab
                .call_method(Network::GetCookies { urls: Some(urls) })
                .map_err(|e| AppError::Browser(format!("failed to read cookies: {}", e)))?;
            Ok(returned.cookies.iter().map(StoredCookie::from_cdp).collect())
        })
        .await?
    }
}

#[async_trait]
impl Session for ChromeSession {
    fn page(&self) -> &dyn PageHandle {
        &self.page
    }

    async fn close(&self) -> Result<()> {
        let tab = self.tab();
        tokio::task::spawn_blocking(move || {
            tab.close(true)
                .map(|_| ())
                .map_err(|e| AppError::Browser(format!("failed to close tab: {}", e)))
        })
        .await?
    }
}

/// Interactive capture of login/cookie state.
///
/// Opens a visible browser, visits every product so the user can sign in or
/// clear interstitials, waits for ENTER, then writes the cookies to
/// `state_path`.
pub async fn record_session(
    config: &BrowserConfig,
    products: &[Product],
    state_path: &Path,
) -> Result<SessionState> {
    let mut headed = config.clone();
    headed.headless = false;

    let existing = SessionState::resolve(state_path, config.session_state.as_deref());
    let session = ChromeSession::launch(&headed, existing.clone()).await?;
    let outcome = record_with(&session, products, existing.unwrap_or_default(), state_path).await;

    if let Err(e) = session.close().await {
        warn!("Browser teardown reported an error: {}", e);
    }
    outcome
}

async fn record_with(
    session: &ChromeSession,
    products: &[Product],
    mut state: SessionState,
    state_path: &Path,
) -> Result<SessionState> {
    let timeout = Duration::from_secs(60);
    for product in products {
        info!("Opening {} at {}", product.name, product.url);
        if let Err(e) = session.page().navigate(&product.url, timeout).await {
            warn!("Could not open {}: {}", product.url, e);
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    println!("Press ENTER to save the session state to {}...", state_path.display());
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;

    let urls = products.iter().map(|p| p.url.clone()).collect();
    state.merge(session.cookies_for(urls).await?);
    state.save(state_path)?;
    info!("Saved {} cookies to {}", state.cookies.len(), state_path.display());
    Ok(state)
}
