use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub browser: BrowserConfig,
    pub extractor: ExtractorConfig,
    pub screenshots: ScreenshotConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub products_file: PathBuf,
    pub state_file: PathBuf,
    pub price_log: PathBuf,
    pub screenshot_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub locale: String,
    pub user_agent: Option<String>,
    pub sandbox: bool,
    pub extra_args: Vec<String>,
    /// Pre-seeded session state JSON, used when the state file is absent.
    pub session_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub navigation_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub element_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub product_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub telegram: TelegramConfig,
    /// Send an informational message when a price is above target or no target is set.
    pub notify_above_target: bool,
    /// Refuse to start without notification credentials.
    pub required: bool,
    pub currency_symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            products_file: PathBuf::from("config.json"),
            state_file: PathBuf::from("state.json"),
            price_log: PathBuf::from("price_log.csv"),
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window_width: 1366,
            window_height: 768,
            locale: "en-IN".to_string(),
            user_agent: None,
            sandbox: false,
            extra_args: vec!["--disable-blink-features=AutomationControlled".to_string()],
            session_state: None,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 60,
            settle_delay_ms: 1500,
            element_timeout_ms: 3000,
            retry_attempts: 1,
            retry_delay_ms: 2000,
            product_timeout_secs: 120,
        }
    }
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            notify_above_target: false,
            required: false,
            currency_symbol: "₹".to_string(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl ExtractorConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn product_timeout(&self) -> Duration {
        Duration::from_secs(self.product_timeout_secs)
    }
}

impl TelegramConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.bot_token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => Some((token, chat)),
            _ => None,
        }
    }
}

impl AppConfig {
    /// Layers defaults, an optional TOML file and `PRICEWATCH__*` variables.
    ///
    /// Without an explicit path, `pricewatch.toml` in the working directory is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name("pricewatch").required(false),
        };

        let s = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("PRICEWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_fallbacks(&mut self) {
        let telegram = &mut self.notifications.telegram;
        if telegram.bot_token.is_none() {
            telegram.bot_token = env::var("TELEGRAM_TOKEN").ok();
        }
        if telegram.chat_id.is_none() {
            telegram.chat_id = env::var("TELEGRAM_CHAT_ID").ok();
        }
        if self.browser.chrome_path.is_none() {
            self.browser.chrome_path = env::var("CHROME_PATH").ok();
        }
        if self.browser.session_state.is_none() {
            self.browser.session_state = env::var("SESSION_STATE").ok();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ex = &self.extractor;
        if ex.navigation_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "extractor.navigation_timeout_secs must be greater than 0".into(),
            ));
        }
        if ex.element_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "extractor.element_timeout_ms must be greater than 0".into(),
            ));
        }
        if ex.product_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "extractor.product_timeout_secs must be greater than 0".into(),
            ));
        }
        if ex.retry_attempts == 0 {
            return Err(ConfigError::Message(
                "extractor.retry_attempts must be at least 1".into(),
            ));
        }

        for (name, path) in [
            ("paths.products_file", &self.paths.products_file),
            ("paths.state_file", &self.paths.state_file),
            ("paths.price_log", &self.paths.price_log),
            ("paths.screenshot_dir", &self.paths.screenshot_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Message(format!("{} cannot be empty", name)));
            }
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message("browser window size must be non-zero".into()));
        }

        let telegram = &self.notifications.telegram;
        if Url::parse(&telegram.api_base).is_err() {
            return Err(ConfigError::Message(
                "notifications.telegram.api_base is not a valid URL".into(),
            ));
        }
        if self.notifications.required && telegram.credentials().is_none() {
            return Err(ConfigError::Message(
                "notifications are required but TELEGRAM_TOKEN / TELEGRAM_CHAT_ID are not set".into(),
            ));
        }

        Ok(())
    }
}
