pub mod config;
pub mod element_finder;
pub mod models;
pub mod pipeline;
pub mod plugins;
pub mod price;
pub mod price_log;
pub mod runner;
pub mod scraper;
pub mod screenshots;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use element_finder::{PriceExtractor, SiteFamily};
pub use models::{PriceReading, Product};
pub use pipeline::CheckPipeline;
pub use runner::RunOrchestrator;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
