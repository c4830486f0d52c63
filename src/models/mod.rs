pub mod price_reading;
pub mod product;

// Re-exports for convenience
pub use price_reading::*;
pub use product::*;
