pub mod notifier;

pub use notifier::{NotificationEvent, NotificationKind, NotificationResult, NotifierPlugin};
