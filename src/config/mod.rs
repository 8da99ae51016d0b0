pub mod settings;

pub use settings::{AppConfig, NotificationConfig, SalahConfig};
