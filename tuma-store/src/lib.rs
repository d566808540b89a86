pub mod app_config;
pub mod mailer;
pub mod memory;

pub use app_config::{AuthConfig, Config, ServerConfig};
pub use mailer::LogMailer;
pub use memory::InMemoryStore;
