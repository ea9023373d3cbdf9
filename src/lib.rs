pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, cli::SessionStore, toml_config::TomlConfig, AppConfig};

pub use adapters::{http::ApiClient, memory::InMemoryBackend};
pub use app::{FormVariant, RegistrationForm};
pub use core::{
    export::{ExportFormat, RosterExporter},
    registration::RegistrationService,
    session::Session,
    workflow::{RegistrationState, RegistrationWorkflow},
};
pub use utils::error::{AppError, Result};
