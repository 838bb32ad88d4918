pub mod backend;
pub mod config;
pub mod persistence;

pub use backend::{invoke, invoke_as, Backend, CommandResult};
pub use config::ConfigStore;
pub use persistence::SettingsPersistence;
