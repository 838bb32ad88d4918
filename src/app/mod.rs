pub mod controller;
pub mod event_bridge;
pub mod model_store;
pub mod setting_store;

pub use controller::AppController;
pub use event_bridge::EventBridge;
pub use model_store::ModelLifecycleStore;
pub use setting_store::SettingStore;
