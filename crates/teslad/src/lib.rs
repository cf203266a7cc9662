pub mod api;
pub mod config;
pub mod controller;
pub mod device;
mod engine;
pub mod error;

pub use config::Config;
pub use config::LogLevel;
pub use controller::Controller;
pub use controller::SnapshotController;
pub use controller::VehicleId;
pub use device::Device;
pub use device::Reading;
pub use device::Switch;
pub use engine::DeviceState;
pub use engine::Engine;
pub use engine::EngineHandle;
pub use engine::State;
pub use error::Error;
