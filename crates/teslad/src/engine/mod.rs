mod engine;
mod message;
pub mod state;

pub use engine::Engine;
pub use engine::EngineHandle;
pub use state::DeviceState;
pub use state::State;
