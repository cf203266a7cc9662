//! Controller abstraction for teslad
//!
//! The controller owns the session with the vehicle API, the per-vehicle
//! cache of polled data, and wake/sleep orchestration. Devices only ever see
//! it through the [`Controller`] trait.

mod params;
pub mod snapshot;

use std::fmt;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub use params::ChargeState;
pub use params::CommandResponse;
pub use params::CommandResult;
pub use params::DriveState;
pub use params::GuiSettings;
pub use params::VehicleState;
pub use params::CHARGING_IN_PROGRESS;
pub use snapshot::SnapshotController;

/// Opaque, stable identifier of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by a controller for resyncs and commands
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("vehicle {0} is asleep")]
    VehicleAsleep(VehicleId),

    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),
}

/// Interface a controller must expose to devices.
///
/// Every facet read is optional: `None` covers both "the vehicle did not
/// report this facet" and "the record could not be decoded".
#[async_trait]
pub trait Controller: Send + Sync {
    /// Refresh the cached state for a vehicle, waking it first if asked to
    async fn resync(&self, id: VehicleId, wake_if_asleep: bool) -> Result<(), ControllerError>;

    async fn charging_params(&self, id: VehicleId) -> Option<ChargeState>;

    async fn drive_params(&self, id: VehicleId) -> Option<DriveState>;

    async fn gui_params(&self, id: VehicleId) -> Option<GuiSettings>;

    async fn state_params(&self, id: VehicleId) -> Option<VehicleState>;

    async fn is_online(&self, id: VehicleId) -> bool;

    /// Time of the last successful poll for this vehicle
    async fn last_update_time(&self, id: VehicleId) -> DateTime<Utc>;

    /// Time of the last successful wake-up for this vehicle
    async fn last_wake_time(&self, id: VehicleId) -> DateTime<Utc>;

    /// Configured interval between regular polls
    fn update_interval(&self) -> chrono::Duration;

    /// Dispatch a named command to a vehicle
    ///
    /// An `Err` means no response was obtained at all; a response whose
    /// result is `false` is a rejection, not an error.
    async fn send_command(
        &self,
        id: VehicleId,
        name: &str,
        payload: serde_json::Value,
        wake_if_asleep: bool,
    ) -> Result<CommandResponse, ControllerError>;
}
