//! Facet records returned by a controller.
//!
//! Field names follow the vehicle API's `vehicle_data` document so records
//! can be decoded straight from it. Only the fields devices consume are
//! modelled; everything else in the document is ignored.

use serde::Deserialize;
use serde::Serialize;

/// `charging_state` value reported while a charge session is active
pub const CHARGING_IN_PROGRESS: &str = "Charging";

/// Charging parameters (`charge_state`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeState {
    pub battery_level: u8,
    pub usable_battery_level: u8,
    pub charging_state: String,
    pub battery_range: f64,
    pub est_battery_range: f64,
    pub ideal_battery_range: f64,
}

impl ChargeState {
    pub fn is_charging(&self) -> bool {
        self.charging_state == CHARGING_IN_PROGRESS
    }
}

/// Driving parameters (`drive_state`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveState {
    /// One of "D", "R", "N", "P"; null or empty while the car is parked
    #[serde(default)]
    pub shift_state: Option<String>,
}

/// GUI settings (`gui_settings`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuiSettings {
    pub gui_distance_units: String,
    pub gui_range_display: String,
}

/// Vehicle state parameters (`vehicle_state`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    #[serde(default)]
    pub sentry_mode: Option<bool>,

    #[serde(default)]
    pub car_version: Option<String>,
}

/// Envelope returned for a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub result: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CommandResponse {
    pub fn new(result: bool, reason: Option<String>) -> Self {
        Self {
            response: CommandResult { result, reason },
        }
    }

    /// Whether the vehicle accepted the command
    pub fn succeeded(&self) -> bool {
        self.response.result
    }
}
