//! Device abstraction for teslad
//!
//! A device presents one derived reading of a vehicle (battery level, range,
//! sentry mode, overall status). Several devices can share a vehicle; each
//! refreshes independently from the shared controller cache.

mod battery;
mod optimistic;
mod range;
mod sentry;
mod status;
mod vehicle;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use battery::BatterySensor;
pub use optimistic::OptimisticState;
pub use range::DistanceUnit;
pub use range::RangeSensor;
pub use sentry::SentrySwitch;
pub use status::derive_status;
pub use status::StatusSensor;
pub use status::VehicleStatus;
pub use vehicle::VehicleData;
pub use vehicle::VehicleDevice;

use crate::controller::Controller;
use crate::controller::VehicleId;
use crate::error::Error;

/// The reading type a device presents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    #[strum(serialize = "battery sensor")]
    Battery,
    #[strum(serialize = "range sensor")]
    Range,
    #[strum(serialize = "sentry switch")]
    Sentry,
    #[strum(serialize = "status sensor")]
    Status,
}

impl DeviceKind {
    /// Host platform this kind is exposed as
    pub fn platform(self) -> &'static str {
        match self {
            DeviceKind::Battery | DeviceKind::Range | DeviceKind::Status => "sensor",
            DeviceKind::Sentry => "switch",
        }
    }
}

/// Presented value of a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Percent(u8),
    Distance(f64),
    Status(VehicleStatus),
    Switch(bool),
}

/// Capability set every device exposes to the host.
///
/// Implementors embed a [`VehicleDevice`] and must run its refresh before
/// reading their own facets.
#[async_trait]
pub trait Device: Send + Sync {
    /// Shared base state
    fn base(&self) -> &VehicleDevice;

    /// Refresh the cached view from the controller
    ///
    /// Never fails: a missing facet leaves the previous reading in place.
    async fn refresh(&mut self);

    /// The presented value
    fn value(&self) -> Reading;

    fn has_battery(&self) -> bool;

    /// Kind-specific attributes reported alongside the value
    fn attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    /// Switch capability, if this device can be commanded
    fn as_switch(&mut self) -> Option<&mut dyn Switch> {
        None
    }

    fn id(&self) -> VehicleId {
        self.base().id()
    }

    fn kind(&self) -> DeviceKind {
        self.base().kind()
    }

    fn name(&self) -> String {
        self.base().name()
    }

    fn unique_name(&self) -> String {
        self.base().unique_name()
    }

    fn platform(&self) -> &'static str {
        self.kind().platform()
    }

    fn should_poll(&self) -> bool {
        self.base().should_poll()
    }

    async fn assumed_state(&self) -> bool {
        self.base().assumed_state().await
    }

    fn is_armable(&self) -> bool {
        false
    }

    fn is_armed(&self) -> bool {
        false
    }

    /// Serialize the current reading and attributes for the engine state
    fn state_json(&self) -> serde_json::Value {
        let mut attributes = self.attributes();
        attributes.insert("car_type".to_string(), self.base().car_type().into());
        attributes.insert("car_version".to_string(), self.base().car_version().into());
        serde_json::json!({
            "value": self.value(),
            "attributes": attributes,
        })
    }
}

/// Commandable on/off capability
#[async_trait]
pub trait Switch: Send + Sync {
    fn is_on(&self) -> bool;

    /// Request the on state; a failed command keeps the believed state
    async fn turn_on(&mut self);

    /// Request the off state; a failed command keeps the believed state
    async fn turn_off(&mut self);
}

/// Build every device kind for one vehicle
pub fn vehicle_devices(
    data: &VehicleData,
    controller: &Arc<dyn Controller>,
) -> Result<Vec<Box<dyn Device>>, Error> {
    Ok(vec![
        Box::new(BatterySensor::new(data, controller.clone())?),
        Box::new(RangeSensor::new(data, controller.clone())?),
        Box::new(SentrySwitch::new(data, controller.clone())?),
        Box::new(StatusSensor::new(data, controller.clone())?),
    ])
}
