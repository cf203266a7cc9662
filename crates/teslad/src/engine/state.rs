use std::collections::BTreeMap;

use serde::Serialize;

use crate::controller::VehicleId;
use crate::device::Device;
use crate::device::DeviceKind;
use crate::device::Reading;

/// Published view of a single device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub vehicle_id: VehicleId,
    pub name: String,
    pub kind: DeviceKind,
    pub platform: &'static str,
    pub value: Reading,

    /// The vehicle is offline and the value may be out of date
    pub assumed_state: bool,

    pub attributes: serde_json::Value,
}

impl DeviceState {
    pub async fn capture(device: &dyn Device) -> Self {
        let mut state = device.state_json();
        Self {
            vehicle_id: device.id(),
            name: device.name(),
            kind: device.kind(),
            platform: device.platform(),
            value: device.value(),
            assumed_state: device.assumed_state().await,
            attributes: state
                .get_mut("attributes")
                .map(serde_json::Value::take)
                .unwrap_or_default(),
        }
    }
}

/// Snapshot of every device, keyed by unique name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub devices: BTreeMap<String, DeviceState>,
}

impl State {
    pub fn device(&self, unique_name: &str) -> Option<&DeviceState> {
        self.devices.get(unique_name)
    }
}
