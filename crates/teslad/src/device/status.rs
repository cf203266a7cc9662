use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::Device;
use super::DeviceKind;
use super::Reading;
use super::VehicleData;
use super::VehicleDevice;
use crate::controller::ChargeState;
use crate::controller::Controller;
use crate::controller::DriveState;
use crate::error::Error;

/// Overall activity of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
pub enum VehicleStatus {
    Sleeping,
    Charging,
    Driving,
    Parked,
    #[default]
    Unknown,
}

/// Derive the vehicle status from the online flag and the charge and drive
/// facets.
///
/// Precedence: offline, then charging, then moving, then parked. Absent
/// drive data counts as an empty shift state.
pub fn derive_status(
    online: bool,
    charge: Option<&ChargeState>,
    drive: Option<&DriveState>,
) -> VehicleStatus {
    if !online {
        return VehicleStatus::Sleeping;
    }
    if charge.is_some_and(ChargeState::is_charging) {
        return VehicleStatus::Charging;
    }
    match drive.and_then(|d| d.shift_state.as_deref()) {
        Some("D" | "R" | "N") => VehicleStatus::Driving,
        None | Some("" | "P") => VehicleStatus::Parked,
        Some(_) => VehicleStatus::Unknown,
    }
}

/// Composite status sensor: sleeping, charging, driving or parked
pub struct StatusSensor {
    base: VehicleDevice,
    status: VehicleStatus,
}

impl StatusSensor {
    pub fn new(data: &VehicleData, controller: Arc<dyn Controller>) -> Result<Self, Error> {
        Ok(Self {
            base: VehicleDevice::new(data, DeviceKind::Status, controller)?,
            status: VehicleStatus::Unknown,
        })
    }

    pub fn status(&self) -> VehicleStatus {
        self.status
    }
}

#[async_trait]
impl Device for StatusSensor {
    fn base(&self) -> &VehicleDevice {
        &self.base
    }

    async fn refresh(&mut self) {
        self.base.refresh().await;
        let controller = self.base.controller().clone();
        let id = self.base.id();

        let charge = controller.charging_params(id).await;
        let drive = controller.drive_params(id).await;
        let online = controller.is_online(id).await;

        let status = derive_status(online, charge.as_ref(), drive.as_ref());
        if status != self.status {
            tracing::debug!("{}: {} -> {}", self.base.unique_name(), self.status, status);
        }
        self.status = status;
    }

    fn value(&self) -> Reading {
        Reading::Status(self.status)
    }

    fn has_battery(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::MockController;
    use crate::controller::VehicleId;

    fn charge(state: &str) -> ChargeState {
        ChargeState {
            battery_level: 50,
            usable_battery_level: 50,
            charging_state: state.to_string(),
            battery_range: 150.0,
            est_battery_range: 140.0,
            ideal_battery_range: 160.0,
        }
    }

    fn drive(shift: Option<&str>) -> DriveState {
        DriveState {
            shift_state: shift.map(str::to_string),
        }
    }

    #[test]
    fn test_offline_dominates() {
        let status = derive_status(false, Some(&charge("Charging")), Some(&drive(Some("D"))));
        assert_eq!(status, VehicleStatus::Sleeping);
    }

    #[test]
    fn test_charging_dominates_driving() {
        let status = derive_status(true, Some(&charge("Charging")), Some(&drive(Some("D"))));
        assert_eq!(status, VehicleStatus::Charging);
    }

    #[test]
    fn test_moving_shift_states() {
        for shift in ["D", "R", "N"] {
            let status = derive_status(true, Some(&charge("Complete")), Some(&drive(Some(shift))));
            assert_eq!(status, VehicleStatus::Driving, "shift state {}", shift);
        }
    }

    #[test]
    fn test_parked_shift_states() {
        assert_eq!(
            derive_status(true, None, Some(&drive(Some("P")))),
            VehicleStatus::Parked
        );
        assert_eq!(
            derive_status(true, None, Some(&drive(Some("")))),
            VehicleStatus::Parked
        );
        assert_eq!(derive_status(true, None, Some(&drive(None))), VehicleStatus::Parked);
    }

    #[test]
    fn test_absent_drive_data_is_parked() {
        assert_eq!(derive_status(true, None, None), VehicleStatus::Parked);
        assert_eq!(
            derive_status(true, Some(&charge("Disconnected")), None),
            VehicleStatus::Parked
        );
    }

    #[test]
    fn test_unrecognised_shift_state_is_unknown() {
        assert_eq!(
            derive_status(true, None, Some(&drive(Some("SNA")))),
            VehicleStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_refresh_tracks_controller() {
        let controller = Arc::new(MockController::new());
        let data = VehicleData {
            id: VehicleId(3),
            vehicle_id: 4,
            vin: "5YJYGDEE1MF000003".to_string(),
            display_name: Some("Roamer".to_string()),
            state: None,
        };
        let mut sensor = StatusSensor::new(&data, controller.clone()).unwrap();
        assert_eq!(sensor.value(), Reading::Status(VehicleStatus::Unknown));

        controller.set_drive(Some(drive(Some("D"))));
        sensor.refresh().await;
        assert_eq!(sensor.status(), VehicleStatus::Driving);

        controller.set_online(false);
        sensor.refresh().await;
        assert_eq!(sensor.status(), VehicleStatus::Sleeping);
        assert_eq!(sensor.name(), "Roamer status sensor");
    }
}
