use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;
use tracing::warn;

use super::DeviceKind;
use crate::controller::Controller;
use crate::controller::VehicleId;
use crate::error::Error;

/// Identity fields of the initial `vehicle_data` snapshot
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VehicleData {
    pub id: VehicleId,
    pub vehicle_id: u64,
    pub vin: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl VehicleData {
    /// Extract the identity fields from a snapshot document
    pub fn from_json(value: &serde_json::Value) -> Result<Self, Error> {
        let data = Self::deserialize(value).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        check_vin(&data.vin)?;
        Ok(data)
    }
}

/// State shared by every device kind: identity, software version and the
/// assumed-state policy.
pub struct VehicleDevice {
    id: VehicleId,
    vehicle_id: u64,
    vin: String,
    display_name: Option<String>,
    car_type: String,
    car_version: String,
    kind: DeviceKind,
    should_poll: bool,
    controller: Arc<dyn Controller>,
}

impl VehicleDevice {
    pub fn new(
        data: &VehicleData,
        kind: DeviceKind,
        controller: Arc<dyn Controller>,
    ) -> Result<Self, Error> {
        check_vin(&data.vin)?;
        let car_type = format!("Model {}", model_letter(&data.vin));

        Ok(Self {
            id: data.id,
            vehicle_id: data.vehicle_id,
            vin: data.vin.clone(),
            display_name: data.display_name.clone(),
            car_type,
            car_version: String::new(),
            kind,
            should_poll: true,
            controller,
        })
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn vehicle_id(&self) -> u64 {
        self.vehicle_id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn should_poll(&self) -> bool {
        self.should_poll
    }

    /// "Model X" derived from the fourth VIN character
    pub fn car_type(&self) -> &str {
        &self.car_type
    }

    /// Software version; empty until the first successful read
    pub fn car_version(&self) -> &str {
        &self.car_version
    }

    pub fn controller(&self) -> &Arc<dyn Controller> {
        &self.controller
    }

    fn vin_suffix(&self) -> &str {
        &self.vin[self.vin.len() - 6..]
    }

    /// A display name set by the owner, ignoring the API's VIN-suffix default
    fn custom_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|name| *name != self.vin_suffix())
    }

    pub fn car_name(&self) -> String {
        match self.custom_name() {
            Some(name) => name.to_string(),
            None => format!("Tesla {}", self.car_type),
        }
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.car_name(), self.kind)
    }

    pub fn unique_name(&self) -> String {
        format!("Tesla {} {} {}", self.car_type, self.vin_suffix(), self.kind)
    }

    /// Resync with the controller (without waking the car), then pick up the
    /// software version if the vehicle reported one.
    pub async fn refresh(&mut self) {
        if let Err(e) = self.controller.resync(self.id, false).await {
            warn!("{}: resync failed: {}", self.unique_name(), e);
        }

        match self
            .controller
            .state_params(self.id)
            .await
            .and_then(|state| state.car_version)
        {
            Some(version) => self.car_version = version,
            None => debug!("{}: no car_version reported", self.unique_name()),
        }
    }

    /// Whether cached readings should be treated as unconfirmed.
    ///
    /// True when the vehicle is offline and more than one update interval
    /// passed between its last wake-up and the last successful update.
    pub async fn assumed_state(&self) -> bool {
        if self.controller.is_online(self.id).await {
            return false;
        }
        let last_update = self.controller.last_update_time(self.id).await;
        let last_wake = self.controller.last_wake_time(self.id).await;
        last_update - last_wake > self.controller.update_interval()
    }
}

/// The model letter and the unique name both index into the VIN
fn check_vin(vin: &str) -> Result<(), Error> {
    if vin.is_ascii() && vin.len() >= 6 {
        Ok(())
    } else {
        Err(Error::InvalidSnapshot(format!("malformed VIN {:?}", vin)))
    }
}

fn model_letter(vin: &str) -> char {
    vin.chars()
        .nth(3)
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('?')
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::Utc;

    use super::*;
    use crate::controller::mock::MockController;
    use crate::controller::VehicleState;

    fn data(display_name: Option<&str>) -> VehicleData {
        VehicleData {
            id: VehicleId(12345678901234567),
            vehicle_id: 1234567890,
            vin: "5yjsa11111111111".to_string(),
            display_name: display_name.map(str::to_string),
            state: Some("online".to_string()),
        }
    }

    fn device(controller: &Arc<MockController>, display_name: Option<&str>) -> VehicleDevice {
        VehicleDevice::new(&data(display_name), DeviceKind::Battery, controller.clone()).unwrap()
    }

    #[test]
    fn test_identity_and_names() {
        let controller = Arc::new(MockController::new());
        let device = device(&controller, Some("Nikola"));

        assert_eq!(device.id(), VehicleId(12345678901234567));
        assert_eq!(device.vehicle_id(), 1234567890);
        assert_eq!(device.car_type(), "Model S");
        assert_eq!(device.car_version(), "");
        assert!(device.should_poll());
        assert_eq!(device.name(), "Nikola battery sensor");
        assert_eq!(device.unique_name(), "Tesla Model S 111111 battery sensor");
    }

    #[test]
    fn test_name_falls_back_when_display_name_is_vin_suffix() {
        let controller = Arc::new(MockController::new());

        let device = device(&controller, Some("111111"));
        assert_eq!(device.name(), "Tesla Model S battery sensor");

        let device = VehicleDevice::new(&data(None), DeviceKind::Sentry, controller).unwrap();
        assert_eq!(device.car_name(), "Tesla Model S");
        assert_eq!(device.name(), "Tesla Model S sentry switch");
    }

    #[test]
    fn test_from_json_requires_identity() {
        let err = VehicleData::from_json(&serde_json::json!({
            "vehicle_id": 1,
            "vin": "5YJSA11111111111",
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));

        let err = VehicleData::from_json(&serde_json::json!({
            "id": 1,
            "vehicle_id": 1,
            "vin": "5YJ",
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }

    #[tokio::test]
    async fn test_refresh_resyncs_without_wake_and_reads_version() {
        let controller = Arc::new(MockController::new());
        let mut device = device(&controller, None);

        controller.set_vehicle(Some(VehicleState {
            sentry_mode: Some(false),
            car_version: Some("2020.12.5 6f4b3ebc5c4d".to_string()),
        }));
        device.refresh().await;

        assert_eq!(controller.resync_count(device.id()), 1);
        assert_eq!(device.car_version(), "2020.12.5 6f4b3ebc5c4d");

        // A later poll without the facet keeps the known version
        controller.set_vehicle(None);
        device.refresh().await;
        assert_eq!(device.car_version(), "2020.12.5 6f4b3ebc5c4d");
    }

    #[tokio::test]
    async fn test_refresh_reads_cache_when_resync_fails() {
        let controller = Arc::new(MockController::new());
        let mut device = device(&controller, None);
        controller.set_resync_error(true);

        controller.set_vehicle(Some(VehicleState {
            sentry_mode: None,
            car_version: Some("2021.4.3".to_string()),
        }));
        device.refresh().await;

        assert_eq!(controller.resync_count(device.id()), 1);
        assert_eq!(device.car_version(), "2021.4.3");

        controller.set_vehicle(None);
        device.refresh().await;
        assert_eq!(device.car_version(), "2021.4.3");
    }

    #[tokio::test]
    async fn test_assumed_state_requires_offline_and_stale() {
        let controller = Arc::new(MockController::new());
        let device = device(&controller, None);
        let now = Utc::now();

        // Online and stale
        controller.set_online(true);
        controller.set_last_wake(now - Duration::hours(1));
        controller.set_last_update(now);
        assert!(!device.assumed_state().await);

        // Offline and stale
        controller.set_online(false);
        assert!(device.assumed_state().await);

        // Offline but within the interval
        controller.set_last_wake(now - Duration::seconds(30));
        assert!(!device.assumed_state().await);
    }
}
