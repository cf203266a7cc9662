use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Device;
use super::DeviceKind;
use super::Reading;
use super::VehicleData;
use super::VehicleDevice;
use crate::controller::Controller;
use crate::error::Error;

/// Battery charge level of a vehicle
pub struct BatterySensor {
    base: VehicleDevice,
    level: u8,
    usable_level: u8,
    charging: bool,
}

impl BatterySensor {
    pub fn new(data: &VehicleData, controller: Arc<dyn Controller>) -> Result<Self, Error> {
        Ok(Self {
            base: VehicleDevice::new(data, DeviceKind::Battery, controller)?,
            level: 0,
            usable_level: 0,
            charging: false,
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Level excluding the buffer the car keeps in reserve
    pub fn usable_level(&self) -> u8 {
        self.usable_level
    }

    pub fn battery_charging(&self) -> bool {
        self.charging
    }
}

#[async_trait]
impl Device for BatterySensor {
    fn base(&self) -> &VehicleDevice {
        &self.base
    }

    async fn refresh(&mut self) {
        self.base.refresh().await;

        let Some(charge) = self.base.controller().charging_params(self.base.id()).await else {
            debug!("{}: no charge_state, keeping last level", self.base.unique_name());
            return;
        };
        self.level = charge.battery_level;
        self.usable_level = charge.usable_battery_level;
        self.charging = charge.is_charging();
    }

    fn value(&self) -> Reading {
        Reading::Percent(self.level)
    }

    fn has_battery(&self) -> bool {
        true
    }

    fn attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut attributes = serde_json::Map::new();
        attributes.insert("device_class".to_string(), "battery".into());
        attributes.insert("unit_of_measurement".to_string(), "%".into());
        attributes.insert("usable_level".to_string(), self.usable_level.into());
        attributes.insert("charging".to_string(), self.charging.into());
        attributes
    }
}
