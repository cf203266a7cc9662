use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::Device;
use super::DeviceKind;
use super::Reading;
use super::VehicleData;
use super::VehicleDevice;
use crate::controller::Controller;
use crate::error::Error;

/// `gui_distance_units` value of a car set up for imperial units
const IMPERIAL_DISTANCE_UNITS: &str = "mi/hr";

/// `gui_range_display` value selecting rated range
const RATED_RANGE_DISPLAY: &str = "Rated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
pub enum DistanceUnit {
    #[default]
    #[serde(rename = "mi")]
    #[strum(serialize = "mi")]
    Miles,
    #[serde(rename = "km")]
    #[strum(serialize = "km")]
    Kilometers,
}

/// Remaining driving range of a vehicle
///
/// Presents rated or ideal range, following the car's own display setting.
pub struct RangeSensor {
    base: VehicleDevice,
    battery_range: f64,
    est_battery_range: f64,
    ideal_battery_range: f64,
    rated: bool,
    unit: DistanceUnit,
}

impl RangeSensor {
    pub fn new(data: &VehicleData, controller: Arc<dyn Controller>) -> Result<Self, Error> {
        Ok(Self {
            base: VehicleDevice::new(data, DeviceKind::Range, controller)?,
            battery_range: 0.0,
            est_battery_range: 0.0,
            ideal_battery_range: 0.0,
            rated: true,
            unit: DistanceUnit::Miles,
        })
    }

    /// Range as estimated from recent driving
    pub fn estimated_range(&self) -> f64 {
        self.est_battery_range
    }

    pub fn is_rated(&self) -> bool {
        self.rated
    }

    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    fn presented_range(&self) -> f64 {
        if self.rated {
            self.battery_range
        } else {
            self.ideal_battery_range
        }
    }
}

#[async_trait]
impl Device for RangeSensor {
    fn base(&self) -> &VehicleDevice {
        &self.base
    }

    async fn refresh(&mut self) {
        self.base.refresh().await;
        let controller = self.base.controller().clone();
        let id = self.base.id();

        match controller.charging_params(id).await {
            Some(charge) => {
                self.battery_range = charge.battery_range;
                self.est_battery_range = charge.est_battery_range;
                self.ideal_battery_range = charge.ideal_battery_range;
            }
            None => debug!("{}: no charge_state, keeping last range", self.base.unique_name()),
        }

        match controller.gui_params(id).await {
            Some(gui) => {
                self.unit = if gui.gui_distance_units == IMPERIAL_DISTANCE_UNITS {
                    DistanceUnit::Miles
                } else {
                    DistanceUnit::Kilometers
                };
                self.rated = gui.gui_range_display == RATED_RANGE_DISPLAY;
            }
            None => debug!("{}: no gui_settings, keeping display mode", self.base.unique_name()),
        }
    }

    fn value(&self) -> Reading {
        Reading::Distance(self.presented_range())
    }

    fn has_battery(&self) -> bool {
        false
    }

    fn attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut attributes = serde_json::Map::new();
        attributes.insert("unit_of_measurement".to_string(), self.unit.to_string().into());
        attributes.insert("rated".to_string(), self.rated.into());
        attributes.insert("estimated_range".to_string(), self.est_battery_range.into());
        attributes
    }
}
