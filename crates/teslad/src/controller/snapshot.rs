use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use super::ChargeState;
use super::CommandResponse;
use super::Controller;
use super::ControllerError;
use super::DriveState;
use super::GuiSettings;
use super::VehicleId;
use super::VehicleState;
use crate::error::Error;

/// Cached view of one vehicle
#[derive(Debug)]
struct CachedVehicle {
    /// The `vehicle_data` document, facets keyed by name
    data: Value,
    online: bool,
    last_update: DateTime<Utc>,
    last_wake: DateTime<Utc>,
}

/// In-memory controller backed by `vehicle_data` snapshots.
///
/// Serves facets straight from the cached documents and applies commands to
/// them, so devices can be exercised without a network session. All access
/// to the cache goes through one mutex, and no guard is held across an
/// await point.
#[derive(Debug)]
pub struct SnapshotController {
    vehicles: Mutex<HashMap<VehicleId, CachedVehicle>>,
    update_interval: chrono::Duration,
}

impl SnapshotController {
    pub fn new(update_interval: chrono::Duration) -> Self {
        Self {
            vehicles: Mutex::new(HashMap::new()),
            update_interval,
        }
    }

    /// Add a vehicle from a `vehicle_data` document
    ///
    /// The document must carry a numeric `id`. Its `state` field decides
    /// whether the vehicle starts out online.
    pub fn insert(&self, data: Value) -> Result<VehicleId, Error> {
        let id = data
            .get("id")
            .and_then(Value::as_u64)
            .map(VehicleId)
            .ok_or_else(|| Error::InvalidSnapshot("missing numeric `id`".to_string()))?;
        let online = data.get("state").and_then(Value::as_str) == Some("online");
        let now = Utc::now();

        info!("Loaded vehicle {} (online={})", id, online);
        self.vehicles().insert(
            id,
            CachedVehicle {
                data,
                online,
                last_update: now,
                last_wake: now,
            },
        );
        Ok(id)
    }

    /// Read a `vehicle_data` document from disk
    pub fn read_document(path: impl AsRef<Path>) -> Result<Value, Error> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Io(path.as_ref().to_path_buf(), e))?;
        let data: Value = serde_json::from_str(&contents)?;
        // The API wraps vehicle_data in a `response` envelope
        Ok(match data {
            Value::Object(mut doc) if doc.contains_key("response") => {
                doc.remove("response").unwrap_or_default()
            }
            other => other,
        })
    }

    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        let mut ids: Vec<_> = self.vehicles().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Mark a vehicle as having gone to sleep or come online
    pub fn set_online(&self, id: VehicleId, online: bool) {
        if let Some(vehicle) = self.vehicles().get_mut(&id) {
            vehicle.online = online;
        }
    }

    /// Replace one facet of a vehicle's document
    pub fn set_facet(&self, id: VehicleId, facet: &str, value: Value) {
        if let Some(Value::Object(doc)) = self.vehicles().get_mut(&id).map(|v| &mut v.data) {
            doc.insert(facet.to_string(), value);
        }
    }

    fn vehicles(&self) -> MutexGuard<'_, HashMap<VehicleId, CachedVehicle>> {
        self.vehicles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn facet<T: DeserializeOwned>(&self, id: VehicleId, facet: &str) -> Option<T> {
        let raw = self.vehicles().get(&id)?.data.get(facet)?.clone();
        match serde_json::from_value(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Vehicle {}: ignoring malformed {}: {}", id, facet, e);
                None
            }
        }
    }

    fn wake(vehicle: &mut CachedVehicle, id: VehicleId) {
        info!("Waking vehicle {}", id);
        let now = Utc::now();
        vehicle.online = true;
        vehicle.last_wake = now;
        vehicle.last_update = now;
    }

    fn apply_command(vehicle: &mut CachedVehicle, name: &str, payload: &Value) -> CommandResponse {
        match name {
            "set_sentry_mode" => {
                let Some(on) = payload.get("on").and_then(Value::as_bool) else {
                    return CommandResponse::new(false, Some("invalid_payload".to_string()));
                };
                if let Value::Object(doc) = &mut vehicle.data {
                    let state = doc
                        .entry("vehicle_state")
                        .or_insert_with(|| Value::Object(Default::default()));
                    if let Value::Object(state) = state {
                        state.insert("sentry_mode".to_string(), Value::Bool(on));
                    }
                }
                CommandResponse::new(true, None)
            }
            _ => CommandResponse::new(false, Some(format!("unknown_command: {}", name))),
        }
    }
}

#[async_trait]
impl Controller for SnapshotController {
    async fn resync(&self, id: VehicleId, wake_if_asleep: bool) -> Result<(), ControllerError> {
        let mut vehicles = self.vehicles();
        let vehicle = vehicles
            .get_mut(&id)
            .ok_or(ControllerError::UnknownVehicle(id))?;

        if vehicle.online {
            vehicle.last_update = Utc::now();
        } else if wake_if_asleep {
            Self::wake(vehicle, id);
        } else {
            debug!("Vehicle {} asleep, not polling", id);
        }
        Ok(())
    }

    async fn charging_params(&self, id: VehicleId) -> Option<ChargeState> {
        self.facet(id, "charge_state")
    }

    async fn drive_params(&self, id: VehicleId) -> Option<DriveState> {
        self.facet(id, "drive_state")
    }

    async fn gui_params(&self, id: VehicleId) -> Option<GuiSettings> {
        self.facet(id, "gui_settings")
    }

    async fn state_params(&self, id: VehicleId) -> Option<VehicleState> {
        self.facet(id, "vehicle_state")
    }

    async fn is_online(&self, id: VehicleId) -> bool {
        self.vehicles().get(&id).is_some_and(|v| v.online)
    }

    async fn last_update_time(&self, id: VehicleId) -> DateTime<Utc> {
        self.vehicles()
            .get(&id)
            .map(|v| v.last_update)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    async fn last_wake_time(&self, id: VehicleId) -> DateTime<Utc> {
        self.vehicles()
            .get(&id)
            .map(|v| v.last_wake)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    fn update_interval(&self) -> chrono::Duration {
        self.update_interval
    }

    async fn send_command(
        &self,
        id: VehicleId,
        name: &str,
        payload: Value,
        wake_if_asleep: bool,
    ) -> Result<CommandResponse, ControllerError> {
        let mut vehicles = self.vehicles();
        let vehicle = vehicles
            .get_mut(&id)
            .ok_or(ControllerError::UnknownVehicle(id))?;

        if !vehicle.online {
            if !wake_if_asleep {
                return Err(ControllerError::VehicleAsleep(id));
            }
            Self::wake(vehicle, id);
        }

        let response = Self::apply_command(vehicle, name, &payload);
        info!(
            "Vehicle {}: command {} {} -> result={}",
            id,
            name,
            payload,
            response.succeeded()
        );
        Ok(response)
    }
}
