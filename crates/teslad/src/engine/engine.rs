use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::message::EngineCommand;
use super::state::DeviceState;
use super::state::State;
use crate::device::Device;
use crate::error::Error;

/// Capacity for the handle→engine command channel
const COMMAND_CHANNEL_SIZE: usize = 64;

/// teslad engine
///
/// Owns every device, refreshes them on the poll interval, executes switch
/// commands, and publishes a [`State`] snapshot after each change. Devices
/// are only touched from the engine task, so none of them needs a lock.
pub struct Engine {
    devices: Vec<Box<dyn Device>>,

    /// Centralized state snapshot (readers load the Arc, the engine stores a new one)
    state: Arc<ArcSwap<State>>,

    command_rx: mpsc::Receiver<EngineCommand>,

    poll_interval: Duration,
}

/// Cloneable access to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<ArcSwap<State>>,
    command_tx: mpsc::Sender<EngineCommand>,
}

impl Engine {
    /// Create a new Engine and the first handle to it
    pub fn new(poll_interval: Duration) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let state = Arc::new(ArcSwap::from_pointee(State::default()));
        let engine = Self {
            devices: Vec::new(),
            state: state.clone(),
            command_rx,
            poll_interval,
        };
        (engine, EngineHandle { state, command_tx })
    }

    pub fn register_device(&mut self, device: Box<dyn Device>) {
        info!(
            "Registered {} {} ({})",
            device.platform(),
            device.unique_name(),
            device.name()
        );
        self.devices.push(device);
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Run the engine's main loop
    ///
    /// Polls immediately, then once per interval, handling commands in
    /// between. Returns once every [`EngineHandle`] has been dropped.
    pub async fn run(mut self) {
        info!(
            "Engine starting with {} devices, polling every {:?}",
            self.devices.len(),
            self.poll_interval
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll().await,
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
            }
        }

        info!("Engine shutting down");
    }

    /// Refresh every pollable device, then publish the new state
    ///
    /// Devices refresh one after another; each device's base refresh
    /// completes before its own facet reads.
    pub async fn poll(&mut self) {
        debug!("Polling {} devices", self.devices.len());
        for device in self.devices.iter_mut().filter(|d| d.should_poll()) {
            device.refresh().await;
        }
        self.publish().await;
    }

    /// Get a snapshot of the current engine state.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Switch {
                unique_name,
                on,
                reply,
            } => {
                info!("Handling switch command for {}: on={}", unique_name, on);
                let result = self.set_switch(&unique_name, on).await;
                if let Err(e) = &result {
                    warn!("Switch command failed: {}", e);
                }
                self.publish().await;
                // The caller may have given up waiting
                let _ = reply.send(result);
            }
            EngineCommand::Refresh { reply } => {
                self.poll().await;
                let _ = reply.send(());
            }
        }
    }

    async fn set_switch(&mut self, unique_name: &str, on: bool) -> Result<bool, Error> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.unique_name() == unique_name)
            .ok_or_else(|| Error::UnknownDevice(unique_name.to_string()))?;
        let switch = device
            .as_switch()
            .ok_or_else(|| Error::NotASwitch(unique_name.to_string()))?;

        if on {
            switch.turn_on().await;
        } else {
            switch.turn_off().await;
        }
        Ok(switch.is_on())
    }

    async fn publish(&self) {
        let previous = self.state.load_full();
        let mut state = State::default();

        for device in &self.devices {
            let device_state = DeviceState::capture(device.as_ref()).await;
            let unique_name = device.unique_name();

            if previous.device(&unique_name).map(|s| s.value) != Some(device_state.value) {
                info!(
                    "Device state changed: {} -> {}",
                    unique_name,
                    serde_json::to_string(&device_state.value).unwrap_or_default()
                );
            }
            state.devices.insert(unique_name, device_state);
        }

        self.state.store(Arc::new(state));
    }
}

impl EngineHandle {
    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Turn a switch on or off, returning its believed state afterwards
    pub async fn set_switch(&self, unique_name: impl Into<String>, on: bool) -> Result<bool, Error> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Switch {
                unique_name: unique_name.into(),
                on,
                reply,
            })
            .await
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)?
    }

    /// Ask the engine to poll every device and wait until it has
    pub async fn refresh(&self) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Refresh { reply })
            .await
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::MockController;
    use crate::controller::ChargeState;
    use crate::controller::Controller;
    use crate::controller::VehicleId;
    use crate::controller::VehicleState;
    use crate::device::vehicle_devices;
    use crate::device::Reading;
    use crate::device::VehicleData;
    use crate::device::VehicleStatus;

    const BATTERY: &str = "Tesla Model S 000001 battery sensor";
    const SENTRY: &str = "Tesla Model S 000001 sentry switch";
    const STATUS: &str = "Tesla Model S 000001 status sensor";

    fn engine(controller: &Arc<MockController>) -> (Engine, EngineHandle) {
        let data = VehicleData {
            id: VehicleId(1),
            vehicle_id: 10,
            vin: "5YJSA1E26HF000001".to_string(),
            display_name: Some("Nikola".to_string()),
            state: Some("online".to_string()),
        };
        let controller: Arc<dyn Controller> = controller.clone();
        let (mut engine, handle) = Engine::new(Duration::from_secs(3600));
        for device in vehicle_devices(&data, &controller).unwrap() {
            engine.register_device(device);
        }
        (engine, handle)
    }

    #[tokio::test]
    async fn test_poll_publishes_state() {
        let controller = Arc::new(MockController::new());
        controller.set_charge(Some(ChargeState {
            battery_level: 81,
            usable_battery_level: 80,
            charging_state: "Charging".to_string(),
            battery_range: 250.0,
            est_battery_range: 230.0,
            ideal_battery_range: 260.0,
        }));
        let (mut engine, _handle) = engine(&controller);
        assert_eq!(engine.device_count(), 4);
        assert!(engine.state_snapshot().devices.is_empty());

        engine.poll().await;

        let state = engine.state_snapshot();
        assert_eq!(state.devices.len(), 4);
        assert_eq!(state.device(BATTERY).unwrap().value, Reading::Percent(81));
        assert_eq!(
            state.device(STATUS).unwrap().value,
            Reading::Status(VehicleStatus::Charging)
        );
        assert_eq!(state.device(SENTRY).unwrap().platform, "switch");
        assert!(!state.device(BATTERY).unwrap().assumed_state);
        // Every device resyncs on its own
        assert_eq!(controller.resync_count(VehicleId(1)), 4);
    }

    #[tokio::test]
    async fn test_switch_command_through_handle() {
        let controller = Arc::new(MockController::new());
        controller.set_vehicle(Some(VehicleState {
            sentry_mode: Some(false),
            car_version: Some("2021.4.3".to_string()),
        }));
        let (engine, handle) = engine(&controller);
        let task = tokio::spawn(engine.run());

        assert!(handle.set_switch(SENTRY, true).await.unwrap());
        assert_eq!(
            handle.state_snapshot().device(SENTRY).unwrap().value,
            Reading::Switch(true)
        );
        assert_eq!(controller.sent_commands().len(), 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_switch_command_errors() {
        let controller = Arc::new(MockController::new());
        let (engine, handle) = engine(&controller);
        let task = tokio::spawn(engine.run());

        let err = handle.set_switch("no such device", true).await.unwrap_err();
        assert!(matches!(err, Error::UnknownDevice(_)));

        let err = handle.set_switch(BATTERY, true).await.unwrap_err();
        assert!(matches!(err, Error::NotASwitch(_)));
        assert!(controller.sent_commands().is_empty());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_through_handle() {
        let controller = Arc::new(MockController::new());
        let (engine, handle) = engine(&controller);
        let task = tokio::spawn(engine.run());

        handle.refresh().await.unwrap();
        controller.set_online(false);
        handle.refresh().await.unwrap();

        assert_eq!(
            handle.state_snapshot().device(STATUS).unwrap().value,
            Reading::Status(VehicleStatus::Sleeping)
        );

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_engine() {
        let controller = Arc::new(MockController::new());
        let (engine, handle) = engine(&controller);
        drop(engine);

        let err = handle.refresh().await.unwrap_err();
        assert!(matches!(err, Error::EngineStopped));
    }
}
