use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Device;
use super::DeviceKind;
use super::OptimisticState;
use super::Reading;
use super::Switch;
use super::VehicleData;
use super::VehicleDevice;
use crate::controller::Controller;
use crate::error::Error;

const SET_SENTRY_MODE: &str = "set_sentry_mode";

/// Sentry mode switch.
///
/// Commands update the believed state as soon as the car accepts them; polls
/// older than the last command attempt are ignored.
pub struct SentrySwitch {
    base: VehicleDevice,
    sentry: OptimisticState<bool>,
}

impl SentrySwitch {
    pub fn new(data: &VehicleData, controller: Arc<dyn Controller>) -> Result<Self, Error> {
        Ok(Self {
            base: VehicleDevice::new(data, DeviceKind::Sentry, controller)?,
            sentry: OptimisticState::new(false),
        })
    }

    pub fn optimistic_state(&self) -> &OptimisticState<bool> {
        &self.sentry
    }

    async fn set_sentry_mode(&mut self, on: bool) {
        if self.sentry.get() == on {
            return;
        }
        let name = self.base.unique_name();

        let accepted = match self
            .base
            .controller()
            .send_command(
                self.base.id(),
                SET_SENTRY_MODE,
                serde_json::json!({ "on": on }),
                true,
            )
            .await
        {
            Ok(resp) if resp.succeeded() => {
                info!("{}: sentry mode {}", name, if on { "enabled" } else { "disabled" });
                true
            }
            Ok(resp) => {
                warn!(
                    "{}: {} rejected: {}",
                    name,
                    SET_SENTRY_MODE,
                    resp.response.reason.as_deref().unwrap_or("no reason given")
                );
                false
            }
            Err(e) => {
                warn!("{}: {} failed: {}", name, SET_SENTRY_MODE, e);
                false
            }
        };

        self.sentry
            .record_local_mutation(Utc::now(), accepted.then_some(on));
    }
}

#[async_trait]
impl Device for SentrySwitch {
    fn base(&self) -> &VehicleDevice {
        &self.base
    }

    async fn refresh(&mut self) {
        self.base.refresh().await;
        let controller = self.base.controller().clone();
        let id = self.base.id();

        let last_update = controller.last_update_time(id).await;
        if !self.sentry.accepts(last_update) {
            debug!(
                "{}: poll from {} predates last command, ignoring",
                self.base.unique_name(),
                last_update
            );
            return;
        }

        let polled = controller
            .state_params(id)
            .await
            .and_then(|state| state.sentry_mode);
        self.sentry.apply_poll(last_update, polled);
    }

    fn value(&self) -> Reading {
        Reading::Switch(self.sentry.get())
    }

    fn has_battery(&self) -> bool {
        false
    }

    fn as_switch(&mut self) -> Option<&mut dyn Switch> {
        Some(self)
    }
}

#[async_trait]
impl Switch for SentrySwitch {
    fn is_on(&self) -> bool {
        self.sentry.get()
    }

    async fn turn_on(&mut self) {
        self.set_sentry_mode(true).await;
    }

    async fn turn_off(&mut self) {
        self.set_sentry_mode(false).await;
    }
}
