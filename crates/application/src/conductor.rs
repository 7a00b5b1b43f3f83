use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use domain::integration::ActionResponse;
use domain::timeline::{TimelineResolver, mappings_for_device};
use domain::{DeviceConfig, DeviceStatus, DeviceTimelineState, DomainError, Mappings};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::device::{DeviceHandle, WorkerContext};
use crate::registry::DeviceRegistry;

struct WorkerEntry {
    config: DeviceConfig,
    mappings: Mappings,
    handle: DeviceHandle,
}

/// Outcome of [`Conductor::apply_configuration`]
#[derive(Debug, Default, PartialEq)]
pub struct ApplyReport {
    pub started: Vec<String>,
    pub restarted: Vec<String>,
    pub stopped: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Outcome of one tick
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub time: i64,
    pub dispatched: Vec<String>,
    pub failed: Vec<(String, DomainError)>,
}

/// Keeps one worker per configured device and fans the resolved timeline
/// out to them each tick.
pub struct Conductor {
    registry: Arc<DeviceRegistry>,
    resolver: Arc<dyn TimelineResolver>,
    context: WorkerContext,
    workers: DashMap<String, WorkerEntry>,
}

impl Conductor {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        resolver: Arc<dyn TimelineResolver>,
        context: WorkerContext,
    ) -> Self {
        Self {
            registry,
            resolver,
            context,
            workers: DashMap::new(),
        }
    }

    fn validate(
        &self,
        devices: &BTreeMap<String, DeviceConfig>,
        mappings: &Mappings,
    ) -> Result<(), DomainError> {
        for (layer, mapping) in mappings {
            if !devices.contains_key(&mapping.device_id) {
                return Err(DomainError::InvalidMapping {
                    layer: layer.clone(),
                    reason: format!("unknown device {}", mapping.device_id),
                });
            }
        }
        for (device_id, config) in devices.iter().filter(|(_, c)| !c.disable) {
            self.registry
                .get(config.device_type)?
                .validate(device_id, config, mappings)?;
        }
        Ok(())
    }

    /// Bring the running workers in line with `devices` and `mappings`.
    ///
    /// Everything is validated before any worker is touched. A device whose
    /// options or mappings changed gets a fresh worker; unchanged devices
    /// keep theirs.
    pub async fn apply_configuration(
        &self,
        devices: &BTreeMap<String, DeviceConfig>,
        mappings: &Mappings,
    ) -> Result<ApplyReport, DomainError> {
        self.validate(devices, mappings)?;
        let mut report = ApplyReport::default();

        let existing: Vec<String> = self.workers.iter().map(|e| e.key().clone()).collect();
        for device_id in existing {
            let keep = devices.get(&device_id).is_some_and(|c| !c.disable);
            if !keep {
                self.stop_worker(&device_id).await;
                report.stopped.push(device_id);
            }
        }

        for (device_id, config) in devices {
            if config.disable {
                debug!(device_id = %device_id, "Device disabled, skipping");
                continue;
            }
            let device_mappings = mappings_for_device(mappings, device_id);

            let unchanged = self
                .workers
                .get(device_id)
                .is_some_and(|e| e.config == *config && e.mappings == device_mappings);
            if unchanged {
                report.unchanged.push(device_id.clone());
                continue;
            }

            let restarted = self.stop_worker(device_id).await;
            let handle = self
                .registry
                .get(config.device_type)?
                .spawn(device_id, config, self.context.clone())?;
            info!(
                device_id = %device_id,
                device = %handle.device_name(),
                layers = device_mappings.len(),
                "Device worker started"
            );
            self.workers.insert(
                device_id.clone(),
                WorkerEntry {
                    config: config.clone(),
                    mappings: device_mappings,
                    handle,
                },
            );
            if restarted {
                report.restarted.push(device_id.clone());
            } else {
                report.started.push(device_id.clone());
            }
        }
        Ok(report)
    }

    async fn stop_worker(&self, device_id: &str) -> bool {
        match self.workers.remove(device_id) {
            Some((_, entry)) => {
                entry.handle.shutdown().await;
                info!(device_id = %device_id, "Device worker stopped");
                true
            }
            None => false,
        }
    }

    /// Resolve the timeline at `time` and hand each device its slice.
    /// Returns once every worker has the new target queued.
    pub fn resolve_and_dispatch(&self, time: i64) -> DispatchReport {
        let timeline = self.resolver.resolve(time);
        self.dispatch(&timeline)
    }

    pub fn dispatch(&self, timeline: &DeviceTimelineState) -> DispatchReport {
        let mut report = DispatchReport {
            time: timeline.time,
            ..Default::default()
        };

        for entry in self.workers.iter() {
            let device_timeline = timeline.retain_layers(entry.mappings.keys());
            match entry
                .handle
                .set_target_state(device_timeline, entry.mappings.clone())
            {
                Ok(()) => report.dispatched.push(entry.key().clone()),
                Err(e) => {
                    error!(device_id = %entry.key(), error = %e, "Dispatch to device failed");
                    report.failed.push((entry.key().clone(), e));
                }
            }
        }
        report.dispatched.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn get_status(&self, device_id: &str) -> Result<DeviceStatus, DomainError> {
        self.workers
            .get(device_id)
            .map(|entry| entry.handle.status())
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))
    }

    pub fn statuses(&self) -> BTreeMap<String, DeviceStatus> {
        self.workers
            .iter()
            .map(|entry| (entry.key().clone(), entry.handle.status()))
            .collect()
    }

    pub fn connect_device(&self, device_id: &str) -> Result<(), DomainError> {
        self.with_handle(device_id, |handle| handle.connect())
    }

    pub fn disconnect_device(&self, device_id: &str) -> Result<(), DomainError> {
        self.with_handle(device_id, |handle| handle.disconnect())
    }

    pub async fn execute_action(
        &self,
        device_id: &str,
        action_id: &str,
        payload: Option<Value>,
    ) -> Result<ActionResponse, DomainError> {
        let response =
            self.with_handle(device_id, |handle| handle.request_action(action_id, payload))?;
        response
            .await
            .map_err(|_| DomainError::WorkerUnavailable(device_id.to_string()))
    }

    fn with_handle<T>(
        &self,
        device_id: &str,
        f: impl FnOnce(&DeviceHandle) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let entry = self
            .workers
            .get(device_id)
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;
        f(&entry.handle)
    }

    /// Stop every worker and wait for their connections to close
    pub async fn shutdown(&self) {
        for device_id in self.device_ids() {
            self.stop_worker(&device_id).await;
        }
    }
}
