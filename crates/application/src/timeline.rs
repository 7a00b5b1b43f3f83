use std::sync::RwLock;

use domain::timeline::{DeviceTimelineState, Instance, ResolvedObject, TimelineObject, TimelineResolver};

/// Reference resolver: an object is active while `time` lies inside its
/// enable window. Layering and keyframes are left to real resolvers.
#[derive(Debug, Default)]
pub struct WindowResolver {
    objects: RwLock<Vec<TimelineObject>>,
}

impl WindowResolver {
    pub fn new(objects: Vec<TimelineObject>) -> Self {
        Self {
            objects: RwLock::new(objects),
        }
    }

    /// Parse a JSON array of timeline objects
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Swap in a new timeline; the next resolve sees it
    pub fn replace(&self, objects: Vec<TimelineObject>) {
        let mut guard = self
            .objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = objects;
    }
}

impl TimelineResolver for WindowResolver {
    fn resolve(&self, time: i64) -> DeviceTimelineState {
        let objects = self
            .objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let active = objects
            .iter()
            .filter(|object| object.enable.contains(time))
            .map(|object| {
                ResolvedObject::new(
                    object.clone(),
                    Instance {
                        start: object.enable.start,
                        end: object.enable.end,
                    },
                )
            })
            .collect();
        DeviceTimelineState::new(time, active)
    }
}
