//! Resolved-timeline input as delivered by the external timeline resolver.

mod mapping;
mod object;

pub use mapping::{Mapping, Mappings, mappings_for_device};
pub use object::{
    DeviceTimelineState, Enable, Instance, ResolvedObject, TimelineContent, TimelineObject,
};

/// Produces the set of active timeline objects at an instant.
/// The layering/keyframe algebra lives behind this port.
pub trait TimelineResolver: Send + Sync {
    fn resolve(&self, time: i64) -> DeviceTimelineState;
}
