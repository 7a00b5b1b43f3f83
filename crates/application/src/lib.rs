//! Application layer - per-device workers, dispatch queue and the conductor

pub mod conductor;
pub mod device;
pub mod messaging;
pub mod queue;
pub mod registry;
pub mod timeline;

pub use conductor::{ApplyReport, Conductor, DispatchReport};
pub use device::{DeviceHandle, WorkerContext};
pub use messaging::ChannelEventPublisher;
pub use registry::{DeviceRegistration, DeviceRegistry, Registration};
pub use timeline::WindowResolver;
