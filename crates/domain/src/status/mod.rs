//! Structured device status: codes, severities, templated messages.

mod detail;
mod device_status;
mod generic;
mod severity;
mod template;

pub(crate) use detail::{context_map, private};
pub use detail::{StatusCatalog, StatusDetail, StatusTemplates};
pub use device_status::{DeviceStatus, StatusTracker};
pub use generic::GenericStatus;
pub use severity::StatusCode;
pub use template::render_template;
