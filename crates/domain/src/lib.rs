//! Domain layer - pure model of the playout control engine, no I/O
//!
//! This crate contains:
//! - Resolved-timeline input types and mappings
//! - Commands, the status model and device events
//! - The connection-state machine and driver port
//! - The `Integration` contract and the pure half of every integration
//!
//! Principles:
//! - No dependencies on infrastructure
//! - State construction and diffing are pure functions
//! - Testable in isolation

pub mod command;
pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod integration;
pub mod status;
pub mod timeline;

// Re-export commonly used types
pub use command::{Command, CommandContext};
pub use device::{DeviceConfig, TimeoutPolicy};
pub use driver::{ConnectionState, DeviceType, ExecutionMode};
pub use error::DomainError;
pub use event::{DeviceEvent, EventPublisher};
pub use integration::Integration;
pub use status::{DeviceStatus, StatusCode, StatusDetail};
pub use timeline::{DeviceTimelineState, Mapping, Mappings, TimelineResolver};
