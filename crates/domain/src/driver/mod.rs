mod connection_state;
mod device_driver;
mod device_type;
mod execution_mode;
mod reconnect_policy;

pub use connection_state::ConnectionState;
pub use device_driver::{
    CommandToken, DeviceDriver, DriverError, DriverEvent, DriverEventSink, SendOutcome,
};
pub use device_type::DeviceType;
pub use execution_mode::ExecutionMode;
pub use reconnect_policy::ReconnectPolicy;
