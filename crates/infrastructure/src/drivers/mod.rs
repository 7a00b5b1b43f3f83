mod abstract_device;
mod osc;
pub mod ptz;
mod websocket;

pub use abstract_device::AbstractDriver;
pub use osc::OscDriver;
pub use ptz::PtzDriver;
pub use websocket::WebsocketDriver;

use domain::Integration;
use domain::driver::DeviceDriver;
use domain::integration::abstract_device::AbstractDevice;
use domain::integration::osc::OscDevice;
use domain::integration::ptz::PtzDevice;
use domain::integration::websocket::WebsocketDevice;

/// Boxed transport for one integration's commands
pub type BoxedDriver<I> = Box<dyn DeviceDriver<<I as Integration>::Command>>;

/// Builds the transport matching an integration's options
pub trait DriverFactory: Integration {
    fn create_driver(device_id: &str, options: &Self::Options) -> BoxedDriver<Self>;
}

impl DriverFactory for AbstractDevice {
    fn create_driver(device_id: &str, options: &Self::Options) -> BoxedDriver<Self> {
        Box::new(AbstractDriver::new(Self::device_name(device_id, options)))
    }
}

impl DriverFactory for PtzDevice {
    fn create_driver(_device_id: &str, options: &Self::Options) -> BoxedDriver<Self> {
        Box::new(PtzDriver::new(options.clone()))
    }
}

impl DriverFactory for OscDevice {
    fn create_driver(_device_id: &str, options: &Self::Options) -> BoxedDriver<Self> {
        Box::new(OscDriver::new(options.clone()))
    }
}

impl DriverFactory for WebsocketDevice {
    fn create_driver(_device_id: &str, options: &Self::Options) -> BoxedDriver<Self> {
        Box::new(WebsocketDriver::new(options.clone()))
    }
}
