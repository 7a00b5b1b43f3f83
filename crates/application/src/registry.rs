use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use domain::integration::{ActionDefinition, parse_options};
use domain::timeline::{Mappings, mappings_for_device};
use domain::{DeviceConfig, DeviceType, DomainError, ExecutionMode, Integration};
use infrastructure::drivers::{BoxedDriver, DriverFactory};
use serde_json::Value;

use crate::device::{DeviceHandle, DeviceWorker, WorkerContext};

/// Type-erased view of one integration, as the conductor sees it
pub trait DeviceRegistration: Send + Sync {
    fn device_type(&self) -> DeviceType;

    fn can_connect(&self) -> bool;

    fn device_name(&self, device_id: &str, options: &Value) -> Result<String, DomainError>;

    fn execution_mode(&self, options: &Value) -> Result<ExecutionMode, DomainError>;

    fn action_manifest(&self) -> &'static [ActionDefinition];

    /// Ids the action table can execute
    fn action_ids(&self) -> Vec<&'static str>;

    /// Check options and every mapping that targets this device
    fn validate(
        &self,
        device_id: &str,
        config: &DeviceConfig,
        mappings: &Mappings,
    ) -> Result<(), DomainError>;

    fn spawn(
        &self,
        device_id: &str,
        config: &DeviceConfig,
        context: WorkerContext,
    ) -> Result<DeviceHandle, DomainError>;
}

type DriverConstructor<I> =
    Arc<dyn Fn(&str, &<I as Integration>::Options) -> BoxedDriver<I> + Send + Sync>;

/// Registration of integration `I` with the driver it connects through
pub struct Registration<I: Integration> {
    create_driver: DriverConstructor<I>,
    _integration: PhantomData<fn() -> I>,
}

impl<I: DriverFactory> Registration<I> {
    pub fn new() -> Self {
        Self::with_driver(I::create_driver)
    }
}

impl<I: DriverFactory> Default for Registration<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Integration> Registration<I> {
    /// Use a custom transport, e.g. a simulator
    pub fn with_driver(
        create_driver: impl Fn(&str, &I::Options) -> BoxedDriver<I> + Send + Sync + 'static,
    ) -> Self {
        Self {
            create_driver: Arc::new(create_driver),
            _integration: PhantomData,
        }
    }
}

impl<I: Integration> DeviceRegistration for Registration<I> {
    fn device_type(&self) -> DeviceType {
        I::DEVICE_TYPE
    }

    fn can_connect(&self) -> bool {
        I::CAN_CONNECT
    }

    fn device_name(&self, device_id: &str, options: &Value) -> Result<String, DomainError> {
        let options = parse_options::<I>(options)?;
        Ok(I::device_name(device_id, &options))
    }

    fn execution_mode(&self, options: &Value) -> Result<ExecutionMode, DomainError> {
        let options = parse_options::<I>(options)?;
        Ok(I::execution_mode(&options))
    }

    fn action_manifest(&self) -> &'static [ActionDefinition] {
        I::action_manifest()
    }

    fn action_ids(&self) -> Vec<&'static str> {
        I::actions().ids().collect()
    }

    fn validate(
        &self,
        device_id: &str,
        config: &DeviceConfig,
        mappings: &Mappings,
    ) -> Result<(), DomainError> {
        if device_id.trim().is_empty() {
            return Err(DomainError::InvalidDeviceId(device_id.to_string()));
        }
        let options = parse_options::<I>(&config.options)?;
        I::validate_options(&options)?;
        for (layer, mapping) in mappings_for_device(mappings, device_id) {
            I::validate_mapping(&layer, &mapping)?;
        }
        Ok(())
    }

    fn spawn(
        &self,
        device_id: &str,
        config: &DeviceConfig,
        context: WorkerContext,
    ) -> Result<DeviceHandle, DomainError> {
        let create_driver = self.create_driver.clone();
        DeviceWorker::<I>::spawn(
            device_id,
            config,
            move |options| create_driver(device_id, options),
            context,
        )
    }
}

/// Device type -> integration lookup, built once at startup
#[derive(Default)]
pub struct DeviceRegistry {
    entries: BTreeMap<DeviceType, Arc<dyn DeviceRegistration>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every integration with its production driver
    pub fn with_default_devices() -> Self {
        use domain::integration::abstract_device::AbstractDevice;
        use domain::integration::osc::OscDevice;
        use domain::integration::ptz::PtzDevice;
        use domain::integration::websocket::WebsocketDevice;

        Self::new()
            .register(Registration::<AbstractDevice>::new())
            .register(Registration::<PtzDevice>::new())
            .register(Registration::<OscDevice>::new())
            .register(Registration::<WebsocketDevice>::new())
    }

    /// Add or replace the registration for its device type
    pub fn register(mut self, registration: impl DeviceRegistration + 'static) -> Self {
        self.entries
            .insert(registration.device_type(), Arc::new(registration));
        self
    }

    pub fn get(&self, device_type: DeviceType) -> Result<&Arc<dyn DeviceRegistration>, DomainError> {
        self.entries
            .get(&device_type)
            .ok_or_else(|| DomainError::UnknownDeviceType(device_type.to_string()))
    }

    pub fn device_types(&self) -> impl Iterator<Item = DeviceType> + '_ {
        self.entries.keys().copied()
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Arc<dyn DeviceRegistration>> {
        self.entries.values()
    }
}
