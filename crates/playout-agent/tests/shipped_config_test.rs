use application::{DeviceRegistry, WindowResolver};
use domain::timeline::TimelineResolver;
use infrastructure::config::AgentConfig;

fn config_dir() -> String {
    format!("{}/config", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_shipped_configuration_is_valid() {
    let config = AgentConfig::load(&config_dir()).expect("default.toml should load");
    let registry = DeviceRegistry::with_default_devices();

    for (device_id, device) in &config.devices {
        registry
            .get(device.device_type)
            .unwrap()
            .validate(device_id, device, &config.mappings)
            .unwrap_or_else(|e| panic!("{} is invalid: {}", device_id, e));
    }
    for (layer, mapping) in &config.mappings {
        assert!(
            config.devices.contains_key(&mapping.device_id),
            "{} maps to unknown device {}",
            layer,
            mapping.device_id
        );
    }
    assert!(!config.status_templates().is_empty());
}

#[test]
fn test_shipped_timeline_parses() {
    let config = AgentConfig::load(&config_dir()).unwrap();
    let file = config.timeline_file.expect("timeline_file is set");
    let json = std::fs::read_to_string(format!("{}/{}", config_dir(), file)).unwrap();

    let resolver = WindowResolver::from_json(&json).unwrap();
    let state = resolver.resolve(1_000);
    assert_eq!(state.objects.len(), 3);
    for object in &state.objects {
        assert!(config.mappings.contains_key(object.layer()));
    }
}
