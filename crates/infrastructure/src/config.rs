use std::collections::{BTreeMap, HashMap};

use config::{Config, ConfigError, Environment, File};
use domain::DeviceConfig;
use domain::status::StatusTemplates;
use domain::timeline::Mappings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub status_topic: Option<String>,
}

impl MqttConfig {
    /// Topic prefix for device status, `playout/<agent>/status` unless overridden
    pub fn status_topic(&self, agent_id: &str) -> String {
        self.status_topic
            .clone()
            .unwrap_or_else(|| format!("playout/{}/status", agent_id))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// JSON file with the timeline objects to play
    #[serde(default)]
    pub timeline_file: Option<String>,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,
    #[serde(default)]
    pub mappings: Mappings,
    #[serde(default)]
    pub status_templates: HashMap<String, String>,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

fn default_tick_interval() -> u64 {
    40
}

impl AgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("agent_id", "playout-agent")?
            .set_default("tick_interval_ms", default_tick_interval())?
            // Required so the agent never starts without devices
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // e.g. PLAYOUT__MQTT__HOST=10.0.0.1
            .add_source(Environment::with_prefix("PLAYOUT").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Host-supplied message overrides. Keys are status codes, which the
    /// loader may have lowercased.
    pub fn status_templates(&self) -> StatusTemplates {
        StatusTemplates::new(
            self.status_templates
                .iter()
                .map(|(code, template)| (code.to_uppercase(), template.clone()))
                .collect(),
        )
    }
}
