use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use serde_yml;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config file locations probed when no path is given on the command line
const CONFIG_PATHS: [&str; 2] = ["config/amr2mqtt.yaml", "amr2mqtt.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config found, tried {0}")]
    NotFound(String),
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
}

fn mqtt_host_default() -> String { return "127.0.0.1".to_string() }
fn mqtt_port_default() -> u16 { return 1883 }
fn mqtt_client_name_default() -> String { return "amr2mqtt".to_string() }
fn mqtt_topic_prefix_default() -> String { return "home/meters".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MqttConfig {
    #[serde(default="mqtt_host_default")]
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    #[serde(default="mqtt_topic_prefix_default")]
    pub topic_prefix: String,
    #[serde(default)]
    pub retain_default: bool,
}

fn rtlamr_enabled_default() -> bool { return true }
fn rtlamr_rtl_tcp_default() -> String { return "/usr/bin/rtl_tcp".to_string() }
fn rtlamr_rtlamr_default() -> String { return "/usr/local/bin/rtlamr".to_string() }
fn rtlamr_centerfreq_default() -> String { return "912.6M".to_string() }
fn rtlamr_startup_delay_default() -> u64 { return 5 }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RtlamrConfig {
    /// When disabled rtlamr JSON lines are read from stdin instead
    #[serde(default="rtlamr_enabled_default")]
    pub enabled: bool,
    #[serde(default="rtlamr_rtl_tcp_default")]
    pub rtl_tcp: String,
    #[serde(default="rtlamr_rtlamr_default")]
    pub rtlamr: String,
    #[serde(default="rtlamr_centerfreq_default")]
    pub centerfreq: String,
    /// Seconds to give rtl_tcp before rtlamr connects to it
    #[serde(default="rtlamr_startup_delay_default")]
    pub startup_delay: u64,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn filter_error_cooldown_default() -> u64 { return 1000 }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct FilterConfig {
    /// Republish readings identical to the last accepted one
    #[serde(default)]
    pub publish_duplicates: bool,
    /// Maximum deviation in percent from the last accepted reading
    #[serde(default)]
    pub outlier_percent: Option<f64>,
    /// Maximum absolute deviation (after the multiplier) from the last accepted reading
    #[serde(default)]
    pub outlier_absolute: Option<f64>,
    #[serde(default="filter_error_cooldown_default")]
    pub error_cooldown_ms: u64,
}

/// One entry of the `meters` list, everything but the id is optional
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MeterDeclaration {
    pub id: u64,
    pub msgtype: Option<String>,
    pub name: Option<String>,
    pub reading_field: Option<String>,
    pub multiplier: Option<Number>,
    pub other_fields: Option<Vec<String>>,
    pub retain: Option<bool>,
}

fn mqtt_default() -> MqttConfig {
    return MqttConfig {
        host: mqtt_host_default(),
        port: mqtt_port_default(),
        user: String::new(),
        pass: String::new(),
        client_name: mqtt_client_name_default(),
        topic_prefix: mqtt_topic_prefix_default(),
        retain_default: false,
    }
}
fn rtlamr_default() -> RtlamrConfig {
    return RtlamrConfig {
        enabled: rtlamr_enabled_default(),
        rtl_tcp: rtlamr_rtl_tcp_default(),
        rtlamr: rtlamr_rtlamr_default(),
        centerfreq: rtlamr_centerfreq_default(),
        startup_delay: rtlamr_startup_delay_default(),
        extra_args: Vec::new(),
    }
}
fn filter_default() -> FilterConfig {
    return FilterConfig {
        publish_duplicates: false,
        outlier_percent: None,
        outlier_absolute: None,
        error_cooldown_ms: filter_error_cooldown_default(),
    }
}
fn default_msgtype_default() -> String { return "scm".to_string() }
fn default_multiplier_default() -> Number { return Number::from(1) }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default="mqtt_default")]
    pub mqtt: MqttConfig,
    #[serde(default="rtlamr_default")]
    pub rtlamr: RtlamrConfig,
    #[serde(default="filter_default")]
    pub filter: FilterConfig,
    #[serde(default="default_msgtype_default")]
    pub default_msgtype: String,
    #[serde(default="default_multiplier_default")]
    pub default_multiplier: Number,
    #[serde(default)]
    pub meters: Vec<MeterDeclaration>,
}

impl Config {
    /// Load from `path` if given, otherwise from the first of the default locations that exists
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_string(),
            None => CONFIG_PATHS.iter()
                .find(|p| Path::new(p).exists())
                .map(|p| p.to_string())
                .ok_or_else(|| ConfigError::NotFound(CONFIG_PATHS.join(", ")))?,
        };

        debug!("Reading config from {path}");
        let contents = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&contents)?;
        info!("Config loaded from {path} with {} meter declarations", config.meters.len());
        return Ok(config);
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        return Ok(serde_yml::from_str(contents)?);
    }
}
