use camino::Utf8Path;
use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use serde_yml::Value;

use crate::error::ApiResult;

/// A paired bridge connection. Every bridge operation requires one; config
/// sections missing either half yield `None` instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeConnection {
    pub ip: String,
    pub username: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BridgeSection {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl BridgeSection {
    #[must_use]
    pub fn connection(&self) -> Option<BridgeConnection> {
        let ip = self.ip.as_deref()?.trim();
        let username = self.username.as_deref()?.trim();
        if ip.is_empty() || username.is_empty() {
            return None;
        }
        Some(BridgeConnection {
            ip: ip.to_string(),
            username: username.to_string(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PauselightConfig {
    pub settings_file: camino::Utf8PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub dwell_secs: u64,
    pub pair_attempts: u32,
    pub pair_delay_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    pub pauselight: PauselightConfig,
    pub preview: PreviewConfig,
}

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("pauselight.settings_file", "settings.yaml")?
        .set_default("preview.dwell_secs", 3)?
        .set_default("preview.pair_attempts", 10)?
        .set_default("preview.pair_delay_ms", 1500)?
        .add_source(config::File::with_name(filename.as_str()).required(false))
        .build()?;

    settings.try_deserialize()
}

/// Persist a freshly paired connection into the config file's bridge section,
/// leaving every other key in the file untouched.
pub fn store_bridge(filename: &Utf8Path, conn: &BridgeConnection) -> ApiResult<()> {
    let mut doc: Value = match std::fs::read_to_string(filename) {
        Ok(text) => serde_yml::from_str(&text)?,
        Err(_) => Value::Mapping(serde_yml::Mapping::new()),
    };

    if !doc.is_mapping() {
        doc = Value::Mapping(serde_yml::Mapping::new());
    }

    let mapping = doc.as_mapping_mut().expect("mapping ensured above");
    let bridge = mapping
        .entry(Value::from("bridge"))
        .or_insert_with(|| Value::Mapping(serde_yml::Mapping::new()));

    if !bridge.is_mapping() {
        *bridge = Value::Mapping(serde_yml::Mapping::new());
    }
    let bridge = bridge.as_mapping_mut().expect("mapping ensured above");
    bridge.insert(Value::from("ip"), Value::from(conn.ip.as_str()));
    bridge.insert(Value::from("username"), Value::from(conn.username.as_str()));

    std::fs::write(filename, serde_yml::to_string(&doc)?)?;
    Ok(())
}
