//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_gauge_cal::ProtocolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default SocketCAN device
pub const DEFAULT_DEVICE: &str = "can0";

/// Application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// SocketCAN device
    pub device: Option<String>,
    /// DBC file describing the vehicle's CAN messages
    pub dbc: Option<PathBuf>,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Per-channel signal names and table files
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChannelsConfig {
    pub tach: Option<ChannelConfig>,
    pub speed: Option<ChannelConfig>,
    pub an1: Option<ChannelConfig>,
    pub an2: Option<ChannelConfig>,
    pub an3: Option<ChannelConfig>,
    pub an4: Option<ChannelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChannelConfig {
    pub signal: Option<String>,
    pub table: Option<PathBuf>,
}

impl ChannelsConfig {
    pub fn get(&self, channel: Channel) -> Option<&ChannelConfig> {
        match channel {
            Channel::Tach => self.tach.as_ref(),
            Channel::Speed => self.speed.as_ref(),
            Channel::An1 => self.an1.as_ref(),
            Channel::An2 => self.an2.as_ref(),
            Channel::An3 => self.an3.as_ref(),
            Channel::An4 => self.an4.as_ref(),
        }
    }
}

/// A gauge output of the interface
///
/// The discriminant is the signal slot the device stores the channel in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Channel {
    Tach = 0,
    Speed = 1,
    An1 = 2,
    An2 = 3,
    An3 = 4,
    An4 = 5,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Tach,
        Channel::Speed,
        Channel::An1,
        Channel::An2,
        Channel::An3,
        Channel::An4,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Short name used in flags and config keys
    pub fn name(self) -> &'static str {
        match self {
            Channel::Tach => "tach",
            Channel::Speed => "speed",
            Channel::An1 => "an1",
            Channel::An2 => "an2",
            Channel::An3 => "an3",
            Channel::An4 => "an4",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Channel::Tach => "tachometer",
            Channel::Speed => "speedometer",
            Channel::An1 => "analog channel 1",
            Channel::An2 => "analog channel 2",
            Channel::An3 => "analog channel 3",
            Channel::An4 => "analog channel 4",
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            device = "vcan0"
            dbc = "vehicle.dbc"

            [protocol]
            timeout_ms = 500

            [channels.tach]
            signal = "EngineSpeed"
            table = "tach.csv"

            [channels.an2]
            table = "oil.csv"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.as_deref(), Some("vcan0"));
        assert_eq!(config.dbc, Some(PathBuf::from("vehicle.dbc")));
        assert_eq!(config.protocol.timeout_ms, 500);
        assert_eq!(config.protocol.max_attempts, 8);

        let tach = config.channels.get(Channel::Tach).unwrap();
        assert_eq!(tach.signal.as_deref(), Some("EngineSpeed"));
        assert!(config.channels.get(Channel::Speed).is_none());
        assert!(config.channels.get(Channel::An2).unwrap().signal.is_none());
    }

    #[test]
    fn test_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.device.is_none());
        assert_eq!(config.protocol, ProtocolConfig::default());
    }

    #[test]
    fn test_load_config_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"device = \"can1\"\n").unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.device.as_deref(), Some("can1"));

        assert!(load_config(Path::new("/nonexistent/config.toml")).is_err());
    }

    #[test]
    fn test_channel_slots() {
        let indices: Vec<u8> = Channel::ALL.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(Channel::An3.name(), "an3");
    }
}
