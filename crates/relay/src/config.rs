use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use wxlink_radio::LinkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Iridium SBD modem: acknowledged sessions through the link driver.
    Modem,
    /// Fire-and-forget packet radio on a plain serial port.
    Raw,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub station_lat: f64,
    pub station_lng: f64,
    pub device: String,
    pub baud: u32,
    pub link_mode: LinkMode,
    pub send_interval_secs: u64,
    pub maintenance_interval_secs: u64,
    pub bulletin_ttl_secs: u64,
    pub position_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            station_lat: 0.0,
            station_lng: 0.0,
            device: "/dev/ttyUSB0".to_string(),
            baud: 19_200,
            link_mode: LinkMode::Modem,
            send_interval_secs: 30,
            maintenance_interval_secs: 10,
            bulletin_ttl_secs: 3_600,
            position_interval_secs: 120,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let file = File::open(path)
            .with_context(|| format!("can't open config file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("can't parse config file {}", path.display()))
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            send_interval: Duration::from_secs(self.send_interval_secs),
            maintenance_interval: Duration::from_secs(self.maintenance_interval_secs),
            ..LinkConfig::default()
        }
    }

    pub fn bulletin_ttl(&self) -> Duration {
        Duration::from_secs(self.bulletin_ttl_secs)
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_secs(self.position_interval_secs)
    }
}
