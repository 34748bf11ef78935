/*
 * This file is part of Peripheral Hub.
 *
 * Copyright (C) 2025 Peripheral Hub contributors
 *
 * Peripheral Hub is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Peripheral Hub is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Peripheral Hub. If not, see <https://www.gnu.org/licenses/>.
 */

//! Daemon configuration file
//!
//! One JSON document describing the peripheral and the simulated hardware
//! behind it:
//!
//! ```json
//! {
//!   "peripheral": { "name": "led-panel", "channels": ["R", "B"] },
//!   "simulation": { "ambient_celsius": 24.0, "stalled_fans": [2] }
//! }
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ph_core::constants::limits::MAX_CONFIG_FILE_SIZE;
use ph_core::{PeripheralConfig, SimulatedDriver};
use ph_error::{HubError, Result};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "PERIPHERAL_HUB_CONFIG";

const CONFIG_DIR_NAME: &str = "peripheral-hub";
const CONFIG_FILE_NAME: &str = "config.json";

fn default_ambient_celsius() -> f32 {
    22.0
}

/// Behaviour of the in-process hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Reading reported by every sensor
    #[serde(default = "default_ambient_celsius")]
    pub ambient_celsius: f32,
    /// Fans that report 0 RPM whatever their duty cycle
    #[serde(default)]
    pub stalled_fans: Vec<u8>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ambient_celsius: default_ambient_celsius(),
            stalled_fans: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Fresh simulated hardware for the given descriptors
    pub fn driver_for(&self, peripheral: &PeripheralConfig) -> SimulatedDriver {
        let driver = SimulatedDriver::from_config(peripheral, self.ambient_celsius);
        for fan_id in &self.stalled_fans {
            driver.set_fan_stalled(*fan_id, true);
        }
        driver
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    pub peripheral: PeripheralConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl HubConfig {
    /// Six-channel light driver with three panels, used when no file exists
    pub fn demo() -> Self {
        let mut peripheral = PeripheralConfig::new("led-driver");
        peripheral.channels = ["R", "FR", "WW", "CW", "G", "B"].iter().map(|c| c.to_string()).collect();
        peripheral.panels = vec!["left".into(), "center".into(), "right".into()];
        Self {
            peripheral,
            simulation: SimulationConfig::default(),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        self.peripheral.validate()?;

        for fan_id in &self.simulation.stalled_fans {
            if !self.peripheral.actuators.iter().any(|a| a.fan_id == *fan_id) {
                return Err(HubError::invalid_config(
                    "simulation.stalled_fans",
                    format!("fan {} is not declared in {}", fan_id, path.display()),
                ));
            }
        }
        if !self.simulation.ambient_celsius.is_finite() {
            return Err(HubError::invalid_config("simulation.ambient_celsius", "must be a finite number"));
        }
        Ok(())
    }
}

/// Default location under the user's config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Config file to load: explicit path, then `PERIPHERAL_HUB_CONFIG`, then the default
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Read, parse and validate a config file
pub fn load_config(path: &Path) -> Result<HubConfig> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HubError::FileNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(HubError::FileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(HubError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: MAX_CONFIG_FILE_SIZE,
        });
    }

    let content = fs::read_to_string(path).map_err(|source| HubError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config: HubConfig = serde_json::from_str(&content)?;
    config.validate(path)?;
    Ok(config)
}

/// Load the resolved config; a missing file at the default location yields the demo setup
///
/// A missing file that was asked for explicitly is still an error.
pub fn load_or_default(explicit: Option<&Path>) -> Result<(HubConfig, Option<PathBuf>)> {
    let requested = explicit.is_some() || env::var(CONFIG_ENV).is_ok_and(|p| !p.trim().is_empty());
    let Some(path) = config_path(explicit) else {
        return Ok((HubConfig::demo(), None));
    };

    match load_config(&path) {
        Ok(config) => Ok((config, Some(path))),
        Err(HubError::FileNotFound(_)) if !requested => Ok((HubConfig::demo(), None)),
        Err(e) => Err(e),
    }
}
