// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration file loading. Every section and field is optional; the
//! system runs with the defaults below when no config exists.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use smartlearn_core::SchedulerTuning;

use crate::error::Fallible;

/// The config file looked up in the working directory when no path is
/// given.
pub const DEFAULT_CONFIG_PATH: &str = "smartlearn.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub cache: CacheSection,
    pub scheduler: SchedulerTuning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub default_ttl_secs: i64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_ttl_secs: crate::cache::DEFAULT_TTL_SECS,
        }
    }
}

/// Loads the config from `path`, or from `smartlearn.toml` if it exists,
/// or the defaults.
pub fn load(path: Option<&str>) -> Fallible<Config> {
    match path {
        Some(path) => parse(path),
        None => {
            if Path::new(DEFAULT_CONFIG_PATH).exists() {
                parse(DEFAULT_CONFIG_PATH)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn parse(path: &str) -> Fallible<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    log::debug!("loaded config from {path}");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(config.scheduler, SchedulerTuning::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smartlearn.toml");
        write(
            &path,
            "[server]\nport = 9001\n\n[scheduler]\ngrowth_factor = 3.0\n",
        )
        .unwrap();
        let config = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.scheduler.growth_factor, 3.0);
        assert_eq!(
            config.scheduler.relearn_step_minutes,
            SchedulerTuning::default().relearn_step_minutes
        );
    }

    #[test]
    fn test_malformed_config_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smartlearn.toml");
        write(&path, "[server\nport = nine").unwrap();
        assert!(load(Some(path.to_str().unwrap())).is_err());
    }
}
