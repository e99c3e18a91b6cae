/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader};

use crate::process::CounterResetAction;

mod yaml;

mod influxdb;
pub use influxdb::InfluxdbConfig;

mod writer;
pub use writer::WriterConfig;

pub const DEFAULT_LISTEN_PORT: u16 = 8096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen: SocketAddr,
    pub typesdb: PathBuf,
    /// `-` means stderr
    pub log_file: PathBuf,
    pub verbose: bool,
    pub normalize: bool,
    pub counter_reset: CounterResetAction,
    pub cache_expire: Option<Duration>,
    pub shutdown_grace: Duration,
    pub influxdb: InfluxdbConfig,
    pub writer: WriterConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_LISTEN_PORT),
            typesdb: PathBuf::from("types.db"),
            log_file: PathBuf::from("proxy.log"),
            verbose: false,
            normalize: true,
            counter_reset: CounterResetAction::default(),
            cache_expire: Some(Duration::from_secs(1800)),
            shutdown_grace: Duration::from_secs(5),
            influxdb: InfluxdbConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

impl ProxyConfig {
    pub fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read config file {}: {e}", path.display()))?;
        self.load_str(&content, path.parent())
            .context(format!("failed to load config file {}", path.display()))
    }

    pub(crate) fn load_str(&mut self, content: &str, conf_dir: Option<&Path>) -> anyhow::Result<()> {
        let docs =
            YamlLoader::load_from_str(content).map_err(|e| anyhow!("invalid yaml: {e}"))?;
        for doc in docs {
            match doc {
                Yaml::Hash(map) => yaml::foreach_kv(&map, |k, v| self.set(k, v, conf_dir))?,
                Yaml::Null => {}
                _ => return Err(anyhow!("root type of the yaml doc should be map")),
            }
        }
        Ok(())
    }

    fn set(&mut self, k: &str, v: &Yaml, conf_dir: Option<&Path>) -> anyhow::Result<()> {
        match yaml::normalize_key(k).as_str() {
            "listen" => {
                self.listen = yaml::as_sockaddr(v)?;
                Ok(())
            }
            "typesdb" | "types_db" => {
                self.typesdb = yaml::as_file_path(v, conf_dir)?;
                Ok(())
            }
            "log_file" => {
                if matches!(v, Yaml::String(s) if s == "-") {
                    self.log_file = PathBuf::from("-");
                } else {
                    self.log_file = yaml::as_file_path(v, conf_dir)?;
                }
                Ok(())
            }
            "verbose" => {
                self.verbose = yaml::as_bool(v)?;
                Ok(())
            }
            "normalize" => {
                self.normalize = yaml::as_bool(v)?;
                Ok(())
            }
            "counter_reset" => {
                let s = yaml::as_string(v)?;
                self.counter_reset = CounterResetAction::from_str(&s)?;
                Ok(())
            }
            "cache_expire" => {
                let timeout = yaml::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                self.cache_expire = if timeout.is_zero() {
                    None
                } else {
                    Some(timeout)
                };
                Ok(())
            }
            "shutdown_grace" => {
                self.shutdown_grace = yaml::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "influxdb" => {
                let map = yaml::as_hash(v)?;
                yaml::foreach_kv(map, |k, v| self.influxdb.set(k, v))
            }
            "writer" => {
                let map = yaml::as_hash(v)?;
                yaml::foreach_kv(map, |k, v| self.writer.set(k, v))
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        self.influxdb.check().context("invalid influxdb config")?;
        self.writer.check().context("invalid writer config")?;
        Ok(())
    }

    pub fn log_to_stderr(&self) -> bool {
        self.log_file.as_os_str() == "-"
    }
}
