/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use http::uri::{Authority, PathAndQuery};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use yaml_rust::Yaml;

const DEFAULT_PORT: u16 = 8086;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfluxdbConfig {
    pub server: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
    pub rsp_header_max_size: usize,
}

impl Default for InfluxdbConfig {
    fn default() -> Self {
        InfluxdbConfig {
            server: format!("localhost:{DEFAULT_PORT}"),
            username: "root".to_string(),
            password: "root".to_string(),
            database: String::new(),
            connect_timeout: Duration::from_secs(10),
            rsp_header_max_size: 8192,
        }
    }
}

impl InfluxdbConfig {
    pub(super) fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match super::yaml::normalize_key(k).as_str() {
            "server" | "host" => {
                self.server = super::yaml::as_string(v)?;
                Ok(())
            }
            "username" | "user" => {
                self.username = super::yaml::as_string(v)?;
                Ok(())
            }
            "password" => {
                self.password = super::yaml::as_string(v)?;
                Ok(())
            }
            "database" | "db" => {
                self.database = super::yaml::as_string(v)?;
                Ok(())
            }
            "connect_timeout" => {
                self.connect_timeout = super::yaml::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "rsp_header_max_size" => {
                self.rsp_header_max_size = super::yaml::as_humanize_usize(v)
                    .context(format!("invalid humanize usize value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    pub(super) fn check(&self) -> anyhow::Result<()> {
        if self.database.is_empty() {
            return Err(anyhow!("database is not set"));
        }
        self.peer()?;
        Ok(())
    }

    /// The value for the Host header and the address to connect to
    pub fn peer(&self) -> anyhow::Result<(Authority, String)> {
        let authority = Authority::from_str(&self.server)
            .map_err(|e| anyhow!("invalid influxdb server address {}: {e}", self.server))?;
        if authority.host().is_empty() {
            return Err(anyhow!("no host found in influxdb server address {}", self.server));
        }
        let port = authority.port_u16().unwrap_or(DEFAULT_PORT);
        let peer = format!("{}:{port}", authority.host());
        Ok((authority, peer))
    }

    pub fn build_api_path(&self) -> anyhow::Result<PathAndQuery> {
        let path = format!(
            "/write?db={}&precision=ms",
            utf8_percent_encode(&self.database, NON_ALPHANUMERIC)
        );
        PathAndQuery::from_str(&path).map_err(|e| anyhow!("invalid influxdb api path {path}: {e}"))
    }
}
