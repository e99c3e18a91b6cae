/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    pub workers: usize,
    pub queue_size: usize,
    pub write_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            workers: 4,
            queue_size: 64,
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl WriterConfig {
    pub(super) fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match super::yaml::normalize_key(k).as_str() {
            "workers" => {
                self.workers = super::yaml::as_usize(v)?;
                Ok(())
            }
            "queue_size" => {
                self.queue_size = super::yaml::as_usize(v)?;
                Ok(())
            }
            "write_timeout" => {
                self.write_timeout = super::yaml::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    pub(super) fn check(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("writer workers should not be 0"));
        }
        if self.queue_size == 0 {
            return Err(anyhow!("writer queue size should not be 0"));
        }
        if self.write_timeout.is_zero() {
            return Err(anyhow!("writer write timeout should not be 0"));
        }
        Ok(())
    }
}
