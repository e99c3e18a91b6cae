/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;

mod value;
pub use value::MetricValue;

mod series;
pub(crate) use series::SeriesPrefix;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSourceKind {
    Counter,
    Gauge,
    Derive,
    Absolute,
}

impl DataSourceKind {
    pub(crate) fn from_wire(v: u8) -> Option<Self> {
        match v {
            0 => Some(DataSourceKind::Counter),
            1 => Some(DataSourceKind::Gauge),
            2 => Some(DataSourceKind::Derive),
            3 => Some(DataSourceKind::Absolute),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceKind::Counter => "COUNTER",
            DataSourceKind::Gauge => "GAUGE",
            DataSourceKind::Derive => "DERIVE",
            DataSourceKind::Absolute => "ABSOLUTE",
        }
    }

    /// Cumulative kinds need the previous observation to produce a rate
    pub fn is_cumulative(&self) -> bool {
        matches!(self, DataSourceKind::Counter | DataSourceKind::Derive)
    }
}

impl FromStr for DataSourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("counter") {
            Ok(DataSourceKind::Counter)
        } else if s.eq_ignore_ascii_case("gauge") {
            Ok(DataSourceKind::Gauge)
        } else if s.eq_ignore_ascii_case("derive") {
            Ok(DataSourceKind::Derive)
        } else if s.eq_ignore_ascii_case("absolute") {
            Ok(DataSourceKind::Absolute)
        } else {
            Err(anyhow!("unknown data source type {s}"))
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleValue {
    pub kind: DataSourceKind,
    pub value: MetricValue,
}

impl SampleValue {
    pub fn new(kind: DataSourceKind, value: MetricValue) -> Self {
        SampleValue { kind, value }
    }

    pub fn gauge(v: f64) -> Self {
        SampleValue::new(DataSourceKind::Gauge, MetricValue::Double(v))
    }

    pub fn counter(v: u64) -> Self {
        SampleValue::new(DataSourceKind::Counter, MetricValue::Unsigned(v))
    }

    pub fn derive(v: i64) -> Self {
        SampleValue::new(DataSourceKind::Derive, MetricValue::Signed(v))
    }

    pub fn absolute(v: u64) -> Self {
        SampleValue::new(DataSourceKind::Absolute, MetricValue::Unsigned(v))
    }
}

/// One decoded collectd value list.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricSample {
    pub host: String,
    pub plugin: String,
    pub plugin_instance: Option<String>,
    pub type_name: String,
    pub type_instance: Option<String>,
    pub values: Vec<SampleValue>,
    /// unix timestamp in milliseconds
    pub time: i64,
}

impl fmt::Display for MetricSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.plugin)?;
        if let Some(instance) = &self.plugin_instance {
            write!(f, "-{instance}")?;
        }
        write!(f, "/{}", self.type_name)?;
        if let Some(instance) = &self.type_instance {
            write!(f, "-{instance}")?;
        }
        write!(f, " @{}", self.time)?;
        for v in &self.values {
            write!(f, " {}:{}", v.kind, v.value)?;
        }
        Ok(())
    }
}

/// A ready to send record for the storage backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub name: String,
    /// unix timestamp in milliseconds
    pub time: i64,
    pub value: f64,
    pub host: Arc<str>,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} host={} value={} @{}",
            self.name,
            self.host,
            ryu::Buffer::new().format(self.value),
            self.time
        )
    }
}
