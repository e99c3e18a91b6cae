/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use log::{debug, trace};
use tokio::time::Instant;

use crate::types::{DataSourceKind, MetricSample, Point, SeriesPrefix};
use crate::typesdb::TypeCatalog;

mod cache;
pub use cache::NormalizationCache;

/// What to do with a COUNTER whose raw value went backwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CounterResetAction {
    /// Send the negative rate
    #[default]
    Emit,
    /// Drop the point and start over from the new raw value
    Suppress,
}

impl FromStr for CounterResetAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emit" => Ok(CounterResetAction::Emit),
            "suppress" => Ok(CounterResetAction::Suppress),
            _ => Err(anyhow!("invalid counter reset action {s}")),
        }
    }
}

pub struct SampleProcessor {
    catalog: Arc<TypeCatalog>,
    cache: NormalizationCache,
    normalize: bool,
    counter_reset: CounterResetAction,
}

impl SampleProcessor {
    pub fn new(catalog: Arc<TypeCatalog>, normalize: bool, counter_reset: CounterResetAction) -> Self {
        SampleProcessor {
            catalog,
            cache: NormalizationCache::default(),
            normalize,
            counter_reset,
        }
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &NormalizationCache {
        &self.cache
    }

    pub(crate) fn expire_cache(&mut self, now: Instant, timeout: Duration) -> usize {
        self.cache.expire(now, timeout)
    }

    /// Convert one sample into points, one for each value that is ready to send.
    pub fn process(&mut self, sample: &MetricSample, now: Instant, points: &mut Vec<Point>) {
        trace!("processing sample {sample}");

        let definition = self.catalog.lookup(&sample.type_name);
        if definition.is_none() && sample.type_instance.is_none() {
            trace!(
                "unknown type {} without type instance from plugin {} of host {}",
                sample.type_name, sample.plugin, sample.host
            );
            return;
        }

        let prefix = SeriesPrefix::new(sample);
        for (i, v) in sample.values.iter().enumerate() {
            let label = match &sample.type_instance {
                Some(s) => Some(s.as_str()),
                None => definition.and_then(|t| t.source_name(i)),
            };
            let name = prefix.series_name(&sample.type_name, label);

            let raw = v.value.as_f64();
            let value = if self.normalize && v.kind.is_cumulative() {
                let key = prefix.series_key(&name);
                let Some(delta) = self.cache.normalize(&key, sample.time, raw, now) else {
                    trace!("no baseline for series {key} yet");
                    continue;
                };
                if delta.diff < 0.0
                    && v.kind == DataSourceKind::Counter
                    && self.counter_reset == CounterResetAction::Suppress
                {
                    debug!("counter of series {key} went backwards, point dropped");
                    continue;
                }
                delta.rate()
            } else {
                raw
            };

            let point = Point {
                name,
                time: sample.time,
                value,
                host: prefix.host.clone(),
            };
            trace!("ready to send point {point}");
            points.push(point);
        }
    }
}
