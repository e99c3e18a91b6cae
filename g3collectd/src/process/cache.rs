/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    time: i64,
    value: f64,
    touched: Instant,
}

/// Difference between two consecutive observations of a cumulative series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CounterDelta {
    pub(crate) diff: f64,
    pub(crate) elapsed_ms: i64,
}

impl CounterDelta {
    /// The per second rate, or the plain difference if time did not advance
    pub(crate) fn rate(&self) -> f64 {
        if self.elapsed_ms > 0 {
            self.diff / (self.elapsed_ms as f64 / 1000.0)
        } else {
            self.diff
        }
    }
}

/// Last raw observation of each COUNTER/DERIVE series, keyed by series key.
#[derive(Default)]
pub struct NormalizationCache {
    inner: AHashMap<String, CacheEntry>,
}

impl NormalizationCache {
    /// Record the new observation and return the delta to the previous one.
    ///
    /// Returns None if there is no usable previous observation.
    pub(crate) fn normalize(
        &mut self,
        key: &str,
        time: i64,
        value: f64,
        now: Instant,
    ) -> Option<CounterDelta> {
        let entry = CacheEntry {
            time,
            value,
            touched: now,
        };
        match self.inner.get_mut(key) {
            Some(prior) => {
                let prior = std::mem::replace(prior, entry);
                if prior.value.is_nan() {
                    None
                } else {
                    Some(CounterDelta {
                        diff: value - prior.value,
                        elapsed_ms: time.saturating_sub(prior.time),
                    })
                }
            }
            None => {
                self.inner.insert(key.to_string(), entry);
                None
            }
        }
    }

    /// Drop the entries that have not been updated within `timeout`
    pub(crate) fn expire(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.inner.len();
        self.inner
            .retain(|_, entry| now.saturating_duration_since(entry.touched) < timeout);
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
