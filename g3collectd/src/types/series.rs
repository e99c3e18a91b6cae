/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use super::MetricSample;

const FIELD_DELIMITER: char = '.';
const INSTANCE_DELIMITER: char = '-';

/// The parts of the series naming that are shared by all values of a sample.
pub(crate) struct SeriesPrefix {
    pub(crate) host: Arc<str>,
    plugin: String,
}

impl SeriesPrefix {
    pub(crate) fn new(sample: &MetricSample) -> Self {
        // host names contain the field delimiter
        let host = sample.host.replace(FIELD_DELIMITER, "_");

        let mut plugin = sample.plugin.clone();
        if let Some(instance) = &sample.plugin_instance {
            plugin.push(INSTANCE_DELIMITER);
            plugin.push_str(instance);
        }

        SeriesPrefix {
            host: Arc::from(host),
            plugin,
        }
    }

    /// `plugin[-plugin_instance].type[-label]`
    pub(crate) fn series_name(&self, type_name: &str, label: Option<&str>) -> String {
        let label_len = label.map(|s| s.len() + 1).unwrap_or_default();
        let mut name = String::with_capacity(self.plugin.len() + type_name.len() + label_len + 1);
        name.push_str(&self.plugin);
        name.push(FIELD_DELIMITER);
        name.push_str(type_name);
        if let Some(label) = label {
            name.push(INSTANCE_DELIMITER);
            name.push_str(label);
        }
        name
    }

    /// `host.plugin[-plugin_instance].type[-label]`
    pub(crate) fn series_key(&self, series_name: &str) -> String {
        let mut key = String::with_capacity(self.host.len() + series_name.len() + 1);
        key.push_str(&self.host);
        key.push(FIELD_DELIMITER);
        key.push_str(series_name);
        key
    }
}
