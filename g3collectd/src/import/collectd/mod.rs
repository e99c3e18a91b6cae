/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::Utf8Error;

use thiserror::Error;

use crate::types::{MetricSample, SampleValue};

mod part;
use part::*;

#[derive(Debug, Error)]
pub enum CollectdParseError {
    #[error("truncated part header")]
    TruncatedHeader,
    #[error("invalid length {1} for part {0:#06x}")]
    InvalidPartLength(u16, usize),
    #[error("string part {0:#06x} is not null terminated")]
    UnterminatedString(u16),
    #[error("invalid string in part {0:#06x}: {1}")]
    InvalidString(u16, Utf8Error),
    #[error("{0} values declared but {1} bytes of value data found")]
    ValueCountMismatch(usize, usize),
    #[error("unknown value type {0}")]
    UnknownValueType(u8),
    #[error("encrypted packet is not supported")]
    Encrypted,
}

#[derive(Default)]
struct ValueListState {
    host: String,
    plugin: String,
    plugin_instance: String,
    type_name: String,
    type_instance: String,
    time: Option<i64>,
}

impl ValueListState {
    fn build_sample(&self, values: Vec<SampleValue>, default_time: i64) -> MetricSample {
        MetricSample {
            host: self.host.clone(),
            plugin: self.plugin.clone(),
            plugin_instance: non_empty(&self.plugin_instance),
            type_name: self.type_name.clone(),
            type_instance: non_empty(&self.type_instance),
            values,
            time: self.time.unwrap_or(default_time),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn set_string(field: &mut String, part_type: u16, payload: &[u8]) -> Result<(), CollectdParseError> {
    let s = read_string(part_type, payload)?;
    field.clear();
    field.push_str(s);
    Ok(())
}

/// Iterate over the value lists in one collectd binary protocol datagram.
///
/// Identity parts (host, plugin, type, time, ...) stay in effect until they
/// are overwritten, and every values part yields one sample. Decoding stops
/// at the first malformed part.
pub struct CollectdPacketVisitor<'a> {
    buf: &'a [u8],
    offset: usize,
    state: ValueListState,
    default_time: i64,
}

impl<'a> CollectdPacketVisitor<'a> {
    /// `default_time` is used for value lists that come without a time part
    pub fn new(buf: &'a [u8], default_time: i64) -> Self {
        CollectdPacketVisitor {
            buf,
            offset: 0,
            state: ValueListState::default(),
            default_time,
        }
    }

    fn next_part(&mut self) -> Option<Result<(u16, &'a [u8]), CollectdParseError>> {
        if self.offset >= self.buf.len() {
            return None;
        }

        let left = &self.buf[self.offset..];
        let Some((header, _)) = left.split_first_chunk::<PART_HEADER_SIZE>() else {
            self.offset = self.buf.len();
            return Some(Err(CollectdParseError::TruncatedHeader));
        };
        let part_type = u16::from_be_bytes([header[0], header[1]]);
        let part_len = usize::from(u16::from_be_bytes([header[2], header[3]]));
        if part_len < PART_HEADER_SIZE || part_len > left.len() {
            self.offset = self.buf.len();
            return Some(Err(CollectdParseError::InvalidPartLength(
                part_type, part_len,
            )));
        }

        self.offset += part_len;
        Some(Ok((part_type, &left[PART_HEADER_SIZE..part_len])))
    }

    fn handle_part(
        &mut self,
        part_type: u16,
        payload: &[u8],
    ) -> Result<Option<MetricSample>, CollectdParseError> {
        match part_type {
            TYPE_HOST => set_string(&mut self.state.host, part_type, payload)?,
            TYPE_PLUGIN => set_string(&mut self.state.plugin, part_type, payload)?,
            TYPE_PLUGIN_INSTANCE => {
                set_string(&mut self.state.plugin_instance, part_type, payload)?
            }
            TYPE_TYPE => set_string(&mut self.state.type_name, part_type, payload)?,
            TYPE_TYPE_INSTANCE => set_string(&mut self.state.type_instance, part_type, payload)?,
            TYPE_TIME => {
                let v = read_numeric(part_type, payload)?;
                self.state.time = Some(secs_to_millis(v));
            }
            TYPE_TIME_HR => {
                let v = read_numeric(part_type, payload)?;
                self.state.time = Some(hr_to_millis(v));
            }
            TYPE_INTERVAL | TYPE_INTERVAL_HR => {
                read_numeric(part_type, payload)?;
            }
            TYPE_VALUES => {
                let values = read_values(payload)?;
                let sample = self.state.build_sample(values, self.default_time);
                return Ok(Some(sample));
            }
            TYPE_ENCRYPTION => return Err(CollectdParseError::Encrypted),
            TYPE_MESSAGE | TYPE_SEVERITY | TYPE_SIGNATURE => {}
            _ => {}
        }
        Ok(None)
    }
}

impl Iterator for CollectdPacketVisitor<'_> {
    type Item = Result<MetricSample, CollectdParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (part_type, payload) = match self.next_part()? {
                Ok(part) => part,
                Err(e) => return Some(Err(e)),
            };

            match self.handle_part(part_type, payload) {
                Ok(Some(sample)) => return Some(Ok(sample)),
                Ok(None) => {}
                Err(e) => {
                    self.offset = self.buf.len();
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::DataSourceKind;

    pub(crate) fn string_part(buf: &mut Vec<u8>, part_type: u16, s: &str) {
        let len = u16::try_from(s.len() + 5).unwrap();
        buf.extend_from_slice(&part_type.to_be_bytes());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
    }

    pub(crate) fn numeric_part(buf: &mut Vec<u8>, part_type: u16, v: u64) {
        buf.extend_from_slice(&part_type.to_be_bytes());
        buf.extend_from_slice(&12u16.to_be_bytes());
        buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn values_part(buf: &mut Vec<u8>, values: &[SampleValue]) {
        let len = u16::try_from(6 + values.len() * 9).unwrap();
        buf.extend_from_slice(&TYPE_VALUES.to_be_bytes());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&u16::try_from(values.len()).unwrap().to_be_bytes());
        for v in values {
            let kind = match v.kind {
                DataSourceKind::Counter => 0u8,
                DataSourceKind::Gauge => 1,
                DataSourceKind::Derive => 2,
                DataSourceKind::Absolute => 3,
            };
            buf.push(kind);
        }
        for v in values {
            match (v.kind, v.value) {
                (DataSourceKind::Gauge, crate::types::MetricValue::Double(f)) => {
                    buf.extend_from_slice(&f.to_le_bytes())
                }
                (_, crate::types::MetricValue::Signed(i)) => {
                    buf.extend_from_slice(&i.to_be_bytes())
                }
                (_, crate::types::MetricValue::Unsigned(u)) => {
                    buf.extend_from_slice(&u.to_be_bytes())
                }
                _ => unreachable!(),
            }
        }
    }

    /// Build a datagram holding a single value list
    pub(crate) fn value_list_packet(
        host: &str,
        plugin: &str,
        type_name: &str,
        time_secs: u64,
        values: &[SampleValue],
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        string_part(&mut buf, TYPE_HOST, host);
        numeric_part(&mut buf, TYPE_TIME, time_secs);
        string_part(&mut buf, TYPE_PLUGIN, plugin);
        string_part(&mut buf, TYPE_TYPE, type_name);
        values_part(&mut buf, values);
        buf
    }

    #[test]
    fn value_lists() {
        let mut buf = Vec::new();
        string_part(&mut buf, TYPE_HOST, "web01.example.com");
        numeric_part(&mut buf, TYPE_TIME_HR, 1_700_000_000 << 30);
        numeric_part(&mut buf, TYPE_INTERVAL_HR, 10 << 30);
        string_part(&mut buf, TYPE_PLUGIN, "cpu");
        string_part(&mut buf, TYPE_PLUGIN_INSTANCE, "0");
        string_part(&mut buf, TYPE_TYPE, "cpu");
        string_part(&mut buf, TYPE_TYPE_INSTANCE, "user");
        values_part(&mut buf, &[SampleValue::derive(1234)]);
        string_part(&mut buf, TYPE_PLUGIN, "load");
        string_part(&mut buf, TYPE_PLUGIN_INSTANCE, "");
        string_part(&mut buf, TYPE_TYPE, "load");
        string_part(&mut buf, TYPE_TYPE_INSTANCE, "");
        values_part(
            &mut buf,
            &[
                SampleValue::gauge(0.5),
                SampleValue::gauge(0.25),
                SampleValue::gauge(0.125),
            ],
        );

        let mut iter = CollectdPacketVisitor::new(&buf, 0);
        let s1 = iter.next().unwrap().unwrap();
        assert_eq!(s1.host, "web01.example.com");
        assert_eq!(s1.plugin, "cpu");
        assert_eq!(s1.plugin_instance.as_deref(), Some("0"));
        assert_eq!(s1.type_name, "cpu");
        assert_eq!(s1.type_instance.as_deref(), Some("user"));
        assert_eq!(s1.values, vec![SampleValue::derive(1234)]);
        assert_eq!(s1.time, 1_700_000_000_000);

        let s2 = iter.next().unwrap().unwrap();
        assert_eq!(s2.host, "web01.example.com");
        assert_eq!(s2.plugin, "load");
        assert!(s2.plugin_instance.is_none());
        assert!(s2.type_instance.is_none());
        assert_eq!(s2.values.len(), 3);
        assert_eq!(s2.values[2], SampleValue::gauge(0.125));

        assert!(iter.next().is_none());
    }

    #[test]
    fn default_time() {
        let mut buf = Vec::new();
        string_part(&mut buf, TYPE_HOST, "h1");
        string_part(&mut buf, TYPE_PLUGIN, "memory");
        string_part(&mut buf, TYPE_TYPE, "memory");
        string_part(&mut buf, TYPE_TYPE_INSTANCE, "used");
        values_part(&mut buf, &[SampleValue::gauge(1024.0)]);

        let mut iter = CollectdPacketVisitor::new(&buf, 5000);
        let s = iter.next().unwrap().unwrap();
        assert_eq!(s.time, 5000);
        assert!(iter.next().is_none());
    }

    #[test]
    fn legacy_time() {
        let mut buf = Vec::new();
        numeric_part(&mut buf, TYPE_TIME, 1_000);
        string_part(&mut buf, TYPE_TYPE, "uptime");
        values_part(&mut buf, &[SampleValue::gauge(3.0)]);

        let s = CollectdPacketVisitor::new(&buf, 0).next().unwrap().unwrap();
        assert_eq!(s.time, 1_000_000);
    }

    #[test]
    fn skip_notification_and_unknown() {
        let mut buf = Vec::new();
        string_part(&mut buf, TYPE_MESSAGE, "something happened");
        numeric_part(&mut buf, TYPE_SEVERITY, 4);
        string_part(&mut buf, 0x0ff0, "unknown");
        string_part(&mut buf, TYPE_TYPE, "uptime");
        values_part(&mut buf, &[SampleValue::gauge(3.0)]);

        let mut iter = CollectdPacketVisitor::new(&buf, 0);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().is_none());
    }

    #[test]
    fn stop_at_malformed_part() {
        let mut buf = Vec::new();
        string_part(&mut buf, TYPE_TYPE, "uptime");
        values_part(&mut buf, &[SampleValue::gauge(3.0)]);
        // length larger than the datagram
        buf.extend_from_slice(&TYPE_HOST.to_be_bytes());
        buf.extend_from_slice(&100u16.to_be_bytes());
        buf.extend_from_slice(b"h1\0");
        values_part(&mut buf, &[SampleValue::gauge(4.0)]);

        let mut iter = CollectdPacketVisitor::new(&buf, 0);
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(
            iter.next(),
            Some(Err(CollectdParseError::InvalidPartLength(TYPE_HOST, 100)))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn truncated_header() {
        let mut iter = CollectdPacketVisitor::new(&[0u8, 0, 0], 0);
        assert!(matches!(
            iter.next(),
            Some(Err(CollectdParseError::TruncatedHeader))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn encrypted() {
        let mut buf = Vec::new();
        string_part(&mut buf, TYPE_ENCRYPTION, "secret");
        let mut iter = CollectdPacketVisitor::new(&buf, 0);
        assert!(matches!(
            iter.next(),
            Some(Err(CollectdParseError::Encrypted))
        ));
        assert!(iter.next().is_none());
    }
}
