/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use super::CollectdParseError;
use crate::types::{DataSourceKind, MetricValue, SampleValue};

pub(super) const PART_HEADER_SIZE: usize = 4;

pub(super) const TYPE_HOST: u16 = 0x0000;
pub(super) const TYPE_TIME: u16 = 0x0001;
pub(super) const TYPE_PLUGIN: u16 = 0x0002;
pub(super) const TYPE_PLUGIN_INSTANCE: u16 = 0x0003;
pub(super) const TYPE_TYPE: u16 = 0x0004;
pub(super) const TYPE_TYPE_INSTANCE: u16 = 0x0005;
pub(super) const TYPE_VALUES: u16 = 0x0006;
pub(super) const TYPE_INTERVAL: u16 = 0x0007;
pub(super) const TYPE_TIME_HR: u16 = 0x0008;
pub(super) const TYPE_INTERVAL_HR: u16 = 0x0009;
pub(super) const TYPE_MESSAGE: u16 = 0x0100;
pub(super) const TYPE_SEVERITY: u16 = 0x0101;
pub(super) const TYPE_SIGNATURE: u16 = 0x0200;
pub(super) const TYPE_ENCRYPTION: u16 = 0x0210;

pub(super) fn read_string(part_type: u16, payload: &[u8]) -> Result<&str, CollectdParseError> {
    let Some((&0, s)) = payload.split_last() else {
        return Err(CollectdParseError::UnterminatedString(part_type));
    };
    std::str::from_utf8(s).map_err(|e| CollectdParseError::InvalidString(part_type, e))
}

pub(super) fn read_numeric(part_type: u16, payload: &[u8]) -> Result<u64, CollectdParseError> {
    let bytes: [u8; 8] = payload
        .try_into()
        .map_err(|_| CollectdParseError::InvalidPartLength(part_type, payload.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Convert the 2^-30 seconds high resolution time to milliseconds
pub(super) fn hr_to_millis(v: u64) -> i64 {
    let secs = v >> 30;
    let frac = v & ((1 << 30) - 1);
    let millis = secs * 1000 + ((frac * 1000) >> 30);
    i64::try_from(millis).unwrap_or(i64::MAX)
}

pub(super) fn secs_to_millis(v: u64) -> i64 {
    i64::try_from(v.saturating_mul(1000)).unwrap_or(i64::MAX)
}

/// `count: u16`, `count` type bytes, then `count` 8 byte values
pub(super) fn read_values(payload: &[u8]) -> Result<Vec<SampleValue>, CollectdParseError> {
    let Some((count, left)) = payload.split_first_chunk::<2>() else {
        return Err(CollectdParseError::InvalidPartLength(
            TYPE_VALUES,
            payload.len(),
        ));
    };
    let count = usize::from(u16::from_be_bytes(*count));
    if left.len() != count * 9 {
        return Err(CollectdParseError::ValueCountMismatch(count, left.len()));
    }

    let (kinds, data) = left.split_at(count);
    let mut values = Vec::with_capacity(count);
    for (kind, data) in kinds.iter().zip(data.chunks_exact(8)) {
        let Some(kind) = DataSourceKind::from_wire(*kind) else {
            return Err(CollectdParseError::UnknownValueType(*kind));
        };
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(data);
        let value = match kind {
            DataSourceKind::Counter | DataSourceKind::Absolute => {
                MetricValue::Unsigned(u64::from_be_bytes(bytes))
            }
            DataSourceKind::Derive => MetricValue::Signed(i64::from_be_bytes(bytes)),
            // gauge values are in x86 byte order
            DataSourceKind::Gauge => MetricValue::Double(f64::from_le_bytes(bytes)),
        };
        values.push(SampleValue::new(kind, value));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string() {
        assert_eq!(read_string(TYPE_HOST, b"localhost\0").unwrap(), "localhost");
        assert_eq!(read_string(TYPE_HOST, b"\0").unwrap(), "");
        assert!(matches!(
            read_string(TYPE_HOST, b"localhost"),
            Err(CollectdParseError::UnterminatedString(TYPE_HOST))
        ));
        assert!(read_string(TYPE_HOST, b"").is_err());
    }

    #[test]
    fn hr_time() {
        assert_eq!(hr_to_millis(1 << 30), 1000);
        assert_eq!(hr_to_millis((10 << 30) + (1 << 29)), 10_500);
        assert_eq!(secs_to_millis(1_700_000_000), 1_700_000_000_000);
    }

    #[test]
    fn values() {
        let mut payload = vec![0u8, 2, 1, 2];
        payload.extend_from_slice(&42.5f64.to_le_bytes());
        payload.extend_from_slice(&(-5i64).to_be_bytes());
        let values = read_values(&payload).unwrap();
        assert_eq!(values, vec![SampleValue::gauge(42.5), SampleValue::derive(-5)]);

        assert!(matches!(
            read_values(&payload[..payload.len() - 1]),
            Err(CollectdParseError::ValueCountMismatch(2, _))
        ));
    }

    #[test]
    fn unknown_value_type() {
        let mut payload = vec![0u8, 1, 9];
        payload.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            read_values(&payload),
            Err(CollectdParseError::UnknownValueType(9))
        ));
    }
}
