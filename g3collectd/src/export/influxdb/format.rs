/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use itoa::Buffer;
use log::debug;

use crate::types::Point;

const MEASUREMENT_SPECIAL: &[u8] = b"\\, ";
const TAG_VALUE_SPECIAL: &[u8] = b"\\,= ";

/// Line breaks can not be escaped and are replaced with `_`
fn serialize_escaped(buf: &mut Vec<u8>, s: &str, special: &[u8]) {
    for b in s.bytes() {
        match b {
            b'\n' | b'\r' => buf.push(b'_'),
            _ => {
                if special.contains(&b) {
                    buf.push(b'\\');
                }
                buf.push(b);
            }
        }
    }
}

fn serialize_point(buf: &mut Vec<u8>, point: &Point) {
    serialize_escaped(buf, &point.name, MEASUREMENT_SPECIAL);
    if !point.host.is_empty() {
        buf.extend_from_slice(b",host=");
        serialize_escaped(buf, &point.host, TAG_VALUE_SPECIAL);
    }

    buf.extend_from_slice(b" value=");
    let mut value_buffer = ryu::Buffer::new();
    buf.extend_from_slice(value_buffer.format_finite(point.value).as_bytes());

    let mut ts_buffer = Buffer::new();
    buf.push(b' ');
    buf.extend_from_slice(ts_buffer.format(point.time).as_bytes());
    buf.push(b'\n');
}

/// Encode the points as line protocol with millisecond timestamps,
/// and return the number of lines written
pub(super) fn serialize_points(points: &[Point], buf: &mut Vec<u8>) -> usize {
    let mut lines = 0;
    for point in points {
        if !point.value.is_finite() {
            debug!(
                "skip point {} of host {} with value {}",
                point.name, point.host, point.value
            );
            continue;
        }
        serialize_point(buf, point);
        lines += 1;
    }
    lines
}
