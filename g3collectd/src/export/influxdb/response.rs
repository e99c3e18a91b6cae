/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use anyhow::anyhow;
use http::StatusCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

const BODY_MAX_SIZE: usize = 4096;

pub(super) struct WriteResponse {
    pub(super) code: StatusCode,
    pub(super) body: Vec<u8>,
}

impl WriteResponse {
    pub(super) fn check(&self) -> anyhow::Result<()> {
        if self.code.is_success() {
            return Ok(());
        }
        match std::str::from_utf8(&self.body) {
            Ok(detail) if !detail.trim().is_empty() => {
                Err(anyhow!("error response: {} {}", self.code, detail.trim()))
            }
            _ => Err(anyhow!("error response: {}", self.code)),
        }
    }
}

fn parse_status_line(line: &str) -> anyhow::Result<StatusCode> {
    let mut parts = line.split_ascii_whitespace();
    let Some(version) = parts.next() else {
        return Err(anyhow!("empty status line"));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(anyhow!("unsupported http version {version}"));
    }
    let Some(code) = parts.next() else {
        return Err(anyhow!("no status code found in status line"));
    };
    StatusCode::from_bytes(code.as_bytes()).map_err(|e| anyhow!("invalid status code {code}: {e}"))
}

async fn read_head_line<R>(
    reader: &mut R,
    line: &mut String,
    head_size: &mut usize,
    head_max_size: usize,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let remaining = head_max_size.saturating_sub(*head_size);
    let n = (&mut *reader)
        .take(remaining as u64)
        .read_line(line)
        .await
        .map_err(|e| anyhow!("failed to read response header: {e}"))?;
    *head_size += n;
    if !line.ends_with('\n') {
        return if n >= remaining {
            Err(anyhow!("response header too large (> {head_max_size})"))
        } else {
            Err(anyhow!("connection closed while reading response header"))
        };
    }
    Ok(())
}

pub(super) async fn read_response<R>(
    reader: &mut R,
    head_max_size: usize,
) -> anyhow::Result<WriteResponse>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::with_capacity(128);
    let mut head_size = 0;

    read_head_line(reader, &mut line, &mut head_size, head_max_size).await?;
    let code = parse_status_line(&line)?;

    let mut content_length = None;
    loop {
        read_head_line(reader, &mut line, &mut head_size, head_max_size).await?;
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        let Some((name, value)) = header.split_once(':') else {
            return Err(anyhow!("invalid response header line: {header}"));
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let len = usize::from_str(value.trim())
                .map_err(|e| anyhow!("invalid content-length value {value}: {e}"))?;
            content_length = Some(len);
        }
    }

    let mut body = Vec::new();
    if let Some(len) = content_length {
        body.resize(len.min(BODY_MAX_SIZE), 0);
        reader
            .read_exact(&mut body)
            .await
            .map_err(|e| anyhow!("failed to read response body: {e}"))?;
    }
    Ok(WriteResponse { code, body })
}
