/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::Write;
use std::time::Duration;

use anyhow::anyhow;
use base64::prelude::*;
use http::uri::{Authority, PathAndQuery};
use http::{HeaderMap, HeaderValue, header};
use log::trace;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::SeriesWriter;
use crate::config::InfluxdbConfig;
use crate::types::Point;

mod format;
mod response;

/// Write points through the InfluxDB 1.x `/write` API.
///
/// A new connection is used for each batch.
pub struct InfluxdbClient {
    host: Authority,
    peer: String,
    api_path: PathAndQuery,
    static_headers: HeaderMap,
    connect_timeout: Duration,
    rsp_header_max_size: usize,
}

impl InfluxdbClient {
    pub fn new(config: &InfluxdbConfig) -> anyhow::Result<Self> {
        let (host, peer) = config.peer()?;
        let api_path = config.build_api_path()?;

        let mut static_headers = HeaderMap::new();
        static_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        static_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if !config.username.is_empty() {
            let token = BASE64_STANDARD.encode(format!("{}:{}", config.username, config.password));
            let mut value = HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|e| anyhow!("invalid authorization header value: {e}"))?;
            value.set_sensitive(true);
            static_headers.insert(header::AUTHORIZATION, value);
        }

        Ok(InfluxdbClient {
            host,
            peer,
            api_path,
            static_headers,
            connect_timeout: config.connect_timeout,
            rsp_header_max_size: config.rsp_header_max_size,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn write_fixed_header(&self, header_buf: &mut Vec<u8>, body_len: usize) {
        header_buf.extend_from_slice(b"POST ");
        header_buf.extend_from_slice(self.api_path.as_str().as_bytes());
        header_buf.extend_from_slice(b" HTTP/1.1\r\n");
        header_buf.extend_from_slice(b"Host: ");
        header_buf.extend_from_slice(self.host.as_str().as_bytes());
        header_buf.extend_from_slice(b"\r\n");
        header_buf.extend_from_slice(b"Connection: close\r\n");
        for (header, value) in &self.static_headers {
            header_buf.extend_from_slice(header.as_str().as_bytes());
            header_buf.extend_from_slice(b": ");
            header_buf.extend_from_slice(value.as_bytes());
            header_buf.extend_from_slice(b"\r\n");
        }
        let _ = write!(header_buf, "Content-Length: {body_len}\r\n\r\n");
    }

    async fn connect(&self) -> anyhow::Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.peer)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(anyhow!("failed to connect to {}: {e}", self.peer)),
            Err(_) => Err(anyhow!("timed out connecting to {}", self.peer)),
        }
    }

    async fn send_request<S>(&self, stream: &mut S, body: &[u8]) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = Vec::with_capacity(256 + body.len());
        self.write_fixed_header(&mut buf, body.len());
        buf.extend_from_slice(body);
        stream
            .write_all(&buf)
            .await
            .map_err(|e| anyhow!("failed to send request: {e}"))?;
        stream
            .flush()
            .await
            .map_err(|e| anyhow!("failed to send request: {e}"))?;

        let mut reader = BufReader::new(stream);
        let rsp = response::read_response(&mut reader, self.rsp_header_max_size).await?;
        rsp.check()
    }
}

impl SeriesWriter for InfluxdbClient {
    async fn write_points(&self, points: &[Point]) -> anyhow::Result<()> {
        let mut body = Vec::with_capacity(points.len() * 64);
        let lines = format::serialize_points(points, &mut body);
        if lines == 0 {
            return Ok(());
        }

        let mut stream = self.connect().await?;
        self.send_request(&mut stream, &body).await?;
        trace!("{lines} lines written to {}", self.peer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt};
    use tokio::net::TcpListener;
    use tokio_test::io::Builder;

    fn config(server: &str) -> InfluxdbConfig {
        InfluxdbConfig {
            server: server.to_string(),
            database: "collectd".to_string(),
            ..Default::default()
        }
    }

    fn points() -> Vec<Point> {
        vec![Point {
            name: "cpu.cpu-value".to_string(),
            time: 1000,
            value: 50.0,
            host: Arc::from("h1"),
        }]
    }

    const BODY: &[u8] = b"cpu.cpu-value,host=h1 value=50.0 1000\n";

    #[test]
    fn request_header() {
        let client = InfluxdbClient::new(&config("localhost:8086")).unwrap();
        let mut buf = Vec::new();
        client.write_fixed_header(&mut buf, BODY.len());
        let s = String::from_utf8(buf).unwrap();
        assert!(s.starts_with("POST /write?db=collectd&precision=ms HTTP/1.1\r\n"));
        assert!(s.contains("Host: localhost:8086\r\n"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.contains("content-type: text/plain; charset=utf-8\r\n"));
        // root:root
        assert!(s.contains("authorization: Basic cm9vdDpyb290\r\n"));
        assert!(s.ends_with("Content-Length: 38\r\n\r\n"));
    }

    #[test]
    fn no_auth() {
        let mut config = config("localhost:8086");
        config.username = String::new();
        let client = InfluxdbClient::new(&config).unwrap();
        let mut buf = Vec::new();
        client.write_fixed_header(&mut buf, 0);
        let s = String::from_utf8(buf).unwrap();
        assert!(!s.contains("authorization"));
    }

    #[tokio::test]
    async fn mock_stream() {
        let client = InfluxdbClient::new(&config("localhost:8086")).unwrap();
        let mut request = Vec::new();
        client.write_fixed_header(&mut request, BODY.len());
        request.extend_from_slice(BODY);

        let mut stream = Builder::new()
            .write(&request)
            .read(b"HTTP/1.1 204 No Content\r\n\r\n")
            .build();
        client.send_request(&mut stream, BODY).await.unwrap();

        let mut stream = Builder::new()
            .write(&request)
            .read(b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 37\r\n\r\n{\"error\":\"authorization failed\"}\n\n\n\n\n")
            .build();
        let e = client.send_request(&mut stream, BODY).await.unwrap_err();
        assert!(e.to_string().starts_with("error response: 401 Unauthorized"));
    }

    #[tokio::test]
    async fn write_to_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = tokio::io::BufReader::new(stream);
            let mut head = Vec::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                if line == "\r\n" {
                    break;
                }
                if let Some(v) = line.strip_prefix("Content-Length: ") {
                    content_length = usize::from_str(v.trim()).unwrap();
                }
                head.push(line);
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).await.unwrap();
            reader
                .get_mut()
                .write_all(b"HTTP/1.1 204 No Content\r\n\r\n")
                .await
                .unwrap();
            (head, body)
        });

        let client = InfluxdbClient::new(&config(&addr.to_string())).unwrap();
        client.write_points(&points()).await.unwrap();

        let (head, body) = server.await.unwrap();
        assert_eq!(head[0], "POST /write?db=collectd&precision=ms HTTP/1.1\r\n");
        assert_eq!(body, BODY);
    }

    #[tokio::test]
    async fn skip_empty() {
        // nothing listens there, and nothing should be sent
        let client = InfluxdbClient::new(&config("127.0.0.1:1")).unwrap();
        let mut points = points();
        points[0].value = f64::NAN;
        client.write_points(&points).await.unwrap();
    }

    #[tokio::test]
    async fn connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = InfluxdbClient::new(&config(&addr.to_string())).unwrap();
        assert!(client.write_points(&points()).await.is_err());
    }
}
