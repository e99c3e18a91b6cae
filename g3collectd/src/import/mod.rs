/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;

use anyhow::anyhow;
use chrono::Utc;
use log::{debug, info, trace, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::MetricSample;

pub mod collectd;
use collectd::CollectdPacketVisitor;

const RECV_BUFFER_SIZE: usize = u16::MAX as usize;

/// Receive collectd datagrams and feed the decoded samples to the pipeline.
///
/// The sample queue is bounded, so a slow pipeline stalls the socket reads
/// and the kernel drops the excess datagrams.
pub struct CollectdListener {
    socket: UdpSocket,
    listen_addr: SocketAddr,
    sender: mpsc::Sender<MetricSample>,
}

impl CollectdListener {
    pub async fn bind(addr: SocketAddr, sender: mpsc::Sender<MetricSample>) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| anyhow!("failed to bind udp socket to {addr}: {e}"))?;
        let listen_addr = socket
            .local_addr()
            .map_err(|e| anyhow!("failed to get local address of udp socket {addr}: {e}"))?;
        Ok(CollectdListener {
            socket,
            listen_addr,
            sender,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub async fn into_running(self, quit: CancellationToken) {
        info!("collectd listener started on {}", self.listen_addr);

        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            tokio::select! {
                biased;

                _ = quit.cancelled() => {
                    info!("collectd listener on {} will go offline", self.listen_addr);
                    break;
                }
                r = self.socket.recv_from(&mut buf) => {
                    match r {
                        Ok((len, peer_addr)) => {
                            if !self.receive_packet(&buf[..len], peer_addr).await {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("error receiving data from socket {}: {e}", self.listen_addr);
                        }
                    }
                }
            }
        }

        info!("collectd listener on {} stopped", self.listen_addr);
    }

    /// Returns false if the pipeline is gone
    async fn receive_packet(&self, packet: &[u8], peer_addr: SocketAddr) -> bool {
        let now = Utc::now().timestamp_millis();
        for r in CollectdPacketVisitor::new(packet, now) {
            match r {
                Ok(sample) => {
                    trace!("got a sample from {peer_addr}: {sample}");
                    if self.sender.send(sample).await.is_err() {
                        warn!("sample queue closed, drop packet from {peer_addr}");
                        return false;
                    }
                }
                Err(e) => {
                    debug!("invalid collectd packet from {peer_addr}: {e}");
                    break;
                }
            }
        }
        true
    }
}
