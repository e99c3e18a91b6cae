/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use log::info;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::export::BackendWriter;
use crate::export::influxdb::InfluxdbClient;
use crate::import::CollectdListener;
use crate::pipeline::{BatchPipeline, QUEUE_CAPACITY};
use crate::process::SampleProcessor;
use crate::typesdb::TypeCatalog;

/// All the running parts of the proxy, wired together.
pub struct CollectdProxy {
    listener: CollectdListener,
    pipeline: BatchPipeline,
    shutdown_grace: Duration,
}

impl CollectdProxy {
    /// Must be called inside the tokio runtime, as the backend writers are spawned here
    pub async fn bind(config: &ProxyConfig, catalog: Arc<TypeCatalog>) -> anyhow::Result<Self> {
        let client =
            InfluxdbClient::new(&config.influxdb).context("failed to create influxdb client")?;
        info!("will write to influxdb {}", client.peer());
        let writer = BackendWriter::spawn(Arc::new(client), &config.writer);

        let processor = SampleProcessor::new(catalog, config.normalize, config.counter_reset);
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let listener = CollectdListener::bind(config.listen, sender).await?;
        let pipeline = BatchPipeline::new(receiver, processor, writer, config.cache_expire);

        Ok(CollectdProxy {
            listener,
            pipeline,
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listener.listen_addr()
    }

    /// Run until `quit` is cancelled, then flush the pending points
    pub async fn run(self, quit: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::spawn(self.listener.into_running(quit));

        // returns after the listener dropped the sample sender
        let writer = self.pipeline.into_running().await;
        listener
            .await
            .map_err(|e| anyhow!("collectd listener task failed: {e}"))?;

        info!("waiting for pending backend writes");
        writer.shutdown(self.shutdown_grace).await;
        info!("proxy stopped");
        Ok(())
    }
}

pub async fn run(config: &ProxyConfig, catalog: Arc<TypeCatalog>) -> anyhow::Result<()> {
    let quit = CancellationToken::new();
    crate::signal::register(quit.clone()).context("failed to setup signal handler")?;

    let proxy = CollectdProxy::bind(config, catalog).await?;
    proxy.run(quit).await
}
