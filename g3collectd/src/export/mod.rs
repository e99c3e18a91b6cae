/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use flume::TrySendError;
use log::{debug, info, trace, warn};
use tokio::task::JoinSet;

use crate::config::WriterConfig;
use crate::types::Point;

pub mod influxdb;

/// A storage backend that accepts batches of points.
pub trait SeriesWriter: Send + Sync + 'static {
    fn write_points(&self, points: &[Point]) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Hand batches over to a fixed number of write workers.
///
/// Submitting never waits. Each batch is written at most once, failed
/// batches are logged and dropped.
pub struct BackendWriter {
    sender: flume::Sender<Vec<Point>>,
    workers: JoinSet<()>,
}

impl BackendWriter {
    pub fn spawn<W: SeriesWriter>(client: Arc<W>, config: &WriterConfig) -> Self {
        let (sender, receiver) = flume::bounded(config.queue_size);
        let mut workers = JoinSet::new();
        for id in 0..config.workers {
            let worker = WriteWorker {
                id,
                client: client.clone(),
                receiver: receiver.clone(),
                write_timeout: config.write_timeout,
            };
            workers.spawn(worker.into_running());
        }
        BackendWriter { sender, workers }
    }

    pub fn submit(&self, points: Vec<Point>) {
        match self.sender.try_send(points) {
            Ok(_) => {}
            Err(TrySendError::Full(points)) => {
                warn!("backend write queue is full, drop {} points", points.len())
            }
            Err(TrySendError::Disconnected(points)) => {
                warn!("backend writer is closed, drop {} points", points.len())
            }
        }
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.sender.len()
    }

    /// Write out the queued batches, and abort the workers if that takes longer than `grace`
    pub async fn shutdown(self, grace: Duration) {
        let BackendWriter {
            sender,
            mut workers,
        } = self;

        let queued = sender.len();
        drop(sender);
        if queued > 0 {
            info!("waiting for {queued} queued batches to be written");
        }

        match tokio::time::timeout(grace, join_all(&mut workers)).await {
            Ok(_) => debug!("all backend writers finished"),
            Err(_) => {
                warn!(
                    "backend writes not finished in {grace:?}, abort {} writers",
                    workers.len()
                );
                workers.abort_all();
                join_all(&mut workers).await;
            }
        }
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while workers.join_next().await.is_some() {}
}

struct WriteWorker<W> {
    id: usize,
    client: Arc<W>,
    receiver: flume::Receiver<Vec<Point>>,
    write_timeout: Duration,
}

impl<W: SeriesWriter> WriteWorker<W> {
    async fn into_running(self) {
        while let Ok(points) = self.receiver.recv_async().await {
            match tokio::time::timeout(self.write_timeout, self.client.write_points(&points)).await
            {
                Ok(Ok(_)) => trace!("writer#{} sent {} points", self.id, points.len()),
                Ok(Err(e)) => warn!(
                    "writer#{} failed to send {} points: {e:?}",
                    self.id,
                    points.len()
                ),
                Err(_) => warn!(
                    "writer#{} timed out sending {} points",
                    self.id,
                    points.len()
                ),
            }
        }
        debug!("writer#{} stopped", self.id);
    }
}
