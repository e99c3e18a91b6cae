/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::export::BackendWriter;
use crate::process::SampleProcessor;
use crate::types::MetricSample;

mod batch;
use batch::Batch;

pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const FLUSH_LIMIT: usize = 50;
pub const QUEUE_CAPACITY: usize = 100;

const RECV_BATCH_SIZE: usize = 16;

/// The ingestion loop: process samples, batch the points and hand the
/// batches over to the backend writer.
pub struct BatchPipeline {
    receiver: mpsc::Receiver<MetricSample>,
    processor: SampleProcessor,
    writer: BackendWriter,
    batch: Batch,
    cache_expire: Option<Duration>,
}

impl BatchPipeline {
    pub fn new(
        receiver: mpsc::Receiver<MetricSample>,
        processor: SampleProcessor,
        writer: BackendWriter,
        cache_expire: Option<Duration>,
    ) -> Self {
        BatchPipeline {
            receiver,
            processor,
            writer,
            batch: Batch::new(FLUSH_INTERVAL, FLUSH_LIMIT, Instant::now()),
            cache_expire,
        }
    }

    /// Run until the sample queue is closed, then return the writer for shutdown
    pub async fn into_running(mut self) -> BackendWriter {
        let mut buf = Vec::with_capacity(RECV_BATCH_SIZE);

        let flush_interval = self.batch.flush_interval();
        let mut flush_tick =
            tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let expire_timeout = self.cache_expire.unwrap_or(Duration::MAX);
        // sweep a few times within each timeout
        let expire_period = (expire_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
        let mut expire_tick = tokio::time::interval_at(Instant::now() + expire_period, expire_period);
        expire_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = flush_tick.tick() => {
                    self.check_flush(Instant::now());
                }
                _ = expire_tick.tick(), if self.cache_expire.is_some() => {
                    let removed = self.processor.expire_cache(Instant::now(), expire_timeout);
                    if removed > 0 {
                        debug!("{removed} idle series removed from normalization cache");
                    }
                }
                n = self.receiver.recv_many(&mut buf, RECV_BATCH_SIZE) => {
                    if n == 0 {
                        break;
                    }

                    for sample in buf.drain(..) {
                        let now = Instant::now();
                        self.processor.process(&sample, now, self.batch.points_mut());
                        self.check_flush(now);
                    }
                }
            }
        }

        if let Some(points) = self.batch.take(Instant::now()) {
            info!("flush the last {} points", points.len());
            self.writer.submit(points);
        }
        self.writer
    }

    fn check_flush(&mut self, now: Instant) {
        if !self.batch.flush_due(now) {
            return;
        }
        if let Some(points) = self.batch.take(now) {
            debug!("flush {} points", points.len());
            self.writer.submit(points);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::WriterConfig;
    use crate::export::tests::RecordWriter;
    use crate::process::CounterResetAction;
    use crate::types::SampleValue;
    use crate::typesdb::TypeCatalog;

    fn sample(type_name: &str, time: i64, value: SampleValue) -> MetricSample {
        MetricSample {
            host: "h1".to_string(),
            plugin: type_name.to_string(),
            plugin_instance: None,
            type_name: type_name.to_string(),
            type_instance: None,
            values: vec![value],
            time,
        }
    }

    fn start(
        cache_expire: Option<Duration>,
    ) -> (
        mpsc::Sender<MetricSample>,
        Arc<RecordWriter>,
        tokio::task::JoinHandle<BackendWriter>,
    ) {
        let catalog = TypeCatalog::parse("cpu value:DERIVE:0:U\ngauge value:GAUGE:U:U\n").unwrap();
        let processor = SampleProcessor::new(Arc::new(catalog), true, CounterResetAction::Emit);
        let client = Arc::new(RecordWriter::default());
        let writer = BackendWriter::spawn(
            client.clone(),
            &WriterConfig {
                workers: 1,
                ..Default::default()
            },
        );
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let pipeline = BatchPipeline::new(receiver, processor, writer, cache_expire);
        (sender, client, tokio::spawn(pipeline.into_running()))
    }

    #[tokio::test(start_paused = true)]
    async fn size_then_time_flush() {
        let (sender, client, handle) = start(None);

        for i in 0..60 {
            sender
                .send(sample("gauge", i * 3, SampleValue::gauge(i as f64)))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(client.batch_sizes(), [50]);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(client.batch_sizes(), [50, 10]);

        drop(sender);
        let writer = handle.await.unwrap();
        writer.shutdown(Duration::from_secs(1)).await;
        assert_eq!(client.batch_sizes(), [50, 10]);

        let batches = client.batches();
        assert_eq!(batches[0][0].value, 0.0);
        assert_eq!(batches[1][9].value, 59.0);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_to_rate() {
        let (sender, client, handle) = start(None);

        sender
            .send(sample("cpu", 0, SampleValue::counter(100)))
            .await
            .unwrap();
        sender
            .send(sample("cpu", 1000, SampleValue::counter(150)))
            .await
            .unwrap();
        drop(sender);
        let writer = handle.await.unwrap();
        writer.shutdown(Duration::from_secs(1)).await;

        let batches = client.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].name, "cpu.cpu-value");
        assert_eq!(batches[0][0].value, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_on_close() {
        let (sender, client, handle) = start(None);

        sender
            .send(sample("gauge", 0, SampleValue::gauge(42.5)))
            .await
            .unwrap();
        drop(sender);
        let writer = handle.await.unwrap();
        writer.shutdown(Duration::from_secs(1)).await;

        let batches = client.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].value, 42.5);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_series_forgotten() {
        let (sender, client, handle) = start(Some(Duration::from_secs(10)));

        sender
            .send(sample("cpu", 0, SampleValue::counter(100)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        sender
            .send(sample("cpu", 30_000, SampleValue::counter(400)))
            .await
            .unwrap();
        drop(sender);
        let writer = handle.await.unwrap();
        writer.shutdown(Duration::from_secs(1)).await;

        // the second observation became a new baseline
        assert!(client.batch_sizes().is_empty());
    }
}
