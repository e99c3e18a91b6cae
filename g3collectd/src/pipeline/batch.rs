/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use tokio::time::Instant;

use crate::types::Point;

pub(super) struct Batch {
    points: Vec<Point>,
    started: Instant,
    flush_interval: Duration,
    flush_limit: usize,
}

impl Batch {
    pub(super) fn new(flush_interval: Duration, flush_limit: usize, now: Instant) -> Self {
        Batch {
            points: Vec::with_capacity(flush_limit),
            started: now,
            flush_interval,
            flush_limit,
        }
    }

    #[inline]
    pub(super) fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub(super) fn points_mut(&mut self) -> &mut Vec<Point> {
        &mut self.points
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.points.len()
    }

    pub(super) fn flush_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.flush_interval
            || self.points.len() >= self.flush_limit
    }

    /// Close the current batch and restart the timer, even if there is nothing to flush
    pub(super) fn take(&mut self, now: Instant) -> Option<Vec<Point>> {
        self.started = now;
        if self.points.is_empty() {
            None
        } else {
            Some(std::mem::replace(
                &mut self.points,
                Vec::with_capacity(self.flush_limit),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::gauge_points;

    #[test]
    fn size_trigger() {
        let now = Instant::now();
        let mut batch = Batch::new(Duration::from_secs(1), 50, now);
        batch.points_mut().extend(gauge_points(49));
        assert!(!batch.flush_due(now));
        batch.points_mut().extend(gauge_points(1));
        assert!(batch.flush_due(now));

        let points = batch.take(now).unwrap();
        assert_eq!(points.len(), 50);
        assert_eq!(batch.len(), 0);
        assert!(!batch.flush_due(now));

        batch.points_mut().extend(gauge_points(1));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn time_trigger() {
        let start = Instant::now();
        let mut batch = Batch::new(Duration::from_secs(1), 50, start);
        batch.points_mut().extend(gauge_points(3));
        assert!(!batch.flush_due(start + Duration::from_millis(999)));
        let now = start + Duration::from_secs(1);
        assert!(batch.flush_due(now));
        assert_eq!(batch.take(now).unwrap().len(), 3);
        assert!(!batch.flush_due(now + Duration::from_millis(500)));
    }

    #[test]
    fn empty_flush_restarts_timer() {
        let start = Instant::now();
        let mut batch = Batch::new(Duration::from_secs(1), 50, start);
        let now = start + Duration::from_secs(2);
        assert!(batch.flush_due(now));
        assert!(batch.take(now).is_none());
        assert!(!batch.flush_due(now + Duration::from_millis(100)));
    }
}
