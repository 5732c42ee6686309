//! Runs every collector on its own timer and funnels readings into the
//! snapshot table through one queue with a single consumer.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::{MetricCollector, MetricReading};
use crate::shutdown::ShutdownListener;
use crate::system::snapshot::SnapshotTable;

pub struct SamplingScheduler {
    collectors: Vec<Arc<dyn MetricCollector>>,
    table: Arc<SnapshotTable>,
    period: Duration,
}

/// Running scheduler. Call [`SchedulerHandle::join`] after shutdown fires.
pub struct SchedulerHandle {
    collectors: Vec<JoinHandle<()>>,
    queue: mpsc::Sender<MetricReading>,
    consumer: JoinHandle<usize>,
}

impl SamplingScheduler {
    pub fn new(
        collectors: Vec<Arc<dyn MetricCollector>>,
        table: Arc<SnapshotTable>,
        period: Duration,
    ) -> Self {
        SamplingScheduler {
            collectors,
            table,
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn start(self, shutdown: ShutdownListener) -> SchedulerHandle {
        let (queue, readings) = mpsc::channel(self.collectors.len().max(1) * 4);
        let consumer = tokio::spawn(apply_readings(readings, Arc::clone(&self.table)));

        let collectors = self
            .collectors
            .into_iter()
            .map(|collector| {
                tokio::spawn(run_collector(
                    collector,
                    self.period,
                    queue.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        SchedulerHandle {
            collectors,
            queue,
            consumer,
        }
    }
}

impl SchedulerHandle {
    /// Wait for every collector task to stop, then close the queue and let
    /// the consumer drain it. Returns how many readings reached the table.
    pub async fn join(self) -> usize {
        let SchedulerHandle {
            collectors,
            queue,
            consumer,
        } = self;

        for result in join_all(collectors).await {
            if let Err(err) = result {
                warn!("collector task failed: {err}");
            }
        }

        // Every producer has exited, so closing cannot race a send.
        drop(queue);
        info!("collectors stopped, draining reading queue");

        match consumer.await {
            Ok(applied) => applied,
            Err(err) => {
                warn!("snapshot consumer failed: {err}");
                0
            }
        }
    }
}

async fn run_collector(
    collector: Arc<dyn MetricCollector>,
    period: Duration,
    queue: mpsc::Sender<MetricReading>,
    shutdown: ShutdownListener,
) {
    let name = collector.name().to_string();
    debug!(collector = %name, "collector started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // The in-flight sample always runs to completion.
        let mut reading = collector.sample(&shutdown).await;
        if shutdown.is_cancelled() {
            debug!(collector = %name, "dropping reading taken during shutdown");
            break;
        }
        // Table keys are the registered names, whatever the reading says.
        reading.name.clone_from(&name);
        if reading.elevated {
            warn!(collector = %name, value = %reading.value, "elevated usage");
        }
        if !forward(&queue, reading, &shutdown).await {
            break;
        }
    }

    debug!(collector = %name, "collector stopped");
}

/// Queue a reading unless shutdown fires while waiting for room. Returns
/// false once the collector should stop.
async fn forward(
    queue: &mpsc::Sender<MetricReading>,
    reading: MetricReading,
    shutdown: &ShutdownListener,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        sent = queue.send(reading) => sent.is_ok(),
    }
}

async fn apply_readings(
    mut readings: mpsc::Receiver<MetricReading>,
    table: Arc<SnapshotTable>,
) -> usize {
    let mut applied = 0;
    while let Some(reading) = readings.recv().await {
        table.set(reading.name.clone(), reading);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;

    #[tokio::test]
    async fn full_queue_send_gives_way_to_shutdown() {
        let (queue, mut readings) = mpsc::channel(1);
        queue.send(MetricReading::new("CPU", "first")).await.unwrap();
        let (shutdown, listener) = shutdown::channel();

        let pending = tokio::spawn(async move {
            forward(&queue, MetricReading::new("CPU", "late"), &listener).await
        });
        tokio::task::yield_now().await;
        shutdown.trigger();

        let queued = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("blocked send should stop on shutdown")
            .unwrap();
        assert!(!queued);
        assert_eq!(readings.recv().await.unwrap().value, "first");
        assert!(readings.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_with_room_is_queued() {
        let (queue, mut readings) = mpsc::channel(1);
        let (_shutdown, listener) = shutdown::channel();

        assert!(forward(&queue, MetricReading::new("Disk", "40.00%"), &listener).await);
        assert_eq!(readings.recv().await.unwrap().value, "40.00%");
    }
}
