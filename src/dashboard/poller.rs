use crate::dashboard::fetcher::Fetcher;
use crate::dashboard::models::{PredictionRecord, SensorReading};
use crate::dashboard::normalizer::Normalizer;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

/// Everything the dashboard pages are derived from. Rebuilt on every refresh.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Newest first.
    pub readings: Vec<SensorReading>,
    /// Newest first.
    pub history: Vec<SensorReading>,
    /// Earliest stage date first.
    pub predictions: Vec<PredictionRecord>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Fetch failures of the last refresh, until dismissed.
    pub banner: Option<String>,
    /// Number of published refreshes; 0 before the first one.
    pub generation: u64,
    /// Records dropped by normalization in the last refresh.
    pub dropped: usize,
}

impl Snapshot {
    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }
}

/// Cheap handle for readers of the latest snapshot.
#[derive(Clone)]
pub struct PollerHandle {
    snapshot_tx: Arc<watch::Sender<Arc<Snapshot>>>,
    snapshot_rx: watch::Receiver<Arc<Snapshot>>,
    refresh: Arc<Notify>,
    offset: FixedOffset,
}

impl PollerHandle {
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_rx.clone()
    }

    /// Ask the poller to refresh without waiting for the next tick.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Hide the banner of the current snapshot. The next refresh with a
    /// failing source shows it again. Returns false if no banner was shown.
    pub fn dismiss_banner(&self) -> bool {
        self.snapshot_tx.send_if_modified(|snapshot| {
            if snapshot.banner.is_none() {
                return false;
            }
            Arc::make_mut(snapshot).banner = None;
            true
        })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

pub struct PollerSettings {
    pub refresh_interval: Duration,
    pub initial_delay: Duration,
    pub offset: FixedOffset,
}

/// Periodically fetches the three data sources and publishes a [`Snapshot`].
///
/// Refreshes run one at a time inside the poller task, so the published
/// snapshot is always the one from the latest completed refresh. The task
/// stops when the shutdown channel flips, abandoning any refresh still in
/// flight.
pub struct Poller {
    fetcher: Arc<Fetcher>,
    normalizer: Normalizer,
    settings: PollerSettings,
    snapshot_tx: Arc<watch::Sender<Arc<Snapshot>>>,
    refresh: Arc<Notify>,
    shutdown_rx: watch::Receiver<bool>,
    generation: u64,
}

impl Poller {
    pub fn new(
        fetcher: Arc<Fetcher>,
        settings: PollerSettings,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, PollerHandle) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Snapshot::default()));
        let snapshot_tx = Arc::new(snapshot_tx);
        let refresh = Arc::new(Notify::new());

        let handle = PollerHandle {
            snapshot_tx: snapshot_tx.clone(),
            snapshot_rx,
            refresh: refresh.clone(),
            offset: settings.offset,
        };

        let poller = Self {
            fetcher,
            normalizer: Normalizer::new(settings.offset),
            settings,
            snapshot_tx,
            refresh,
            shutdown_rx,
            generation: 0,
        };

        (poller, handle)
    }

    pub async fn run(&mut self) {
        info!(
            "Poller starting with {:?} initial delay, {:?} interval against {}",
            self.settings.initial_delay,
            self.settings.refresh_interval,
            self.fetcher.base_url()
        );

        tokio::select! {
            _ = tokio::time::sleep(self.settings.initial_delay) => {},
            _ = self.shutdown_rx.changed() => {
                info!("Shutdown received during initial delay");
                return;
            }
        }

        if self.refresh().await.is_none() {
            return;
        }

        let mut ticker = interval(self.settings.refresh_interval);
        ticker.tick().await; // First tick is immediate, skip it

        let refresh = self.refresh.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.refresh().await.is_none() {
                        break;
                    }
                }
                _ = refresh.notified() => {
                    info!("Manual refresh requested");
                    if self.refresh().await.is_none() {
                        break;
                    }
                    ticker.reset();
                }
                _ = self.shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping poller");
                    break;
                }
            }
        }
    }

    /// Fetch all sources once and publish the result.
    ///
    /// Returns `None` when the poller is torn down before the fetch
    /// completes; nothing is published then.
    pub async fn refresh(&mut self) -> Option<Arc<Snapshot>> {
        let fetcher = self.fetcher.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        let (sensors, history, predictions) = tokio::select! {
            results = async {
                tokio::join!(
                    fetcher.sensor_records(),
                    fetcher.history_records(),
                    fetcher.prediction_records(),
                )
            } => results,
            _ = async {
                // Without a sender nothing can tear the poller down
                if shutdown_rx.wait_for(|stopped| *stopped).await.is_err() {
                    std::future::pending::<()>().await;
                }
            } => {
                info!("Abandoning in-flight refresh on teardown");
                return None;
            }
        };

        if *self.shutdown_rx.borrow() {
            info!("Discarding refresh that completed after teardown");
            return None;
        }

        let mut failures = Vec::new();
        let mut dropped = 0;

        let readings = match sensors {
            Ok(records) => {
                let (readings, stats) = self.normalizer.sensor_readings(&records);
                dropped += stats.dropped;
                readings
            }
            Err(e) => {
                error!("Sensor data refresh failed: {}", e);
                failures.push(format!("Sensor data: {}", e));
                Vec::new()
            }
        };

        let history = match history {
            Ok(records) => {
                let (readings, stats) = self.normalizer.sensor_readings(&records);
                dropped += stats.dropped;
                readings
            }
            Err(e) => {
                error!("Sensor history refresh failed: {}", e);
                failures.push(format!("Sensor history: {}", e));
                Vec::new()
            }
        };

        let predictions = match predictions {
            Ok(records) => {
                let (predictions, stats) = self.normalizer.predictions(&records);
                dropped += stats.dropped;
                predictions
            }
            Err(e) => {
                error!("Prediction data refresh failed: {}", e);
                failures.push(format!("Prediction data: {}", e));
                Vec::new()
            }
        };

        if dropped > 0 {
            warn!("Dropped {} malformed records during refresh", dropped);
        }

        self.generation += 1;
        let snapshot = Arc::new(Snapshot {
            readings,
            history,
            predictions,
            fetched_at: Some(Utc::now()),
            banner: (!failures.is_empty()).then(|| failures.join("; ")),
            generation: self.generation,
            dropped,
        });

        info!(
            "Refresh {} published: {} readings, {} history, {} predictions",
            snapshot.generation,
            snapshot.readings.len(),
            snapshot.history.len(),
            snapshot.predictions.len()
        );

        self.snapshot_tx.send_replace(snapshot.clone());
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PollerSettings {
        PollerSettings {
            refresh_interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(0),
            offset: FixedOffset::east_opt(8 * 3600).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_handle_starts_with_empty_snapshot() {
        let fetcher = Arc::new(Fetcher::new("http://127.0.0.1:9", None, 0).unwrap());
        let (_tx, rx) = watch::channel(false);
        let (_poller, handle) = Poller::new(fetcher, settings(), rx);

        let snapshot = handle.snapshot();
        assert!(!snapshot.is_loaded());
        assert!(snapshot.readings.is_empty());
        assert!(snapshot.banner.is_none());
        assert_eq!(handle.offset().local_minus_utc(), 8 * 3600);
    }

    #[tokio::test]
    async fn test_run_returns_on_shutdown_during_delay() {
        let fetcher = Arc::new(Fetcher::new("http://127.0.0.1:9", None, 0).unwrap());
        let (tx, rx) = watch::channel(false);
        let mut s = settings();
        s.initial_delay = Duration::from_secs(3600);
        let (mut poller, handle) = Poller::new(fetcher, s, rx);

        let task = tokio::spawn(async move { poller.run().await });
        tx.send(true).unwrap();
        task.await.unwrap();

        assert!(!handle.snapshot().is_loaded());
    }
}
