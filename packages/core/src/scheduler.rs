// Фоновое обслуживание: периодическая ротация ключей и переоценка угрозы
//
// Два независимых цикла; остановка через watch-канал. Период ротации
// берётся из keyRotationInterval фабрики и перечитывается на каждом цикле.

use crate::config::AgilityConfig;
use crate::crypto::keys::KeyManagementService;
use crate::monitor::SecurityMonitor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Счётчики выполненных проходов
#[derive(Debug, Default)]
pub struct SchedulerStats {
    rotation_sweeps: AtomicU64,
    threat_assessments: AtomicU64,
}

impl SchedulerStats {
    pub fn rotation_sweeps(&self) -> u64 {
        self.rotation_sweeps.load(Ordering::Relaxed)
    }

    pub fn threat_assessments(&self) -> u64 {
        self.threat_assessments.load(Ordering::Relaxed)
    }
}

/// Handle to the running maintenance tasks. Dropping it without calling
/// [`shutdown`](Self::shutdown) leaves the tasks running until the runtime stops.
#[derive(Debug)]
pub struct MaintenanceScheduler {
    shutdown: watch::Sender<bool>,
    stats: Arc<SchedulerStats>,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceScheduler {
    /// Spawns the rotation sweep and the threat assessment loops on the
    /// current tokio runtime. Both fire once immediately. Sweeps repeat every
    /// `keyRotationInterval` hours of the KMS factory config; a config update
    /// takes effect after the sweep already waiting.
    pub fn spawn(
        kms: Arc<KeyManagementService>,
        monitor: Arc<SecurityMonitor>,
        config: &AgilityConfig,
    ) -> Self {
        use tracing::info;

        let (shutdown, _) = watch::channel(false);
        let stats = Arc::new(SchedulerStats::default());

        let rotation_every = kms.factory().config().key_rotation_interval();
        let rotation = {
            let mut stop = shutdown.subscribe();
            let stats = Arc::clone(&stats);
            let timeout = config.rotation_timeout;
            tokio::spawn(async move {
                loop {
                    run_rotation_sweep(&kms, timeout).await;
                    stats.rotation_sweeps.fetch_add(1, Ordering::Relaxed);

                    let period = kms.factory().config().key_rotation_interval();
                    tokio::select! {
                        _ = tokio::time::sleep(period) => {}
                        _ = stop.changed() => break,
                    }
                }
            })
        };

        let assessment = {
            let mut stop = shutdown.subscribe();
            let stats = Arc::clone(&stats);
            let period = config.threat_assessment_interval;
            tokio::spawn(async move {
                let mut ticker = interval(period);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            monitor.assess_quantum_threat();
                            stats.threat_assessments.fetch_add(1, Ordering::Relaxed);
                        }
                        _ = stop.changed() => break,
                    }
                }
            })
        };

        info!(
            target: "scheduler",
            rotation_every = ?rotation_every,
            assess_every = ?config.threat_assessment_interval,
            "Maintenance scheduler started"
        );

        Self {
            shutdown,
            stats,
            tasks: vec![rotation, assessment],
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Signals both loops and waits for them to finish. A rotation already
    /// handed to the blocking pool completes on its own.
    pub async fn shutdown(self) {
        use tracing::{info, warn};

        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(target: "scheduler", error = %e, "Maintenance task ended abnormally");
            }
        }
        info!(target: "scheduler", "Maintenance scheduler stopped");
    }
}

fn interval(period: Duration) -> tokio::time::Interval {
    // tokio паникует на нулевом периоде
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_rotation_sweep(kms: &Arc<KeyManagementService>, timeout: Duration) {
    use tracing::{debug, warn};

    let report = kms.perform_scheduled_rotations_with_timeout(timeout).await;
    if report.failed.is_empty() {
        debug!(
            target: "scheduler",
            rotated = report.rotated.len(),
            expired = report.expired.len(),
            "Rotation sweep done"
        );
    } else {
        warn!(
            target: "scheduler",
            rotated = report.rotated.len(),
            failed = report.failed.len(),
            "Rotation sweep finished with failures"
        );
    }
}
