//! Scheduled jobs for periodic lifecycle maintenance.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use agora_common::{AppResult, LifecycleConfig};
use agora_core::services::{LifecycleService, SweepReport};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between lifecycle sweeps (default: 1 minute).
    pub sweep_interval: Duration,
    /// Maximum items advanced per sweep.
    pub sweep_batch_size: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            sweep_batch_size: 100,
        }
    }
}

impl SchedulerConfig {
    /// Scheduler settings from lifecycle configuration.
    ///
    /// Returns `None` when the sweep interval is zero.
    #[must_use]
    pub fn from_lifecycle(config: &LifecycleConfig) -> Option<Self> {
        (config.sweep_interval_secs > 0).then(|| Self {
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            sweep_batch_size: config.sweep_batch_size.max(1),
        })
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Execute a lifecycle sweep over at most `batch_size` items, continuing
    /// after `after_id`.
    async fn sweep_lifecycle(
        &self,
        batch_size: u64,
        after_id: Option<&str>,
    ) -> AppResult<SweepReport>;
}

#[async_trait::async_trait]
impl JobExecutor for LifecycleService {
    async fn sweep_lifecycle(
        &self,
        batch_size: u64,
        after_id: Option<&str>,
    ) -> AppResult<SweepReport> {
        self.sweep(batch_size, after_id).await
    }
}

/// Run the scheduler with the given configuration and executor.
///
/// Each sweep picks up where the previous full page stopped, so a backlog
/// of items that cannot move yet is paged through instead of re-read.
/// The returned handle can be aborted on shutdown.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
) -> JoinHandle<()> {
    tracing::info!(
        interval_secs = config.sweep_interval.as_secs(),
        batch_size = config.sweep_batch_size,
        "Lifecycle sweeper started"
    );

    tokio::spawn(async move {
        let mut interval = interval(config.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cursor: Option<String> = None;
        loop {
            interval.tick().await;
            let result = executor
                .sweep_lifecycle(config.sweep_batch_size, cursor.as_deref())
                .await;
            match result {
                Ok(report) => {
                    if report.advanced > 0 || report.failed > 0 {
                        tracing::info!(
                            examined = report.examined,
                            advanced = report.advanced,
                            failed = report.failed,
                            "Lifecycle sweep finished"
                        );
                    } else {
                        tracing::debug!(examined = report.examined, "Lifecycle sweep idle");
                    }
                    cursor = report.resume_after;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Lifecycle sweep failed");
                    cursor = None;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_common::AppError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicU64,
        last_batch: AtomicU64,
        cursors: Mutex<Vec<Option<String>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl JobExecutor for CountingExecutor {
        async fn sweep_lifecycle(
            &self,
            batch_size: u64,
            after_id: Option<&str>,
        ) -> AppResult<SweepReport> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_batch.store(batch_size, Ordering::SeqCst);
            self.cursors.lock().unwrap().push(after_id.map(str::to_string));
            if self.fail {
                return Err(AppError::StoreUnavailable("connection refused".to_string()));
            }
            // Every other sweep fills its page.
            Ok(SweepReport {
                examined: batch_size as usize,
                resume_after: (call % 2 == 0).then(|| format!("page{call}")),
                ..SweepReport::default()
            })
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            sweep_interval: Duration::from_millis(5),
            sweep_batch_size: 25,
        }
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.sweep_batch_size, 100);
    }

    #[test]
    fn test_zero_interval_disables_sweeper() {
        let config = LifecycleConfig {
            sweep_interval_secs: 0,
            ..LifecycleConfig::default()
        };
        assert!(SchedulerConfig::from_lifecycle(&config).is_none());

        let config = LifecycleConfig {
            sweep_interval_secs: 30,
            sweep_batch_size: 0,
            ..LifecycleConfig::default()
        };
        let scheduler = SchedulerConfig::from_lifecycle(&config).unwrap();
        assert_eq!(scheduler.sweep_interval, Duration::from_secs(30));
        assert_eq!(scheduler.sweep_batch_size, 1);
    }

    #[tokio::test]
    async fn test_scheduler_runs_sweeps_with_batch_size() {
        let executor = Arc::new(CountingExecutor::default());

        let handle = run_scheduler(fast_config(), Arc::clone(&executor));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        assert!(executor.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(executor.last_batch.load(Ordering::SeqCst), 25);
    }

    #[tokio::test]
    async fn test_scheduler_continues_after_full_page() {
        let executor = Arc::new(CountingExecutor::default());

        let handle = run_scheduler(fast_config(), Arc::clone(&executor));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        let cursors = executor.cursors.lock().unwrap().clone();
        assert!(cursors.len() >= 3);
        assert_eq!(cursors[0], None);
        assert_eq!(cursors[1].as_deref(), Some("page0"));
        assert_eq!(cursors[2], None);
    }

    #[tokio::test]
    async fn test_scheduler_keeps_running_after_failures() {
        let executor = Arc::new(CountingExecutor {
            fail: true,
            ..CountingExecutor::default()
        });

        let handle = run_scheduler(fast_config(), Arc::clone(&executor));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        assert!(executor.calls.load(Ordering::SeqCst) >= 2);
        assert!(executor.cursors.lock().unwrap().iter().all(Option::is_none));
    }
}
