//! Start and stop control of the batch submitter loop.

use crate::{BatcherError, Driver, DriverSetup};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// A running loop and the signals controlling it.
#[derive(Debug)]
struct Session {
    /// Stops new ticks and triggers the final drain.
    shutdown: CancellationToken,
    /// Aborts all network calls and in-flight sends.
    kill: CancellationToken,
    handle: JoinHandle<()>,
}

/// Posts L2 blocks to L1 from a background task.
///
/// A submitter can be started and stopped any number of times. Each start begins with a
/// cleared channel manager and fresh loop state.
#[derive(Debug)]
pub struct BatchSubmitter {
    setup: DriverSetup,
    session: Mutex<Option<Session>>,
}

impl BatchSubmitter {
    /// Creates a stopped [BatchSubmitter].
    pub fn new(setup: DriverSetup) -> Self {
        Self { setup, session: Mutex::new(None) }
    }

    /// Spawns the submission loop.
    ///
    /// Returns [BatcherError::AlreadyRunning] if the loop is already running, or
    /// [BatcherError::Config] if the configuration is invalid.
    pub async fn start(&self) -> Result<(), BatcherError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(BatcherError::AlreadyRunning);
        }
        self.setup.config.validate()?;
        info!(target: "batcher", "Starting batch submitter");

        self.setup.channel_manager.lock().clear();
        let shutdown = CancellationToken::new();
        let kill = CancellationToken::new();
        let (driver, receipts) = Driver::new(self.setup.clone(), kill.clone());
        let handle = tokio::spawn(driver.run(receipts, shutdown.clone()));
        *session = Some(Session { shutdown, kill, handle });

        info!(target: "batcher", "Batch submitter started");
        Ok(())
    }

    /// Stops the loop after it published all remaining channel data.
    ///
    /// If `ctx` is cancelled before the loop finished, in-flight work is aborted. Returns once
    /// the loop exited, or [BatcherError::NotRunning] if it was not running.
    pub async fn stop(&self, ctx: CancellationToken) -> Result<(), BatcherError> {
        let mut session = self.session.lock().await;
        let Some(Session { shutdown, kill, mut handle }) = session.take() else {
            return Err(BatcherError::NotRunning);
        };
        info!(target: "batcher", "Stopping batch submitter");

        shutdown.cancel();
        let res = tokio::select! {
            res = &mut handle => res,
            _ = ctx.cancelled() => {
                warn!(target: "batcher", "Stop deadline reached, aborting in-flight work");
                kill.cancel();
                handle.await
            }
        };
        kill.cancel();
        if let Err(err) = res {
            error!(target: "batcher", %err, "Batch submitter loop failed");
        }

        info!(target: "batcher", "Batch submitter stopped");
        Ok(())
    }

    /// Like [Self::stop], but succeeds if the loop was not running.
    pub async fn stop_if_running(&self, ctx: CancellationToken) -> Result<(), BatcherError> {
        match self.stop(ctx).await {
            Err(BatcherError::NotRunning) => Ok(()),
            res => res,
        }
    }

    /// Returns `true` if the loop is running.
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BatcherConfig, ConfigError,
        test_utils::{MockTxManager, TestHarness, init_test_tracing, l2_chain, test_config},
    };
    use alloy_primitives::B256;
    use core::time::Duration;
    use std::sync::Arc;

    fn submitter(harness: &TestHarness, config: BatcherConfig) -> BatchSubmitter {
        init_test_tracing();
        harness.serve(&l2_chain(100, 105, B256::repeat_byte(0x99), 0), 100, 105);
        BatchSubmitter::new(harness.setup(config))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_graceful_stop() {
        let harness = TestHarness::default();
        let submitter = submitter(&harness, test_config());

        submitter.start().await.unwrap();
        assert!(submitter.is_running().await);
        assert_eq!(harness.channel_manager.lock().clears(), 1);

        // No tick before one poll interval elapsed.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(harness.endpoints.eth.fetched().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(harness.endpoints.eth.fetched(), vec![101, 102, 103, 104, 105]);

        submitter.stop(CancellationToken::new()).await.unwrap();
        assert!(!submitter.is_running().await);
        let channel_manager = harness.channel_manager.lock();
        assert_eq!(channel_manager.confirmed_blocks(), vec![101, 102, 103, 104, 105]);
        assert_eq!(channel_manager.closes(), 1);
        assert_eq!(channel_manager.in_flight_frames(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_before_final_publish() {
        let harness = TestHarness::default();
        harness.channel_manager.lock().frames_on_close = true;
        let submitter = submitter(&harness, test_config());

        submitter.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(harness.endpoints.eth.fetched(), vec![101, 102, 103, 104, 105]);
        // Frames are held in the open channel until it is closed.
        assert_eq!(harness.tx_manager.started(), 0);

        submitter.stop(CancellationToken::new()).await.unwrap();
        let channel_manager = harness.channel_manager.lock();
        assert_eq!(channel_manager.closes(), 1);
        assert_eq!(channel_manager.confirmed_blocks(), vec![101, 102, 103, 104, 105]);
        assert_eq!(channel_manager.pending_frames(), 0);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let harness = TestHarness::default();
        let config = BatcherConfig { poll_interval: Duration::ZERO.into(), ..test_config() };
        let submitter = submitter(&harness, config);

        assert!(matches!(
            submitter.start().await,
            Err(BatcherError::Config(ConfigError::ZeroDuration("poll interval")))
        ));
        assert!(!submitter.is_running().await);
        assert_eq!(harness.channel_manager.lock().clears(), 0);
        assert!(matches!(
            submitter.stop(CancellationToken::new()).await,
            Err(BatcherError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let harness = TestHarness::default();
        let submitter = submitter(&harness, test_config());

        assert!(matches!(
            submitter.stop(CancellationToken::new()).await,
            Err(BatcherError::NotRunning)
        ));
        submitter.stop_if_running(CancellationToken::new()).await.unwrap();

        submitter.start().await.unwrap();
        assert!(matches!(submitter.start().await, Err(BatcherError::AlreadyRunning)));
        submitter.stop(CancellationToken::new()).await.unwrap();

        // Restarting after a stop begins a new session.
        submitter.start().await.unwrap();
        submitter.stop_if_running(CancellationToken::new()).await.unwrap();
        assert_eq!(harness.channel_manager.lock().clears(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_transactions() {
        let (tx_manager, gate) = MockTxManager::gated();
        let harness = TestHarness::with_tx_manager(tx_manager);
        let submitter = Arc::new(submitter(&harness, test_config()));

        submitter.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(harness.tx_manager.started(), 1);

        let stop = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            async move { submitter.stop(CancellationToken::new()).await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!stop.is_finished());

        gate.add_permits(5);
        stop.await.unwrap().unwrap();
        assert_eq!(
            harness.channel_manager.lock().confirmed_blocks(),
            vec![101, 102, 103, 104, 105]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_stop_kills_in_flight_work() {
        let (tx_manager, _gate) = MockTxManager::gated();
        let harness = TestHarness::with_tx_manager(tx_manager);
        let submitter = submitter(&harness, test_config());

        submitter.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(harness.tx_manager.started(), 1);

        let ctx = CancellationToken::new();
        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(5), submitter.stop(ctx))
            .await
            .expect("stop should not hang")
            .unwrap();

        assert!(!submitter.is_running().await);
        let channel_manager = harness.channel_manager.lock();
        assert!(channel_manager.confirmed().is_empty());
        assert!(!channel_manager.failed().is_empty());
        assert_eq!(channel_manager.in_flight_frames(), 0);
        assert_eq!(harness.metrics.confirmed(), 0);
    }
}
