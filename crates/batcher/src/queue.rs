//! A bounded queue of in-flight batcher transactions.

use crate::{BlockId, TargetMode, TxManager, TxManagerError};
use alloy_primitives::{Address, B256, Bytes};
use core::fmt;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// A transaction to be published by the [TxManager].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCandidate {
    /// The mode the candidate was built for. [TargetMode::L2Halted] candidates go to L2.
    pub mode: TargetMode,
    /// The recipient of the transaction.
    pub to: Address,
    /// The call data of the transaction.
    pub tx_data: Bytes,
    /// The gas limit of the transaction.
    pub gas_limit: u64,
}

/// Where a confirmed transaction landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfirmation {
    /// The transaction hash.
    pub tx_hash: B256,
    /// The block the transaction was included in.
    pub block: BlockId,
}

/// The outcome of a queued transaction, tagged with the id it was queued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt<T> {
    /// The id passed to [TxQueue::send].
    pub id: T,
    /// The confirmation, or the reason the transaction failed.
    pub result: Result<TxConfirmation, TxManagerError>,
}

/// Sends transactions through a [TxManager] with a cap on how many are in flight.
///
/// Every queued transaction produces exactly one [TxReceipt] on the channel it was queued
/// with, including transactions aborted by the kill token.
pub struct TxQueue {
    tx_manager: Arc<dyn TxManager>,
    slots: Option<Arc<Semaphore>>,
    tasks: TaskTracker,
    kill: CancellationToken,
}

impl fmt::Debug for TxQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxQueue")
            .field("available_slots", &self.slots.as_ref().map(|s| s.available_permits()))
            .field("in_flight", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl TxQueue {
    /// Creates a new [TxQueue]. A `max_pending` of 0 disables the cap.
    pub fn new(
        tx_manager: Arc<dyn TxManager>,
        max_pending: usize,
        kill: CancellationToken,
    ) -> Self {
        Self {
            tx_manager,
            slots: (max_pending > 0).then(|| Arc::new(Semaphore::new(max_pending))),
            tasks: TaskTracker::new(),
            kill,
        }
    }

    /// Queues a transaction, waiting for a free slot if the queue is full.
    ///
    /// Returns once the send has started; the outcome is delivered on `receipts`.
    pub async fn send<T>(
        &self,
        id: T,
        candidate: TxCandidate,
        receipts: mpsc::UnboundedSender<TxReceipt<T>>,
    ) where
        T: Send + 'static,
    {
        let permit = match &self.slots {
            Some(slots) => {
                let acquired = tokio::select! {
                    biased;
                    _ = self.kill.cancelled() => None,
                    permit = Arc::clone(slots).acquire_owned() => permit.ok(),
                };
                let Some(permit) = acquired else {
                    let _ = receipts.send(TxReceipt { id, result: Err(TxManagerError::Cancelled) });
                    return;
                };
                Some(permit)
            }
            None => None,
        };

        let tx_manager = Arc::clone(&self.tx_manager);
        let kill = self.kill.clone();
        self.tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = kill.cancelled() => Err(TxManagerError::Cancelled),
                res = tx_manager.send(candidate) => res,
            };
            // The slot is only released once the receipt is delivered.
            let _ = receipts.send(TxReceipt { id, result });
            drop(permit);
        });
    }

    /// Waits until every queued transaction has delivered its receipt.
    pub async fn wait(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Returns the number of transactions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}
