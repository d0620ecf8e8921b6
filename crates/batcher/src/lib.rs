#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod block;
pub use block::{BlockId, BlockRef, L2Block, L2BlockRef, SyncStatus};

mod tx_data;
pub use tx_data::{ChannelId, DERIVATION_VERSION_0, FrameId, TxData};

mod errors;
pub use errors::{BatcherError, ChannelError, ClientError, ConfigError, GasError, TxManagerError};

mod gas;
pub use gas::{GasRuleKind, IntrinsicGasRule};

mod config;
pub use config::BatcherConfig;

mod traits;
pub use traits::{ChannelManager, L1Client, L2Client, L2EndpointProvider, RollupClient, TxManager};

mod mode;
pub use mode::{HaltDetector, SubmissionTarget, TargetMode, TargetSelector};

mod queue;
pub use queue::{TxCandidate, TxConfirmation, TxQueue, TxReceipt};

mod timeout;

mod metrics;
pub use metrics::{BatcherMetrics, Metricer, NoopMetrics};

mod driver;
pub use driver::DriverSetup;
use driver::Driver;

mod submitter;
pub use submitter::BatchSubmitter;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
