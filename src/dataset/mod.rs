//! Data service dataset and iterator.
//!
//! This module provides the consumer-facing entry point for reading a job
//! from the sharded data service:
//!
//! - [`DataServiceDataset`] identifies the job and hands out iterators
//! - [`DataServiceIterator`] streams elements from whichever workers the
//!   dispatcher currently assigns, tolerating worker churn and transient
//!   RPC failures
//!
//! # Example
//!
//! ```ignore
//! use datasvc_client::{ClientConfig, DataServiceDataset, JobSpec, ProcessingMode};
//!
//! let mut config = ClientConfig::default();
//! config.address = "dispatcher:5000".to_string();
//!
//! let spec = JobSpec {
//!     dataset_id: 42,
//!     processing_mode: ProcessingMode::ParallelEpochs,
//!     job_name: None,
//!     consumer: None,
//! };
//!
//! let dataset = DataServiceDataset::new(spec, config)?;
//! let mut iter = dataset.iterator();
//! iter.initialize().await?;
//! while let Some(element) = iter.next().await? {
//!     // element holds opaque compressed bytes
//! }
//! ```

mod fetcher;
mod iterator;
mod manager;
mod state;

pub use iterator::{CancelHandle, DataServiceIterator, IteratorMetrics};

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::rpc::{
    DispatcherClient, GrpcDispatcherClient, GrpcWorkerConnector, ProcessingMode, WorkerConnector,
};

/// Position of one consumer within a round-robin consumer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerGroup {
    /// This consumer's index, in `0..count`.
    pub index: i64,
    /// Total number of consumers reading the job.
    pub count: i64,
}

impl ConsumerGroup {
    /// Builds the group from the raw scalar encoding, where negative values
    /// mean "absent". Both values must be present or absent together.
    pub fn from_raw(consumer_index: i64, num_consumers: i64) -> Result<Option<Self>> {
        match (consumer_index >= 0, num_consumers >= 0) {
            (true, true) => Ok(Some(Self {
                index: consumer_index,
                count: num_consumers,
            })),
            (false, false) => Ok(None),
            _ => Err(ClientError::config(
                "consumer_index and num_consumers must be set together",
            )),
        }
    }
}

/// Identity of the job this consumer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub dataset_id: i64,
    pub processing_mode: ProcessingMode,
    /// Absent means an anonymous job private to this consumer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    /// Present selects strict round-robin reads across the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ConsumerGroup>,
}

impl JobSpec {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.job_name {
            if name.is_empty() {
                return Err(ClientError::config("job_name must be non-empty when set"));
            }
        }
        if let Some(consumer) = &self.consumer {
            if consumer.count <= 0 {
                return Err(ClientError::config(format!(
                    "num_consumers must be positive, got {}",
                    consumer.count
                )));
            }
            if consumer.index < 0 || consumer.index >= consumer.count {
                return Err(ClientError::config(format!(
                    "consumer_index must be in [0, {}), got {}",
                    consumer.count, consumer.index
                )));
            }
        }
        Ok(())
    }
}

/// Hands out distinct iterator indices for successive iterators over the
/// same dataset, so named-job coordinators can tell them apart.
#[derive(Debug, Default)]
pub struct IterationCounter {
    next: AtomicI64,
}

impl IterationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_and_increment(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// A handle to one data service job, from which iterators are created.
///
/// The dataset owns the iteration counter; it is shared with every iterator
/// it creates and goes away with the last of them.
pub struct DataServiceDataset {
    spec: JobSpec,
    config: ClientConfig,
    counter: Arc<IterationCounter>,
    dispatcher: Arc<dyn DispatcherClient>,
    connector: Arc<dyn WorkerConnector>,
}

impl DataServiceDataset {
    /// Validates the spec and configuration and prepares lazily-connecting
    /// gRPC clients for the dispatcher and workers.
    pub fn new(spec: JobSpec, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        spec.validate()?;
        let dispatcher = Arc::new(GrpcDispatcherClient::new(&config)?);
        let connector = Arc::new(GrpcWorkerConnector::new(&config));
        Ok(Self::with_clients(spec, config, dispatcher, connector))
    }

    /// Builds a dataset over externally supplied clients. This is the seam
    /// used to exercise the fetch engine against in-memory fakes.
    pub fn with_clients(
        spec: JobSpec,
        config: ClientConfig,
        dispatcher: Arc<dyn DispatcherClient>,
        connector: Arc<dyn WorkerConnector>,
    ) -> Self {
        Self {
            spec,
            config,
            counter: Arc::new(IterationCounter::new()),
            dispatcher,
            connector,
        }
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Creates a new iterator over this job with a fresh iteration index.
    pub fn iterator(&self) -> DataServiceIterator {
        DataServiceIterator::new(
            self.spec.clone(),
            self.config.clone(),
            self.counter.get_and_increment(),
            self.dispatcher.clone(),
            self.connector.clone(),
        )
    }
}
