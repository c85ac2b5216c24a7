// src/lib.rs

//! Data Service Client
//!
//! This crate provides the client side of a sharded data service: a
//! long-lived iterator that streams opaque compressed elements from a
//! dynamic fleet of remote worker processes, coordinated through a central
//! dispatcher.
//!
//! The iterator periodically polls the dispatcher for the current task list,
//! keeps a bounded pool of fetch workers busy against whichever workers are
//! assigned, retries preemption-class RPC failures with backoff, and
//! supports two ordering disciplines: non-deterministic interleave (the
//! default) and strict round-robin across a consumer group.

pub mod config;
pub mod error;
pub mod retry;
pub mod rpc;

// Re-export commonly used types for convenience
pub use config::{ClientConfig, OutstandingRequests, AUTOTUNE};
pub use error::{ClientError, Result};

pub mod dataset;
pub use dataset::{
    CancelHandle, ConsumerGroup, DataServiceDataset, DataServiceIterator, IterationCounter,
    IteratorMetrics, JobSpec,
};

pub use retry::RetryConfig;
pub use rpc::{
    DispatcherClient, GrpcDispatcherClient, GrpcWorkerClient, GrpcWorkerConnector, JobKey,
    ProcessingMode, TaskInfo, TaskList, WorkerClient, WorkerConnector,
};
