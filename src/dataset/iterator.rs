//! The data service iterator.
//!
//! [`DataServiceIterator`] is the public facade over the fetch engine: it
//! registers a job client with the dispatcher, lazily starts the task
//! manager on first use, and streams elements out of the shared result
//! queue. Teardown cancels the background tasks, releases the job client
//! handle, and waits for every fetch worker to exit.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::fetcher::FetchContext;
use super::manager::{self, ManagerContext};
use super::state::Shared;
use super::JobSpec;
use crate::config::{ClientConfig, OutstandingRequests};
use crate::error::{ClientError, Result};
use crate::retry::{retry_transient, RetryConfig};
use crate::rpc::{DispatcherClient, JobKey, WorkerConnector};

/// Point-in-time view of the iterator's fetch machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorMetrics {
    /// Tasks currently assigned and not yet at end of sequence.
    pub num_active_tasks: usize,
    /// Results currently buffered, ready or reserved.
    pub num_results_buffered: usize,
    pub job_name: Option<String>,
    /// Effective cap on buffered plus in-flight elements.
    pub max_outstanding_requests: usize,
}

/// Handle for cancelling an iterator from another task.
///
/// Cancellation takes effect at the next retry boundary of any in-flight
/// RPC; no request is forcibly interrupted.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

/// Streaming iterator over the elements of one data service job.
///
/// Interleaves elements from whichever workers the dispatcher currently
/// assigns. With a consumer group configured, reads are strict round-robin
/// across the task rotation instead.
pub struct DataServiceIterator {
    spec: JobSpec,
    config: ClientConfig,
    iterator_index: i64,
    shared: Arc<Shared>,
    fetch: Arc<FetchContext>,
    dispatcher: Arc<dyn DispatcherClient>,
    connector: Arc<dyn WorkerConnector>,
    job_client_id: Option<i64>,
    manager: Option<JoinHandle<()>>,
    released: bool,
}

impl DataServiceIterator {
    pub(crate) fn new(
        spec: JobSpec,
        config: ClientConfig,
        iterator_index: i64,
        dispatcher: Arc<dyn DispatcherClient>,
        connector: Arc<dyn WorkerConnector>,
    ) -> Self {
        let round_robin = spec.consumer.is_some();
        // Under autotune the cap starts at zero and follows the task count
        // from the first refresh on.
        let initial_max = match config.max_outstanding_requests {
            OutstandingRequests::Fixed(n) => n,
            OutstandingRequests::Auto => 0,
        };
        let shared = Shared::new(round_robin, initial_max);
        let fetch = Arc::new(FetchContext {
            shared: shared.clone(),
            consumer_index: spec.consumer.map(|c| c.index),
            retry: RetryConfig::from(&config),
        });
        Self {
            spec,
            config,
            iterator_index,
            shared,
            fetch,
            dispatcher,
            connector,
            job_client_id: None,
            manager: None,
            released: false,
        }
    }

    /// This iterator's index among iterators created from the same dataset.
    pub fn iterator_index(&self) -> i64 {
        self.iterator_index
    }

    /// Registers a job client with the dispatcher.
    ///
    /// Retries transient dispatcher errors with no deadline, so an
    /// unreachable dispatcher blocks here until the iterator is cancelled.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.job_client_id.is_some() {
            return Ok(());
        }
        tracing::debug!("Connecting to dispatcher at {}", self.config.address);

        let dataset_id = self.spec.dataset_id;
        let processing_mode = self.spec.processing_mode;
        let num_consumers = self.spec.consumer.map(|c| c.count);
        let job_key = self.spec.job_name.as_ref().map(|name| JobKey {
            job_name: name.clone(),
            iterator_index: self.iterator_index,
        });

        let retry = RetryConfig::from(&self.config);
        let description = format!(
            "get or create job with dispatcher at {}",
            self.config.address
        );
        let dispatcher = self.dispatcher.clone();
        let job_client_id = retry_transient(
            &retry,
            self.shared.cancel_watch(),
            None,
            &description,
            || {
                let dispatcher = dispatcher.clone();
                let job_key = job_key.clone();
                async move {
                    dispatcher
                        .get_or_create_job(dataset_id, processing_mode, job_key, num_consumers)
                        .await
                }
            },
        )
        .await
        .map_err(|status| {
            if status.code() == tonic::Code::Cancelled {
                ClientError::Cancelled
            } else {
                ClientError::dispatcher_with_status(format!("failed to {description}"), status)
            }
        })?;

        tracing::debug!("Created data service job with client id {}", job_client_id);
        self.job_client_id = Some(job_client_id);
        Ok(())
    }

    /// Returns the next element, or `None` once the job has finished and the
    /// queue has drained.
    ///
    /// The first call starts the task manager. A fatal fetch error is
    /// reported by exactly one call; cancellation surfaces as
    /// [`ClientError::Cancelled`].
    pub async fn next(&mut self) -> Result<Option<Vec<u8>>> {
        let job_client_id = self
            .job_client_id
            .ok_or_else(|| ClientError::iterator("iterator is not initialized"))?;

        if self.manager.is_none() && !self.shared.is_cancelled() {
            self.manager = Some(tokio::spawn(manager::run_manager(ManagerContext {
                shared: self.shared.clone(),
                dispatcher: self.dispatcher.clone(),
                connector: self.connector.clone(),
                fetch: self.fetch.clone(),
                job_client_id,
                refresh_interval: self.config.refresh_interval(),
                auto_tune: self.config.max_outstanding_requests.is_auto(),
            })));
        }

        loop {
            let notified = self.shared.get_next.notified();
            {
                let mut st = self.shared.lock();
                if st.cancelled {
                    return Err(ClientError::Cancelled);
                }
                if let Some(err) = st.status.take() {
                    return Err(err);
                }
                if st.front_ready() {
                    if let Some(slot) = st.pop_front() {
                        drop(st);
                        self.shared.worker.notify_one();
                        if slot.end_of_sequence {
                            return Ok(None);
                        }
                        return Ok(Some(slot.element.unwrap_or_default()));
                    }
                }
                if st.job_finished && st.num_running_workers == 0 {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    /// A handle that cancels this iterator from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: self.shared.clone(),
        }
    }

    /// Snapshot of the fetch machinery, taken under the lock.
    pub fn metrics(&self) -> IteratorMetrics {
        let st = self.shared.lock();
        IteratorMetrics {
            num_active_tasks: st.tasks.len() - st.finished_tasks,
            num_results_buffered: st.results.len(),
            job_name: self.spec.job_name.clone(),
            max_outstanding_requests: st.max_outstanding,
        }
    }

    /// Checkpointing the fetch position is not supported.
    pub fn save(&self) -> Result<()> {
        Err(ClientError::unsupported("saving iterator state"))
    }

    /// Restoring a checkpointed fetch position is not supported.
    pub fn restore(&mut self) -> Result<()> {
        Err(ClientError::unsupported("restoring iterator state"))
    }

    /// Cancels the iterator, waits for the task manager, releases the job
    /// client handle, and waits for every fetch worker to exit.
    pub async fn shutdown(&mut self) {
        self.shared.cancel();
        if let Some(manager) = self.manager.take() {
            let _ = manager.await;
        }
        self.release_job_client().await;
        for handle in self.shared.take_worker_handles() {
            let _ = handle.await;
        }
    }

    async fn release_job_client(&mut self) {
        if self.released {
            return;
        }
        if let Some(job_client_id) = self.job_client_id {
            self.released = true;
            if let Err(e) = self.dispatcher.release_job_client(job_client_id).await {
                tracing::warn!("Failed to release job client id {}: {}", job_client_id, e);
            }
        }
    }
}

impl Drop for DataServiceIterator {
    fn drop(&mut self) {
        self.shared.cancel();
        // Background tasks exit on their own once cancelled. The job client
        // release is fired best-effort when `shutdown` was skipped.
        if !self.released {
            if let Some(job_client_id) = self.job_client_id.take() {
                let dispatcher = self.dispatcher.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        if let Err(e) = dispatcher.release_job_client(job_client_id).await {
                            tracing::warn!(
                                "Failed to release job client id {}: {}",
                                job_client_id,
                                e
                            );
                        }
                    });
                }
            }
        }
    }
}
