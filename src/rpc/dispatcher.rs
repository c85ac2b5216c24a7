//! Dispatcher client implementation.
//!
//! This module provides the gRPC client the iterator uses to register itself
//! with the dispatcher and to poll job membership.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use super::proto::dispatcher_service_client::DispatcherServiceClient;
use super::proto::{GetOrCreateJobRequest, GetTasksRequest, ReleaseJobClientRequest};
use super::{JobKey, ProcessingMode, RpcResult, TaskList};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Trait for dispatcher client implementations.
#[async_trait]
pub trait DispatcherClient: Send + Sync {
    /// Register this consumer with the dispatcher, creating the job if it
    /// does not exist yet. Returns the job client id.
    async fn get_or_create_job(
        &self,
        dataset_id: i64,
        processing_mode: ProcessingMode,
        job_key: Option<JobKey>,
        num_consumers: Option<i64>,
    ) -> RpcResult<i64>;

    /// Fetch the current task list for this job client. Idempotent and safe
    /// to poll.
    async fn get_tasks(&self, job_client_id: i64) -> RpcResult<TaskList>;

    /// Release the job client handle (graceful teardown).
    async fn release_job_client(&self, job_client_id: i64) -> RpcResult<()>;
}

/// gRPC-based dispatcher client.
///
/// The channel connects lazily: construction only validates the address and
/// protocol, and connection failures surface as `Unavailable` statuses on the
/// first call, where the retry layer handles them.
#[derive(Debug, Clone)]
pub struct GrpcDispatcherClient {
    inner: DispatcherServiceClient<Channel>,
}

/// Build a lazily-connecting endpoint for `address` under `protocol`.
pub(crate) fn endpoint_for(
    address: &str,
    protocol: &str,
    connect_timeout: Duration,
) -> Result<Endpoint> {
    let scheme = match protocol {
        "grpc" => "http",
        "grpc+tls" => "https",
        other => {
            return Err(ClientError::config(format!(
                "unsupported protocol '{other}' (expected \"grpc\" or \"grpc+tls\")"
            )))
        }
    };
    let endpoint = Endpoint::from_shared(format!("{scheme}://{address}"))
        .map_err(|e| ClientError::config_with_source(format!("invalid address '{address}'"), e))?
        .connect_timeout(connect_timeout);
    Ok(endpoint)
}

impl GrpcDispatcherClient {
    /// Create a client for the dispatcher configured in `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = endpoint_for(&config.address, &config.protocol, config.connect_timeout())?;
        let channel = endpoint.connect_lazy();
        Ok(Self {
            inner: DispatcherServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl DispatcherClient for GrpcDispatcherClient {
    async fn get_or_create_job(
        &self,
        dataset_id: i64,
        processing_mode: ProcessingMode,
        job_key: Option<JobKey>,
        num_consumers: Option<i64>,
    ) -> RpcResult<i64> {
        let mut client = self.inner.clone();
        let request = Request::new(GetOrCreateJobRequest {
            dataset_id,
            processing_mode: processing_mode.to_string(),
            job_key: job_key.map(Into::into),
            num_consumers,
        });
        let response = client.get_or_create_job(request).await?;
        Ok(response.into_inner().job_client_id)
    }

    async fn get_tasks(&self, job_client_id: i64) -> RpcResult<TaskList> {
        let mut client = self.inner.clone();
        let request = Request::new(GetTasksRequest { job_client_id });
        let response = client.get_tasks(request).await?;
        Ok(TaskList::from(response.into_inner()))
    }

    async fn release_job_client(&self, job_client_id: i64) -> RpcResult<()> {
        let mut client = self.inner.clone();
        let request = Request::new(ReleaseJobClientRequest { job_client_id });
        client.release_job_client(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let mut config = ClientConfig::default();
        config.address = "localhost:5000".to_string();
        assert!(GrpcDispatcherClient::new(&config).is_ok());
    }

    #[test]
    fn test_unsupported_protocol() {
        let mut config = ClientConfig::default();
        config.address = "localhost:5000".to_string();
        config.protocol = "carrier-pigeon".to_string();
        assert!(GrpcDispatcherClient::new(&config).is_err());
    }

    #[test]
    fn test_invalid_address() {
        let mut config = ClientConfig::default();
        config.address = "not a valid address".to_string();
        assert!(GrpcDispatcherClient::new(&config).is_err());
    }
}
