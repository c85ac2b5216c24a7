//! Worker client implementation.
//!
//! Each task the dispatcher reports carries a worker address; the iterator
//! opens one client per task through a [`WorkerConnector`] so tests can
//! substitute scripted fakes for real workers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::Request;

use super::dispatcher::endpoint_for;
use super::proto::worker_service_client::WorkerServiceClient;
use super::proto::GetElementRequest;
use super::RpcResult;
use crate::config::ClientConfig;
use crate::error::Result;

/// Trait for worker client implementations.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Fetch one element for `task_id`. Returns `None` at end of sequence.
    ///
    /// `consumer_index` and `round_index` are set only for round-robin
    /// consumer groups, where the worker serves each round deterministically.
    async fn get_element(
        &self,
        task_id: i64,
        consumer_index: Option<i64>,
        round_index: Option<i64>,
    ) -> RpcResult<Option<Vec<u8>>>;
}

/// Constructs a worker client for an address reported by the dispatcher.
pub trait WorkerConnector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Arc<dyn WorkerClient>>;
}

/// gRPC-based worker client. The channel connects lazily, so construction
/// fails only on an invalid address or protocol.
#[derive(Debug, Clone)]
pub struct GrpcWorkerClient {
    inner: WorkerServiceClient<Channel>,
}

impl GrpcWorkerClient {
    pub fn new(address: &str, protocol: &str, connect_timeout: Duration) -> Result<Self> {
        let endpoint = endpoint_for(address, protocol, connect_timeout)?;
        let channel = endpoint.connect_lazy();
        Ok(Self {
            inner: WorkerServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl WorkerClient for GrpcWorkerClient {
    async fn get_element(
        &self,
        task_id: i64,
        consumer_index: Option<i64>,
        round_index: Option<i64>,
    ) -> RpcResult<Option<Vec<u8>>> {
        let mut client = self.inner.clone();
        let request = Request::new(GetElementRequest {
            task_id,
            consumer_index,
            round_index,
        });
        let response = client.get_element(request).await?.into_inner();
        if response.end_of_sequence {
            Ok(None)
        } else {
            Ok(Some(response.compressed_element))
        }
    }
}

/// Connector producing lazily-connecting gRPC worker clients that share the
/// iterator's protocol and timeout settings.
#[derive(Debug, Clone)]
pub struct GrpcWorkerConnector {
    protocol: String,
    connect_timeout: Duration,
}

impl GrpcWorkerConnector {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            protocol: config.protocol.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

impl WorkerConnector for GrpcWorkerConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn WorkerClient>> {
        let client = GrpcWorkerClient::new(address, &self.protocol, self.connect_timeout)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connector_creation() {
        let mut config = ClientConfig::default();
        config.address = "localhost:5000".to_string();
        let connector = GrpcWorkerConnector::new(&config);
        assert!(connector.connect("worker-1:4000").is_ok());
        assert!(connector.connect("not a valid address").is_err());
    }
}
