// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Dispatcher error: {message}")]
    Dispatcher {
        message: String,
        #[source]
        source: Option<tonic::Status>,
    },

    #[error("Failed to get element from worker {address}: {message}")]
    Worker {
        address: String,
        code: tonic::Code,
        message: String,
    },

    #[error("Iterator error: {message}")]
    Iterator {
        message: String,
    },

    #[error("Data service iterator was cancelled")]
    Cancelled,

    #[error("{operation} is not supported")]
    Unsupported {
        operation: String,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;

// Convenience constructors
impl ClientError {

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn dispatcher(message: impl Into<String>) -> Self {
        Self::Dispatcher {
            message: message.into(),
            source: None,
        }
    }

    pub fn dispatcher_with_status(message: impl Into<String>, status: tonic::Status) -> Self {
        Self::Dispatcher {
            message: message.into(),
            source: Some(status),
        }
    }

    pub fn worker(address: impl Into<String>, status: &tonic::Status) -> Self {
        Self::Worker {
            address: address.into(),
            code: status.code(),
            message: status.message().to_string(),
        }
    }

    pub fn iterator(message: impl Into<String>) -> Self {
        Self::Iterator {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// The gRPC status code behind this error, where one exists.
    pub fn code(&self) -> Option<tonic::Code> {
        match self {
            Self::Worker { code, .. } => Some(*code),
            Self::Dispatcher { source, .. } => source.as_ref().map(|s| s.code()),
            Self::Cancelled => Some(tonic::Code::Cancelled),
            _ => None,
        }
    }
}
