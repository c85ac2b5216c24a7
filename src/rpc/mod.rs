//! RPC stubs for the dispatcher and worker services.
//!
//! This module provides gRPC clients for the two external services the
//! iterator talks to:
//!
//! - The dispatcher, which registers job clients and reports task membership
//! - Workers, which produce dataset elements for their assigned tasks
//!
//! Both clients sit behind traits so the fetch engine can be exercised
//! against in-memory fakes.

mod dispatcher;
mod worker;

// Include generated protobuf code
pub mod proto {
    include!("proto/datasvc.v1.rs");
}

pub use dispatcher::{DispatcherClient, GrpcDispatcherClient};
pub use worker::{GrpcWorkerClient, GrpcWorkerConnector, WorkerClient, WorkerConnector};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Result type for raw RPC calls; status codes drive retry decisions.
pub type RpcResult<T> = std::result::Result<T, tonic::Status>;

/// How the dispatcher shards the dataset across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Each worker processes the full dataset; consumers see every epoch
    /// once per worker.
    ParallelEpochs,
    /// The dispatcher splits each epoch across workers.
    DistributedEpoch,
}

impl FromStr for ProcessingMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parallel_epochs" => Ok(Self::ParallelEpochs),
            "distributed_epoch" => Ok(Self::DistributedEpoch),
            other => Err(ClientError::config(format!(
                "unrecognized processing mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ParallelEpochs => "parallel_epochs",
            Self::DistributedEpoch => "distributed_epoch",
        };
        f.write_str(s)
    }
}

/// Identity of a named job: iterators over the same name use their iteration
/// index to disambiguate themselves to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKey {
    pub job_name: String,
    pub iterator_index: i64,
}

impl From<JobKey> for proto::JobKey {
    fn from(key: JobKey) -> Self {
        Self {
            job_name: key.job_name,
            job_name_index: key.iterator_index,
        }
    }
}

/// One task as reported by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub task_id: i64,
    pub worker_address: String,
}

impl From<proto::TaskInfo> for TaskInfo {
    fn from(task: proto::TaskInfo) -> Self {
        Self {
            task_id: task.task_id,
            worker_address: task.worker_address,
        }
    }
}

/// Snapshot of job membership from one GetTasks call.
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    pub tasks: Vec<TaskInfo>,
    pub job_finished: bool,
}

impl From<proto::GetTasksResponse> for TaskList {
    fn from(response: proto::GetTasksResponse) -> Self {
        Self {
            tasks: response.tasks.into_iter().map(TaskInfo::from).collect(),
            job_finished: response.job_finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_mode_parse() {
        assert_eq!(
            "parallel_epochs".parse::<ProcessingMode>().unwrap(),
            ProcessingMode::ParallelEpochs
        );
        assert_eq!(
            "distributed_epoch".parse::<ProcessingMode>().unwrap(),
            ProcessingMode::DistributedEpoch
        );
        assert!("round_robin".parse::<ProcessingMode>().is_err());
        assert!("".parse::<ProcessingMode>().is_err());
    }

    #[test]
    fn test_processing_mode_display_roundtrip() {
        for mode in [
            ProcessingMode::ParallelEpochs,
            ProcessingMode::DistributedEpoch,
        ] {
            assert_eq!(mode.to_string().parse::<ProcessingMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_task_list_from_proto() {
        let response = proto::GetTasksResponse {
            tasks: vec![proto::TaskInfo {
                task_id: 7,
                worker_address: "w1:4000".to_string(),
            }],
            job_finished: true,
        };
        let list = TaskList::from(response);
        assert_eq!(list.tasks.len(), 1);
        assert_eq!(list.tasks[0].task_id, 7);
        assert_eq!(list.tasks[0].worker_address, "w1:4000");
        assert!(list.job_finished);
    }
}
