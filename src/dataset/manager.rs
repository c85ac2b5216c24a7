//! Task manager.
//!
//! A single loop that refreshes job membership from the dispatcher at a
//! fixed interval and keeps the fetch worker pool sized to the
//! outstanding-request cap. Cancellation cuts the sleep short.

use std::sync::Arc;
use std::time::Duration;

use super::fetcher::{self, FetchContext};
use super::state::Shared;
use crate::rpc::{DispatcherClient, WorkerConnector};

pub(crate) struct ManagerContext {
    pub shared: Arc<Shared>,
    pub dispatcher: Arc<dyn DispatcherClient>,
    pub connector: Arc<dyn WorkerConnector>,
    pub fetch: Arc<FetchContext>,
    pub job_client_id: i64,
    pub refresh_interval: Duration,
    /// Whether the cap tracks the task count (autotune).
    pub auto_tune: bool,
}

pub(crate) async fn run_manager(ctx: ManagerContext) {
    tracing::debug!("Starting task manager");
    let mut cancel = ctx.shared.cancel_watch();

    loop {
        if ctx.shared.is_cancelled() {
            break;
        }
        update_tasks(&ctx).await;
        update_worker_pool(&ctx);

        tokio::select! {
            _ = tokio::time::sleep(ctx.refresh_interval) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Task manager exiting");
}

async fn update_tasks(ctx: &ManagerContext) {
    let list = match ctx.dispatcher.get_tasks(ctx.job_client_id).await {
        Ok(list) => list,
        Err(e) => {
            // Membership is self-healing; the next tick retries.
            tracing::warn!(
                "Failed to get task info for job client id {}: {}",
                ctx.job_client_id,
                e
            );
            return;
        }
    };

    let status_set = {
        let mut st = ctx.shared.lock();
        st.job_finished = list.job_finished;
        if list.job_finished {
            drop(st);
            ctx.shared.get_next.notify_waiters();
            ctx.shared.worker.notify_waiters();
            return;
        }
        st.reconcile(&list.tasks, ctx.connector.as_ref(), ctx.auto_tune)
    };

    // Newly joined tasks can unblock workers parked on the task predicate.
    ctx.shared.worker.notify_waiters();
    if status_set {
        ctx.shared.get_next.notify_waiters();
    }
}

fn update_worker_pool(ctx: &ManagerContext) {
    let mut handles = Vec::new();
    {
        let mut st = ctx.shared.lock();
        while st.num_running_workers < st.max_outstanding {
            st.num_running_workers += 1;
            // A fresh worker holds one reserved in-flight slot until its
            // first wait.
            st.outstanding_requests += 1;
            handles.push(tokio::spawn(fetcher::run_worker(ctx.fetch.clone())));
        }
    }
    if !handles.is_empty() {
        ctx.shared.push_worker_handles(handles);
    }
}
