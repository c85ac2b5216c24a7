//! Fetch workers.
//!
//! Each worker claims a task, issues one element request without holding the
//! lock, publishes the result, and loops. Workers are never killed directly:
//! they exit on cancellation, job completion, or a fatal fetch error.

use std::sync::Arc;

use tokio::sync::watch;

use super::state::{FetchClaim, Shared};
use crate::error::ClientError;
use crate::retry::{is_transient, RetryConfig};

/// Static context shared by all fetch workers of one iterator.
pub(crate) struct FetchContext {
    pub shared: Arc<Shared>,
    /// This consumer's position in its group; set only in round-robin mode.
    pub consumer_index: Option<i64>,
    pub retry: RetryConfig,
}

enum FetchOutcome {
    Element(Vec<u8>),
    EndOfSequence,
    Fatal(tonic::Status),
}

pub(crate) async fn run_worker(ctx: Arc<FetchContext>) {
    tracing::debug!("Starting fetch worker");
    let shared = ctx.shared.clone();
    let mut cancel = shared.cancel_watch();
    let mut prev_task: Option<i64> = None;

    'run: loop {
        // Hand back the previous task and the in-flight slot.
        {
            let mut st = shared.lock();
            if let Some(task_id) = prev_task.take() {
                st.release_task(task_id);
                shared.worker.notify_one();
            }
            st.outstanding_requests -= 1;
        }

        // Wait until an element request is both allowed and possible.
        let claim = loop {
            let notified = shared.worker.notified();
            {
                let mut st = shared.lock();
                if st.cancelled || st.job_finished {
                    st.outstanding_requests += 1;
                    break 'run;
                }
                if st.element_space_available() && st.task_available() {
                    if let Some(claim) = st.claim_next() {
                        st.outstanding_requests += 1;
                        break claim;
                    }
                }
            }
            notified.await;
        };

        tracing::trace!("Processing task {}", claim.task_id);
        let outcome = fetch_element(&ctx, &claim, &mut cancel).await;

        let mut st = shared.lock();
        match outcome {
            FetchOutcome::Fatal(status) => {
                tracing::warn!(
                    "Failed to get element from worker {}: {}",
                    claim.address,
                    status
                );
                st.release_task(claim.task_id);
                st.set_status(ClientError::worker(&claim.address, &status));
                drop(st);
                shared.get_next.notify_waiters();
                break 'run;
            }
            FetchOutcome::EndOfSequence => {
                let newly_finished = match st.task_mut(claim.task_id) {
                    Some(task) if !task.end_of_sequence => {
                        task.end_of_sequence = true;
                        true
                    }
                    _ => false,
                };
                if newly_finished {
                    st.finished_tasks += 1;
                }
                if let Some(seq) = claim.slot_seq {
                    st.complete_slot(seq, None);
                }
                drop(st);
                shared.get_next.notify_waiters();
            }
            FetchOutcome::Element(bytes) => {
                if let Some(task) = st.task_mut(claim.task_id) {
                    task.elements_read += 1;
                }
                match claim.slot_seq {
                    Some(seq) => st.complete_slot(seq, Some(bytes)),
                    None => st.push_ready(bytes),
                }
                drop(st);
                shared.get_next.notify_waiters();
            }
        }
        prev_task = Some(claim.task_id);
    }

    // A worker exit frees its reserved slot and may satisfy the consumer's
    // drain condition.
    {
        let mut st = shared.lock();
        st.outstanding_requests -= 1;
        st.num_running_workers -= 1;
    }
    shared.get_next.notify_waiters();
    tracing::debug!("Fetch worker exiting");
}

/// Issues the element RPC for one claim, retrying preemption-class errors
/// indefinitely with backoff.
///
/// Cancellation, or the task reaching end of sequence (or being retired)
/// while retrying, resolves to a clean end-of-sequence so the worker can
/// drop the task without surfacing an error.
async fn fetch_element(
    ctx: &FetchContext,
    claim: &FetchClaim,
    cancel: &mut watch::Receiver<bool>,
) -> FetchOutcome {
    let round_index = ctx.consumer_index.is_some().then_some(claim.round_index);
    let mut attempt: u32 = 0;

    loop {
        let status = match claim
            .client
            .get_element(claim.task_id, ctx.consumer_index, round_index)
            .await
        {
            Ok(Some(bytes)) => return FetchOutcome::Element(bytes),
            Ok(None) => return FetchOutcome::EndOfSequence,
            Err(status) if is_transient(&status) => status,
            Err(status) => return FetchOutcome::Fatal(status),
        };

        {
            let st = ctx.shared.lock();
            let task_finished = st
                .task(claim.task_id)
                .map_or(true, |task| task.end_of_sequence);
            if st.cancelled || task_finished {
                return FetchOutcome::EndOfSequence;
            }
        }

        let delay = ctx.retry.delay_for_attempt(attempt);
        tracing::debug!(
            "Failed to get element from worker {}: {}. Will retry in {:?}",
            claim.address,
            status,
            delay
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return FetchOutcome::EndOfSequence;
                }
            }
        }
        attempt += 1;
    }
}
