//! Lock-guarded state shared by the consumer, the task manager, and the
//! fetch workers.
//!
//! All mutable iterator state sits behind one mutex and is never held across
//! an `.await`. The two wake-up channels play the role of condition
//! variables: `get_next` for the consumer, `worker` for fetch workers; the
//! cancellation watch doubles as the task manager's early wake-up.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::rpc::{TaskInfo, WorkerClient, WorkerConnector};

/// One active task: a unit of work the dispatcher assigned to a worker.
pub(crate) struct TaskState {
    pub task_id: i64,
    /// Address of the worker producing elements for this task.
    pub address: String,
    /// Client for fetching elements from that worker.
    pub client: Arc<dyn WorkerClient>,
    /// Elements successfully read; doubles as the round index in round-robin
    /// mode.
    pub elements_read: i64,
    /// Whether a fetch worker currently owns this task.
    pub in_use: bool,
    /// Whether the worker has returned end_of_sequence for this task.
    pub end_of_sequence: bool,
}

/// One slot in the result queue.
///
/// Round-robin fetches reserve their slot before the element arrives, so the
/// queue order reflects the fixed task rotation; interleaved fetches only
/// enqueue ready results.
#[derive(Debug)]
pub(crate) struct ResultSlot {
    pub seq: u64,
    pub ready: bool,
    pub element: Option<Vec<u8>>,
    pub end_of_sequence: bool,
}

/// Everything a fetch worker needs to issue one element request without
/// holding the lock.
pub(crate) struct FetchClaim {
    pub task_id: i64,
    pub address: String,
    pub client: Arc<dyn WorkerClient>,
    /// Round index snapshot, used in round-robin requests.
    pub round_index: i64,
    /// The queue slot reserved for this fetch (round-robin mode only).
    pub slot_seq: Option<u64>,
}

pub(crate) struct State {
    pub cancelled: bool,
    pub job_finished: bool,
    /// First fatal fetch error; taken by the `next()` call that reports it.
    pub status: Option<ClientError>,
    pub tasks: Vec<TaskState>,
    /// Index of the next task to read from.
    pub next_task_index: usize,
    /// Tasks in `tasks` that have reached end_of_sequence.
    pub finished_tasks: usize,
    /// In-flight element requests, counting reserved worker slots.
    pub outstanding_requests: usize,
    /// Fetch workers that have been spawned and not yet exited.
    pub num_running_workers: usize,
    /// Effective cap on buffered plus in-flight elements; tracks the task
    /// count under autotune.
    pub max_outstanding: usize,
    pub results: VecDeque<ResultSlot>,
    next_seq: u64,
    /// Sequence number of `results.front()`.
    front_seq: u64,
    round_robin: bool,
}

impl State {
    pub fn new(round_robin: bool, max_outstanding: usize) -> Self {
        Self {
            cancelled: false,
            job_finished: false,
            status: None,
            tasks: Vec::new(),
            next_task_index: 0,
            finished_tasks: 0,
            outstanding_requests: 0,
            num_running_workers: 0,
            max_outstanding,
            results: VecDeque::new(),
            next_seq: 0,
            front_seq: 0,
            round_robin,
        }
    }

    // Reports whether another element request fits under the cap.
    pub fn element_space_available(&self) -> bool {
        if self.round_robin {
            // Round-robin fetches pre-allocate their result slot, so the
            // queue size alone accounts for requests in flight.
            self.results.len() < self.max_outstanding
        } else {
            // Otherwise results are only enqueued once ready, so in-flight
            // requests count separately.
            self.results.len() + self.outstanding_requests < self.max_outstanding
        }
    }

    pub fn task_available(&self) -> bool {
        if self.tasks.is_empty() {
            return false;
        }
        if self.round_robin {
            !self.tasks[self.next_task_index % self.tasks.len()].in_use
        } else {
            self.finished_tasks + self.outstanding_requests < self.tasks.len()
        }
    }

    /// Claims the next task to fetch from, marking it in use and (in
    /// round-robin mode) reserving its result slot. Returns `None` when no
    /// task is claimable.
    pub fn claim_next(&mut self) -> Option<FetchClaim> {
        if self.tasks.is_empty() {
            return None;
        }
        let num_tasks = self.tasks.len();
        if self.round_robin {
            let index = self.next_task_index % num_tasks;
            if self.tasks[index].in_use {
                return None;
            }
            let seq = self.push_placeholder();
            self.next_task_index = (index + 1) % num_tasks;
            let task = &mut self.tasks[index];
            task.in_use = true;
            Some(FetchClaim {
                task_id: task.task_id,
                address: task.address.clone(),
                client: task.client.clone(),
                round_index: task.elements_read,
                slot_seq: Some(seq),
            })
        } else {
            for i in 0..num_tasks {
                let index = (self.next_task_index + i) % num_tasks;
                if !self.tasks[index].in_use && !self.tasks[index].end_of_sequence {
                    self.next_task_index = (index + 1) % num_tasks;
                    let task = &mut self.tasks[index];
                    task.in_use = true;
                    return Some(FetchClaim {
                        task_id: task.task_id,
                        address: task.address.clone(),
                        client: task.client.clone(),
                        round_index: task.elements_read,
                        slot_seq: None,
                    });
                }
            }
            None
        }
    }

    pub fn task(&self, task_id: i64) -> Option<&TaskState> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn task_mut(&mut self, task_id: i64) -> Option<&mut TaskState> {
        self.tasks.iter_mut().find(|t| t.task_id == task_id)
    }

    /// Clears the in-use mark; a no-op when the task has been removed.
    pub fn release_task(&mut self, task_id: i64) {
        if let Some(task) = self.task_mut(task_id) {
            task.in_use = false;
        }
    }

    /// Reserves an empty slot at the back of the queue and returns its
    /// sequence number.
    fn push_placeholder(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.results.push_back(ResultSlot {
            seq,
            ready: false,
            element: None,
            end_of_sequence: false,
        });
        seq
    }

    /// Completes a reserved slot. `None` marks end of sequence.
    pub fn complete_slot(&mut self, seq: u64, element: Option<Vec<u8>>) {
        let Some(index) = seq.checked_sub(self.front_seq) else {
            return;
        };
        if let Some(slot) = self.results.get_mut(index as usize) {
            slot.ready = true;
            slot.end_of_sequence = element.is_none();
            slot.element = element;
        }
    }

    /// Enqueues an already-ready element (interleave mode).
    pub fn push_ready(&mut self, element: Vec<u8>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.results.push_back(ResultSlot {
            seq,
            ready: true,
            element: Some(element),
            end_of_sequence: false,
        });
    }

    pub fn front_ready(&self) -> bool {
        self.results.front().is_some_and(|slot| slot.ready)
    }

    pub fn pop_front(&mut self) -> Option<ResultSlot> {
        let slot = self.results.pop_front()?;
        self.front_seq = slot.seq + 1;
        Some(slot)
    }

    // First fatal error wins; later failures during drain are only logged.
    pub fn set_status(&mut self, err: ClientError) {
        if self.status.is_none() {
            self.status = Some(err);
        } else {
            tracing::debug!("Suppressing subsequent fetch error: {}", err);
        }
    }

    /// Reconciles the task set against one dispatcher report: departed tasks
    /// are swap-removed, newly reported tasks get a worker client. Client
    /// construction failures become the sticky status but do not stop the
    /// remaining tasks from joining. Returns true if the sticky status was
    /// set.
    pub fn reconcile(
        &mut self,
        reported: &[TaskInfo],
        connector: &dyn WorkerConnector,
        auto_tune: bool,
    ) -> bool {
        let mut incoming: HashMap<i64, &TaskInfo> =
            reported.iter().map(|t| (t.task_id, t)).collect();

        let mut i = 0;
        while i < self.tasks.len() {
            if incoming.remove(&self.tasks[i].task_id).is_some() {
                i += 1;
            } else {
                if self.tasks[i].end_of_sequence {
                    self.finished_tasks -= 1;
                }
                self.tasks.swap_remove(i);
            }
        }

        let mut failed = false;
        for task in reported {
            if incoming.remove(&task.task_id).is_none() {
                continue;
            }
            match connector.connect(&task.worker_address) {
                Ok(client) => self.tasks.push(TaskState {
                    task_id: task.task_id,
                    address: task.worker_address.clone(),
                    client,
                    elements_read: 0,
                    in_use: false,
                    end_of_sequence: false,
                }),
                Err(e) => {
                    tracing::warn!(
                        "Failed to create client for worker {}: {}",
                        task.worker_address,
                        e
                    );
                    self.set_status(e);
                    failed = true;
                }
            }
        }

        // Removals restart the rotation from the equivalent position.
        if self.tasks.is_empty() {
            self.next_task_index = 0;
        } else {
            self.next_task_index %= self.tasks.len();
        }
        if auto_tune {
            self.max_outstanding = self.tasks.len();
        }
        failed
    }
}

/// State plus wake-up channels, shared across the iterator's tasks.
pub(crate) struct Shared {
    state: Mutex<State>,
    /// Woken when a result becomes ready, a worker exits, the job finishes,
    /// a fatal error lands, or the iterator is cancelled.
    pub get_next: Notify,
    /// Woken when queue space or a task frees up, and on cancel/finish.
    pub worker: Notify,
    /// Handles of spawned fetch workers, drained at shutdown.
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    cancel_tx: watch::Sender<bool>,
}

impl Shared {
    pub fn new(round_robin: bool, max_outstanding: usize) -> Arc<Self> {
        let (cancel_tx, _) = watch::channel(false);
        Arc::new(Self {
            state: Mutex::new(State::new(round_robin, max_outstanding)),
            get_next: Notify::new(),
            worker: Notify::new(),
            worker_handles: Mutex::new(Vec::new()),
            cancel_tx,
        })
    }

    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the cancelled flag and wakes every suspension point.
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        // send_replace stores the value even with no receivers subscribed.
        self.cancel_tx.send_replace(true);
        self.get_next.notify_waiters();
        self.worker.notify_waiters();
    }

    pub fn cancel_watch(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn push_worker_handles(&self, handles: Vec<JoinHandle<()>>) {
        self.worker_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
    }

    pub fn take_worker_handles(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(
            &mut *self
                .worker_handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
