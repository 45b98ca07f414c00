use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use log::warn;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum RunnerMessage {
    Immediate(Task),
    Delayed { deadline: Instant, task: Task },
    Shutdown,
}

/// Dedicated worker thread draining a serialized task queue.
///
/// All tasks posted to a runner execute on its single worker thread in
/// submission order; delayed tasks run when their deadline passes, ordered
/// by deadline. Thread-confined objects hold a [`TaskRunnerHandle`] and
/// debug-assert
/// [`runs_tasks_on_current_thread`](TaskRunnerHandle::runs_tasks_on_current_thread)
/// in their mutating paths.
///
/// Dropping the runner delivers a shutdown message, runs tasks already in
/// the queue, discards delayed tasks that are not yet due, and joins the
/// worker.
pub struct TaskRunner {
    handle: TaskRunnerHandle,
    worker: Option<JoinHandle<()>>,
}

/// Cloneable posting endpoint for a [`TaskRunner`].
#[derive(Clone)]
pub struct TaskRunnerHandle {
    sender: Sender<RunnerMessage>,
    thread_id: ThreadId,
    name: &'static str,
}

impl TaskRunner {
    pub fn new(name: &'static str) -> Self {
        let (sender, receiver) = unbounded();
        let (id_sender, id_receiver) = bounded(1);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                id_sender
                    .send(thread::current().id())
                    .expect("task runner startup handshake failed");
                worker_loop(&receiver);
            })
            .expect("failed to spawn task runner thread");
        let thread_id = id_receiver
            .recv()
            .expect("task runner startup handshake failed");
        Self {
            handle: TaskRunnerHandle {
                sender,
                thread_id,
                name,
            },
            worker: Some(worker),
        }
    }

    pub fn handle(&self) -> TaskRunnerHandle {
        self.handle.clone()
    }

    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.handle.post(task);
    }

    pub fn post_delayed(&self, task: impl FnOnce() + Send + 'static, delay: Duration) {
        self.handle.post_delayed(task, delay);
    }

    pub fn runs_tasks_on_current_thread(&self) -> bool {
        self.handle.runs_tasks_on_current_thread()
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        let _ = self.handle.sender.send(RunnerMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .unwrap_or_else(|err| warn!("task runner '{}' panicked: {err:?}", self.handle.name));
        }
    }
}

impl TaskRunnerHandle {
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        if self
            .sender
            .send(RunnerMessage::Immediate(Box::new(task)))
            .is_err()
        {
            warn!("task posted to stopped runner '{}'", self.name);
        }
    }

    pub fn post_delayed(&self, task: impl FnOnce() + Send + 'static, delay: Duration) {
        let deadline = Instant::now() + delay;
        if self
            .sender
            .send(RunnerMessage::Delayed {
                deadline,
                task: Box::new(task),
            })
            .is_err()
        {
            warn!("delayed task posted to stopped runner '{}'", self.name);
        }
    }

    pub fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

struct DelayedEntry {
    deadline: Instant,
    order: u64,
    task: Task,
}

// BinaryHeap is a max-heap; reverse so the earliest deadline surfaces first,
// with submission order as the tie-break.
impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then(other.order.cmp(&self.order))
    }
}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.order == other.order
    }
}

impl Eq for DelayedEntry {}

fn worker_loop(receiver: &Receiver<RunnerMessage>) {
    let mut delayed: BinaryHeap<DelayedEntry> = BinaryHeap::new();
    let mut next_order = 0u64;
    loop {
        while let Some(entry) = delayed.peek() {
            if entry.deadline > Instant::now() {
                break;
            }
            let entry: DelayedEntry = delayed.pop().expect("peeked entry vanished");
            (entry.task)();
        }

        let message = match delayed.peek() {
            Some(entry) => {
                let timeout = entry.deadline.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(timeout) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match receiver.recv() {
                Ok(message) => message,
                Err(_) => return,
            },
        };

        match message {
            RunnerMessage::Immediate(task) => task(),
            RunnerMessage::Delayed { deadline, task } => {
                delayed.push(DelayedEntry {
                    deadline,
                    order: next_order,
                    task,
                });
                next_order += 1;
            }
            RunnerMessage::Shutdown => {
                // Run what is already queued; drop delayed tasks that have
                // not come due.
                while let Ok(message) = receiver.try_recv() {
                    if let RunnerMessage::Immediate(task) = message {
                        task();
                    }
                }
                return;
            }
        }
    }
}
