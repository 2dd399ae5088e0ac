//! Fixed-size carrier pool with one shared FIFO admission queue
//!
//! Every carrier pulls from the same unbounded channel. A task that
//! returns `Pending` is parked until its waker fires, at which point it
//! is pushed to the back of the shared queue and picked up by whichever
//! carrier is free first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Wake, Waker};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{Task, TaskScheduler};
use crate::config::Strategy;
use crate::error::HarnessError;

enum Message {
    Run(Arc<Job>),
    Shutdown,
}

/// A submitted task plus the bookkeeping needed to requeue it on wake
struct Job {
    future: Mutex<Option<Task>>,
    queued: AtomicBool,
    queue: Sender<Message>,
}

impl Job {
    fn schedule(self: &Arc<Self>) {
        if !self.queued.swap(true, Ordering::AcqRel) {
            // Carriers are gone only after shutdown; late wakes are dropped
            let _ = self.queue.send(Message::Run(Arc::clone(self)));
        }
    }

    fn run(self: &Arc<Self>) {
        self.queued.store(false, Ordering::Release);

        let mut slot = self.future.lock();
        if let Some(mut future) = slot.take() {
            let waker = Waker::from(Arc::clone(self));
            let mut cx = Context::from_waker(&waker);
            if future.as_mut().poll(&mut cx).is_pending() {
                *slot = Some(future);
            }
        }
    }
}

impl Wake for Job {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.schedule();
    }
}

/// Queue-based scheduler with exactly `worker_count` persistent carriers
pub struct FixedPoolScheduler {
    worker_count: usize,
    queue: Sender<Message>,
    accepting: AtomicBool,
    carriers: Mutex<Vec<JoinHandle<()>>>,
}

impl FixedPoolScheduler {
    /// Spawn the carriers
    ///
    /// Carriers enter `io` so tasks can use its I/O and timer drivers.
    pub fn new(worker_count: usize, io: Handle) -> Result<Self, HarnessError> {
        let (queue, inbox) = crossbeam_channel::unbounded();
        let scheduler = Self {
            worker_count,
            queue,
            accepting: AtomicBool::new(true),
            carriers: Mutex::new(Vec::with_capacity(worker_count)),
        };

        for index in 0..worker_count {
            let inbox = inbox.clone();
            let io = io.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("fixed-carrier-{}", index))
                .spawn(move || carrier_loop(inbox, io));

            match spawned {
                Ok(handle) => scheduler.carriers.lock().push(handle),
                Err(e) => {
                    scheduler.shutdown();
                    return Err(HarnessError::SchedulerInit(format!(
                        "failed to spawn carrier {}: {}",
                        index, e
                    )));
                }
            }
        }

        Ok(scheduler)
    }
}

fn carrier_loop(inbox: Receiver<Message>, io: Handle) {
    let _guard = io.enter();
    while let Ok(message) = inbox.recv() {
        match message {
            Message::Run(job) => job.run(),
            Message::Shutdown => break,
        }
    }
}

impl TaskScheduler for FixedPoolScheduler {
    fn strategy(&self) -> Strategy {
        Strategy::FixedPool
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn submit(&self, task: Task) -> Result<(), HarnessError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(HarnessError::Dispatch {
                submitted: 0,
                reason: "fixed pool is shut down".to_string(),
            });
        }

        let job = Arc::new(Job {
            future: Mutex::new(Some(task)),
            queued: AtomicBool::new(true),
            queue: self.queue.clone(),
        });

        self.queue
            .send(Message::Run(job))
            .map_err(|_| HarnessError::Dispatch {
                submitted: 0,
                reason: "fixed pool queue is closed".to_string(),
            })
    }

    fn is_running(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);

        let carriers = std::mem::take(&mut *self.carriers.lock());
        if carriers.is_empty() {
            return;
        }

        // One marker per carrier, queued behind any work still pending
        for _ in 0..carriers.len() {
            let _ = self.queue.send(Message::Shutdown);
        }
        for handle in carriers {
            if handle.join().is_err() {
                warn!("fixed pool carrier panicked");
            }
        }

        debug!(worker_count = self.worker_count, "fixed pool stopped");
    }
}

impl Drop for FixedPoolScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
