//! The result context: the single place completions run.
//!
//! File work happens on the store's worker pool, but every completion is
//! queued here and executed in submission order on one thread. That thread
//! is either owned by the context ([`ResultContext::dedicated`]) or is the
//! host's own main loop driving a [`ResultPump`].

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::error;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct ResultContext {
    sender: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
}

impl ResultContext {
    /// Spawns a named thread that runs completions until the context is
    /// dropped.
    pub fn dedicated(name: &str) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in receiver {
                    run_job(job);
                }
            })?;
        Ok(Self {
            sender: Some(sender),
            thread_id: Some(handle.thread().id()),
            thread: Some(handle),
        })
    }

    /// Completions are queued until the host runs them through the pump.
    pub fn pumped() -> (Self, ResultPump) {
        let (sender, receiver) = mpsc::channel::<Job>();
        (
            Self {
                sender: Some(sender),
                thread: None,
                thread_id: None,
            },
            ResultPump { receiver },
        )
    }

    /// Queues a job. Hands it back if the consuming side is gone.
    pub(crate) fn post(&self, job: Job) -> Result<(), Job> {
        match &self.sender {
            Some(sender) => sender.send(job).map_err(|err| err.0),
            None => Err(job),
        }
    }
}

impl Drop for ResultContext {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.thread.take() {
            // Joining ourselves would never return.
            if Some(thread::current().id()) != self.thread_id {
                let _ = handle.join();
            }
        }
    }
}

/// Host-driven side of [`ResultContext::pumped`].
pub struct ResultPump {
    receiver: Receiver<Job>,
}

impl ResultPump {
    /// Runs everything already queued without blocking.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(job) => {
                    run_job(job);
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Blocks for the next completion and runs it. False once the context
    /// is gone and the queue is drained.
    pub fn run_one(&self) -> bool {
        match self.receiver.recv() {
            Ok(job) => {
                run_job(job);
                true
            }
            Err(_) => false,
        }
    }

    /// Like [`run_one`](Self::run_one) but gives up after `timeout`.
    pub fn run_one_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                run_job(job);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Runs completions until the context is dropped.
    pub fn run(self) {
        for job in self.receiver {
            run_job(job);
        }
    }
}

fn run_job(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!(panic = panic_message(payload.as_ref()), "completion panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
