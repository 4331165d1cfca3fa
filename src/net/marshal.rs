//! The stack execution context and the primitive for marshaling work into it.
//!
//! All interface and protocol state lives on a single thread which owns it
//! outright. Other threads never touch that state; they post closures which
//! the context runs one at a time, in the order they arrived.
//!
//! ```text
//!   MAC rx thread ──post()──────────┐
//!   MAC irq thread ─post_and_wait()─┼──> queue ──> stack thread: job(&mut state)
//!   application ───call()───────────┘                   │
//!                                          deferred <───┘ (posts made from the
//!                                                          stack thread itself)
//! ```

use std::collections::VecDeque;
use std::sync::mpsc::{
    self,
    Receiver,
    SyncSender,
    TrySendError,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use std::thread::{
    self,
    JoinHandle,
    ThreadId,
};

use {
    Error,
    Result,
};

/// Default number of jobs which may wait in the queue.
pub const DEFAULT_QUEUE_LEN: usize = 32;

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    Stop,
}

/// Settings for a stack execution context.
#[derive(Clone, Debug)]
pub struct Config {
    /// Name of the thread backing the context.
    pub name: String,
    /// Number of jobs which may wait before `post` reports `Exhausted` and
    /// blocking posts start to wait for room.
    pub queue_len: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            name: "netstack".to_string(),
            queue_len: DEFAULT_QUEUE_LEN,
        }
    }
}

/// How a blocking post was carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Posted {
    /// The job ran before the poster resumed.
    Completed,
    /// The poster was the stack context itself. The job runs right after the
    /// current one.
    Deferred,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(err) => err.into_inner(),
    }
}

/// A cloneable way to hand work to a stack execution context.
pub struct Handle<S> {
    tx: SyncSender<Message<S>>,
    thread: ThreadId,
    deferred: Arc<Mutex<VecDeque<Job<S>>>>,
}

impl<S> Clone for Handle<S> {
    fn clone(&self) -> Self {
        Handle {
            tx: self.tx.clone(),
            thread: self.thread,
            deferred: self.deferred.clone(),
        }
    }
}

impl<S: 'static> Handle<S> {
    /// Checks if the calling thread is the stack execution context.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Queues f without waiting for it to run.
    ///
    /// Fails with `Exhausted` when the queue is full and `ContextClosed` when
    /// the context has stopped. Either way f is dropped without running.
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.is_current() {
            self.defer(Box::new(f));
            return Ok(());
        }

        match self.tx.try_send(Message::Run(Box::new(f))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Exhausted),
            Err(TrySendError::Disconnected(_)) => Err(Error::ContextClosed),
        }
    }

    /// Queues f and blocks until it has run.
    ///
    /// Called from the stack context itself, f is deferred instead and the
    /// call returns at once with `Posted::Deferred`.
    pub fn post_and_wait<F>(&self, f: F) -> Result<Posted>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.is_current() {
            self.defer(Box::new(f));
            return Ok(Posted::Deferred);
        }

        self.call(f).map(|_| Posted::Completed)
    }

    /// Runs f in the stack context and returns its result.
    ///
    /// Fails with `WouldDeadlock` when called from the stack context itself.
    pub fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Err(Error::WouldDeadlock);
        }

        let (done_tx, done_rx) = mpsc::channel();
        let job = move |state: &mut S| {
            let _ = done_tx.send(f(state));
        };

        self.tx
            .send(Message::Run(Box::new(job)))
            .map_err(|_| Error::ContextClosed)?;

        // The job is dropped unrun if the context stops first, which hangs up
        // done_tx.
        done_rx.recv().map_err(|_| Error::ContextClosed)
    }

    /// Asks the context to stop once the jobs queued so far have run.
    pub fn stop(&self) -> Result<()> {
        self.tx
            .send(Message::Stop)
            .map_err(|_| Error::ContextClosed)
    }

    fn defer(&self, job: Job<S>) {
        lock(&self.deferred).push_back(job);
    }
}

/// A single threaded executor owning the state of a network stack.
pub struct Executor<S> {
    handle: Handle<S>,
    thread: Option<JoinHandle<S>>,
}

impl<S: Send + 'static> Executor<S> {
    /// Starts a stack execution context which owns state.
    pub fn spawn(config: &Config, state: S) -> Result<Executor<S>> {
        let (tx, rx) = mpsc::sync_channel(config.queue_len);
        let deferred = Arc::new(Mutex::new(VecDeque::new()));

        let thread = {
            let deferred = deferred.clone();
            let name = config.name.clone();
            thread::Builder::new()
                .name(config.name.clone())
                .spawn(move || run(&name, state, rx, deferred))?
        };

        let handle = Handle {
            tx,
            thread: thread.thread().id(),
            deferred,
        };

        Ok(Executor {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> Handle<S> {
        self.handle.clone()
    }

    /// Stops the context after the work queued so far and returns its state.
    pub fn shutdown(mut self) -> Result<S> {
        let thread = match self.thread.take() {
            Some(thread) => thread,
            None => return Err(Error::ContextClosed),
        };

        self.handle.stop()?;
        thread.join().map_err(|_| Error::ContextClosed)
    }
}

impl<S> Drop for Executor<S> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            if self.handle.tx.send(Message::Stop).is_ok() {
                let _ = thread.join();
            }
        }
    }
}

fn run<S>(
    name: &str,
    mut state: S,
    rx: Receiver<Message<S>>,
    deferred: Arc<Mutex<VecDeque<Job<S>>>>,
) -> S {
    debug!("Stack context '{}' started.", name);

    while let Ok(message) = rx.recv() {
        match message {
            Message::Run(job) => {
                job(&mut state);
                run_deferred(&mut state, &deferred);
            }
            Message::Stop => break,
        }
    }

    debug!("Stack context '{}' stopped.", name);
    state
}

fn run_deferred<S>(state: &mut S, deferred: &Mutex<VecDeque<Job<S>>>) {
    loop {
        let job = lock(deferred).pop_front();
        match job {
            Some(job) => job(state),
            None => break,
        }
    }
}
