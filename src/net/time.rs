//! Abstractions for providing the current time.

use std::fmt::Debug;
use std::time::{
    Duration,
    Instant,
};

/// An environment that provides the current time.
pub trait Env: Debug + Send {
    /// Returns an instant corresponding to "now".
    fn now_instant(&self) -> Instant;
}

/// An environment backed by the system clock.
#[derive(Clone, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    pub fn new() -> SystemEnv {
        SystemEnv
    }
}

impl Env for SystemEnv {
    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

/// An environment whose clock only moves when told to.
#[derive(Clone, Debug)]
pub struct MockEnv {
    pub now: Instant,
}

impl MockEnv {
    pub fn new() -> MockEnv {
        MockEnv {
            now: Instant::now(),
        }
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl Env for MockEnv {
    fn now_instant(&self) -> Instant {
        self.now
    }
}
