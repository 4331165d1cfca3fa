//! Packet buffers and the ownership rules for handing them across the
//! MAC/stack boundary.
//!
//! A `PacketBuffer` has exactly one owner. Every call that takes one by value
//! either keeps it (and eventually frees it) or hands it back through a
//! `SendError::Returned`. There is no way to keep using a buffer after it has
//! been passed on, and no way to free it twice.

use std::fmt::{
    Debug,
    Formatter,
    Result as FmtResult,
};
use std::mem;
use std::result::Result as StdResult;
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::sync::Arc;

use {
    Error,
    Result,
};

#[derive(Debug, Default)]
struct Counters {
    allocated: AtomicUsize,
    freed: AtomicUsize,
    outstanding: AtomicUsize,
}

/// A source of packet buffers with a bound on how many may be outstanding.
///
/// Clones share the same counters, so a pool can be handed to a driver while
/// the owner keeps watching allocations and frees.
#[derive(Clone, Debug)]
pub struct Pool {
    counters: Arc<Counters>,
    capacity: usize,
}

impl Pool {
    /// Creates a pool which allows up to capacity outstanding buffers.
    pub fn new(capacity: usize) -> Pool {
        Pool {
            counters: Arc::new(Counters::default()),
            capacity,
        }
    }

    /// Allocates a zeroed buffer of len bytes.
    pub fn alloc(&self, len: usize) -> Result<PacketBuffer> {
        self.reserve()?;
        Ok(PacketBuffer {
            data: vec![0; len],
            counters: Some(self.counters.clone()),
        })
    }

    /// Allocates a buffer holding a copy of data.
    pub fn alloc_from(&self, data: &[u8]) -> Result<PacketBuffer> {
        self.reserve()?;
        Ok(PacketBuffer {
            data: data.to_vec(),
            counters: Some(self.counters.clone()),
        })
    }

    /// Returns the number of buffers allocated over the lifetime of the pool.
    pub fn allocated(&self) -> usize {
        self.counters.allocated.load(Ordering::SeqCst)
    }

    /// Returns the number of buffers which have been freed.
    pub fn freed(&self) -> usize {
        self.counters.freed.load(Ordering::SeqCst)
    }

    /// Returns the number of buffers currently alive.
    pub fn outstanding(&self) -> usize {
        self.counters.outstanding.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve(&self) -> Result<()> {
        let capacity = self.capacity;
        self.counters
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n < capacity {
                    Some(n + 1)
                } else {
                    None
                }
            })
            .map_err(|_| Error::Exhausted)?;
        self.counters.allocated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A single owner frame buffer.
///
/// Dropping the buffer frees it. `free()` does the same and reads better at
/// the places where disposal is the point of the call.
pub struct PacketBuffer {
    data: Vec<u8>,
    counters: Option<Arc<Counters>>,
}

impl PacketBuffer {
    /// Creates a buffer which is not tracked by any pool.
    pub fn new(data: Vec<u8>) -> PacketBuffer {
        PacketBuffer {
            data,
            counters: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Inserts header in front of the current contents.
    pub fn prepend(&mut self, header: &[u8]) {
        let tail = mem::replace(&mut self.data, Vec::with_capacity(header.len()));
        self.data.extend_from_slice(header);
        self.data.extend_from_slice(&tail);
    }

    /// Shortens the buffer to len bytes.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Frees the buffer.
    pub fn free(self) {}

    /// Frees the buffer, keeping its contents as a plain vector.
    pub fn into_vec(mut self) -> Vec<u8> {
        mem::replace(&mut self.data, Vec::new())
    }
}

impl AsRef<[u8]> for PacketBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for PacketBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Debug for PacketBuffer {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "PacketBuffer({} bytes)", self.data.len())
    }
}

impl Drop for PacketBuffer {
    fn drop(&mut self) {
        if let Some(ref counters) = self.counters {
            counters.freed.fetch_add(1, Ordering::SeqCst);
            counters.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Failure of a call which took a buffer by value.
#[derive(Debug)]
pub enum SendError {
    /// The callee refused the buffer and handed it back. The caller owns it
    /// again and decides how to dispose of it.
    Returned(Error, PacketBuffer),
    /// The callee took the buffer and failed afterwards. The buffer is gone.
    Consumed(Error),
}

impl SendError {
    pub fn error(&self) -> &Error {
        match *self {
            SendError::Returned(ref err, _) => err,
            SendError::Consumed(ref err) => err,
        }
    }

    /// Returns the buffer if it was handed back.
    pub fn into_buffer(self) -> Option<PacketBuffer> {
        match self {
            SendError::Returned(_, buffer) => Some(buffer),
            SendError::Consumed(_) => None,
        }
    }
}

impl From<Error> for SendError {
    fn from(err: Error) -> Self {
        SendError::Consumed(err)
    }
}

impl From<SendError> for Error {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Returned(err, _) => err,
            SendError::Consumed(err) => err,
        }
    }
}

pub type SendResult = StdResult<(), SendError>;
