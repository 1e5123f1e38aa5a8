//! A replica node of the shared register service.
//!
//! Each node owns an in-memory table of address records and answers four
//! primitives: quorum read, two-phase write (pre-commit then confirm),
//! and a forced update used by the coordinator's read repair. A node only
//! participates for addresses that the ring predicate places on it.

mod clock;
pub mod server;
mod store;

pub use clock::Clock;
pub use store::{Store, PENDING_TIMEOUT};

use register::{ReadResponse, ValueVersion, WriteResponse};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("address {0} not found")]
    AddressNotFound(String),
    #[error("address {0} has no pending value")]
    NoPendingValue(String),
    #[error("address {addr} has a pending value {pending}")]
    PendingInFlight { addr: String, pending: String },
    #[error("{op} refused by test flag")]
    Refused { op: &'static str },
}

/// Per-operation refusal switches for fault-injection in tests. Not part
/// of the wire protocol.
#[derive(Debug, Default)]
pub struct Flags {
    pub refuse_read: AtomicBool,
    pub refuse_write: AtomicBool,
    pub refuse_confirm: AtomicBool,
}

impl Flags {
    fn refused(flag: &AtomicBool, op: &'static str) -> Result<(), Error> {
        if flag.load(Ordering::Relaxed) {
            Err(Error::Refused { op })
        } else {
            Ok(())
        }
    }
}

pub struct Node {
    id: uuid::Uuid,
    index: usize,
    total_nodes: usize,
    num_replicas: usize,
    store: Store,
    pub flags: Flags,
}

impl Node {
    /// A node at `index` within a fixed cluster of `total_nodes`, where
    /// every address is held by `num_replicas` nodes.
    pub fn new(index: usize, total_nodes: usize, num_replicas: usize) -> Self {
        Self::with_clock(index, total_nodes, num_replicas, Clock::system())
    }

    pub fn with_clock(index: usize, total_nodes: usize, num_replicas: usize, clock: Clock) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            index,
            total_nodes,
            num_replicas,
            store: Store::new(clock),
            flags: Flags::default(),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn clock(&self) -> &Clock {
        self.store.clock()
    }

    /// Whether the ring places `addr` on this node.
    pub fn should_include(&self, addr: &str) -> bool {
        register::include_in_shard(addr, self.index, self.total_nodes, self.num_replicas)
    }

    /// Read the committed (value, version) at `addr`.
    ///
    /// When the address is not placed on this node, the reply carries
    /// `should_include = false` with a zero ValueVersion and is not an
    /// error: the node disclaims responsibility rather than failing.
    pub fn read(&self, addr: &str) -> Result<ReadResponse, Error> {
        Flags::refused(&self.flags.refuse_read, "read")?;

        if !self.should_include(addr) {
            return Ok(ReadResponse {
                value_version: ValueVersion::default(),
                should_include: false,
            });
        }
        let value_version = self.store.read(addr)?;
        Ok(ReadResponse {
            value_version,
            should_include: true,
        })
    }

    /// Pre-commit `value` at `addr`. Out-of-shard addresses are declined
    /// without touching the store.
    pub fn write(&self, addr: &str, value: &str) -> Result<WriteResponse, Error> {
        Flags::refused(&self.flags.refuse_write, "write")?;

        if !self.should_include(addr) {
            return Ok(WriteResponse {
                should_include: false,
            });
        }
        self.store.write(addr, value)?;
        Ok(WriteResponse {
            should_include: true,
        })
    }

    /// Commit the pending value at `addr`.
    pub fn confirm(&self, addr: &str) -> Result<(), Error> {
        Flags::refused(&self.flags.refuse_confirm, "confirm")?;
        self.store.confirm(addr)
    }

    /// Force-adopt `(value, version)` at `addr`. Update is the read-repair
    /// path: it is gated by neither shard placement nor test flags.
    pub fn update(&self, addr: &str, value: &str, version: u64) {
        self.store.update(addr, value, version)
    }
}
