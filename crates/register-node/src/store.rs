use crate::{Clock, Error};
use register::ValueVersion;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long an unconfirmed pre-commit blocks further writes to its address.
pub const PENDING_TIMEOUT: Duration = Duration::from_secs(2);

// One address's slot: the last committed (value, version), plus at most
// one pre-committed value awaiting confirmation.
#[derive(Debug, Default)]
struct Record {
    committed: ValueVersion,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    value: String,
    accepted_at: Instant,
}

impl Pending {
    fn expired(&self, now: Instant) -> bool {
        self.accepted_at + PENDING_TIMEOUT < now
    }
}

/// In-memory table of address records with per-address mutual exclusion.
///
/// A coarse mutex guards the table itself, and is held only long enough to
/// look up or insert a record handle. All record mutation happens under
/// that record's own lock, so operations on distinct addresses never
/// serialize with one another. Record locks are synchronous: no store
/// operation awaits while holding one.
pub struct Store {
    clock: Clock,
    records: Mutex<HashMap<String, Arc<Mutex<Record>>>>,
}

impl Store {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    // Fetch the record handle for `addr`, creating it on first touch.
    fn record(&self, addr: &str) -> Arc<Mutex<Record>> {
        let mut records = self.records.lock().unwrap();
        match records.get(addr) {
            Some(record) => record.clone(),
            None => records.entry(addr.to_string()).or_default().clone(),
        }
    }

    // Fetch the record handle for `addr` without creating one: reads must
    // not materialize records.
    fn lookup(&self, addr: &str) -> Option<Arc<Mutex<Record>>> {
        self.records.lock().unwrap().get(addr).cloned()
    }

    /// Read the committed (value, version) at `addr`.
    ///
    /// A record whose committed version is still 0 exists only because a
    /// pre-commit was accepted, and reads as not-found.
    pub fn read(&self, addr: &str) -> Result<ValueVersion, Error> {
        let Some(record) = self.lookup(addr) else {
            return Err(Error::AddressNotFound(addr.to_string()));
        };
        let record = record.lock().unwrap();

        if record.committed.version == 0 {
            return Err(Error::AddressNotFound(addr.to_string()));
        }
        Ok(record.committed.clone())
    }

    /// Pre-commit `value` at `addr`.
    ///
    /// At most one pending value may exist per address. A live pending
    /// rejects the write; a pending older than `PENDING_TIMEOUT` is
    /// evicted and replaced. A pending of exactly `PENDING_TIMEOUT` age
    /// still rejects.
    pub fn write(&self, addr: &str, value: &str) -> Result<(), Error> {
        let record = self.record(addr);
        let mut record = record.lock().unwrap();
        let now = self.clock.now();

        match &record.pending {
            Some(pending) if !pending.expired(now) => Err(Error::PendingInFlight {
                addr: addr.to_string(),
                pending: pending.value.clone(),
            }),
            _ => {
                record.pending = Some(Pending {
                    value: value.to_string(),
                    accepted_at: now,
                });
                Ok(())
            }
        }
    }

    /// Commit the pending value at `addr`, incrementing the committed
    /// version by exactly one.
    pub fn confirm(&self, addr: &str) -> Result<(), Error> {
        let Some(record) = self.lookup(addr) else {
            return Err(Error::AddressNotFound(addr.to_string()));
        };
        let mut record = record.lock().unwrap();

        let Some(pending) = record.pending.take() else {
            return Err(Error::NoPendingValue(addr.to_string()));
        };
        record.committed = ValueVersion {
            value: pending.value,
            version: record.committed.version + 1,
        };
        Ok(())
    }

    /// Force-adopt `(value, version)` at `addr`, leaving any in-flight
    /// pending untouched.
    ///
    /// No downgrade guard is applied: the caller is expected to have
    /// observed `(value, version)` from a replica that is strictly ahead.
    pub fn update(&self, addr: &str, value: &str, version: u64) {
        let record = self.record(addr);
        let mut record = record.lock().unwrap();

        record.committed = ValueVersion {
            value: value.to_string(),
            version,
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixed_store() -> Store {
        Store::new(Clock::fixed())
    }

    #[test]
    fn test_read_of_unknown_address() {
        let store = fixed_store();
        assert!(matches!(
            store.read("addr1"),
            Err(Error::AddressNotFound(_))
        ));
    }

    #[test]
    fn test_uncommitted_write_reads_as_not_found() {
        let store = fixed_store();
        store.write("addr1", "val1").unwrap();
        assert!(matches!(
            store.read("addr1"),
            Err(Error::AddressNotFound(_))
        ));
    }

    #[test]
    fn test_write_confirm_read() {
        let store = fixed_store();
        store.write("addr1", "val1").unwrap();
        store.confirm("addr1").unwrap();

        assert_eq!(
            store.read("addr1").unwrap(),
            ValueVersion {
                value: "val1".to_string(),
                version: 1,
            }
        );
    }

    #[test]
    fn test_version_increments_by_one_per_confirm() {
        let store = fixed_store();
        for (round, value) in ["val1", "val2", "val3"].iter().enumerate() {
            store.write("addr1", value).unwrap();
            store.confirm("addr1").unwrap();
            assert_eq!(store.read("addr1").unwrap().version, round as u64 + 1);
        }
        assert_eq!(store.read("addr1").unwrap().value, "val3");
    }

    #[test]
    fn test_live_pending_rejects_write() {
        let store = fixed_store();
        store.write("addr1", "val1").unwrap();

        match store.write("addr1", "val2") {
            Err(Error::PendingInFlight { pending, .. }) => assert_eq!(pending, "val1"),
            other => panic!("expected PendingInFlight, got {other:?}"),
        }

        // The original pre-commit is still the one confirmed.
        store.confirm("addr1").unwrap();
        assert_eq!(store.read("addr1").unwrap().value, "val1");
    }

    #[test]
    fn test_pending_timeout_boundary() {
        let store = fixed_store();
        store.write("addr1", "val1").unwrap();

        // At exactly PENDING_TIMEOUT the pending still blocks.
        store.clock().advance(PENDING_TIMEOUT);
        assert!(matches!(
            store.write("addr1", "val2"),
            Err(Error::PendingInFlight { .. })
        ));

        // Strictly after, it is evicted and replaced.
        store.clock().advance(Duration::from_millis(1));
        store.write("addr1", "val2").unwrap();

        store.confirm("addr1").unwrap();
        assert_eq!(
            store.read("addr1").unwrap(),
            ValueVersion {
                value: "val2".to_string(),
                version: 1,
            }
        );
    }

    #[test]
    fn test_confirm_without_record_or_pending() {
        let store = fixed_store();
        assert!(matches!(
            store.confirm("addr1"),
            Err(Error::AddressNotFound(_))
        ));

        store.write("addr1", "val1").unwrap();
        store.confirm("addr1").unwrap();
        assert!(matches!(
            store.confirm("addr1"),
            Err(Error::NoPendingValue(_))
        ));
    }

    #[test]
    fn test_update_creates_record() {
        let store = fixed_store();
        store.update("addr1", "val1", 7);
        assert_eq!(
            store.read("addr1").unwrap(),
            ValueVersion {
                value: "val1".to_string(),
                version: 7,
            }
        );
    }

    #[test]
    fn test_update_preserves_pending() {
        let store = fixed_store();
        store.write("addr1", "val1").unwrap();
        store.update("addr1", "repaired", 5);

        assert_eq!(store.read("addr1").unwrap().version, 5);

        // The pending pre-commit survives the forced update, and its
        // confirmation builds on the updated version.
        store.confirm("addr1").unwrap();
        assert_eq!(
            store.read("addr1").unwrap(),
            ValueVersion {
                value: "val1".to_string(),
                version: 6,
            }
        );
    }

    #[test]
    fn test_distinct_addresses_do_not_interfere() {
        let store = Arc::new(fixed_store());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let addr = format!("addr-{worker}-{i}");
                        store.write(&addr, "val").unwrap();
                        store.confirm(&addr).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for worker in 0..8 {
            for i in 0..100 {
                let addr = format!("addr-{worker}-{i}");
                assert_eq!(store.read(&addr).unwrap().version, 1);
            }
        }
    }
}
