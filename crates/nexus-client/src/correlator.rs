//! Request identifiers and in-flight bookkeeping.
//!
//! Every outgoing request draws a fresh identifier (starting at 1, never
//! reused) and is registered in a table of pending requests before it is
//! sent. The response is matched back against that table, so a client
//! shared between threads can tell which caller a response belongs to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{NexusError, Result};

/// A request that has been sent and not yet answered.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Request identifier.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// When the request was registered.
    pub issued_at: Instant,
}

impl PendingRequest {
    /// Time since the request was registered.
    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

/// Allocates request identifiers and tracks requests in flight.
#[derive(Debug)]
pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingRequest>>,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCorrelator {
    /// Create a correlator whose first identifier is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next identifier.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Check a response identifier against the awaited one.
    pub fn validate(response_id: u64, expected_id: u64) -> Result<()> {
        if response_id == expected_id {
            Ok(())
        } else {
            Err(NexusError::IdMismatch {
                expected: expected_id,
                actual: response_id,
            })
        }
    }

    /// Allocate an identifier and register it as in flight.
    ///
    /// The returned guard removes the entry when dropped unless the
    /// matching response was resolved through it.
    pub fn begin(&self, method: &str) -> Result<InFlight<'_>> {
        let id = self.next_id();
        self.register(id, method)?;
        Ok(InFlight {
            correlator: self,
            id,
            resolved: false,
        })
    }

    /// Register an identifier as in flight.
    pub fn register(&self, id: u64, method: &str) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&id) {
            return Err(NexusError::protocol(format!(
                "request id {} is already in flight",
                id
            )));
        }
        pending.insert(
            id,
            PendingRequest {
                id,
                method: method.to_string(),
                issued_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Resolve the pending request a response belongs to.
    pub fn resolve(&self, response_id: u64) -> Result<PendingRequest> {
        self.pending.lock().remove(&response_id).ok_or_else(|| {
            tracing::warn!(id = response_id, "response matches no request in flight");
            NexusError::protocol(format!(
                "response id {} matches no request in flight",
                response_id
            ))
        })
    }

    /// Drop a pending request without a response.
    pub fn abandon(&self, id: u64) -> Option<PendingRequest> {
        self.pending.lock().remove(&id)
    }

    /// Whether an identifier is currently in flight.
    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.lock().contains_key(&id)
    }

    /// Number of requests in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Handle for one registered request.
#[derive(Debug)]
pub struct InFlight<'a> {
    correlator: &'a RequestCorrelator,
    id: u64,
    resolved: bool,
}

impl InFlight<'_> {
    /// Identifier of this request.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Match a response to this request.
    ///
    /// A response carrying any other identifier is rejected and this
    /// request is abandoned when the guard drops.
    pub fn complete(mut self, response_id: u64) -> Result<PendingRequest> {
        RequestCorrelator::validate(response_id, self.id)?;
        let pending = self.correlator.resolve(response_id)?;
        self.resolved = true;
        Ok(pending)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.correlator.abandon(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let correlator = RequestCorrelator::new();
        assert_eq!(correlator.next_id(), 1);
        assert_eq!(correlator.next_id(), 2);
        assert_eq!(correlator.next_id(), 3);
    }

    #[test]
    fn test_validate() {
        assert!(RequestCorrelator::validate(4, 4).is_ok());
        match RequestCorrelator::validate(5, 4) {
            Err(NexusError::IdMismatch { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 5);
            }
            other => panic!("expected IdMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_begin_and_complete() {
        let correlator = RequestCorrelator::new();
        let request = correlator.begin("ping").unwrap();
        let id = request.id();
        assert!(correlator.is_pending(id));
        assert_eq!(correlator.in_flight(), 1);

        let pending = request.complete(id).unwrap();
        assert_eq!(pending.method, "ping");
        assert_eq!(pending.id, id);
        assert_eq!(correlator.in_flight(), 0);
    }

    #[test]
    fn test_mismatch_abandons_request() {
        let correlator = RequestCorrelator::new();
        let request = correlator.begin("tools/call").unwrap();
        let id = request.id();

        let err = request.complete(id + 10).unwrap_err();
        assert!(matches!(err, NexusError::IdMismatch { .. }));
        assert!(!correlator.is_pending(id));
    }

    #[test]
    fn test_dropped_guard_abandons_request() {
        let correlator = RequestCorrelator::new();
        {
            let _request = correlator.begin("initialize").unwrap();
            assert_eq!(correlator.in_flight(), 1);
        }
        assert_eq!(correlator.in_flight(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let correlator = RequestCorrelator::new();
        correlator.register(9, "ping").unwrap();
        let err = correlator.register(9, "ping").unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_resolve_unknown_id() {
        let correlator = RequestCorrelator::new();
        let err = correlator.resolve(42).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let correlator = Arc::new(RequestCorrelator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let correlator = Arc::clone(&correlator);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| correlator.next_id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 800);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&800));
    }
}
