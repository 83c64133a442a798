//! Request registry: the single owner of every randomness request.
//!
//! Identifiers come from a monotonically increasing counter that starts at 1
//! and never reuses a value. Records are never deleted. The only transition
//! is `Pending -> Fulfilled`, performed at most once per request.
//!
//! Writes made while a [`Checkpoint`] is open are journaled so that the
//! oracle can undo them atomically when a callback fails.

use std::collections::BTreeMap;

use tracing::debug;

use crate::address::Address;
use crate::error::OracleError;

/// Lifecycle status of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Created, awaiting a verified fulfillment.
    Pending,
    /// Verified randomness was delivered. Terminal.
    Fulfilled,
}

/// Status as seen by readers, including identifiers never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Fulfilled,
    NotFound,
}

impl From<RequestStatus> for RequestState {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Pending => RequestState::Pending,
            RequestStatus::Fulfilled => RequestState::Fulfilled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub request_id: u64,
    /// Consumer that created the request; the only callback target.
    pub requester: Address,
    /// Seed derived at creation time. Proofs are always checked against it.
    pub seed: [u8; 32],
    pub status: RequestStatus,
    pub request_slot: u64,
    pub fulfilled_slot: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum JournalEntry {
    Created(u64),
    Fulfilled(u64),
}

/// Marks a point the registry can be reverted to.
#[must_use]
#[derive(Debug)]
pub struct Checkpoint {
    journal_len: usize,
}

#[derive(Debug)]
pub struct RequestRegistry {
    requests: BTreeMap<u64, RandomnessRequest>,
    next_request_id: u64,
    journal: Vec<JournalEntry>,
    open_checkpoints: usize,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self {
            requests: BTreeMap::new(),
            next_request_id: 1,
            journal: Vec::new(),
            open_checkpoints: 0,
        }
    }

    /// Record a new `Pending` request and return its identifier.
    pub fn create(
        &mut self,
        requester: Address,
        seed: [u8; 32],
        request_slot: u64,
    ) -> Result<u64, OracleError> {
        let request_id = self.next_request_id;
        self.next_request_id = request_id
            .checked_add(1)
            .ok_or(OracleError::CounterOverflow)?;

        self.requests.insert(
            request_id,
            RandomnessRequest {
                request_id,
                requester,
                seed,
                status: RequestStatus::Pending,
                request_slot,
                fulfilled_slot: None,
            },
        );
        self.record(JournalEntry::Created(request_id));

        debug!(request_id, requester = %requester, "request created");
        Ok(request_id)
    }

    pub fn get(&self, request_id: u64) -> Result<&RandomnessRequest, OracleError> {
        self.requests
            .get(&request_id)
            .ok_or(OracleError::NotFound(request_id))
    }

    pub fn status(&self, request_id: u64) -> RequestState {
        self.requests
            .get(&request_id)
            .map_or(RequestState::NotFound, |request| request.status.into())
    }

    /// Flip a request to `Fulfilled`.
    ///
    /// Fails with `NotFound` for identifiers never issued and with
    /// `AlreadyFulfilled` on every call after the first success.
    pub fn mark_fulfilled(&mut self, request_id: u64, slot: u64) -> Result<(), OracleError> {
        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(OracleError::NotFound(request_id))?;
        if request.status == RequestStatus::Fulfilled {
            return Err(OracleError::AlreadyFulfilled(request_id));
        }
        request.status = RequestStatus::Fulfilled;
        request.fulfilled_slot = Some(slot);
        self.record(JournalEntry::Fulfilled(request_id));

        debug!(request_id, slot, "request fulfilled");
        Ok(())
    }

    /// Identifier the next `create` will assign.
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &RandomnessRequest> {
        self.requests
            .values()
            .filter(|request| request.status == RequestStatus::Pending)
    }

    /// Open a checkpoint. Every write until the matching `commit` or
    /// `revert_to` is journaled. Checkpoints nest.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.open_checkpoints += 1;
        Checkpoint {
            journal_len: self.journal.len(),
        }
    }

    /// Keep every write made since `checkpoint`.
    pub fn commit(&mut self, _checkpoint: Checkpoint) {
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        if self.open_checkpoints == 0 {
            self.journal.clear();
        }
    }

    /// Undo every write made since `checkpoint`, newest first. An undone
    /// creation also rewinds the counter: the identifier was never issued.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.journal_len {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Created(request_id) => {
                    self.requests.remove(&request_id);
                    self.next_request_id = request_id;
                }
                JournalEntry::Fulfilled(request_id) => {
                    if let Some(request) = self.requests.get_mut(&request_id) {
                        request.status = RequestStatus::Pending;
                        request.fulfilled_slot = None;
                    }
                }
            }
        }
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        if self.open_checkpoints == 0 {
            self.journal.clear();
        }
    }

    fn record(&mut self, entry: JournalEntry) {
        if self.open_checkpoints > 0 {
            self.journal.push(entry);
        }
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester() -> Address {
        Address::new([9u8; 32])
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut registry = RequestRegistry::new();
        assert_eq!(registry.create(requester(), [0u8; 32], 1), Ok(1));
        assert_eq!(registry.create(requester(), [0u8; 32], 1), Ok(2));
        assert_eq!(registry.next_request_id(), 3);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut registry = RequestRegistry::new();
        assert_eq!(registry.status(1), RequestState::NotFound);
        assert_eq!(registry.get(1), Err(OracleError::NotFound(1)));
        assert_eq!(registry.mark_fulfilled(1, 5), Err(OracleError::NotFound(1)));
    }

    #[test]
    fn fulfills_exactly_once() {
        let mut registry = RequestRegistry::new();
        let id = registry.create(requester(), [1u8; 32], 3).unwrap();
        assert_eq!(registry.status(id), RequestState::Pending);

        registry.mark_fulfilled(id, 4).unwrap();
        assert_eq!(registry.status(id), RequestState::Fulfilled);
        assert_eq!(registry.get(id).unwrap().fulfilled_slot, Some(4));

        assert_eq!(
            registry.mark_fulfilled(id, 5),
            Err(OracleError::AlreadyFulfilled(id))
        );
        assert_eq!(registry.get(id).unwrap().fulfilled_slot, Some(4));
    }

    #[test]
    fn fulfilled_requests_are_retained() {
        let mut registry = RequestRegistry::new();
        let id = registry.create(requester(), [1u8; 32], 3).unwrap();
        registry.mark_fulfilled(id, 4).unwrap();
        let next = registry.create(requester(), [1u8; 32], 5).unwrap();
        assert_ne!(id, next);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.pending().count(), 1);
    }

    #[test]
    fn counter_overflow_is_reported() {
        let mut registry = RequestRegistry::new();
        registry.next_request_id = u64::MAX;
        assert_eq!(
            registry.create(requester(), [0u8; 32], 1),
            Err(OracleError::CounterOverflow)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn revert_undoes_fulfillment_and_creation() {
        let mut registry = RequestRegistry::new();
        let id = registry.create(requester(), [1u8; 32], 1).unwrap();

        let checkpoint = registry.checkpoint();
        registry.mark_fulfilled(id, 2).unwrap();
        let nested = registry.create(requester(), [2u8; 32], 2).unwrap();
        registry.revert_to(checkpoint);

        assert_eq!(registry.status(id), RequestState::Pending);
        assert_eq!(registry.get(id).unwrap().fulfilled_slot, None);
        assert_eq!(registry.status(nested), RequestState::NotFound);
        assert_eq!(registry.next_request_id(), nested);
    }

    #[test]
    fn nested_commit_is_undone_by_outer_revert() {
        let mut registry = RequestRegistry::new();
        let a = registry.create(requester(), [1u8; 32], 1).unwrap();
        let b = registry.create(requester(), [2u8; 32], 1).unwrap();

        let outer = registry.checkpoint();
        registry.mark_fulfilled(a, 2).unwrap();
        let inner = registry.checkpoint();
        registry.mark_fulfilled(b, 2).unwrap();
        registry.commit(inner);
        registry.revert_to(outer);

        assert_eq!(registry.status(a), RequestState::Pending);
        assert_eq!(registry.status(b), RequestState::Pending);
    }

    #[test]
    fn commit_keeps_writes() {
        let mut registry = RequestRegistry::new();
        let id = registry.create(requester(), [1u8; 32], 1).unwrap();
        let checkpoint = registry.checkpoint();
        registry.mark_fulfilled(id, 2).unwrap();
        registry.commit(checkpoint);
        assert_eq!(registry.status(id), RequestState::Fulfilled);
        assert!(registry.journal.is_empty());
    }
}
