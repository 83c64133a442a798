//! Oracle core: request intake and verified fulfillment.
//!
//! The oracle is the only writer of its [`RequestRegistry`]. Per request the
//! state machine is `NotFound -> Pending -> Fulfilled`, with no skipped or
//! reversed transitions outside of an atomic rollback.

use tracing::{debug, info, warn};

use crate::address::Address;
use crate::callback::{CallbackRouter, Delivery};
use crate::error::OracleError;
use crate::registry::{RandomnessRequest, RequestRegistry, RequestState, RequestStatus};
use crate::vrf::{self, Randomness, VerifyingKey};

/// Events emitted by the oracle, in emission order. Events of a call that
/// fails are discarded together with its state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleEvent {
    /// Observed by the off-chain operator to start computing a proof.
    RandomnessRequested {
        request_id: u64,
        requester: Address,
        seed: [u8; 32],
        request_slot: u64,
    },
    RandomnessFulfilled {
        request_id: u64,
        randomness: Randomness,
    },
    ConfigUpdated {
        operator: Address,
        admin: Address,
    },
}

#[derive(Debug)]
pub struct OracleCore {
    address: Address,
    admin: Address,
    operator: Address,
    verifying_key: VerifyingKey,
    registry: RequestRegistry,
    events: Vec<OracleEvent>,
    slot: u64,
}

impl OracleCore {
    /// Construct the oracle with its immutable VRF verifying key.
    pub fn new(
        address: Address,
        admin: Address,
        operator: Address,
        verifying_key: &[u8; 32],
    ) -> Result<Self, OracleError> {
        if admin.is_zero() || operator.is_zero() {
            return Err(OracleError::ZeroAddressNotAllowed);
        }
        let verifying_key = VerifyingKey::from_bytes(verifying_key)?;

        info!(oracle = %address, operator = %operator, "oracle initialized");
        Ok(Self {
            address,
            admin,
            operator,
            verifying_key,
            registry: RequestRegistry::new(),
            events: Vec::new(),
            slot: 0,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Advance the host clock. Slots are stamped on requests and mixed into
    /// their seeds.
    pub fn set_slot(&mut self, slot: u64) {
        self.slot = slot;
    }

    pub fn request(&self, request_id: u64) -> Result<&RandomnessRequest, OracleError> {
        self.registry.get(request_id)
    }

    pub fn request_status(&self, request_id: u64) -> RequestState {
        self.registry.status(request_id)
    }

    pub fn events(&self) -> &[OracleEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<OracleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Record a new request for `requester` and emit `RandomnessRequested`.
    ///
    /// Any requester may call. The stored seed mixes the caller's seed with
    /// the requester and the current slot.
    pub fn request_randomness(
        &mut self,
        requester: Address,
        seed: [u8; 32],
    ) -> Result<u64, OracleError> {
        let seed = vrf::derive_seed(&seed, requester.as_bytes(), self.slot);
        let request_id = self.registry.create(requester, seed, self.slot)?;

        self.events.push(OracleEvent::RandomnessRequested {
            request_id,
            requester,
            seed,
            request_slot: self.slot,
        });
        Ok(request_id)
    }

    /// Verify a submitted VRF output and deliver it to the requester.
    ///
    /// Checks, each a precondition for the next:
    /// 1. the request exists (`NotFound`);
    /// 2. it is still pending (`AlreadyFulfilled`);
    /// 3. `caller` is the operator (`Unauthorized`);
    /// 4. the proof verifies against the stored seed (`VerificationFailed`).
    ///
    /// The request is marked `Fulfilled` before the callback is dispatched,
    /// so a re-entrant call for the same id observes `AlreadyFulfilled`. If
    /// the callback fails, every change made since step 4 is rolled back,
    /// the request stays `Pending` and `CallbackFailed` is returned.
    pub fn fulfill_randomness(
        &mut self,
        caller: Address,
        request_id: u64,
        randomness: Randomness,
        proof: &[u8],
        router: &mut dyn CallbackRouter,
    ) -> Result<(), OracleError> {
        let request = self.registry.get(request_id)?;
        if request.status != RequestStatus::Pending {
            return Err(OracleError::AlreadyFulfilled(request_id));
        }
        if caller != self.operator {
            warn!(request_id, caller = %caller, "fulfillment from non-operator");
            return Err(OracleError::Unauthorized { caller });
        }
        if !vrf::verify(&self.verifying_key, &request.seed, request_id, &randomness, proof) {
            warn!(request_id, "proof failed verification");
            return Err(OracleError::VerificationFailed(request_id));
        }
        let requester = request.requester;

        let events_len = self.events.len();
        let checkpoint = self.registry.checkpoint();
        if let Err(err) = self.registry.mark_fulfilled(request_id, self.slot) {
            self.registry.revert_to(checkpoint);
            return Err(err);
        }
        self.events.push(OracleEvent::RandomnessFulfilled {
            request_id,
            randomness,
        });

        match router.dispatch(self, Delivery::new(requester, request_id, randomness)) {
            Ok(()) => {
                self.registry.commit(checkpoint);
                debug!(request_id, requester = %requester, "randomness delivered");
                Ok(())
            }
            Err(reason) => {
                self.registry.revert_to(checkpoint);
                self.events.truncate(events_len);
                warn!(request_id, requester = %requester, %reason, "callback failed, fulfillment rolled back");
                Err(OracleError::CallbackFailed { request_id, reason })
            }
        }
    }

    /// Rotate the operator and/or admin. Admin only. The verifying key is
    /// fixed for the oracle's lifetime and cannot be changed here.
    pub fn update_config(
        &mut self,
        caller: Address,
        new_operator: Option<Address>,
        new_admin: Option<Address>,
    ) -> Result<(), OracleError> {
        if caller != self.admin {
            return Err(OracleError::Unauthorized { caller });
        }
        if new_operator.is_some_and(|a| a.is_zero()) || new_admin.is_some_and(|a| a.is_zero()) {
            return Err(OracleError::ZeroAddressNotAllowed);
        }
        if let Some(operator) = new_operator {
            self.operator = operator;
        }
        if let Some(admin) = new_admin {
            self.admin = admin;
        }

        self.events.push(OracleEvent::ConfigUpdated {
            operator: self.operator,
            admin: self.admin,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::ReceiverDirectory;
    use crate::consumer::EntropyConsumer;
    use crate::vrf::SecretKey;

    const ORACLE: Address = Address([1u8; 32]);
    const ADMIN: Address = Address([2u8; 32]);
    const OPERATOR: Address = Address([3u8; 32]);
    const CONSUMER: Address = Address([4u8; 32]);

    fn setup() -> (SecretKey, OracleCore, ReceiverDirectory<EntropyConsumer>) {
        let sk = SecretKey::from_bytes(&[42u8; 32]);
        let oracle = OracleCore::new(ORACLE, ADMIN, OPERATOR, &sk.verifying_key().to_bytes()).unwrap();
        let mut directory = ReceiverDirectory::new();
        directory.insert(CONSUMER, EntropyConsumer::new(CONSUMER, ORACLE));
        (sk, oracle, directory)
    }

    #[test]
    fn rejects_invalid_verifying_key() {
        assert!(matches!(
            OracleCore::new(ORACLE, ADMIN, OPERATOR, &[0u8; 32]),
            Err(OracleError::Vrf(_))
        ));
    }

    #[test]
    fn rejects_zero_operator() {
        let sk = SecretKey::from_bytes(&[42u8; 32]);
        assert_eq!(
            OracleCore::new(ORACLE, ADMIN, Address::ZERO, &sk.verifying_key().to_bytes()).unwrap_err(),
            OracleError::ZeroAddressNotAllowed
        );
    }

    #[test]
    fn request_emits_event_with_stored_seed() {
        let (_, mut oracle, _) = setup();
        oracle.set_slot(7);
        let id = oracle.request_randomness(CONSUMER, [5u8; 32]).unwrap();

        let stored = oracle.request(id).unwrap().clone();
        assert_eq!(stored.request_slot, 7);
        assert_eq!(stored.seed, vrf::derive_seed(&[5u8; 32], CONSUMER.as_bytes(), 7));
        assert_eq!(
            oracle.events(),
            &[OracleEvent::RandomnessRequested {
                request_id: id,
                requester: CONSUMER,
                seed: stored.seed,
                request_slot: 7,
            }]
        );
    }

    #[test]
    fn unknown_request_is_not_found() {
        let (sk, mut oracle, mut directory) = setup();
        let (randomness, proof) = sk.prove(&[0u8; 32], 99);
        assert_eq!(
            oracle.fulfill_randomness(OPERATOR, 99, randomness, proof.as_bytes(), &mut directory),
            Err(OracleError::NotFound(99))
        );
    }

    #[test]
    fn non_operator_is_unauthorized() {
        let (sk, mut oracle, mut directory) = setup();
        let id = oracle.request_randomness(CONSUMER, [5u8; 32]).unwrap();
        let seed = oracle.request(id).unwrap().seed;
        let (randomness, proof) = sk.prove(&seed, id);

        assert_eq!(
            oracle.fulfill_randomness(ADMIN, id, randomness, proof.as_bytes(), &mut directory),
            Err(OracleError::Unauthorized { caller: ADMIN })
        );
        assert_eq!(oracle.request_status(id), RequestState::Pending);
    }

    #[test]
    fn proof_over_caller_supplied_seed_is_rejected() {
        let (sk, mut oracle, mut directory) = setup();
        let caller_seed = [5u8; 32];
        let id = oracle.request_randomness(CONSUMER, caller_seed).unwrap();
        // Proof over the raw caller seed instead of the stored, derived one.
        let (randomness, proof) = sk.prove(&caller_seed, id);

        assert_eq!(
            oracle.fulfill_randomness(OPERATOR, id, randomness, proof.as_bytes(), &mut directory),
            Err(OracleError::VerificationFailed(id))
        );
    }

    #[test]
    fn update_config_rotates_operator() {
        let (sk, mut oracle, mut directory) = setup();
        let new_operator = Address::new([8u8; 32]);
        assert_eq!(
            oracle.update_config(OPERATOR, Some(new_operator), None),
            Err(OracleError::Unauthorized { caller: OPERATOR })
        );
        assert_eq!(
            oracle.update_config(ADMIN, Some(Address::ZERO), None),
            Err(OracleError::ZeroAddressNotAllowed)
        );
        oracle.update_config(ADMIN, Some(new_operator), None).unwrap();
        assert_eq!(oracle.operator(), new_operator);
        assert_eq!(oracle.admin(), ADMIN);

        let id = directory
            .get_mut(&CONSUMER)
            .unwrap()
            .request_entropy(&mut oracle, [5u8; 32])
            .unwrap();
        let seed = oracle.request(id).unwrap().seed;
        let (randomness, proof) = sk.prove(&seed, id);
        assert_eq!(
            oracle.fulfill_randomness(OPERATOR, id, randomness, proof.as_bytes(), &mut directory),
            Err(OracleError::Unauthorized { caller: OPERATOR })
        );
        oracle
            .fulfill_randomness(new_operator, id, randomness, proof.as_bytes(), &mut directory)
            .unwrap();
        assert_eq!(oracle.request_status(id), RequestState::Fulfilled);
        assert_eq!(
            directory.get(&CONSUMER).unwrap().randomness(id),
            Some(randomness)
        );
    }

    #[test]
    fn drain_events_empties_the_log() {
        let (_, mut oracle, _) = setup();
        oracle.request_randomness(CONSUMER, [5u8; 32]).unwrap();
        assert_eq!(oracle.drain_events().len(), 1);
        assert!(oracle.events().is_empty());
    }
}
