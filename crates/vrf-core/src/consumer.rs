//! Reference consumer: requests entropy and stores what the oracle delivers.

use std::collections::BTreeMap;

use tracing::debug;

use crate::address::Address;
use crate::callback::{CallbackCall, RandomnessReceiver};
use crate::error::{CallbackError, OracleError};
use crate::oracle::OracleCore;
use crate::vrf::Randomness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyState {
    Pending,
    Received(Randomness),
}

/// A consumer bound to one oracle at construction.
///
/// Its received-randomness storage is written only through
/// [`RandomnessReceiver::receive_randomness`], and only for requests it issued
/// itself and has not consumed yet.
#[derive(Debug, Clone)]
pub struct EntropyConsumer {
    address: Address,
    oracle: Address,
    requests: BTreeMap<u64, EntropyState>,
}

impl EntropyConsumer {
    pub fn new(address: Address, oracle: Address) -> Self {
        Self {
            address,
            oracle,
            requests: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn oracle(&self) -> Address {
        self.oracle
    }

    /// Ask the configured oracle for randomness. Refuses any other oracle.
    pub fn request_entropy(
        &mut self,
        oracle: &mut OracleCore,
        seed: [u8; 32],
    ) -> Result<u64, OracleError> {
        if oracle.address() != self.oracle {
            return Err(OracleError::Unauthorized {
                caller: oracle.address(),
            });
        }
        let request_id = oracle.request_randomness(self.address, seed)?;
        self.requests.insert(request_id, EntropyState::Pending);
        Ok(request_id)
    }

    pub fn state(&self, request_id: u64) -> Option<EntropyState> {
        self.requests.get(&request_id).copied()
    }

    pub fn randomness(&self, request_id: u64) -> Option<Randomness> {
        match self.requests.get(&request_id) {
            Some(EntropyState::Received(randomness)) => Some(*randomness),
            _ => None,
        }
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = u64> + '_ {
        self.requests
            .iter()
            .filter(|(_, state)| **state == EntropyState::Pending)
            .map(|(id, _)| *id)
    }

    /// Face of a six-sided die for a delivered request.
    pub fn dice_roll(&self, request_id: u64) -> Option<u8> {
        self.randomness(request_id).map(|randomness| die_face(&randomness))
    }
}

impl RandomnessReceiver for EntropyConsumer {
    fn receive_randomness(
        &mut self,
        call: &mut CallbackCall<'_>,
        request_id: u64,
        randomness: Randomness,
    ) -> Result<(), CallbackError> {
        if call.caller() != self.oracle {
            return Err(CallbackError::Unauthorized(call.caller()));
        }
        let state = self
            .requests
            .get_mut(&request_id)
            .ok_or(CallbackError::UnknownRequest(request_id))?;
        if let EntropyState::Received(_) = state {
            return Err(CallbackError::AlreadyConsumed(request_id));
        }
        *state = EntropyState::Received(randomness);

        debug!(request_id, consumer = %self.address, "entropy received");
        Ok(())
    }
}

/// Map randomness to 1..=6 from its first eight bytes, little-endian.
pub fn die_face(randomness: &Randomness) -> u8 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&randomness[..8]);
    (u64::from_le_bytes(word) % 6) as u8 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::ReceiverDirectory;
    use crate::vrf::SecretKey;

    const ORACLE: Address = Address([1u8; 32]);
    const OPERATOR: Address = Address([3u8; 32]);
    const CONSUMER: Address = Address([4u8; 32]);
    const INTRUDER: Address = Address([6u8; 32]);

    fn oracle_at(address: Address) -> OracleCore {
        let sk = SecretKey::from_bytes(&[7u8; 32]);
        OracleCore::new(address, OPERATOR, OPERATOR, &sk.verifying_key().to_bytes()).unwrap()
    }

    #[test]
    fn die_face_is_in_range() {
        assert_eq!(die_face(&[0u8; 32]), 1);
        let mut r = [0u8; 32];
        r[0] = 5;
        assert_eq!(die_face(&r), 6);
        r[0] = 6;
        assert_eq!(die_face(&r), 1);
        assert!((1..=6).contains(&die_face(&[0xff; 32])));
    }

    #[test]
    fn refuses_foreign_oracle() {
        let mut foreign = oracle_at(INTRUDER);
        let mut consumer = EntropyConsumer::new(CONSUMER, ORACLE);
        assert_eq!(
            consumer.request_entropy(&mut foreign, [0u8; 32]),
            Err(OracleError::Unauthorized { caller: INTRUDER })
        );
        assert!(foreign.registry().is_empty());
    }

    #[test]
    fn rejects_callback_from_unexpected_caller() {
        let mut oracle = oracle_at(ORACLE);
        let mut consumer = EntropyConsumer::new(CONSUMER, ORACLE);
        let id = consumer.request_entropy(&mut oracle, [0u8; 32]).unwrap();

        let mut router: ReceiverDirectory<EntropyConsumer> = ReceiverDirectory::new();
        let mut call = CallbackCall::new(INTRUDER, CONSUMER, &mut oracle, &mut router);
        assert_eq!(
            consumer.receive_randomness(&mut call, id, [9u8; 32]),
            Err(CallbackError::Unauthorized(INTRUDER))
        );
        assert_eq!(consumer.state(id), Some(EntropyState::Pending));
    }

    #[test]
    fn rejects_unissued_and_replayed_requests() {
        let mut oracle = oracle_at(ORACLE);
        let mut consumer = EntropyConsumer::new(CONSUMER, ORACLE);
        let id = consumer.request_entropy(&mut oracle, [0u8; 32]).unwrap();

        let mut router: ReceiverDirectory<EntropyConsumer> = ReceiverDirectory::new();
        let mut call = CallbackCall::new(ORACLE, CONSUMER, &mut oracle, &mut router);
        assert_eq!(
            consumer.receive_randomness(&mut call, id + 1, [9u8; 32]),
            Err(CallbackError::UnknownRequest(id + 1))
        );

        consumer.receive_randomness(&mut call, id, [9u8; 32]).unwrap();
        assert_eq!(consumer.randomness(id), Some([9u8; 32]));
        assert_eq!(
            consumer.receive_randomness(&mut call, id, [1u8; 32]),
            Err(CallbackError::AlreadyConsumed(id))
        );
        assert_eq!(consumer.randomness(id), Some([9u8; 32]));
        assert_eq!(consumer.pending_requests().count(), 0);
    }
}
