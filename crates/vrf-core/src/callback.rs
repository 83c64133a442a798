//! Callback delivery as an explicit message send.
//!
//! The oracle never holds a reference to a consumer. It asks a
//! [`CallbackRouter`] to route a [`Delivery`] to the requester, and the router
//! hands the receiver a [`CallbackCall`] that carries the sender and is the
//! only way back into the oracle during the callback.
//!
//! A [`Delivery`] can only be minted by [`OracleCore::fulfill_randomness`]
//! after the proof verified and the request was marked `Fulfilled`, so a
//! router cannot be driven from outside the oracle to inject randomness.
//!
//! ```compile_fail
//! use vrf_core::callback::Delivery;
//! use vrf_core::Address;
//!
//! let forged = Delivery {
//!     target: Address::new([4u8; 32]),
//!     request_id: 1,
//!     randomness: [0xAA; 32],
//! };
//! ```

use std::collections::BTreeMap;

use crate::address::Address;
use crate::error::{CallbackError, OracleError};
use crate::oracle::OracleCore;
use crate::registry::RequestState;
use crate::vrf::Randomness;

/// Narrow interface a consumer exposes to the oracle.
pub trait RandomnessReceiver {
    /// Receive verified randomness for `request_id`. Returning an error
    /// aborts the delivery and the fulfillment with it.
    fn receive_randomness(
        &mut self,
        call: &mut CallbackCall<'_>,
        request_id: u64,
        randomness: Randomness,
    ) -> Result<(), CallbackError>;
}

/// Verified randomness on its way to the requester.
///
/// Not `Clone` and not constructible outside this crate: each one stands for
/// exactly one fulfillment that passed verification.
#[derive(Debug, PartialEq, Eq)]
pub struct Delivery {
    target: Address,
    request_id: u64,
    randomness: Randomness,
}

impl Delivery {
    pub(crate) fn new(target: Address, request_id: u64, randomness: Randomness) -> Self {
        Self {
            target,
            request_id,
            randomness,
        }
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn randomness(&self) -> &Randomness {
        &self.randomness
    }
}

/// Routes a [`Delivery`] to the receiver at its target.
pub trait CallbackRouter {
    fn dispatch(&mut self, oracle: &mut OracleCore, delivery: Delivery) -> Result<(), CallbackError>;
}

/// Context of one in-flight callback.
///
/// `caller` is the address that sent the message; receivers compare it to
/// the oracle they trust. Calls back into the oracle are made as `callee`,
/// the receiver's own address.
pub struct CallbackCall<'a> {
    caller: Address,
    callee: Address,
    oracle: &'a mut OracleCore,
    router: &'a mut dyn CallbackRouter,
}

impl<'a> CallbackCall<'a> {
    pub(crate) fn new(
        caller: Address,
        callee: Address,
        oracle: &'a mut OracleCore,
        router: &'a mut dyn CallbackRouter,
    ) -> Self {
        Self {
            caller,
            callee,
            oracle,
            router,
        }
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    pub fn callee(&self) -> Address {
        self.callee
    }

    pub fn oracle(&self) -> &OracleCore {
        self.oracle
    }

    pub fn request_status(&self, request_id: u64) -> RequestState {
        self.oracle.request_status(request_id)
    }

    /// Re-enter `fulfill_randomness` as the receiver.
    pub fn fulfill_randomness(
        &mut self,
        request_id: u64,
        randomness: Randomness,
        proof: &[u8],
    ) -> Result<(), OracleError> {
        self.oracle
            .fulfill_randomness(self.callee, request_id, randomness, proof, &mut *self.router)
    }

    /// Open a new request as the receiver.
    pub fn request_randomness(&mut self, seed: [u8; 32]) -> Result<u64, OracleError> {
        self.oracle.request_randomness(self.callee, seed)
    }
}

/// In-memory set of receivers keyed by address.
///
/// A receiver is taken out of the directory while its callback runs, so a
/// nested delivery to the same address fails with `NoReceiver`. On failure
/// every receiver is restored to its state before the dispatch.
#[derive(Debug, Clone)]
pub struct ReceiverDirectory<R> {
    receivers: BTreeMap<Address, R>,
}

impl<R> ReceiverDirectory<R> {
    pub fn new() -> Self {
        Self {
            receivers: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, address: Address, receiver: R) -> Option<R> {
        self.receivers.insert(address, receiver)
    }

    pub fn get(&self, address: &Address) -> Option<&R> {
        self.receivers.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut R> {
        self.receivers.get_mut(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.receivers.contains_key(address)
    }
}

impl<R> Default for ReceiverDirectory<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomnessReceiver + Clone> CallbackRouter for ReceiverDirectory<R> {
    fn dispatch(&mut self, oracle: &mut OracleCore, delivery: Delivery) -> Result<(), CallbackError> {
        let Delivery {
            target,
            request_id,
            randomness,
        } = delivery;
        let snapshot = self.receivers.clone();
        let mut receiver = self
            .receivers
            .remove(&target)
            .ok_or(CallbackError::NoReceiver(target))?;

        let result = {
            let caller = oracle.address();
            let mut call = CallbackCall::new(caller, target, oracle, self);
            receiver.receive_randomness(&mut call, request_id, randomness)
        };

        match result {
            Ok(()) => {
                self.receivers.insert(target, receiver);
                Ok(())
            }
            Err(err) => {
                self.receivers = snapshot;
                Err(err)
            }
        }
    }
}
