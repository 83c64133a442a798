//! Core of the verifiable randomness oracle.
//!
//! A requester asks the oracle for randomness bound to a request identifier.
//! The off-chain operator evaluates an ECVRF over `(request_id, seed)` with
//! its secret key and submits the output together with a proof. The oracle
//! verifies the proof against the seed it stored at request time, flips the
//! request to `Fulfilled`, and only then delivers the randomness to the
//! requester's callback.
//!
//! ## Request lifecycle
//!
//! 1. **Request**: [`OracleCore::request_randomness`] records a `Pending`
//!    request in the [`RequestRegistry`] and emits
//!    [`OracleEvent::RandomnessRequested`].
//! 2. **Fulfill**: [`OracleCore::fulfill_randomness`] looks up the request,
//!    rejects it if already fulfilled or if the caller is not the operator,
//!    runs [`vrf::verify`], marks the request `Fulfilled` and dispatches the
//!    callback through a [`CallbackRouter`].
//! 3. **Deliver**: the [`RandomnessReceiver`] (for example
//!    [`EntropyConsumer`]) authenticates the caller and stores the value.
//!
//! A failed callback rolls the whole fulfillment back; the request stays
//! `Pending` and can be fulfilled again.
//!
//! The `vrf` module has no dependency on the rest of the crate and is what
//! the on-chain program links against.

pub mod address;
pub mod callback;
pub mod consumer;
pub mod error;
pub mod oracle;
pub mod registry;
pub mod vrf;

pub use address::Address;
pub use callback::{CallbackCall, CallbackRouter, Delivery, RandomnessReceiver, ReceiverDirectory};
pub use consumer::{EntropyConsumer, EntropyState};
pub use error::{CallbackError, OracleError};
pub use oracle::{OracleCore, OracleEvent};
pub use registry::{RandomnessRequest, RequestRegistry, RequestState, RequestStatus};
pub use vrf::{Proof, Randomness, SecretKey, VerifyingKey, VrfError};
