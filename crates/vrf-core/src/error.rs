use thiserror::Error;

use crate::address::Address;
use crate::vrf::VrfError;

/// Failures reported by the oracle entry points. Every failure leaves the
/// oracle state exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("request {0} not found")]
    NotFound(u64),

    #[error("request {0} already fulfilled")]
    AlreadyFulfilled(u64),

    #[error("proof for request {0} failed verification")]
    VerificationFailed(u64),

    #[error("{caller} is not authorized for this call")]
    Unauthorized { caller: Address },

    #[error("callback for request {request_id} failed: {reason}")]
    CallbackFailed {
        request_id: u64,
        reason: CallbackError,
    },

    #[error("request counter overflow")]
    CounterOverflow,

    #[error("zero address not allowed")]
    ZeroAddressNotAllowed,

    #[error(transparent)]
    Vrf(#[from] VrfError),
}

/// Failures raised by a consumer while receiving randomness. Returning one
/// of these aborts the delivery and rolls the fulfillment back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("caller {0} is not the configured oracle")]
    Unauthorized(Address),

    #[error("request {0} was not issued by this consumer")]
    UnknownRequest(u64),

    #[error("randomness for request {0} was already consumed")]
    AlreadyConsumed(u64),

    #[error("no receiver at {0}")]
    NoReceiver(Address),

    #[error("consumer rejected delivery: {0}")]
    Rejected(String),
}
