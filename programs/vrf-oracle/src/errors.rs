use anchor_lang::prelude::*;

/// Error codes for the oracle program.
///
/// Anchor encodes these as `6000 + variant index` in on-chain error responses.
/// The off-chain operator treats `RequestNotFound` through
/// `InvalidCallbackProgram` as terminal for the request it was fulfilling, so
/// keep new variants at the end.
///
/// There is no callback-failure code: a failing consumer CPI aborts the whole
/// transaction with the consumer's own error.
#[error_code]
pub enum VrfError {
    /// No request account exists for this identifier.
    #[msg("Request not found")]
    RequestNotFound,
    /// The request was already fulfilled; fulfillment happens at most once.
    #[msg("Request already fulfilled")]
    AlreadyFulfilled,
    /// Signer does not have permission for this action (wrong admin or operator).
    #[msg("Unauthorized")]
    Unauthorized,
    /// The proof does not verify for the stored seed, request id and randomness.
    #[msg("VRF proof verification failed")]
    VerificationFailed,
    /// The callback program passed in does not match the one stored on the request.
    #[msg("Callback program does not match request")]
    InvalidCallbackProgram,
    /// The verifying key is not a valid ristretto255 point.
    #[msg("Invalid verifying key")]
    InvalidVerifyingKey,
    /// A public key argument was the zero address (`11111111111111111111111111111111`).
    #[msg("Zero address not allowed")]
    ZeroAddressNotAllowed,
    /// The request counter would overflow u64 (practically unreachable).
    #[msg("Request counter overflow")]
    CounterOverflow,
}
