use anchor_lang::prelude::*;

/// Global oracle configuration, stored as a singleton PDA.
///
/// Seeds: `["oracle-config"]`
///
/// Only the `admin` may update this account via [`update_config`]. The
/// `verifying_key` is fixed at initialization; rotating the `operator` only
/// changes who may submit fulfillments, never which proofs verify.
///
/// The config PDA also signs every consumer callback, so consumers
/// authenticate the oracle by checking this address is a signer.
#[account]
#[derive(InitSpace)]
pub struct OracleConfig {
    /// Privileged key that may update this configuration.
    pub admin: Pubkey,
    /// Account allowed to submit fulfillments.
    pub operator: Pubkey,
    /// Compressed ristretto255 point of the oracle's VRF key.
    pub verifying_key: [u8; 32],
    /// Identifier the next request will receive. Starts at 1.
    pub next_request_id: u64,
    /// PDA bump seed cached for efficient re-derivation.
    pub bump: u8,
}

/// Individual randomness request account, one per request. Never closed.
///
/// Seeds: `["request", request_id.to_le_bytes()]`
///
/// Lifecycle: Pending (0) -> Fulfilled (1), exactly once.
#[account]
#[derive(InitSpace)]
pub struct RandomnessRequest {
    /// Identifier taken from `OracleConfig::next_request_id` at creation time.
    pub request_id: u64,
    /// Signer that created the request.
    pub requester: Pubkey,
    /// Program whose `receive_randomness` instruction gets the output.
    pub callback_program: Pubkey,
    /// Seed derived from the caller's seed, the requester and the slot.
    pub seed: [u8; 32],
    /// Solana slot at which the request was created.
    pub request_slot: u64,
    /// Request lifecycle status. See `STATUS_*` constants.
    pub status: u8,
    /// Solana slot at which the request was fulfilled, 0 while pending.
    pub fulfilled_slot: u64,
    /// PDA bump seed cached for efficient re-derivation.
    pub bump: u8,
}

impl RandomnessRequest {
    /// Request created, awaiting a verified fulfillment.
    pub const STATUS_PENDING: u8 = 0;
    /// Randomness verified and delivered to the callback program.
    pub const STATUS_FULFILLED: u8 = 1;

    /// Byte offset of `status` in the account data, discriminator included.
    /// Used by off-chain `getProgramAccounts` filters.
    pub const STATUS_OFFSET: usize = 8 + 8 + 32 + 32 + 32 + 8;
}

/// Status reported by `get_request_status`, including ids never issued.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Fulfilled,
    NotFound,
}

impl RequestState {
    pub fn from_status(status: u8) -> Self {
        match status {
            RandomnessRequest::STATUS_PENDING => RequestState::Pending,
            RandomnessRequest::STATUS_FULFILLED => RequestState::Fulfilled,
            _ => RequestState::NotFound,
        }
    }
}
