use anchor_lang::prelude::*;

/// Emitted when a new randomness request is created.
///
/// The off-chain operator subscribes to these events via WebSocket log
/// monitoring, proves over `seed` and submits the fulfillment.
#[event]
pub struct RandomnessRequested {
    pub request_id: u64,
    pub requester: Pubkey,
    pub callback_program: Pubkey,
    /// Stored seed, already mixed with the requester and slot.
    pub seed: [u8; 32],
    pub request_slot: u64,
}

/// Emitted when verified randomness is delivered to the callback program.
#[event]
pub struct RandomnessFulfilled {
    pub request_id: u64,
    pub randomness: [u8; 32],
}

#[event]
pub struct ConfigUpdated {
    pub operator: Pubkey,
    pub admin: Pubkey,
}
