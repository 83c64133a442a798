use anchor_lang::prelude::*;

pub mod errors;
pub mod events;
pub mod instructions;
pub mod state;

use instructions::*;
use state::RequestState;

declare_id!("A4pDDsKvtX2U3jyEURVSoH15Mx4JcgUiSqCKxqWE3N48");

/// Verifiable randomness oracle program.
///
/// An off-chain operator watches for [`RandomnessRequested`] events, evaluates
/// an ECVRF (ristretto255, SHA-512) over `request_id || seed` with its secret
/// key and submits the output with an 80-byte proof. The program verifies the
/// proof against the immutable verifying key before delivering the output to
/// the requester's callback program.
///
/// ## Request lifecycle
///
/// 1. **Request**: any signer calls `request_randomness` with a seed and a
///    callback program; a request PDA is created with status `Pending`.
/// 2. **Fulfill**: the operator submits `fulfill_randomness`; the proof is
///    verified, the status flips to `Fulfilled`, and the callback program's
///    `receive_randomness` is invoked with the config PDA as signer.
///
/// Request accounts are never closed; they are the audit trail.
#[program]
pub mod vrf_oracle {
    use super::*;

    /// Create the singleton oracle configuration PDA.
    ///
    /// Must be called exactly once. Sets the admin, operator and verifying key.
    pub fn initialize(ctx: Context<Initialize>, verifying_key: [u8; 32]) -> Result<()> {
        instructions::initialize::handler(ctx, verifying_key)
    }

    /// Submit a new randomness request.
    ///
    /// Creates a request PDA and emits [`RandomnessRequested`].
    pub fn request_randomness(ctx: Context<RequestRandomness>, seed: [u8; 32]) -> Result<()> {
        instructions::request::handler(ctx, seed)
    }

    /// Fulfill a pending request with a VRF output and proof.
    ///
    /// Only callable by the configured `operator`.
    pub fn fulfill_randomness<'info>(
        ctx: Context<'_, '_, '_, 'info, FulfillRandomness<'info>>,
        request_id: u64,
        randomness: [u8; 32],
        proof: Vec<u8>,
    ) -> Result<()> {
        instructions::fulfill::handler(ctx, request_id, randomness, proof)
    }

    /// Read a request's status without mutating anything.
    pub fn get_request_status(ctx: Context<GetRequestStatus>, request_id: u64) -> Result<RequestState> {
        instructions::request_status::handler(ctx, request_id)
    }

    /// Update the oracle configuration (admin-only).
    ///
    /// Both parameters are optional; only provided fields are updated.
    /// Zero-address values are rejected.
    pub fn update_config(
        ctx: Context<UpdateConfig>,
        new_operator: Option<Pubkey>,
        new_admin: Option<Pubkey>,
    ) -> Result<()> {
        instructions::update_config::handler(ctx, new_operator, new_admin)
    }
}
