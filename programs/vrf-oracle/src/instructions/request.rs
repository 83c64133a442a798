use anchor_lang::prelude::*;
use vrf_core::vrf::derive_seed;

use crate::errors::VrfError;
use crate::events::RandomnessRequested;
use crate::state::{OracleConfig, RandomnessRequest};

/// Accounts required to create a new randomness request.
///
/// The request PDA is derived from the current `next_request_id` value,
/// guaranteeing uniqueness. The counter is incremented after the PDA is
/// initialized.
#[derive(Accounts)]
pub struct RequestRandomness<'info> {
    /// Identity recorded on the request. Consumer programs sign with a PDA.
    pub requester: Signer<'info>,

    /// Pays rent for the request account.
    #[account(mut)]
    pub payer: Signer<'info>,

    /// Oracle configuration PDA (mutated to increment `next_request_id`).
    #[account(
        mut,
        seeds = [b"oracle-config"],
        bump = config.bump,
    )]
    pub config: Account<'info, OracleConfig>,

    /// New request PDA. Seeds: `["request", next_request_id.to_le_bytes()]`.
    #[account(
        init,
        payer = payer,
        space = 8 + RandomnessRequest::INIT_SPACE,
        seeds = [b"request", config.next_request_id.to_le_bytes().as_ref()],
        bump,
    )]
    pub request: Account<'info, RandomnessRequest>,

    /// The program to call back after fulfillment.
    /// CHECK: Stored as-is; matched against the account passed at fulfillment.
    pub callback_program: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

/// Create a new randomness request.
///
/// 1. Derives the stored seed from the caller's seed, requester and slot.
/// 2. Initializes the request PDA with status `Pending`.
/// 3. Increments `config.next_request_id`.
/// 4. Emits [`RandomnessRequested`] for the off-chain operator.
pub fn handler(ctx: Context<RequestRandomness>, seed: [u8; 32]) -> Result<()> {
    require!(
        ctx.accounts.callback_program.key() != Pubkey::default(),
        VrfError::ZeroAddressNotAllowed
    );

    let config = &mut ctx.accounts.config;
    let request_id = config.next_request_id;
    let requester = ctx.accounts.requester.key();
    let request_slot = Clock::get()?.slot;
    let seed = derive_seed(&seed, &requester.to_bytes(), request_slot);

    let request = &mut ctx.accounts.request;
    request.request_id = request_id;
    request.requester = requester;
    request.callback_program = ctx.accounts.callback_program.key();
    request.seed = seed;
    request.request_slot = request_slot;
    request.status = RandomnessRequest::STATUS_PENDING;
    request.fulfilled_slot = 0;
    request.bump = ctx.bumps.request;

    config.next_request_id = request_id
        .checked_add(1)
        .ok_or(VrfError::CounterOverflow)?;

    emit!(RandomnessRequested {
        request_id,
        requester,
        callback_program: request.callback_program,
        seed,
        request_slot,
    });

    Ok(())
}
