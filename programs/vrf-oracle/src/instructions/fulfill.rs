use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::Instruction;
use solana_program::log::sol_log_compute_units;
use anchor_lang::solana_program::program::invoke_signed;
use sha2::{Digest, Sha256};
use vrf_core::vrf::{verify, VerifyingKey};

use crate::errors::VrfError;
use crate::events::RandomnessFulfilled;
use crate::state::{OracleConfig, RandomnessRequest};

/// Accounts required to fulfill a pending randomness request.
///
/// After verification the oracle:
/// 1. Flips the request to `Fulfilled` and writes it back
/// 2. CPIs into the callback program's `receive_randomness` instruction,
///    signed by the config PDA
///
/// A failing callback fails the whole transaction, so the request stays
/// `Pending` and can be fulfilled again.
#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct FulfillRandomness<'info> {
    /// Must match `config.operator`. Checked in the handler, after the
    /// request lookup.
    pub operator: Signer<'info>,

    /// Oracle configuration PDA (holds the verifying key, signs the CPI).
    #[account(
        seeds = [b"oracle-config"],
        bump = config.bump,
    )]
    pub config: Account<'info, OracleConfig>,

    /// The request PDA to fulfill.
    /// CHECK: Address is pinned by the seeds; owner and contents are checked
    /// in the handler so a missing request reports `RequestNotFound`.
    #[account(
        mut,
        seeds = [b"request", request_id.to_le_bytes().as_ref()],
        bump,
    )]
    pub request: UncheckedAccount<'info>,

    /// The program to CPI into for the callback.
    /// CHECK: Validated by matching request.callback_program.
    pub callback_program: UncheckedAccount<'info>,
    // remaining_accounts: consumer-specific accounts for the callback CPI
}

/// Build the `receive_randomness` discriminator for the consumer callback.
///
/// Consumer programs must implement: `receive_randomness(request_id: u64, randomness: [u8; 32])`
fn callback_discriminator() -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"global:receive_randomness");
    let hash = hasher.finalize();
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&hash[..8]);
    disc
}

/// Instruction data for the callback: discriminator, then the Borsh-encoded
/// `request_id` and `randomness`.
fn callback_data(request_id: u64, randomness: &[u8; 32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + 8 + 32);
    data.extend_from_slice(&callback_discriminator());
    data.extend_from_slice(&request_id.to_le_bytes());
    data.extend_from_slice(randomness);
    data
}

/// Fulfill a pending randomness request with callback delivery.
///
/// Checks run in order: request exists, request is pending, signer is the
/// operator, proof verifies against the stored seed, callback program
/// matches. The status flip is persisted before the CPI.
pub fn handler<'info>(
    ctx: Context<'_, '_, '_, 'info, FulfillRandomness<'info>>,
    request_id: u64,
    randomness: [u8; 32],
    proof: Vec<u8>,
) -> Result<()> {
    let request_info = ctx.accounts.request.to_account_info();
    if request_info.owner != &crate::ID || request_info.data_is_empty() {
        return err!(VrfError::RequestNotFound);
    }
    let mut request = {
        let data = request_info.try_borrow_data()?;
        RandomnessRequest::try_deserialize(&mut &data[..])?
    };

    require!(
        request.status == RandomnessRequest::STATUS_PENDING,
        VrfError::AlreadyFulfilled
    );

    let config = &ctx.accounts.config;
    require_keys_eq!(
        ctx.accounts.operator.key(),
        config.operator,
        VrfError::Unauthorized
    );

    let verifying_key = VerifyingKey::from_bytes(&config.verifying_key)
        .map_err(|_| error!(VrfError::InvalidVerifyingKey))?;
    // Bracket the proof check so its cost shows up in the transaction logs.
    sol_log_compute_units();
    let verified = verify(&verifying_key, &request.seed, request_id, &randomness, &proof);
    sol_log_compute_units();
    require!(verified, VrfError::VerificationFailed);

    require_keys_eq!(
        ctx.accounts.callback_program.key(),
        request.callback_program,
        VrfError::InvalidCallbackProgram
    );

    // 1. Persist the status flip before handing control to the consumer
    request.status = RandomnessRequest::STATUS_FULFILLED;
    request.fulfilled_slot = Clock::get()?.slot;
    {
        let mut data = request_info.try_borrow_mut_data()?;
        let mut writer: &mut [u8] = &mut data[..];
        request.try_serialize(&mut writer)?;
    }

    emit!(RandomnessFulfilled {
        request_id,
        randomness,
    });

    // 2. CPI into the consumer's receive_randomness instruction.
    // The oracle-config PDA signs so the consumer can verify the caller.
    let config_bump = config.bump;
    let signer_seeds: &[&[u8]] = &[b"oracle-config", &[config_bump]];

    // The first account is always the oracle-config PDA as signer.
    // Remaining accounts are passed through from the transaction.
    let mut callback_accounts = Vec::with_capacity(1 + ctx.remaining_accounts.len());
    callback_accounts.push(AccountMeta::new_readonly(config.key(), true));
    for account in ctx.remaining_accounts {
        if account.is_writable {
            callback_accounts.push(AccountMeta::new(*account.key, account.is_signer));
        } else {
            callback_accounts.push(AccountMeta::new_readonly(*account.key, account.is_signer));
        }
    }

    let callback_ix = Instruction {
        program_id: request.callback_program,
        accounts: callback_accounts,
        data: callback_data(request_id, &randomness),
    };

    let mut cpi_account_infos = Vec::with_capacity(2 + ctx.remaining_accounts.len());
    cpi_account_infos.push(config.to_account_info());
    for account in ctx.remaining_accounts {
        cpi_account_infos.push(account.to_account_info());
    }
    cpi_account_infos.push(ctx.accounts.callback_program.to_account_info());

    invoke_signed(&callback_ix, &cpi_account_infos, &[signer_seeds])?;

    msg!("Request {} fulfilled", request_id);
    Ok(())
}
