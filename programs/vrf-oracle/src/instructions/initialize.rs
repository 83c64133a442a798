use anchor_lang::prelude::*;
use vrf_core::vrf::VerifyingKey;

use crate::errors::VrfError;
use crate::state::OracleConfig;

/// Accounts required to initialize the oracle configuration singleton.
#[derive(Accounts)]
pub struct Initialize<'info> {
    /// The initial admin who pays for account creation.
    #[account(mut)]
    pub admin: Signer<'info>,

    /// Account that will submit fulfillments.
    /// CHECK: Stored as configuration; validated to be non-zero.
    pub operator: UncheckedAccount<'info>,

    /// Singleton configuration PDA. Seeds: `["oracle-config"]`.
    #[account(
        init,
        payer = admin,
        space = 8 + OracleConfig::INIT_SPACE,
        seeds = [b"oracle-config"],
        bump,
    )]
    pub config: Account<'info, OracleConfig>,

    pub system_program: Program<'info, System>,
}

/// Initialize the oracle configuration with its immutable verifying key.
pub fn handler(ctx: Context<Initialize>, verifying_key: [u8; 32]) -> Result<()> {
    require!(
        ctx.accounts.operator.key() != Pubkey::default(),
        VrfError::ZeroAddressNotAllowed
    );
    VerifyingKey::from_bytes(&verifying_key).map_err(|_| error!(VrfError::InvalidVerifyingKey))?;

    let config = &mut ctx.accounts.config;
    config.admin = ctx.accounts.admin.key();
    config.operator = ctx.accounts.operator.key();
    config.verifying_key = verifying_key;
    config.next_request_id = 1;
    config.bump = ctx.bumps.config;

    msg!("Oracle initialized, operator={}", config.operator);
    Ok(())
}
