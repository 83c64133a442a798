use anchor_lang::prelude::*;

use crate::errors::VrfError;
use crate::events::ConfigUpdated;
use crate::state::OracleConfig;

/// Accounts required to update the oracle configuration.
#[derive(Accounts)]
pub struct UpdateConfig<'info> {
    /// Current admin; must sign.
    pub admin: Signer<'info>,

    /// Oracle configuration PDA to update.
    #[account(
        mut,
        seeds = [b"oracle-config"],
        bump = config.bump,
        constraint = config.admin == admin.key() @ VrfError::Unauthorized,
    )]
    pub config: Account<'info, OracleConfig>,
}

/// Rotate the operator and/or the admin. The verifying key cannot change.
pub fn handler(
    ctx: Context<UpdateConfig>,
    new_operator: Option<Pubkey>,
    new_admin: Option<Pubkey>,
) -> Result<()> {
    let config = &mut ctx.accounts.config;

    if let Some(operator) = new_operator {
        require!(
            operator != Pubkey::default(),
            VrfError::ZeroAddressNotAllowed
        );
        config.operator = operator;
    }
    if let Some(admin) = new_admin {
        require!(
            admin != Pubkey::default(),
            VrfError::ZeroAddressNotAllowed
        );
        config.admin = admin;
    }

    emit!(ConfigUpdated {
        operator: config.operator,
        admin: config.admin,
    });
    Ok(())
}
