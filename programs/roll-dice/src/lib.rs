use anchor_lang::prelude::*;
use vrf_core::consumer::die_face;

declare_id!("7Q5b9aimnHmR8ooooRqxgfYfnLmPi6qrVR9GrJ1b6fDp");

/// Consumer configuration, stored as a singleton PDA.
///
/// Seeds: `["dice-config"]`
#[account]
#[derive(InitSpace)]
pub struct DiceConfig {
    /// Account that initialized the consumer.
    pub admin: Pubkey,
    /// The oracle program this consumer trusts.
    pub oracle_program: Pubkey,
    /// The oracle's config PDA; the only accepted callback signer.
    pub oracle_config: Pubkey,
    /// PDA bump seed cached for efficient re-derivation.
    pub bump: u8,
}

/// A dice roll that is backed by VRF randomness.
///
/// Seeds: `["dice-roll", request_id.to_le_bytes()]`
///
/// Exists only for requests this program issued, which is what lets the
/// callback reject ids it never asked for.
#[account]
#[derive(InitSpace)]
pub struct DiceRoll {
    /// The player who requested the roll.
    pub player: Pubkey,
    /// The oracle request ID associated with this roll.
    pub vrf_request_id: u64,
    /// See `STATUS_*` constants.
    pub status: u8,
    /// Randomness delivered by the oracle, zero while pending.
    pub randomness: [u8; 32],
    /// Dice outcome: 0 = pending, 1-6 = settled face value.
    pub result: u8,
    /// PDA bump seed cached for efficient re-derivation.
    pub bump: u8,
}

impl DiceRoll {
    pub const STATUS_PENDING: u8 = 0;
    pub const STATUS_SETTLED: u8 = 1;
}

/// Error codes for the roll-dice program.
#[error_code]
pub enum RollDiceError {
    /// The callback was not signed by the configured oracle config PDA.
    #[msg("Callback caller is not the configured oracle")]
    Unauthorized,
    /// The oracle program passed in is not the one this consumer trusts.
    #[msg("Oracle program does not match dice config")]
    OracleMismatch,
    /// Randomness for this roll was already received.
    #[msg("Dice roll has already been settled")]
    AlreadySettled,
}

/// Emitted when a player requests a new dice roll.
#[event]
pub struct DiceRollRequested {
    pub player: Pubkey,
    pub vrf_request_id: u64,
}

/// Emitted when a dice roll is settled with a final result.
#[event]
pub struct DiceRollSettled {
    pub player: Pubkey,
    pub vrf_request_id: u64,
    pub result: u8,
}

/// On-chain dice game powered by the VRF oracle.
///
/// Demonstrates how a consumer program integrates with the oracle:
///
/// 1. **Request**: `request_entropy` CPIs into `vrf_oracle::request_randomness`,
///    signing as the consumer-authority PDA and naming this program as the
///    callback.
/// 2. **Wait**: the off-chain operator fulfills the request.
/// 3. **Receive**: the oracle CPIs `receive_randomness`, signed by its
///    config PDA, and the roll settles to a face in 1..=6.
#[program]
pub mod roll_dice {
    use super::*;

    /// Bind this consumer to an oracle program.
    pub fn initialize(ctx: Context<Initialize>, oracle_program: Pubkey) -> Result<()> {
        let (oracle_config, _) = Pubkey::find_program_address(&[b"oracle-config"], &oracle_program);

        let config = &mut ctx.accounts.dice_config;
        config.admin = ctx.accounts.admin.key();
        config.oracle_program = oracle_program;
        config.oracle_config = oracle_config;
        config.bump = ctx.bumps.dice_config;
        Ok(())
    }

    /// Request a dice roll by CPI-ing into the oracle program.
    ///
    /// Creates a `DiceRoll` PDA keyed by the request id the oracle is about
    /// to assign.
    pub fn request_entropy(ctx: Context<RequestEntropy>, seed: [u8; 32]) -> Result<()> {
        let request_id = ctx.accounts.oracle_config.next_request_id;

        let authority_bump = ctx.bumps.consumer_authority;
        let signer_seeds: &[&[u8]] = &[b"consumer-authority", &[authority_bump]];

        let cpi_accounts = vrf_oracle::cpi::accounts::RequestRandomness {
            requester: ctx.accounts.consumer_authority.to_account_info(),
            payer: ctx.accounts.player.to_account_info(),
            config: ctx.accounts.oracle_config.to_account_info(),
            request: ctx.accounts.oracle_request.to_account_info(),
            callback_program: ctx.accounts.this_program.to_account_info(),
            system_program: ctx.accounts.system_program.to_account_info(),
        };
        let signer = &[signer_seeds];
        let cpi_ctx = CpiContext::new_with_signer(
            ctx.accounts.oracle_program.to_account_info(),
            cpi_accounts,
            signer,
        );
        vrf_oracle::cpi::request_randomness(cpi_ctx, seed)?;

        let dice = &mut ctx.accounts.dice_roll;
        dice.player = ctx.accounts.player.key();
        dice.vrf_request_id = request_id;
        dice.status = DiceRoll::STATUS_PENDING;
        dice.randomness = [0u8; 32];
        dice.result = 0;
        dice.bump = ctx.bumps.dice_roll;

        emit!(DiceRollRequested {
            player: dice.player,
            vrf_request_id: request_id,
        });

        msg!("Dice roll requested, vrf_request_id={}", request_id);
        Ok(())
    }

    /// Oracle callback. Only the oracle config PDA may sign it, only for a
    /// roll this program created, and only once.
    pub fn receive_randomness(
        ctx: Context<ReceiveRandomness>,
        request_id: u64,
        randomness: [u8; 32],
    ) -> Result<()> {
        let dice_value = die_face(&randomness);

        let dice = &mut ctx.accounts.dice_roll;
        dice.randomness = randomness;
        dice.result = dice_value;
        dice.status = DiceRoll::STATUS_SETTLED;

        emit!(DiceRollSettled {
            player: dice.player,
            vrf_request_id: request_id,
            result: dice_value,
        });

        msg!("Dice rolled: {} (request_id={})", dice_value, request_id);
        Ok(())
    }
}

/// Accounts for [`roll_dice::initialize`].
#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    /// Consumer config PDA. Seeds: `["dice-config"]`.
    #[account(
        init,
        payer = admin,
        space = 8 + DiceConfig::INIT_SPACE,
        seeds = [b"dice-config"],
        bump,
    )]
    pub dice_config: Account<'info, DiceConfig>,

    pub system_program: Program<'info, System>,
}

/// Accounts for [`roll_dice::request_entropy`].
#[derive(Accounts)]
pub struct RequestEntropy<'info> {
    /// The player requesting the roll; pays rent for both new accounts.
    #[account(mut)]
    pub player: Signer<'info>,

    #[account(
        seeds = [b"dice-config"],
        bump = dice_config.bump,
    )]
    pub dice_config: Account<'info, DiceConfig>,

    /// Requester identity recorded by the oracle. Seeds: `["consumer-authority"]`.
    /// CHECK: PDA with no data; only signs the oracle CPI.
    #[account(
        seeds = [b"consumer-authority"],
        bump,
    )]
    pub consumer_authority: UncheckedAccount<'info>,

    /// Oracle config (read for `next_request_id`, mutated by the oracle CPI).
    #[account(
        mut,
        address = dice_config.oracle_config @ RollDiceError::OracleMismatch,
    )]
    pub oracle_config: Account<'info, vrf_oracle::state::OracleConfig>,

    /// Oracle request account (created by the oracle CPI).
    /// CHECK: Created and validated by the oracle program during CPI.
    #[account(mut)]
    pub oracle_request: UncheckedAccount<'info>,

    /// Dice roll PDA. Seeds: `["dice-roll", next_request_id.to_le_bytes()]`.
    #[account(
        init,
        payer = player,
        space = 8 + DiceRoll::INIT_SPACE,
        seeds = [b"dice-roll".as_ref(), oracle_config.next_request_id.to_le_bytes().as_ref()],
        bump,
    )]
    pub dice_roll: Account<'info, DiceRoll>,

    /// This program, recorded as the request's callback target.
    /// CHECK: Pinned to this program's id.
    #[account(address = crate::ID)]
    pub this_program: UncheckedAccount<'info>,

    #[account(
        constraint = oracle_program.key() == dice_config.oracle_program @ RollDiceError::OracleMismatch,
    )]
    pub oracle_program: Program<'info, vrf_oracle::program::VrfOracle>,
    pub system_program: Program<'info, System>,
}

/// Accounts for [`roll_dice::receive_randomness`].
///
/// The oracle passes its config PDA first, then the transaction's remaining
/// accounts in order: `dice_config`, `dice_roll`.
#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct ReceiveRandomness<'info> {
    /// Oracle config PDA, signing through `invoke_signed`.
    #[account(
        address = dice_config.oracle_config @ RollDiceError::Unauthorized,
    )]
    pub oracle_config: Signer<'info>,

    #[account(
        seeds = [b"dice-config"],
        bump = dice_config.bump,
    )]
    pub dice_config: Account<'info, DiceConfig>,

    /// Roll created by `request_entropy` for this id. Must still be pending.
    #[account(
        mut,
        seeds = [b"dice-roll", request_id.to_le_bytes().as_ref()],
        bump = dice_roll.bump,
        constraint = dice_roll.vrf_request_id == request_id,
        constraint = dice_roll.status == DiceRoll::STATUS_PENDING @ RollDiceError::AlreadySettled,
    )]
    pub dice_roll: Account<'info, DiceRoll>,
}
