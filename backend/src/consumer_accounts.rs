//! Derives consumer-specific callback accounts for known consumer programs.
//!
//! When the oracle fulfills a request, it CPIs into the callback program's
//! `receive_randomness` instruction. The operator must provide the correct
//! remaining_accounts for each known consumer.

use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

use crate::listener::RandomnessRequestedEvent;

/// Derive the callback accounts for the roll-dice consumer program.
///
/// The roll-dice `receive_randomness` instruction expects:
/// 1. oracle_config (signer), provided automatically by the oracle
/// 2. dice_config, PDA ["dice-config"] from the dice program
/// 3. dice_roll, PDA ["dice-roll", request_id_le_bytes] from the dice program
pub fn derive_dice_callback_accounts(
    dice_program_id: &Pubkey,
    event: &RandomnessRequestedEvent,
) -> Vec<AccountMeta> {
    let (dice_config_pda, _) = Pubkey::find_program_address(&[b"dice-config"], dice_program_id);

    let (dice_roll_pda, _) = Pubkey::find_program_address(
        &[b"dice-roll", &event.request_id.to_le_bytes()],
        dice_program_id,
    );

    vec![
        AccountMeta::new_readonly(dice_config_pda, false),
        AccountMeta::new(dice_roll_pda, false),
    ]
}

/// Derive callback accounts for the request's callback program.
///
/// Returns the remaining_accounts that should be appended to the
/// `fulfill_randomness` transaction for the consumer's callback CPI.
pub fn derive_callback_accounts(
    dice_program_id: Option<&Pubkey>,
    event: &RandomnessRequestedEvent,
) -> Vec<AccountMeta> {
    match dice_program_id {
        Some(dice_id) if *dice_id == event.callback_program => {
            derive_dice_callback_accounts(dice_id, event)
        }
        // Unknown consumer: it only receives the oracle config PDA.
        _ => vec![],
    }
}
