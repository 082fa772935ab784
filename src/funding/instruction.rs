//! Instruction builders for the reward pool program.

use solana_sdk::{
    hash::hashv,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account_idempotent,
};

use crate::error::{FundingError, Result};
use crate::funding::types::{BatchTransferItem, ProgramIds, TokenProgram};

/// Anchor discriminator: first 8 bytes of `sha256("{namespace}:{name}")`.
pub fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let hash = hashv(&[namespace.as_bytes(), b":", name.as_bytes()]);
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.to_bytes()[..8]);
    out
}

pub fn token_account(owner: &Pubkey, mint: &Pubkey, token_program: TokenProgram) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, &token_program.id())
}

/// Creates `owner`'s associated token account for `mint` unless it already
/// exists; succeeds either way on chain.
pub fn create_token_account(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: TokenProgram,
) -> Instruction {
    create_associated_token_account_idempotent(payer, owner, mint, &token_program.id())
}

/// `fund_pool(amount)` moving `item.amount` from the funder's token account
/// into the reward pool vault.
pub fn fund_pool(programs: &ProgramIds, funder: &Pubkey, item: &BatchTransferItem) -> Result<Instruction> {
    let amount = u64::try_from(item.amount).map_err(|_| FundingError::AmountTooLarge(item.amount))?;

    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(&anchor_discriminator("global", "fund_pool"));
    data.extend_from_slice(&amount.to_le_bytes());

    Ok(Instruction {
        program_id: programs.reward_pool,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(token_account(funder, &item.mint, item.token_program), false),
            AccountMeta::new(item.vault, false),
            AccountMeta::new(item.recipient, false),
            AccountMeta::new_readonly(item.mint, false),
            // Anchor optional account: the program id stands in for "none"
            AccountMeta::new_readonly(item.fee_value.unwrap_or(programs.reward_pool), false),
            AccountMeta::new(
                token_account(&programs.treasury, &item.mint, item.token_program),
                false,
            ),
            AccountMeta::new_readonly(item.token_program.id(), false),
        ],
        data,
    })
}
