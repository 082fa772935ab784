//! Layouts of the on-chain accounts the worker reads.
//!
//! Staking and reward pools are Anchor accounts: an 8-byte discriminator
//! followed by the packed fields. Fields are byte arrays so the layouts have
//! alignment 1 and can be viewed in place with `bytemuck`.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use solana_sdk::{program_pack::Pack, pubkey::Pubkey};
use spl_token_2022::extension::StateWithExtensions;

use crate::error::{FundingError, Result};
use crate::funding::consts::TOKEN_2022_PROGRAM_ID;
use crate::funding::instruction::anchor_discriminator;

const DISCRIMINATOR_LEN: usize = 8;

/// Offset of `stake_pool` inside a reward pool account; used as the
/// memcmp filter when listing the reward pools of a staking pool.
pub const REWARD_POOL_STAKE_POOL_OFFSET: usize = DISCRIMINATOR_LEN + offset_of!(RewardPool, stake_pool);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct StakePool {
    pub bump: u8,
    pub nonce: u8,
    pub mint: [u8; 32],
    pub creator: [u8; 32],
    pub stake_mint: [u8; 32],
    pub vault: [u8; 32],
    pub min_weight: [u8; 8],
    pub max_weight: [u8; 8],
    pub min_duration: [u8; 8],
    pub max_duration: [u8; 8],
    pub permissionless: u8,
    pub reserved: [u8; 9],
    /// Total staked amount, in base units of `mint`
    pub total_stake: [u8; 8],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct RewardPool {
    pub bump: u8,
    pub nonce: u8,
    pub stake_pool: [u8; 32],
    pub mint: [u8; 32],
    pub creator: [u8; 32],
    pub authority: [u8; 32],
    pub vault: [u8; 32],
    pub funded_amount: [u8; 8],
    pub claimed_amount: [u8; 8],
    pub rewards_state: [u8; 16],
    pub last_amount: [u8; 8],
    /// Unix seconds
    pub created_ts: [u8; 8],
}

/// Anchor account types the worker can decode.
pub trait AnchorAccount: Pod {
    const NAME: &'static str;

    /// Checks the discriminator and views the fields. Trailing bytes are
    /// ignored.
    fn try_from_account<'a>(address: &Pubkey, data: &'a [u8]) -> Result<&'a Self> {
        let len = DISCRIMINATOR_LEN + size_of::<Self>();
        if data.len() < len {
            return Err(FundingError::invalid_account(
                *address,
                format!("{} data is {} bytes, expected at least {len}", Self::NAME, data.len()),
            ));
        }
        if data[..DISCRIMINATOR_LEN] != anchor_discriminator("account", Self::NAME) {
            return Err(FundingError::invalid_account(
                *address,
                format!("not a {} account", Self::NAME),
            ));
        }
        bytemuck::try_from_bytes(&data[DISCRIMINATOR_LEN..len])
            .map_err(|e| FundingError::invalid_account(*address, e.to_string()))
    }
}

impl AnchorAccount for StakePool {
    const NAME: &'static str = "StakePool";
}

impl AnchorAccount for RewardPool {
    const NAME: &'static str = "RewardPool";
}

impl StakePool {
    pub fn mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.mint)
    }

    pub fn total_stake(&self) -> u64 {
        u64::from_le_bytes(self.total_stake)
    }
}

impl RewardPool {
    pub fn stake_pool(&self) -> Pubkey {
        Pubkey::new_from_array(self.stake_pool)
    }

    pub fn mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.mint)
    }

    pub fn vault(&self) -> Pubkey {
        Pubkey::new_from_array(self.vault)
    }

    pub fn funded_amount(&self) -> u64 {
        u64::from_le_bytes(self.funded_amount)
    }

    pub fn claimed_amount(&self) -> u64 {
        u64::from_le_bytes(self.claimed_amount)
    }

    pub fn last_amount(&self) -> u64 {
        u64::from_le_bytes(self.last_amount)
    }

    pub fn created_ts(&self) -> u64 {
        u64::from_le_bytes(self.created_ts)
    }
}

/// Decimals of an SPL Token or Token-2022 mint owned by `owner`.
pub fn mint_decimals(address: &Pubkey, owner: &Pubkey, data: &[u8]) -> Result<u8> {
    if *owner == TOKEN_2022_PROGRAM_ID {
        StateWithExtensions::<spl_token_2022::state::Mint>::unpack(data)
            .map(|mint| mint.base.decimals)
            .map_err(|e| FundingError::invalid_account(*address, format!("mint: {e}")))
    } else {
        spl_token::state::Mint::unpack(data)
            .map(|mint| mint.decimals)
            .map_err(|e| FundingError::invalid_account(*address, format!("mint: {e}")))
    }
}
