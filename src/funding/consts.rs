use solana_sdk::{pubkey, pubkey::Pubkey};

/// Stake pool program owning the staking pool accounts.
pub const STAKE_POOL_PROGRAM_ID: Pubkey = pubkey!("STAKEvGqQTtzJZH6BWDcbpzXXn2BBerPAgQ3EGLN2GH");

/// Dynamic reward pool program exposing `fund_pool`.
pub const REWARD_POOL_PROGRAM_ID: Pubkey = pubkey!("RWRDyfZa6Rk9UYi85yjYYfGmoUqffLqjo6vZdFawEez");

/// Treasury wallet whose associated token accounts receive the funding fee.
pub const PROTOCOL_TREASURY: Pubkey = pubkey!("5SEpbdjFK5FxwTvfsGMXVQTD2v4M2c5tyRTxhdsPkgDw");

pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

/// A single fund-pool transfer; account creation is covered by the headroom.
pub const DEFAULT_COMPUTE_UNITS_PER_TRANSFER: u32 = 60_000;

/// Priority fee in micro-lamports per compute unit.
pub const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 1_000_000;

/// In-flight submissions allowed across the whole process.
pub const DEFAULT_SEND_CONCURRENCY: usize = 2;

pub const DEFAULT_SEND_RATE_PER_SECOND: u32 = 2;

/// Submission attempts before an expiring transaction is given up on.
pub const DEFAULT_SUBMIT_MAX_ATTEMPTS: u32 = 30;
