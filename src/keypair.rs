//! Funder secret decoding.

use solana_sdk::signature::{keypair_from_seed, Keypair};

use crate::error::{FundingError, Result};

/// Decodes a funder secret.
///
/// Accepts a JSON byte array (the first 32 bytes are used as the ed25519
/// seed) or a base58 encoded 64-byte secret key. Any failure is reported as
/// [`FundingError::InvalidKeypair`] without echoing the input.
pub fn parse_keypair(secret: &str) -> Result<Keypair> {
    let secret = secret.trim();

    if secret.starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(secret).map_err(|_| FundingError::InvalidKeypair)?;
        let seed = bytes.get(..32).ok_or(FundingError::InvalidKeypair)?;
        return keypair_from_seed(seed).map_err(|_| FundingError::InvalidKeypair);
    }

    let bytes = bs58::decode(secret)
        .into_vec()
        .map_err(|_| FundingError::InvalidKeypair)?;
    Keypair::try_from(bytes.as_slice()).map_err(|_| FundingError::InvalidKeypair)
}
