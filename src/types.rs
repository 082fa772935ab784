//! Pool configuration records as deployed in `POOL_CONFIGS`.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use crate::error::Result;
use crate::funding::{AnnualRate, DistributionStrategy, TokenProgram};
use crate::keypair::parse_keypair;

/// One staking pool the worker keeps funded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub stake_pool_address: Pubkey,
    /// Wallet paying for and signing the top-ups
    #[serde(rename = "privateKey")]
    pub funder: FunderSecret,
    /// Annual yield target in percent, e.g. `8` or `7.5`
    #[serde(rename = "targetAPY")]
    pub target_apy: f64,
    pub funding_period_minutes: u64,
    #[serde(default, deserialize_with = "deserialize_optional_pubkey")]
    pub fee_value: Option<Pubkey>,
    #[serde(default)]
    pub is_token2022: bool,
    #[serde(default)]
    pub distribution_strategy: StrategyKind,
    /// Reward pool funded under `single_pool`
    #[serde(default)]
    pub target_pool_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Proportional,
    SinglePool,
}

impl PoolConfig {
    pub fn strategy(&self) -> DistributionStrategy {
        match self.distribution_strategy {
            StrategyKind::Proportional => DistributionStrategy::Proportional,
            StrategyKind::SinglePool => DistributionStrategy::SingleTarget {
                index: self.target_pool_index,
            },
        }
    }

    pub fn annual_rate(&self) -> Result<AnnualRate> {
        AnnualRate::from_percent_f64(self.target_apy)
    }

    pub fn token_program(&self) -> TokenProgram {
        TokenProgram::from_flag(self.is_token2022)
    }

    pub fn keypair(&self) -> &Keypair {
        &self.funder.0
    }
}

/// Decoded funder keypair. `Debug` only shows the public key.
pub struct FunderSecret(Keypair);

impl FunderSecret {
    pub fn new(keypair: Keypair) -> Self {
        Self(keypair)
    }
}

impl Clone for FunderSecret {
    fn clone(&self) -> Self {
        Self(self.0.insecure_clone())
    }
}

impl fmt::Debug for FunderSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunderSecret({})", self.0.pubkey())
    }
}

impl<'de> Deserialize<'de> for FunderSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_keypair(&raw).map(Self).map_err(de::Error::custom)
    }
}

fn deserialize_pubkey<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Pubkey, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Pubkey::from_str(raw.trim()).map_err(|e| de::Error::custom(format!("invalid address {raw}: {e}")))
}

/// `null`, absent and empty strings all mean "no fee account".
fn deserialize_optional_pubkey<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Pubkey>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => Pubkey::from_str(raw.trim())
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid address {raw}: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_json() -> String {
        let bytes: Vec<String> = (1..=64).map(|b: u8| b.to_string()).collect();
        format!("[{}]", bytes.join(","))
    }

    fn pool_json(extra: &str) -> String {
        format!(
            r#"{{
                "id": "pool-1",
                "name": "Main pool",
                "stakePoolAddress": "{}",
                "privateKey": "{}",
                "targetAPY": 8,
                "fundingPeriodMinutes": 60,
                "isToken2022": false{}
            }}"#,
            Pubkey::new_unique(),
            secret_json().replace('"', "\\\""),
            extra
        )
    }

    #[test]
    fn test_parse_deployed_shape() {
        let config: PoolConfig = serde_json::from_str(&pool_json("")).unwrap();
        assert_eq!(config.id, "pool-1");
        assert_eq!(config.funding_period_minutes, 60);
        assert_eq!(config.fee_value, None);
        assert_eq!(config.strategy(), DistributionStrategy::Proportional);
        assert_eq!(config.token_program(), TokenProgram::Standard);
        assert_eq!(config.annual_rate().unwrap(), AnnualRate::from_percent(8).unwrap());
    }

    #[test]
    fn test_parse_single_pool_strategy() {
        let config: PoolConfig = serde_json::from_str(&pool_json(
            r#", "distributionStrategy": "single_pool", "targetPoolIndex": 1, "feeValue": null"#,
        ))
        .unwrap();
        assert_eq!(
            config.strategy(),
            DistributionStrategy::SingleTarget { index: Some(1) }
        );
    }

    #[test]
    fn test_empty_fee_value_is_none() {
        let config: PoolConfig = serde_json::from_str(&pool_json(r#", "feeValue": """#)).unwrap();
        assert_eq!(config.fee_value, None);

        let fee = Pubkey::new_unique();
        let config: PoolConfig =
            serde_json::from_str(&pool_json(&format!(r#", "feeValue": "{fee}""#))).unwrap();
        assert_eq!(config.fee_value, Some(fee));
    }

    #[test]
    fn test_rejects_bad_private_key() {
        let json = pool_json("").replace(&secret_json().replace('"', "\\\""), "not-a-key");
        assert!(serde_json::from_str::<PoolConfig>(&json).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let config: PoolConfig = serde_json::from_str(&pool_json("")).unwrap();
        let printed = format!("{config:?}");
        assert!(printed.contains(&config.keypair().pubkey().to_string()));
        assert!(!printed.contains("1,2,3,4"));
    }
}
