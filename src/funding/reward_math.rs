//! Fixed-point reward math.
//!
//! Everything here is pure: identical inputs always give identical outputs,
//! and every multiplication happens before the single floor division so no
//! intermediate truncation leaks into the result.

use std::fmt;

use crate::error::{FundingError, Result};

/// Fractional digits carried by an [`AnnualRate`].
pub const PRECISION_DECIMALS: u32 = 6;
pub const PRECISION: u128 = 10u128.pow(PRECISION_DECIMALS);
pub const MINUTES_PER_YEAR: u128 = 525_600;

const DENOMINATOR: u128 = 100 * MINUTES_PER_YEAR * PRECISION;

/// Annual rate in percent, stored with [`PRECISION_DECIMALS`] fractional digits
/// so decimal APYs such as `7.5` survive integer math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AnnualRate(u128);

impl AnnualRate {
    pub fn from_percent(percent: u128) -> Result<Self> {
        percent
            .checked_mul(PRECISION)
            .map(Self)
            .ok_or(FundingError::ArithmeticOverflow)
    }

    pub const fn from_micro_percent(micro_percent: u128) -> Self {
        Self(micro_percent)
    }

    /// Accepts the JSON number form used by pool configs. Values beyond
    /// six fractional digits are rounded to the nearest micro-percent.
    pub fn from_percent_f64(percent: f64) -> Result<Self> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(FundingError::invalid_config(
                "targetAPY",
                format!("{percent} is not a non-negative number"),
            ));
        }
        let scaled = (percent * PRECISION as f64).round();
        if scaled > u64::MAX as f64 {
            return Err(FundingError::invalid_config(
                "targetAPY",
                format!("{percent} is too large"),
            ));
        }
        Ok(Self(scaled as u128))
    }

    pub const fn micro_percent(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AnnualRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PRECISION;
        let frac = self.0 % PRECISION;
        if frac == 0 {
            return write!(f, "{whole}%");
        }
        let digits = format!("{frac:06}");
        write!(f, "{whole}.{}%", digits.trim_end_matches('0'))
    }
}

/// Reward owed for one funding interval:
/// `floor(total * rate * interval * 10^P / (100 * MINUTES_PER_YEAR * 10^P))`.
///
/// Returns 0 when any input is zero.
pub fn interval_reward(
    total_staked: u128,
    annual_rate_percent: u128,
    interval_minutes: u64,
) -> Result<u128> {
    if annual_rate_percent == 0 {
        return Ok(0);
    }
    let rate = AnnualRate::from_percent(annual_rate_percent)?;
    interval_reward_scaled(total_staked, rate.micro_percent(), interval_minutes)
}

/// Same as [`interval_reward`] with the rate already scaled by `10^P`.
pub fn interval_reward_scaled(
    total_staked: u128,
    rate_micro_percent: u128,
    interval_minutes: u64,
) -> Result<u128> {
    if total_staked == 0 || rate_micro_percent == 0 || interval_minutes == 0 {
        return Ok(0);
    }

    let numerator = total_staked
        .checked_mul(rate_micro_percent)
        .and_then(|v| v.checked_mul(u128::from(interval_minutes)))
        .ok_or(FundingError::ArithmeticOverflow)?;

    Ok(numerator / DENOMINATOR)
}

/// Convenience wrapper over [`interval_reward_scaled`] for an [`AnnualRate`].
pub fn reward_for_rate(total_staked: u128, rate: AnnualRate, interval_minutes: u64) -> Result<u128> {
    interval_reward_scaled(total_staked, rate.micro_percent(), interval_minutes)
}
