//! Wei-denominated amounts.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Number of fractional digits in one whole coin (1 coin = 10^18 wei).
pub const ETHER_DECIMALS: u32 = 18;

const WEI_PER_ETHER: u128 = 10u128.pow(ETHER_DECIMALS);

/// Non-negative amount of value in the smallest indivisible unit (wei).
///
/// Arithmetic is checked; balances never wrap.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u128);

impl ValueObject for Amount {}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    pub const fn wei(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Parse a decimal coin string (`"1.25"`) into wei.
    ///
    /// Accepts at most [`ETHER_DECIMALS`] fractional digits; signs, exponents
    /// and separators are rejected.
    pub fn parse_ether(s: &str) -> DomainResult<Self> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(DomainError::invalid_amount(format!("'{s}' is not a number")));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_amount(format!("'{s}' is not a decimal amount")));
        }
        if frac.len() > ETHER_DECIMALS as usize {
            return Err(DomainError::invalid_amount(format!(
                "'{s}' has more than {ETHER_DECIMALS} fractional digits"
            )));
        }

        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|w| w.checked_mul(WEI_PER_ETHER))
                .ok_or(DomainError::Overflow)?
        };

        let frac_wei = if frac.is_empty() {
            0
        } else {
            let scale = 10u128.pow(ETHER_DECIMALS - frac.len() as u32);
            frac.parse::<u128>()
                .map_err(|e| DomainError::invalid_amount(e.to_string()))?
                * scale
        };

        whole_wei
            .checked_add(frac_wei)
            .map(Amount)
            .ok_or(DomainError::Overflow)
    }

    /// Format as a decimal coin string, trimming trailing zeros (`"1.7"`, `"2.0"`).
    pub fn to_ether_string(self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        if frac == 0 {
            return format!("{whole}.0");
        }
        let digits = format!("{frac:0width$}", width = ETHER_DECIMALS as usize);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_ether_string())
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_ether(s)
    }
}

impl From<u128> for Amount {
    fn from(wei: u128) -> Self {
        Self(wei)
    }
}

impl core::iter::Sum for Amount {
    /// Saturates at `u128::MAX`; callers that need exactness use `checked_add`.
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_whole_and_fractional_coins() {
        assert_eq!(Amount::parse_ether("1").unwrap().wei(), WEI_PER_ETHER);
        assert_eq!(Amount::parse_ether("0.5").unwrap().wei(), WEI_PER_ETHER / 2);
        assert_eq!(Amount::parse_ether(".25").unwrap().wei(), WEI_PER_ETHER / 4);
        assert_eq!(Amount::parse_ether("0.000000000000000001").unwrap().wei(), 1);
    }

    #[test]
    fn sums_like_decimal_arithmetic() {
        let a = Amount::parse_ether("0.5").unwrap();
        let b = Amount::parse_ether("1.2").unwrap();
        assert_eq!(a.checked_add(b).unwrap(), Amount::parse_ether("1.7").unwrap());
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", ".", "-1", "1e18", "1,5", "abc", "0.0000000000000000001"] {
            assert!(
                matches!(Amount::parse_ether(bad), Err(DomainError::InvalidAmount(_))),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn rejects_values_beyond_u128() {
        let huge = format!("{}", u128::MAX);
        assert_eq!(Amount::parse_ether(&huge), Err(DomainError::Overflow));
    }

    #[test]
    fn formats_like_ethers_format_ether() {
        assert_eq!(Amount::parse_ether("2").unwrap().to_string(), "2.0");
        assert_eq!(Amount::parse_ether("1.250").unwrap().to_string(), "1.25");
        assert_eq!(Amount::from_wei(1).to_string(), "0.000000000000000001");
        assert_eq!(Amount::ZERO.to_string(), "0.0");
    }

    #[test]
    fn checked_sub_refuses_to_go_negative() {
        let small = Amount::parse_ether("0.3").unwrap();
        let big = Amount::parse_ether("0.5").unwrap();
        assert_eq!(small.checked_sub(big), None);
        assert_eq!(big.checked_sub(small), Some(Amount::parse_ether("0.2").unwrap()));
    }

    proptest! {
        /// Property: formatting then parsing yields the same wei value.
        #[test]
        fn format_parse_is_lossless(wei in any::<u128>()) {
            let amount = Amount::from_wei(wei);
            prop_assert_eq!(Amount::parse_ether(&amount.to_ether_string()).unwrap(), amount);
        }
    }
}
