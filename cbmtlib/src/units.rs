use crate::common::Amount;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// The number of decimal places in a token amount
const TOKEN_TO_RAW_POWER_OF_10_CONVERSION: u64 = 8;
/// The conversion from whole tokens to raw units
const TOKEN_TO_RAW_CONVERSION: u64 = 100_000_000;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Failed to parse amount: {0}")]
    FailedToParseAmount(String),
    #[error("Amount exceeds the representable range")]
    ExcessiveValue,
    #[error("Amount has more than 8 decimal places")]
    LossOfPrecision,
}

/// A CBMT token amount in raw units. 10^8 raw units = 1 token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenUnits(Amount);

impl TokenUnits {
    /// Type safe representation of zero TokenUnits.
    pub const fn zero() -> Self {
        Self(Amount::ZERO)
    }

    /// Returns whether it's a representation of zero TokenUnits.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// New value from a raw amount.
    pub fn from_raw(value: Amount) -> Self {
        Self(value)
    }

    /// New value from a number of raw units.
    pub fn from_u64(value: u64) -> Self {
        Self(Amount::from(value))
    }

    /// New value from a number of whole tokens.
    pub fn from_tokens(value: u64) -> Self {
        Self(Amount::from(value) * Amount::from(TOKEN_TO_RAW_CONVERSION))
    }

    /// The amount expressed in raw units.
    pub fn as_raw(self) -> Amount {
        self.0
    }

    /// Computes `self + rhs`, returning `None` if overflow occurred.
    pub fn checked_add(self, rhs: TokenUnits) -> Option<TokenUnits> {
        self.0.checked_add(rhs.0).map(Self::from_raw)
    }

    /// Computes `self - rhs`, returning `None` if overflow occurred.
    pub fn checked_sub(self, rhs: TokenUnits) -> Option<TokenUnits> {
        self.0.checked_sub(rhs.0).map(Self::from_raw)
    }
}

impl From<u64> for TokenUnits {
    fn from(value: u64) -> Self {
        Self(Amount::from(value))
    }
}

impl From<Amount> for TokenUnits {
    fn from(value: Amount) -> Self {
        Self(value)
    }
}

impl FromStr for TokenUnits {
    type Err = Error;

    fn from_str(value_str: &str) -> Result<Self, Error> {
        let mut itr = value_str.splitn(2, '.');
        let converted_units = {
            let units = itr
                .next()
                .and_then(|s| s.parse::<Amount>().ok())
                .ok_or_else(|| {
                    Error::FailedToParseAmount("Can't parse token units".to_string())
                })?;

            units
                .checked_mul(Amount::from(TOKEN_TO_RAW_CONVERSION))
                .ok_or(Error::ExcessiveValue)?
        };

        let remainder = {
            let remainder_str = itr.next().unwrap_or_default().trim_end_matches('0');

            if remainder_str.is_empty() {
                Amount::ZERO
            } else {
                let parsed_remainder = remainder_str.parse::<Amount>().map_err(|_| {
                    Error::FailedToParseAmount("Can't parse token remainder".to_string())
                })?;

                let remainder_conversion = TOKEN_TO_RAW_POWER_OF_10_CONVERSION
                    .checked_sub(remainder_str.len() as u64)
                    .ok_or(Error::LossOfPrecision)?;
                parsed_remainder * Amount::from(10).pow(Amount::from(remainder_conversion))
            }
        };

        Ok(Self(converted_units + remainder))
    }
}

impl Display for TokenUnits {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        let unit = self.0 / Amount::from(TOKEN_TO_RAW_CONVERSION);
        let remainder = (self.0 % Amount::from(TOKEN_TO_RAW_CONVERSION)).to::<u64>();
        write!(formatter, "{unit}.{remainder:08}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str() -> Result<(), Error> {
        assert_eq!(TokenUnits::from_u64(0), TokenUnits::from_str("0")?);
        assert_eq!(TokenUnits::from_u64(0), TokenUnits::from_str("0.")?);
        assert_eq!(TokenUnits::from_u64(0), TokenUnits::from_str("0.0")?);
        assert_eq!(TokenUnits::from_u64(1), TokenUnits::from_str("0.00000001")?);
        assert_eq!(
            TokenUnits::from_u64(100_000_000),
            TokenUnits::from_str("1")?
        );
        assert_eq!(
            TokenUnits::from_u64(100_000_000),
            TokenUnits::from_str("1.")?
        );
        assert_eq!(
            TokenUnits::from_u64(100_000_000),
            TokenUnits::from_str("1.0")?
        );
        assert_eq!(
            TokenUnits::from_u64(100_000_001),
            TokenUnits::from_str("1.00000001")?
        );
        assert_eq!(
            TokenUnits::from_u64(110_000_000),
            TokenUnits::from_str("1.1")?
        );
        assert_eq!(
            TokenUnits::from_u64(314_159_265),
            TokenUnits::from_str("3.14159265")?
        );
        assert_eq!(
            TokenUnits::from_u64(314_159_265),
            TokenUnits::from_str("3.141592650000")?
        );
        assert_eq!(
            TokenUnits::from_u64(429_496_729_599_999_999),
            TokenUnits::from_str("4294967295.99999999")?,
        );

        assert_eq!(
            Err(Error::FailedToParseAmount(
                "Can't parse token units".to_string()
            )),
            TokenUnits::from_str("a")
        );
        assert_eq!(
            Err(Error::FailedToParseAmount(
                "Can't parse token remainder".to_string()
            )),
            TokenUnits::from_str("0.a")
        );
        assert_eq!(
            Err(Error::FailedToParseAmount(
                "Can't parse token remainder".to_string()
            )),
            TokenUnits::from_str("0.0.0")
        );
        assert_eq!(
            Err(Error::LossOfPrecision),
            TokenUnits::from_str("0.000000009")
        );
        Ok(())
    }

    #[test]
    fn display() {
        assert_eq!("0.00000000", format!("{}", TokenUnits::from_u64(0)));
        assert_eq!("0.00000001", format!("{}", TokenUnits::from_u64(1)));
        assert_eq!("0.00000010", format!("{}", TokenUnits::from_u64(10)));
        assert_eq!("1.00000000", format!("{}", TokenUnits::from_u64(100_000_000)));
        assert_eq!("1.00000001", format!("{}", TokenUnits::from_u64(100_000_001)));
        assert_eq!("3.14159265", format!("{}", TokenUnits::from_u64(314_159_265)));
        assert_eq!(
            "4294967295.00000000",
            format!("{}", TokenUnits::from_u64(429_496_729_500_000_000))
        );
    }

    #[test]
    fn from_tokens() {
        assert_eq!(TokenUnits::from_u64(100_000_000), TokenUnits::from_tokens(1));
        assert_eq!(
            TokenUnits::from_u64(10_000_000_000),
            TokenUnits::from_tokens(100)
        );
    }

    #[test]
    fn checked_add_sub() {
        assert_eq!(
            Some(TokenUnits::from_u64(3)),
            TokenUnits::from_u64(1).checked_add(TokenUnits::from_u64(2))
        );
        assert_eq!(
            None,
            TokenUnits::from_raw(Amount::MAX).checked_add(TokenUnits::from_u64(1))
        );

        assert_eq!(
            Some(TokenUnits::zero()),
            TokenUnits::from_u64(10).checked_sub(TokenUnits::from_u64(10))
        );
        assert_eq!(
            None,
            TokenUnits::from_u64(10).checked_sub(TokenUnits::from_u64(11))
        );
    }
}
