// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use alloy::primitives::FixedBytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Address = alloy::primitives::Address;
pub type Hash = FixedBytes<32>;
pub type TxHash = alloy::primitives::TxHash;
pub type U256 = alloy::primitives::U256;
pub type Amount = U256;
pub type EthereumWallet = alloy::network::EthereumWallet;
pub type Calldata = alloy::primitives::Bytes;

pub type BankId = u64;
pub type CurrencyId = u64;

/// Participating bank ids are spaced so that `bank id + currency id` forms a
/// collision free token id. ISO 4217 currency ids stay below this spacing.
pub const BANK_ID_SPACING: u64 = 1000;

/// A currency the network settles in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Eur,
    Usd,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Eur, Currency::Usd];

    /// ISO 4217 numeric code.
    pub fn id(self) -> CurrencyId {
        match self {
            Currency::Eur => 978,
            Currency::Usd => 840,
        }
    }

    /// ISO 4217 alphabetic code.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }

    pub fn from_id(id: CurrencyId) -> Option<Self> {
        Self::ALL.into_iter().find(|currency| currency.id() == id)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown currency: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EUR" | "978" => Ok(Currency::Eur),
            "USD" | "840" => Ok(Currency::Usd),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}

/// ERC-1155 token id of a stamped CBMT token: the issuing bank id plus the
/// ISO 4217 currency id.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TokenId(u64);

impl TokenId {
    pub fn new(issuer: BankId, currency: Currency) -> Self {
        Self(issuer + currency.id())
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// The currency part of the id.
    pub fn currency_id(self) -> CurrencyId {
        self.0 % BANK_ID_SPACING
    }

    /// The currency part, if it is one the network settles in.
    pub fn currency(self) -> Option<Currency> {
        Currency::from_id(self.currency_id())
    }

    /// The id of the bank that issued the token.
    pub fn issuer(self) -> BankId {
        self.0 - self.currency_id()
    }
}

impl From<u64> for TokenId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_id_round_trip() {
        for issuer in [1000, 2000, 3000] {
            for currency in Currency::ALL {
                let token_id = TokenId::new(issuer, currency);
                assert_eq!(token_id.as_raw(), issuer + currency.id());
                assert_eq!(token_id.issuer(), issuer);
                assert_eq!(token_id.currency(), Some(currency));
            }
        }
    }

    #[test]
    fn token_id_unknown_currency() {
        let token_id = TokenId::from_raw(2999);
        assert_eq!(token_id.currency(), None);
        assert_eq!(token_id.currency_id(), 999);
        assert_eq!(token_id.issuer(), 2000);
    }

    #[test]
    fn currency_from_str() {
        assert_eq!("EUR".parse(), Ok(Currency::Eur));
        assert_eq!("usd".parse(), Ok(Currency::Usd));
        assert_eq!("978".parse(), Ok(Currency::Eur));
        assert_eq!("840".parse(), Ok(Currency::Usd));
        assert!("GBP".parse::<Currency>().is_err());
    }
}
