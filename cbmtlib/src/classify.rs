use crate::common::{Address, BankId, CurrencyId, TokenId};
use crate::registry::{self, ReadOnlyRegistry};
use crate::units::TokenUnits;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] registry::Error),
    #[error("Receiver {0} is not registered as a customer address")]
    ReceiverUnregistered(Address),
    #[error("Token {0} does not carry a known currency")]
    UnknownTokenCurrency(TokenId),
}

/// A transfer as requested, before any routing decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferIntent {
    pub sender: Address,
    pub receiver: Address,
    pub token_id: TokenId,
    pub amount: TokenUnits,
    /// Free-form reference string carried in the transfer calldata.
    pub label: Option<String>,
}

/// How the receiving address is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverProfile {
    /// Customer general address. Transfers go through directly.
    General,
    /// Customer convert address, with both acceptance checks resolved
    /// against the token being sent.
    Convert {
        issuer_supported: bool,
        currency_supported: bool,
    },
}

impl ReceiverProfile {
    /// Resolve `receiver` against the registry for a token issued by
    /// `issuer` in `currency`.
    ///
    /// The general address check runs first; a general receiver never
    /// triggers the convert lookups.
    pub async fn fetch<R>(
        registry: &R,
        receiver: Address,
        issuer: BankId,
        currency: CurrencyId,
    ) -> Result<Self, Error>
    where
        R: ReadOnlyRegistry + Sync + ?Sized,
    {
        if registry.is_general_address(receiver).await? {
            return Ok(ReceiverProfile::General);
        }
        if !registry.is_convert_address(receiver).await? {
            return Err(Error::ReceiverUnregistered(receiver));
        }

        let issuer_supported = registry
            .is_preferred_issuer(receiver, currency, issuer)
            .await?;
        let currency_supported = registry
            .is_currency_supported(issuer, receiver, currency)
            .await?;
        Ok(ReceiverProfile::Convert {
            issuer_supported,
            currency_supported,
        })
    }
}

/// The five routing outcomes for a token transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferCase {
    DirectGeneralTransfer,
    SupportedIssuerSupportedCurrency,
    SupportedIssuerUnsupportedCurrency,
    UnsupportedIssuerSupportedCurrency,
    UnsupportedIssuerUnsupportedCurrency,
}

impl TransferCase {
    pub const ALL: [TransferCase; 5] = [
        TransferCase::DirectGeneralTransfer,
        TransferCase::SupportedIssuerSupportedCurrency,
        TransferCase::SupportedIssuerUnsupportedCurrency,
        TransferCase::UnsupportedIssuerSupportedCurrency,
        TransferCase::UnsupportedIssuerUnsupportedCurrency,
    ];

    /// Whether tokens move without any conversion step.
    pub fn is_direct(&self) -> bool {
        matches!(
            self,
            TransferCase::DirectGeneralTransfer
                | TransferCase::SupportedIssuerSupportedCurrency
        )
    }

    /// What the case means for the receiver.
    pub fn describe(&self) -> &'static str {
        match self {
            TransferCase::DirectGeneralTransfer => {
                "receiver is a general address, tokens move directly"
            }
            TransferCase::SupportedIssuerSupportedCurrency => {
                "receiver accepts tokens of this issuer in this currency"
            }
            TransferCase::SupportedIssuerUnsupportedCurrency => {
                "receiver accepts this issuer but not this currency"
            }
            TransferCase::UnsupportedIssuerSupportedCurrency => {
                "receiver supports this currency but not this issuer, conversion applies"
            }
            TransferCase::UnsupportedIssuerUnsupportedCurrency => {
                "receiver accepts neither this issuer nor this currency"
            }
        }
    }
}

impl fmt::Display for TransferCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransferCase::DirectGeneralTransfer => "direct general transfer",
            TransferCase::SupportedIssuerSupportedCurrency => {
                "supported issuer / supported currency"
            }
            TransferCase::SupportedIssuerUnsupportedCurrency => {
                "supported issuer / unsupported currency"
            }
            TransferCase::UnsupportedIssuerSupportedCurrency => {
                "unsupported issuer / supported currency"
            }
            TransferCase::UnsupportedIssuerUnsupportedCurrency => {
                "unsupported issuer / unsupported currency"
            }
        };
        write!(f, "{label}")
    }
}

/// The decision for one transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub case: TransferCase,
    pub token_issuer: BankId,
    pub token_currency: CurrencyId,
}

/// Map a receiver profile to its transfer case. Pure; all chain state is
/// already captured in `profile`.
pub fn classify(profile: ReceiverProfile) -> TransferCase {
    match profile {
        ReceiverProfile::General => TransferCase::DirectGeneralTransfer,
        ReceiverProfile::Convert {
            issuer_supported: true,
            currency_supported: true,
        } => TransferCase::SupportedIssuerSupportedCurrency,
        ReceiverProfile::Convert {
            issuer_supported: true,
            currency_supported: false,
        } => TransferCase::SupportedIssuerUnsupportedCurrency,
        ReceiverProfile::Convert {
            issuer_supported: false,
            currency_supported: true,
        } => TransferCase::UnsupportedIssuerSupportedCurrency,
        ReceiverProfile::Convert {
            issuer_supported: false,
            currency_supported: false,
        } => TransferCase::UnsupportedIssuerUnsupportedCurrency,
    }
}

/// Classify `intent` against live registry state.
pub async fn classify_transfer<R>(
    registry: &R,
    intent: &TransferIntent,
) -> Result<Classification, Error>
where
    R: ReadOnlyRegistry + Sync + ?Sized,
{
    let currency = intent
        .token_id
        .currency()
        .ok_or(Error::UnknownTokenCurrency(intent.token_id))?;
    let issuer = intent.token_id.issuer();

    let profile = ReceiverProfile::fetch(registry, intent.receiver, issuer, currency.id()).await?;
    let case = classify(profile);
    debug!(
        "Transfer of {} with token {} from {} to {} classified as {case}",
        intent.amount, intent.token_id, intent.sender, intent.receiver
    );

    Ok(Classification {
        case,
        token_issuer: issuer,
        token_currency: currency.id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn general_receiver_is_a_direct_transfer() {
        assert_eq!(
            classify(ReceiverProfile::General),
            TransferCase::DirectGeneralTransfer
        );
    }

    #[test]
    fn convert_receiver_cases_follow_the_support_matrix() {
        let cases = [
            (true, true, TransferCase::SupportedIssuerSupportedCurrency),
            (true, false, TransferCase::SupportedIssuerUnsupportedCurrency),
            (false, true, TransferCase::UnsupportedIssuerSupportedCurrency),
            (false, false, TransferCase::UnsupportedIssuerUnsupportedCurrency),
        ];
        for (issuer_supported, currency_supported, expected) in cases {
            assert_eq!(
                classify(ReceiverProfile::Convert {
                    issuer_supported,
                    currency_supported,
                }),
                expected
            );
        }
    }

    #[test]
    fn profiles_partition_into_distinct_cases() {
        let mut seen = HashSet::new();
        let _ = seen.insert(classify(ReceiverProfile::General));
        for issuer_supported in [false, true] {
            for currency_supported in [false, true] {
                let _ = seen.insert(classify(ReceiverProfile::Convert {
                    issuer_supported,
                    currency_supported,
                }));
            }
        }
        assert_eq!(seen.len(), TransferCase::ALL.len());
    }

    #[test]
    fn direct_cases_are_flagged() {
        assert!(TransferCase::DirectGeneralTransfer.is_direct());
        assert!(TransferCase::SupportedIssuerSupportedCurrency.is_direct());
        assert!(!TransferCase::UnsupportedIssuerSupportedCurrency.is_direct());
        assert!(!TransferCase::UnsupportedIssuerUnsupportedCurrency.is_direct());
    }
}
