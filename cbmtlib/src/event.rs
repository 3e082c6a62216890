// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use crate::common::{Address, Amount, TokenId, U256};
use crate::contract::cbmt_token::CbmtTokenContract;
use alloy::primitives::{b256, FixedBytes};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;

// keccak256 of TransferSingle(address,address,address,uint256,uint256).
pub(crate) const TRANSFER_SINGLE_EVENT_SIGNATURE: FixedBytes<32> =
    b256!("c3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62"); // DevSkim: ignore DS173237

pub(crate) fn supported_issuer_event_signature() -> FixedBytes<32> {
    CbmtTokenContract::TransferTokenFromSupportedIssuer::SIGNATURE_HASH
}

pub(crate) fn not_supported_issuer_event_signature() -> FixedBytes<32> {
    CbmtTokenContract::TransferTokenFromNotSupportedIssuer::SIGNATURE_HASH
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Topics amount is unexpected")]
    TopicsAmountUnexpected,
    #[error("Event signature is missing")]
    EventSignatureMissing,
    #[error("Event signature does not match")]
    EventSignatureDoesNotMatch,
    #[error("Event data is malformed")]
    DataMalformed,
    #[error("Token id {0} is out of range")]
    TokenIdOutOfRange(U256),
}

/// Which contract event reported the movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    /// Plain ERC-1155 `TransferSingle`.
    Single,
    /// Routed by the token contract for an issuer the receiver supports.
    SupportedIssuer,
    /// Routed with a conversion because the receiver does not support the
    /// issuer.
    NotSupportedIssuer,
}

impl TransferKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            TransferKind::Single => "TransferSingle",
            TransferKind::SupportedIssuer => "TransferTokenFromSupportedIssuer",
            TransferKind::NotSupportedIssuer => "TransferTokenFromNotSupportedIssuer",
        }
    }
}

/// A token movement decoded from a CBMT token contract log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenTransferEvent {
    pub kind: TransferKind,
    pub from: Address,
    pub to: Address,
    pub token_id: TokenId,
    pub amount: Amount,
}

impl TryFrom<Log> for TokenTransferEvent {
    type Error = Error;

    fn try_from(log: Log) -> Result<Self, Self::Error> {
        let topics = log.topics();
        let topic0 = *topics
            .first()
            .ok_or(Error::EventSignatureMissing)
            .inspect_err(|_| error!("Event signature is missing"))?;

        let (kind, from_topic, to_topic, expected_topics) =
            if topic0 == TRANSFER_SINGLE_EVENT_SIGNATURE {
                // operator, from, to
                (TransferKind::Single, 2, 3, 4)
            } else if topic0 == supported_issuer_event_signature() {
                (TransferKind::SupportedIssuer, 1, 2, 3)
            } else if topic0 == not_supported_issuer_event_signature() {
                (TransferKind::NotSupportedIssuer, 1, 2, 3)
            } else {
                error!("Event signature {topic0} does not match a CBMT transfer event");
                return Err(Error::EventSignatureDoesNotMatch);
            };

        if topics.len() != expected_topics {
            error!(
                "Topics amount is unexpected. Was expecting {expected_topics}, got {}",
                topics.len()
            );
            return Err(Error::TopicsAmountUnexpected);
        }

        let from = Address::from_slice(&topics[from_topic][12..]);
        let to = Address::from_slice(&topics[to_topic][12..]);

        // id and value are unindexed, back to back in the data section
        let data = log.inner.data.data.as_ref();
        if data.len() < 64 {
            error!("Event data is too short: {} bytes", data.len());
            return Err(Error::DataMalformed);
        }
        let id = U256::from_be_slice(&data[..32]);
        let amount = U256::from_be_slice(&data[32..64]);
        let token_id =
            TokenId::from_raw(u64::try_from(id).map_err(|_| Error::TokenIdOutOfRange(id))?);

        Ok(Self {
            kind,
            from,
            to,
            token_id,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Currency;
    use crate::utils::dummy_address;
    use alloy::primitives::{Bytes, LogData, B256};

    fn synthetic_log(topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: dummy_address(),
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            ..Default::default()
        }
    }

    fn id_and_value_data(token_id: TokenId, value: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(B256::from(U256::from(token_id.as_raw())).as_slice());
        data.extend_from_slice(B256::from(U256::from(value)).as_slice());
        data
    }

    #[test]
    fn hardcoded_transfer_single_signature_matches_the_abi() {
        assert_eq!(
            TRANSFER_SINGLE_EVENT_SIGNATURE,
            CbmtTokenContract::TransferSingle::SIGNATURE_HASH
        );
    }

    #[test]
    fn decodes_transfer_single() {
        let operator = dummy_address();
        let from = dummy_address();
        let to = dummy_address();
        let token_id = TokenId::new(2000, Currency::Eur);

        let log = synthetic_log(
            vec![
                TRANSFER_SINGLE_EVENT_SIGNATURE,
                operator.into_word(),
                from.into_word(),
                to.into_word(),
            ],
            id_and_value_data(token_id, 500_000_000),
        );

        let event = TokenTransferEvent::try_from(log).expect("event");
        assert_eq!(event.kind, TransferKind::Single);
        assert_eq!(event.from, from);
        assert_eq!(event.to, to);
        assert_eq!(event.token_id, token_id);
        assert_eq!(event.amount, U256::from(500_000_000u64));
    }

    #[test]
    fn decodes_supported_issuer_transfer() {
        let from = dummy_address();
        let to = dummy_address();
        let token_id = TokenId::new(1000, Currency::Usd);

        let log = synthetic_log(
            vec![
                supported_issuer_event_signature(),
                from.into_word(),
                to.into_word(),
            ],
            id_and_value_data(token_id, 100_000_000),
        );

        let event = TokenTransferEvent::try_from(log).expect("event");
        assert_eq!(event.kind, TransferKind::SupportedIssuer);
        assert_eq!(event.from, from);
        assert_eq!(event.to, to);
        assert_eq!(event.token_id, token_id);
    }

    #[test]
    fn decodes_not_supported_issuer_transfer() {
        let from = dummy_address();
        let to = dummy_address();
        let token_id = TokenId::new(3000, Currency::Eur);

        let log = synthetic_log(
            vec![
                not_supported_issuer_event_signature(),
                from.into_word(),
                to.into_word(),
            ],
            id_and_value_data(token_id, 42),
        );

        let event = TokenTransferEvent::try_from(log).expect("event");
        assert_eq!(event.kind, TransferKind::NotSupportedIssuer);
        assert_eq!(event.kind.event_name(), "TransferTokenFromNotSupportedIssuer");
    }

    #[test]
    fn rejects_unknown_event_signature() {
        let log = synthetic_log(
            vec![crate::utils::dummy_hash(), dummy_address().into_word()],
            vec![],
        );
        assert!(matches!(
            TokenTransferEvent::try_from(log),
            Err(Error::EventSignatureDoesNotMatch)
        ));
    }

    #[test]
    fn rejects_wrong_topic_count() {
        let log = synthetic_log(
            vec![TRANSFER_SINGLE_EVENT_SIGNATURE, dummy_address().into_word()],
            id_and_value_data(TokenId::new(1000, Currency::Eur), 1),
        );
        assert!(matches!(
            TokenTransferEvent::try_from(log),
            Err(Error::TopicsAmountUnexpected)
        ));
    }

    #[test]
    fn rejects_truncated_data() {
        let from = dummy_address();
        let to = dummy_address();
        let log = synthetic_log(
            vec![
                supported_issuer_event_signature(),
                from.into_word(),
                to.into_word(),
            ],
            vec![0u8; 32],
        );
        assert!(matches!(
            TokenTransferEvent::try_from(log),
            Err(Error::DataMalformed)
        ));
    }
}
