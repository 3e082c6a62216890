use crate::event::{
    not_supported_issuer_event_signature, supported_issuer_event_signature, TokenTransferEvent,
    TRANSFER_SINGLE_EVENT_SIGNATURE,
};
use crate::utils::http_provider;
use crate::Network;
use alloy::eips::BlockNumberOrTag;
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy::transports::{RpcError, TransportErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    #[error("Block {0} is not available")]
    BlockMissing(u64),
}

/// Token transfer events on the CBMT token contract between two unix
/// timestamps, newest block first.
///
/// Walks the chain backwards from the latest block. Blocks newer than
/// `to_timestamp` are skipped, the walk stops at the first block older than
/// `from_timestamp` or after `max_blocks` visited blocks. There is no block
/// number index by time, so the walk is linear.
pub async fn token_transfer_history(
    network: &Network,
    from_timestamp: u64,
    to_timestamp: u64,
    max_blocks: Option<u64>,
) -> Result<Vec<TokenTransferEvent>, Error> {
    let provider = http_provider(network.rpc_url().clone());
    let latest = provider.get_block_number().await?;
    debug!(
        "Scanning for token transfers between {from_timestamp} and {to_timestamp} from block {latest}"
    );

    let mut events = Vec::new();
    let mut number = latest;
    let mut visited: u64 = 0;

    loop {
        if let Some(max_blocks) = max_blocks {
            if visited >= max_blocks {
                debug!("Stopping scan after {visited} blocks");
                break;
            }
        }
        visited += 1;

        let block = provider
            .get_block_by_number(BlockNumberOrTag::Number(number), false.into())
            .await?
            .ok_or(Error::BlockMissing(number))?;
        let timestamp = block.header.timestamp;

        if timestamp < from_timestamp {
            break;
        }
        if timestamp <= to_timestamp {
            let filter = Filter::new()
                .address(*network.cbmt_token_address())
                .event_signature(vec![
                    TRANSFER_SINGLE_EVENT_SIGNATURE,
                    supported_issuer_event_signature(),
                    not_supported_issuer_event_signature(),
                ])
                .from_block(number)
                .to_block(number);
            let logs = provider.get_logs(&filter).await?;
            for log in logs {
                match TokenTransferEvent::try_from(log) {
                    Ok(event) => events.push(event),
                    Err(err) => warn!("Skipping undecodable log in block {number}: {err}"),
                }
            }
        }

        if number == 0 {
            break;
        }
        number -= 1;
    }

    debug!("Scan visited {visited} blocks and found {} events", events.len());
    Ok(events)
}
