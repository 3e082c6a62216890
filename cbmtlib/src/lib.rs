use crate::common::{Address, TxHash};
use crate::event::TokenTransferEvent;
use alloy::transports::http::reqwest;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

#[macro_use]
extern crate tracing;

pub mod classify;
pub mod common;
pub mod contract;
pub mod credential;
pub mod event;
pub mod registry;
pub mod scan;
pub mod units;
pub mod utils;
pub mod wallet;

/// Deployment descriptor for one CBMT network: the RPC endpoint plus the
/// addresses of the contracts operated on it.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde_as(as = "DisplayFromStr")]
    rpc_url_http: reqwest::Url,
    general_cbmt_address: Address,
    cbmt_token_address: Address,
    escrow_cbmt_address: Address,
    #[serde_as(as = "Option<DisplayFromStr>")]
    explorer_url_http: Option<reqwest::Url>,
}

impl Network {
    pub fn new(
        rpc_url_http: reqwest::Url,
        general_cbmt_address: Address,
        cbmt_token_address: Address,
        escrow_cbmt_address: Address,
    ) -> Self {
        Self {
            rpc_url_http,
            general_cbmt_address,
            cbmt_token_address,
            escrow_cbmt_address,
            explorer_url_http: None,
        }
    }

    pub fn with_explorer_url(mut self, explorer_url_http: reqwest::Url) -> Self {
        self.explorer_url_http = Some(explorer_url_http);
        self
    }

    pub fn rpc_url(&self) -> &reqwest::Url {
        &self.rpc_url_http
    }

    pub fn general_cbmt_address(&self) -> &Address {
        &self.general_cbmt_address
    }

    pub fn cbmt_token_address(&self) -> &Address {
        &self.cbmt_token_address
    }

    pub fn escrow_cbmt_address(&self) -> &Address {
        &self.escrow_cbmt_address
    }

    /// Link to a transaction on the configured block explorer, if one is set.
    pub fn explorer_tx_url(&self, tx_hash: TxHash) -> Option<String> {
        self.explorer_url_http.as_ref().map(|base| {
            let base = base.as_str().trim_end_matches('/');
            format!("{base}/tx/{tx_hash}")
        })
    }

    /// Token transfer events on the CBMT token contract between the two
    /// unix timestamps. See [`scan::token_transfer_history`].
    pub async fn transfer_history(
        &self,
        from_timestamp: u64,
        to_timestamp: u64,
        max_blocks: Option<u64>,
    ) -> Result<Vec<TokenTransferEvent>, scan::Error> {
        scan::token_transfer_history(self, from_timestamp, to_timestamp, max_blocks).await
    }
}
