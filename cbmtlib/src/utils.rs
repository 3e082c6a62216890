// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use crate::common::{Address, Hash};
use crate::Network;
use alloy::network::Ethereum;
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
};
use alloy::providers::{Identity, ProviderBuilder, ReqwestProvider};
use alloy::transports::http::{reqwest, Client, Http};
use rand::Rng;
use std::env;
use std::str::FromStr;

pub use alloy::primitives::utils::{format_ether, parse_ether};

/// environment variable naming the JSON-RPC endpoint
pub const CBMT_RPC_URL: &str = "CBMT_RPC_URL";
const CBMT_RPC_URL_BUILD_TIME_VAL: Option<&str> = option_env!("CBMT_RPC_URL");
pub const GENERAL_CBMT_ADDRESS: &str = "GENERAL_CBMT_ADDRESS";
const GENERAL_CBMT_ADDRESS_BUILD_TIME_VAL: Option<&str> = option_env!("GENERAL_CBMT_ADDRESS");
pub const CBMT_CONTRACT_ADDRESS: &str = "CBMT_CONTRACT_ADDRESS";
const CBMT_CONTRACT_ADDRESS_BUILD_TIME_VAL: Option<&str> = option_env!("CBMT_CONTRACT_ADDRESS");
pub const ESCROW_CBMT_ADDRESS: &str = "ESCROW_CBMT_ADDRESS";
const ESCROW_CBMT_ADDRESS_BUILD_TIME_VAL: Option<&str> = option_env!("ESCROW_CBMT_ADDRESS");
/// environment variable naming a block explorer for transaction links
pub const CBMT_EXPLORER_URL: &str = "CBMT_EXPLORER_URL";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to get CBMT network: {0}")]
    FailedToGetCbmtNetwork(String),
}

/// Generate a random Address.
pub fn dummy_address() -> Address {
    Address::new(rand::rngs::OsRng.gen())
}

/// Generate a random Hash.
pub fn dummy_hash() -> Hash {
    Hash::new(rand::rngs::OsRng.gen())
}

/// Get the `Network` from environment variables.
/// Returns an error if any required variable is missing or malformed.
pub fn cbmt_network_from_env() -> Result<Network, Error> {
    let cbmt_vars = [
        env::var(CBMT_RPC_URL)
            .ok()
            .or_else(|| CBMT_RPC_URL_BUILD_TIME_VAL.map(|s| s.to_string())),
        env::var(GENERAL_CBMT_ADDRESS)
            .ok()
            .or_else(|| GENERAL_CBMT_ADDRESS_BUILD_TIME_VAL.map(|s| s.to_string())),
        env::var(CBMT_CONTRACT_ADDRESS)
            .ok()
            .or_else(|| CBMT_CONTRACT_ADDRESS_BUILD_TIME_VAL.map(|s| s.to_string())),
        env::var(ESCROW_CBMT_ADDRESS)
            .ok()
            .or_else(|| ESCROW_CBMT_ADDRESS_BUILD_TIME_VAL.map(|s| s.to_string())),
    ]
    .into_iter()
    .map(|var| {
        var.ok_or(Error::FailedToGetCbmtNetwork(format!(
            "missing env var, make sure to set all of: {CBMT_RPC_URL}, {GENERAL_CBMT_ADDRESS}, {CBMT_CONTRACT_ADDRESS}, {ESCROW_CBMT_ADDRESS}"
        )))
    })
    .collect::<Result<Vec<String>, Error>>()?;

    let rpc_url = reqwest::Url::parse(&cbmt_vars[0]).map_err(|err| {
        Error::FailedToGetCbmtNetwork(format!("invalid {CBMT_RPC_URL}: {err}"))
    })?;
    let general_cbmt_address = parse_contract_address(&cbmt_vars[1], GENERAL_CBMT_ADDRESS)?;
    let cbmt_token_address = parse_contract_address(&cbmt_vars[2], CBMT_CONTRACT_ADDRESS)?;
    let escrow_cbmt_address = parse_contract_address(&cbmt_vars[3], ESCROW_CBMT_ADDRESS)?;

    let mut network = Network::new(
        rpc_url,
        general_cbmt_address,
        cbmt_token_address,
        escrow_cbmt_address,
    );
    if let Ok(explorer) = env::var(CBMT_EXPLORER_URL) {
        match reqwest::Url::parse(&explorer) {
            Ok(url) => network = network.with_explorer_url(url),
            Err(err) => warn!("Ignoring malformed {CBMT_EXPLORER_URL}: {err}"),
        }
    }
    info!("Using CBMT network from environment variables");
    Ok(network)
}

fn parse_contract_address(value: &str, var: &str) -> Result<Address, Error> {
    Address::from_str(value)
        .map_err(|err| Error::FailedToGetCbmtNetwork(format!("invalid {var}: {err}")))
}

/// Read-only provider for the network. Signing flows go through
/// [`crate::wallet::Wallet`] instead.
#[allow(clippy::type_complexity)]
pub fn http_provider(
    rpc_url: reqwest::Url,
) -> FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    ReqwestProvider,
    Http<Client>,
    Ethereum,
> {
    ProviderBuilder::new()
        .with_recommended_fillers()
        .on_http(rpc_url)
}
