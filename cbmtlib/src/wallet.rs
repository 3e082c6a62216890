use crate::common::{Address, Amount, TxHash};
use crate::credential::Credential;
use crate::Network;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, ReqwestProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::{LocalSigner, PrivateKeySigner};
use alloy::transports::http::{Client, Http};
use alloy::transports::{RpcError, TransportErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Credential(#[from] crate::credential::Error),
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    #[error(transparent)]
    PendingTransactionError(#[from] alloy::providers::PendingTransactionError),
}

/// A signing identity bound to a deployment. Wraps the raw signer in a
/// provider that fills nonce, gas and chain id before signing.
#[derive(Clone, Debug)]
pub struct Wallet {
    wallet: EthereumWallet,
    address: Address,
    network: Network,
}

impl Wallet {
    pub fn new(signer: PrivateKeySigner, network: Network) -> Self {
        let address = signer.address();
        Self {
            wallet: EthereumWallet::from(signer),
            address,
            network,
        }
    }

    pub fn from_credential(credential: &Credential, network: Network) -> Result<Self, Error> {
        Ok(Self::new(credential.signer()?, network))
    }

    /// Wallet with a fresh random key, useful on local test networks.
    pub fn random(network: Network) -> Self {
        let signer: PrivateKeySigner = LocalSigner::random();
        Self::new(signer, network)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Provider with this wallet attached for signing.
    #[allow(clippy::type_complexity)]
    pub fn provider(
        &self,
    ) -> FillProvider<
        JoinFill<
            JoinFill<
                Identity,
                JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
            >,
            WalletFiller<EthereumWallet>,
        >,
        ReqwestProvider,
        Http<Client>,
        Ethereum,
    > {
        ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.wallet.clone())
            .on_http(self.network.rpc_url().clone())
    }

    /// Native token balance of the wallet address, in wei.
    pub async fn gas_balance(&self) -> Result<Amount, Error> {
        balance_of_gas_tokens(self.address, &self.network).await
    }

    /// Send native gas tokens to `to`.
    pub async fn transfer_gas_tokens(&self, to: Address, amount: Amount) -> Result<TxHash, Error> {
        let provider = self.provider();
        let tx = TransactionRequest::default().with_to(to).with_value(amount);
        let pending = provider.send_transaction(tx).await.inspect_err(|err| {
            error!("Error sending gas token transfer: {err:?}");
        })?;
        let tx_hash = pending.watch().await?;
        debug!("Transferred {amount} gas tokens to {to} in tx {tx_hash}");
        Ok(tx_hash)
    }
}

/// Native token balance of `address`, in wei.
pub async fn balance_of_gas_tokens(address: Address, network: &Network) -> Result<Amount, Error> {
    let provider = crate::utils::http_provider(network.rpc_url().clone());
    let balance = provider.get_balance(address).await?;
    Ok(balance)
}
