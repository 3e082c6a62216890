use crate::common::{Address, Amount, CurrencyId, TokenId, TxHash, U256};
use crate::contract::escrow_cbmt::EscrowCbmtContract::EscrowCbmtContractInstance;
use alloy::providers::{Network, Provider};
use alloy::sol;
use alloy::transports::{RpcError, Transport, TransportErrorKind};

sol!(
    #[allow(clippy::too_many_arguments)]
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract EscrowCbmtContract {
        function setEscrowContractConditions(address payee, address arbiter, uint256 lockedUntilTimestamp, uint256 depositDeadline, uint256 amount, uint256 currencyId) external;
        function nextContractId() external view returns (uint256);
        function acceptEscrowContractConditions(uint256 contractId) external;
        function escrowContractDeposit(uint256 contractId, uint256 tokenId) external;
        function approveReleaseFunds(uint256 contractId) external;
    }
);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ContractError(#[from] alloy::contract::Error),
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    #[error(transparent)]
    PendingTransactionError(#[from] alloy::providers::PendingTransactionError),
    #[error("Escrow contract id {0} is out of range")]
    ContractIdOutOfRange(U256),
}

/// Conditions for a new escrow agreement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscrowConditions {
    pub payee: Address,
    pub arbiter: Address,
    pub locked_until_timestamp: u64,
    pub deposit_deadline: u64,
    pub amount: Amount,
    pub currency_id: CurrencyId,
}

/// Handler for the EscrowCBMT contract.
pub struct EscrowCbmtHandler<T: Transport + Clone, P: Provider<T, N>, N: Network> {
    pub contract: EscrowCbmtContractInstance<T, P, N>,
    confirmations: u64,
}

impl<T, P, N> EscrowCbmtHandler<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N>,
    N: Network,
{
    /// Create a new EscrowCBMT contract instance.
    pub fn new(contract_address: Address, provider: P) -> Self {
        let contract = EscrowCbmtContract::new(contract_address, provider);
        EscrowCbmtHandler {
            contract,
            confirmations: 1,
        }
    }

    /// Number of confirmations to wait for on state changing calls.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    /// Escrow contract id counter. The most recently created agreement has
    /// this id minus one.
    pub async fn next_contract_id(&self) -> Result<u64, Error> {
        let id = self
            .contract
            .nextContractId()
            .call()
            .await
            .inspect_err(|err| error!("Error getting next escrow contract id: {err:?}"))?
            ._0;
        u64::try_from(id).map_err(|_| Error::ContractIdOutOfRange(id))
    }

    /// Propose a new escrow agreement. Signed by the payer.
    pub async fn set_contract_conditions(
        &self,
        conditions: EscrowConditions,
    ) -> Result<TxHash, Error> {
        debug!(
            "Setting escrow conditions for payee {} with arbiter {}",
            conditions.payee, conditions.arbiter
        );
        let call = self.contract.setEscrowContractConditions(
            conditions.payee,
            conditions.arbiter,
            U256::from(conditions.locked_until_timestamp),
            U256::from(conditions.deposit_deadline),
            conditions.amount,
            U256::from(conditions.currency_id),
        );
        let pending_tx_builder = call
            .send()
            .await
            .inspect_err(|err| error!("Error setting escrow conditions: {err:?}"))?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Accept a proposed agreement. Signed by the payee side.
    pub async fn accept_contract_conditions(&self, contract_id: u64) -> Result<TxHash, Error> {
        debug!("Accepting escrow contract {contract_id}");
        let call = self
            .contract
            .acceptEscrowContractConditions(U256::from(contract_id));
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error accepting escrow contract {contract_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Deposit tokens into an accepted agreement. The payer must have
    /// approved the escrow contract as an ERC-1155 operator first.
    pub async fn deposit(&self, contract_id: u64, token_id: TokenId) -> Result<TxHash, Error> {
        debug!("Depositing token {token_id} into escrow contract {contract_id}");
        let call = self
            .contract
            .escrowContractDeposit(U256::from(contract_id), U256::from(token_id.as_raw()));
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error depositing into escrow contract {contract_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Release the deposited funds to the payee. Signed by the arbiter.
    pub async fn approve_release_funds(&self, contract_id: u64) -> Result<TxHash, Error> {
        debug!("Releasing funds of escrow contract {contract_id}");
        let call = self.contract.approveReleaseFunds(U256::from(contract_id));
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error releasing funds of escrow contract {contract_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }
}
