use crate::common::{Address, Amount, BankId, CurrencyId, TokenId, TxHash, U256};
use crate::contract::cbmt_token::CbmtTokenContract::CbmtTokenContractInstance;
use alloy::primitives::Bytes;
use alloy::providers::{Network, Provider};
use alloy::sol;
use alloy::transports::{RpcError, Transport, TransportErrorKind};

sol!(
    #[allow(clippy::too_many_arguments)]
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract CbmtTokenContract {
        event TransferSingle(address indexed operator, address indexed from, address indexed to, uint256 id, uint256 value);
        event TransferTokenFromSupportedIssuer(address indexed from, address indexed to, uint256 id, uint256 value);
        event TransferTokenFromNotSupportedIssuer(address indexed from, address indexed to, uint256 id, uint256 value);

        function balanceOf(address account, uint256 id) external view returns (uint256);
        function setApprovalForAll(address operator, bool approved) external;
        function safeTransferFrom(address from, address to, uint256 id, uint256 amount, bytes calldata data) external;
        function transfer(uint256 bankId, address to, uint256 tokenId, uint256 amount) external;
        function requestBlankToken(uint256 bankId, uint256 currencyId, uint256 amount) external;
        function stampToken(uint256 bankId, uint256 currencyId, uint256 amount, bytes calldata label) external;
        function requestTokenFromCustomer(uint256 bankId, address customer, uint256 currencyId, uint256 amount) external;
        function returnTokens(uint256 bankId, uint256 currencyId, uint256 amount) external;
        function startNetSettlement(uint256 fromBankId, uint256 toBankId, uint256 currencyId, uint256 amount) external;
        function grossSettlement(uint256 fromBankId, uint256 toBankId, uint256 currencyId, uint256 amount) external;
        function convertTokenFromNotSupportedIssuer(uint256 tokenId, uint256 bankId, uint256 currencyId, uint256 amount, address customer) external;
        function setExchangeRate(uint256 bankId, uint256 fromCurrencyId, uint256 toCurrencyId, uint256 rate) external;
        function getTokenIdFromBankId(uint256 bankId, uint256 currencyId) external view returns (uint256);
        function getContractVersion() external view returns (string memory);
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
    #[error("Token id {0} is out of range")]
    TokenIdOutOfRange(U256),
}

/// Handler for the CBMT ERC-1155 token contract.
pub struct CbmtTokenHandler<T: Transport + Clone, P: Provider<T, N>, N: Network> {
    pub contract: CbmtTokenContractInstance<T, P, N>,
    confirmations: u64,
}

impl<T, P, N> CbmtTokenHandler<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N>,
    N: Network,
{
    /// Create a new CBMT token contract instance.
    pub fn new(contract_address: Address, provider: P) -> Self {
        let contract = CbmtTokenContract::new(contract_address, provider);
        CbmtTokenHandler {
            contract,
            confirmations: 1,
        }
    }

    /// Number of confirmations to wait for on state changing calls.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    /// Raw token balance of an account for one token id.
    pub async fn balance_of(&self, account: Address, token_id: TokenId) -> Result<Amount, Error> {
        let balance = self
            .contract
            .balanceOf(account, U256::from(token_id.as_raw()))
            .call()
            .await
            .inspect_err(|err| error!("Error getting balance of {account}: {err:?}"))?
            ._0;
        debug!("Balance of {account} for token {token_id} is {balance}");
        Ok(balance)
    }

    /// The token id the contract uses for a bank and currency pair.
    pub async fn token_id_from_bank_id(
        &self,
        bank_id: BankId,
        currency_id: CurrencyId,
    ) -> Result<TokenId, Error> {
        let id = self
            .contract
            .getTokenIdFromBankId(U256::from(bank_id), U256::from(currency_id))
            .call()
            .await?
            ._0;
        let raw = u64::try_from(id).map_err(|_| Error::TokenIdOutOfRange(id))?;
        Ok(TokenId::from_raw(raw))
    }

    pub async fn contract_version(&self) -> Result<String, Error> {
        Ok(self.contract.getContractVersion().call().await?._0)
    }

    /// Plain ERC-1155 transfer, with an arbitrary label in the data field.
    pub async fn safe_transfer_from(
        &self,
        from: Address,
        to: Address,
        token_id: TokenId,
        amount: Amount,
        label: Bytes,
    ) -> Result<TxHash, Error> {
        debug!("Transferring {amount} of token {token_id} from {from} to {to}");
        let call =
            self.contract
                .safeTransferFrom(from, to, U256::from(token_id.as_raw()), amount, label);
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error transferring token {token_id} from {from} to {to}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        debug!("Transfer of token {token_id} to {to} settled in tx {tx_hash:?}");
        Ok(tx_hash)
    }

    /// Bank initiated transfer routed by the contract.
    pub async fn transfer(
        &self,
        bank_id: BankId,
        to: Address,
        token_id: TokenId,
        amount: Amount,
    ) -> Result<TxHash, Error> {
        debug!("Bank {bank_id} transferring {amount} of token {token_id} to {to}");
        let call = self.contract.transfer(
            U256::from(bank_id),
            to,
            U256::from(token_id.as_raw()),
            amount,
        );
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error transferring token {token_id} to {to} as bank {bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Request blank tokens onto the issuing address. Signed with the
    /// issuing key.
    pub async fn request_blank_token(
        &self,
        bank_id: BankId,
        currency_id: CurrencyId,
        amount: Amount,
    ) -> Result<TxHash, Error> {
        debug!("Requesting {amount} blank tokens ({currency_id}) for bank {bank_id}");
        let call =
            self.contract
                .requestBlankToken(U256::from(bank_id), U256::from(currency_id), amount);
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error requesting blank tokens for bank {bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Stamp previously requested blank tokens. Signed with the mint key.
    pub async fn stamp_token(
        &self,
        bank_id: BankId,
        currency_id: CurrencyId,
        amount: Amount,
        label: Bytes,
    ) -> Result<TxHash, Error> {
        debug!("Stamping {amount} tokens ({currency_id}) for bank {bank_id}");
        let call = self.contract.stampToken(
            U256::from(bank_id),
            U256::from(currency_id),
            amount,
            label,
        );
        let pending_tx_builder = call
            .send()
            .await
            .inspect_err(|err| error!("Error stamping tokens for bank {bank_id}: {err:?}"))?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Supply stamped tokens to a customer. Signed with the mint key.
    pub async fn request_token_from_customer(
        &self,
        bank_id: BankId,
        customer: Address,
        currency_id: CurrencyId,
        amount: Amount,
    ) -> Result<TxHash, Error> {
        debug!("Supplying {amount} tokens ({currency_id}) of bank {bank_id} to {customer}");
        let call = self.contract.requestTokenFromCustomer(
            U256::from(bank_id),
            customer,
            U256::from(currency_id),
            amount,
        );
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error supplying tokens of bank {bank_id} to {customer}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Return tokens to the issuer for destruction.
    pub async fn return_tokens(
        &self,
        bank_id: BankId,
        currency_id: CurrencyId,
        amount: Amount,
    ) -> Result<TxHash, Error> {
        debug!("Returning {amount} tokens ({currency_id}) of bank {bank_id}");
        let call =
            self.contract
                .returnTokens(U256::from(bank_id), U256::from(currency_id), amount);
        let pending_tx_builder = call
            .send()
            .await
            .inspect_err(|err| error!("Error returning tokens of bank {bank_id}: {err:?}"))?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    pub async fn start_net_settlement(
        &self,
        from_bank_id: BankId,
        to_bank_id: BankId,
        currency_id: CurrencyId,
        amount: Amount,
    ) -> Result<TxHash, Error> {
        debug!(
            "Net settlement of {amount} ({currency_id}) from bank {from_bank_id} to bank {to_bank_id}"
        );
        let call = self.contract.startNetSettlement(
            U256::from(from_bank_id),
            U256::from(to_bank_id),
            U256::from(currency_id),
            amount,
        );
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error starting net settlement from bank {from_bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    pub async fn gross_settlement(
        &self,
        from_bank_id: BankId,
        to_bank_id: BankId,
        currency_id: CurrencyId,
        amount: Amount,
    ) -> Result<TxHash, Error> {
        debug!(
            "Gross settlement of {amount} ({currency_id}) from bank {from_bank_id} to bank {to_bank_id}"
        );
        let call = self.contract.grossSettlement(
            U256::from(from_bank_id),
            U256::from(to_bank_id),
            U256::from(currency_id),
            amount,
        );
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error running gross settlement from bank {from_bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Move tokens stuck on a convert address into tokens of `bank_id`.
    /// Signed with the mint key of that bank.
    pub async fn convert_token_from_not_supported_issuer(
        &self,
        token_id: TokenId,
        bank_id: BankId,
        currency_id: CurrencyId,
        amount: Amount,
        customer: Address,
    ) -> Result<TxHash, Error> {
        debug!("Converting {amount} of token {token_id} on {customer} for bank {bank_id}");
        let call = self.contract.convertTokenFromNotSupportedIssuer(
            U256::from(token_id.as_raw()),
            U256::from(bank_id),
            U256::from(currency_id),
            amount,
            customer,
        );
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error converting token {token_id} on {customer}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    pub async fn set_exchange_rate(
        &self,
        bank_id: BankId,
        from_currency_id: CurrencyId,
        to_currency_id: CurrencyId,
        rate: U256,
    ) -> Result<TxHash, Error> {
        debug!(
            "Setting exchange rate {from_currency_id}->{to_currency_id} to {rate} for bank {bank_id}"
        );
        let call = self.contract.setExchangeRate(
            U256::from(bank_id),
            U256::from(from_currency_id),
            U256::from(to_currency_id),
            rate,
        );
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error setting exchange rate for bank {bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// ERC-1155 operator approval, needed before escrow deposits.
    pub async fn set_approval_for_all(
        &self,
        operator: Address,
        approved: bool,
    ) -> Result<TxHash, Error> {
        debug!("Setting operator approval for {operator} to {approved}");
        let call = self.contract.setApprovalForAll(operator, approved);
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error setting operator approval for {operator}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }
}
