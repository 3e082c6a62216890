// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use crate::common::{Address, BankId, CurrencyId, TxHash, U256};
use crate::contract::general_cbmt::GeneralCbmtContract::GeneralCbmtContractInstance;
use crate::registry::{self, BankInfo, ReadOnlyRegistry};
use alloy::providers::{Network, Provider};
use alloy::sol;
use alloy::transports::{RpcError, Transport, TransportErrorKind};
use async_trait::async_trait;

sol!(
    #[allow(clippy::too_many_arguments)]
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract GeneralCbmtContract {
        struct Bank {
            uint256 _bankId;
            address _issuingAddress;
            address _mintAddress;
            address _redemptionAddress;
            address _generalAddress;
            string _name;
        }

        function addParticipatingBank(address issuingAddress, address mintAddress, address redemptionAddress, address generalAddress, string calldata name) external;
        function getCurrentBankId() external view returns (uint256);
        function getParticipatingBank(uint256 bankId) external view returns (Bank memory);
        function getParticipatingBanks() external view returns (Bank[] memory);
        function addToWhitelist(uint256 bankId, address customer) external;
        function removeFromWhitelist(uint256 bankId, address customer) external;
        function registerCustomer(uint256 bankId, address generalAddress) external;
        function addCurrencyToCustomer(uint256 bankId, address convertAddress, uint256[] calldata currencyIds) external;
        function removeCurrencyFromCustomer(uint256 bankId, address convertAddress, uint256 currencyId) external;
        function isCustomerGeneralAddress(address customer) external view returns (bool);
        function isCustomerConvertAddress(address customer) external view returns (bool);
        function getCustomerGeneralAddress(address convertAddress) external view returns (address);
        function getCustomerConvertAddressFromGeneralAndBankId(address generalAddress, uint256 bankId) external view returns (address[] memory);
        function isCustomerSupportedCurrency(uint256 bankId, address customer, uint256 currencyId) external view returns (bool);
        function isCustomerPreferredIssuerForCurrency(address customer, uint256 currencyId, uint256 bankId) external view returns (bool);
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
    #[error("Value {0} does not fit a bank or currency id")]
    IdOutOfRange(U256),
}

fn id_to_u64(value: U256) -> Result<u64, Error> {
    u64::try_from(value).map_err(|_| Error::IdOutOfRange(value))
}

fn bank_from(bank: GeneralCbmtContract::Bank) -> Result<BankInfo, Error> {
    Ok(BankInfo {
        bank_id: id_to_u64(bank._bankId)?,
        name: bank._name,
        issuing: bank._issuingAddress,
        mint: bank._mintAddress,
        redemption: bank._redemptionAddress,
        general: bank._generalAddress,
    })
}

fn unavailable(err: Error) -> registry::Error {
    registry::Error::Unavailable(err.to_string())
}

/// Handler for the GeneralCBMT participation registry contract.
pub struct GeneralCbmtHandler<T: Transport + Clone, P: Provider<T, N>, N: Network> {
    pub contract: GeneralCbmtContractInstance<T, P, N>,
    confirmations: u64,
}

impl<T, P, N> GeneralCbmtHandler<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N>,
    N: Network,
{
    /// Create a new GeneralCBMT contract instance.
    pub fn new(contract_address: Address, provider: P) -> Self {
        let contract = GeneralCbmtContract::new(contract_address, provider);
        GeneralCbmtHandler {
            contract,
            confirmations: 1,
        }
    }

    /// Number of confirmations to wait for on state changing calls.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    /// Bank id counter. The next registered bank receives this id.
    pub async fn current_bank_id(&self) -> Result<BankId, Error> {
        let id = self
            .contract
            .getCurrentBankId()
            .call()
            .await
            .inspect_err(|err| error!("Error getting current bank id: {err:?}"))?
            ._0;
        id_to_u64(id)
    }

    /// All registered banks.
    pub async fn participating_banks(&self) -> Result<Vec<BankInfo>, Error> {
        let banks = self
            .contract
            .getParticipatingBanks()
            .call()
            .await
            .inspect_err(|err| error!("Error getting participating banks: {err:?}"))?
            ._0;
        banks.into_iter().map(bank_from).collect()
    }

    pub async fn participating_bank(&self, bank_id: BankId) -> Result<BankInfo, Error> {
        let bank = self
            .contract
            .getParticipatingBank(U256::from(bank_id))
            .call()
            .await
            .inspect_err(|err| error!("Error getting bank {bank_id}: {err:?}"))?
            ._0;
        bank_from(bank)
    }

    pub async fn is_customer_general_address(&self, customer: Address) -> Result<bool, Error> {
        Ok(self
            .contract
            .isCustomerGeneralAddress(customer)
            .call()
            .await?
            ._0)
    }

    pub async fn is_customer_convert_address(&self, customer: Address) -> Result<bool, Error> {
        Ok(self
            .contract
            .isCustomerConvertAddress(customer)
            .call()
            .await?
            ._0)
    }

    /// The general address behind a convert address.
    pub async fn customer_general_address(&self, convert_address: Address) -> Result<Address, Error> {
        Ok(self
            .contract
            .getCustomerGeneralAddress(convert_address)
            .call()
            .await?
            ._0)
    }

    /// Convert addresses the customer registered with `bank_id`.
    pub async fn customer_convert_addresses(
        &self,
        general_address: Address,
        bank_id: BankId,
    ) -> Result<Vec<Address>, Error> {
        Ok(self
            .contract
            .getCustomerConvertAddressFromGeneralAndBankId(general_address, U256::from(bank_id))
            .call()
            .await?
            ._0)
    }

    pub async fn is_customer_supported_currency(
        &self,
        bank_id: BankId,
        customer: Address,
        currency_id: CurrencyId,
    ) -> Result<bool, Error> {
        Ok(self
            .contract
            .isCustomerSupportedCurrency(U256::from(bank_id), customer, U256::from(currency_id))
            .call()
            .await?
            ._0)
    }

    pub async fn is_customer_preferred_issuer(
        &self,
        customer: Address,
        currency_id: CurrencyId,
        bank_id: BankId,
    ) -> Result<bool, Error> {
        Ok(self
            .contract
            .isCustomerPreferredIssuerForCurrency(
                customer,
                U256::from(currency_id),
                U256::from(bank_id),
            )
            .call()
            .await?
            ._0)
    }

    pub async fn contract_version(&self) -> Result<String, Error> {
        Ok(self.contract.getContractVersion().call().await?._0)
    }

    /// Register a new participating bank with its four role addresses.
    pub async fn add_participating_bank(
        &self,
        issuing: Address,
        mint: Address,
        redemption: Address,
        general: Address,
        name: &str,
    ) -> Result<TxHash, Error> {
        debug!("Adding participating bank {name}");
        let call = self
            .contract
            .addParticipatingBank(issuing, mint, redemption, general, name.to_string());
        let pending_tx_builder = call
            .send()
            .await
            .inspect_err(|err| error!("Error adding participating bank {name}: {err:?}"))?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        debug!("Added participating bank {name} in tx {tx_hash:?}");
        Ok(tx_hash)
    }

    /// Whitelist a customer address for a bank.
    pub async fn add_to_whitelist(
        &self,
        bank_id: BankId,
        customer: Address,
    ) -> Result<TxHash, Error> {
        debug!("Whitelisting {customer} for bank {bank_id}");
        let call = self.contract.addToWhitelist(U256::from(bank_id), customer);
        let pending_tx_builder = call
            .send()
            .await
            .inspect_err(|err| error!("Error whitelisting {customer} for bank {bank_id}: {err:?}"))?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    pub async fn remove_from_whitelist(
        &self,
        bank_id: BankId,
        customer: Address,
    ) -> Result<TxHash, Error> {
        debug!("Removing {customer} from the whitelist of bank {bank_id}");
        let call = self
            .contract
            .removeFromWhitelist(U256::from(bank_id), customer);
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error removing {customer} from the whitelist of bank {bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    /// Register the customer's general address with a bank. Signed with the
    /// customer's convert key, which becomes the convert address.
    pub async fn register_customer(
        &self,
        bank_id: BankId,
        general_address: Address,
    ) -> Result<TxHash, Error> {
        debug!("Registering customer {general_address} with bank {bank_id}");
        let call = self
            .contract
            .registerCustomer(U256::from(bank_id), general_address);
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error registering customer {general_address} with bank {bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    pub async fn add_currency_to_customer(
        &self,
        bank_id: BankId,
        convert_address: Address,
        currency_ids: &[CurrencyId],
    ) -> Result<TxHash, Error> {
        debug!("Adding currencies {currency_ids:?} to {convert_address} for bank {bank_id}");
        let currency_ids: Vec<U256> = currency_ids.iter().map(|id| U256::from(*id)).collect();
        let call = self
            .contract
            .addCurrencyToCustomer(U256::from(bank_id), convert_address, currency_ids);
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error adding currencies to {convert_address} for bank {bank_id}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }

    pub async fn remove_currency_from_customer(
        &self,
        bank_id: BankId,
        convert_address: Address,
        currency_id: CurrencyId,
    ) -> Result<TxHash, Error> {
        debug!("Removing currency {currency_id} from {convert_address} for bank {bank_id}");
        let call = self.contract.removeCurrencyFromCustomer(
            U256::from(bank_id),
            convert_address,
            U256::from(currency_id),
        );
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!("Error removing currency {currency_id} from {convert_address}: {err:?}")
        })?;
        let tx_hash = pending_tx_builder
            .with_required_confirmations(self.confirmations)
            .watch()
            .await?;
        Ok(tx_hash)
    }
}

#[async_trait]
impl<T, P, N> ReadOnlyRegistry for GeneralCbmtHandler<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N>,
    N: Network,
{
    async fn participating_banks(&self) -> Result<Vec<BankInfo>, registry::Error> {
        self.participating_banks().await.map_err(unavailable)
    }

    async fn is_general_address(&self, address: Address) -> Result<bool, registry::Error> {
        self.is_customer_general_address(address)
            .await
            .map_err(unavailable)
    }

    async fn is_convert_address(&self, address: Address) -> Result<bool, registry::Error> {
        self.is_customer_convert_address(address)
            .await
            .map_err(unavailable)
    }

    async fn is_preferred_issuer(
        &self,
        address: Address,
        currency_id: CurrencyId,
        bank_id: BankId,
    ) -> Result<bool, registry::Error> {
        self.is_customer_preferred_issuer(address, currency_id, bank_id)
            .await
            .map_err(unavailable)
    }

    async fn is_currency_supported(
        &self,
        bank_id: BankId,
        address: Address,
        currency_id: CurrencyId,
    ) -> Result<bool, registry::Error> {
        self.is_customer_supported_currency(bank_id, address, currency_id)
            .await
            .map_err(unavailable)
    }
}
