// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use crate::common::{Address, BankId, CurrencyId};
use crate::credential::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Bank registry is unavailable: {0}")]
    Unavailable(String),
}

/// One participating bank as registered on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankInfo {
    pub bank_id: BankId,
    pub name: String,
    pub issuing: Address,
    pub mint: Address,
    pub redemption: Address,
    pub general: Address,
}

impl BankInfo {
    /// The bank's address for a role, if banks hold that role at all.
    pub fn address_for(&self, role: Role) -> Option<Address> {
        match role {
            Role::Issuing => Some(self.issuing),
            Role::Mint => Some(self.mint),
            Role::Redemption => Some(self.redemption),
            Role::General => Some(self.general),
            Role::Convert => None,
        }
    }
}

/// Read side of the participation registry. Backed by the GeneralCBMT
/// contract in production and by [`InMemoryRegistry`] in tests.
#[async_trait]
pub trait ReadOnlyRegistry {
    async fn participating_banks(&self) -> Result<Vec<BankInfo>, Error>;

    /// Whether `address` is a registered customer general address.
    async fn is_general_address(&self, address: Address) -> Result<bool, Error>;

    /// Whether `address` is a registered customer convert address.
    async fn is_convert_address(&self, address: Address) -> Result<bool, Error>;

    /// Whether the customer at `address` accepts tokens of `currency_id`
    /// issued by `bank_id`.
    async fn is_preferred_issuer(
        &self,
        address: Address,
        currency_id: CurrencyId,
        bank_id: BankId,
    ) -> Result<bool, Error>;

    /// Whether the customer at `address` supports `currency_id` within
    /// `bank_id`.
    async fn is_currency_supported(
        &self,
        bank_id: BankId,
        address: Address,
        currency_id: CurrencyId,
    ) -> Result<bool, Error>;
}

/// Bank roster fetched once and indexed by address.
///
/// Looking up which bank an address belongs to is a map hit here instead of
/// a walk over the roster per query.
#[derive(Clone, Debug, Default)]
pub struct RegistrySnapshot {
    banks: Vec<BankInfo>,
    by_address: HashMap<Address, (BankId, Role)>,
}

impl RegistrySnapshot {
    /// Fetch the roster from the registry and index it.
    pub async fn load<R>(registry: &R) -> Result<Self, Error>
    where
        R: ReadOnlyRegistry + Sync + ?Sized,
    {
        let banks = registry.participating_banks().await?;
        Ok(Self::from_banks(banks))
    }

    pub fn from_banks(banks: Vec<BankInfo>) -> Self {
        let mut by_address = HashMap::new();
        for bank in &banks {
            for role in [Role::Issuing, Role::Mint, Role::Redemption, Role::General] {
                let address = match bank.address_for(role) {
                    Some(address) => address,
                    None => continue,
                };
                if let Some((other, _)) = by_address.insert(address, (bank.bank_id, role)) {
                    if other != bank.bank_id {
                        warn!(
                            "Address {address} is registered for bank {other} and bank {}",
                            bank.bank_id
                        );
                    }
                }
            }
        }
        Self { banks, by_address }
    }

    pub fn banks(&self) -> &[BankInfo] {
        &self.banks
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    pub fn bank(&self, bank_id: BankId) -> Option<&BankInfo> {
        self.banks.iter().find(|bank| bank.bank_id == bank_id)
    }

    pub fn bank_by_name(&self, name: &str) -> Option<&BankInfo> {
        self.banks
            .iter()
            .find(|bank| bank.name.eq_ignore_ascii_case(name))
    }

    /// The bank and role an address is registered under, if any.
    pub fn role_of(&self, address: &Address) -> Option<(BankId, Role)> {
        self.by_address.get(address).copied()
    }

    pub fn bank_of(&self, address: &Address) -> Option<&BankInfo> {
        let (bank_id, _) = self.role_of(address)?;
        self.bank(bank_id)
    }
}

/// In-memory registry for tests and local tooling.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRegistry {
    pub banks: Vec<BankInfo>,
    pub general_addresses: HashSet<Address>,
    pub convert_addresses: HashSet<Address>,
    pub preferred_issuers: HashSet<(Address, CurrencyId, BankId)>,
    pub supported_currencies: HashSet<(BankId, Address, CurrencyId)>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bank(mut self, bank: BankInfo) -> Self {
        self.banks.push(bank);
        self
    }

    pub fn with_general_customer(mut self, address: Address) -> Self {
        let _ = self.general_addresses.insert(address);
        self
    }

    pub fn with_convert_customer(mut self, address: Address) -> Self {
        let _ = self.convert_addresses.insert(address);
        self
    }

    pub fn with_preferred_issuer(
        mut self,
        address: Address,
        currency_id: CurrencyId,
        bank_id: BankId,
    ) -> Self {
        let _ = self.preferred_issuers.insert((address, currency_id, bank_id));
        self
    }

    pub fn with_supported_currency(
        mut self,
        bank_id: BankId,
        address: Address,
        currency_id: CurrencyId,
    ) -> Self {
        let _ = self
            .supported_currencies
            .insert((bank_id, address, currency_id));
        self
    }
}

#[async_trait]
impl ReadOnlyRegistry for InMemoryRegistry {
    async fn participating_banks(&self) -> Result<Vec<BankInfo>, Error> {
        Ok(self.banks.clone())
    }

    async fn is_general_address(&self, address: Address) -> Result<bool, Error> {
        Ok(self.general_addresses.contains(&address))
    }

    async fn is_convert_address(&self, address: Address) -> Result<bool, Error> {
        Ok(self.convert_addresses.contains(&address))
    }

    async fn is_preferred_issuer(
        &self,
        address: Address,
        currency_id: CurrencyId,
        bank_id: BankId,
    ) -> Result<bool, Error> {
        Ok(self.preferred_issuers.contains(&(address, currency_id, bank_id)))
    }

    async fn is_currency_supported(
        &self,
        bank_id: BankId,
        address: Address,
        currency_id: CurrencyId,
    ) -> Result<bool, Error> {
        Ok(self
            .supported_currencies
            .contains(&(bank_id, address, currency_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dummy_address;

    fn bank(bank_id: BankId, name: &str) -> BankInfo {
        BankInfo {
            bank_id,
            name: name.to_string(),
            issuing: dummy_address(),
            mint: dummy_address(),
            redemption: dummy_address(),
            general: dummy_address(),
        }
    }

    #[test]
    fn snapshot_indexes_every_bank_role() {
        let dz = bank(1000, "DZ Bank");
        let uc = bank(2000, "Unicredit");
        let snapshot = RegistrySnapshot::from_banks(vec![dz.clone(), uc.clone()]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.role_of(&dz.issuing), Some((1000, Role::Issuing)));
        assert_eq!(snapshot.role_of(&dz.mint), Some((1000, Role::Mint)));
        assert_eq!(
            snapshot.role_of(&dz.redemption),
            Some((1000, Role::Redemption))
        );
        assert_eq!(snapshot.role_of(&uc.general), Some((2000, Role::General)));
        assert_eq!(snapshot.role_of(&dummy_address()), None);
    }

    #[test]
    fn snapshot_resolves_banks_by_id_and_name() {
        let snapshot =
            RegistrySnapshot::from_banks(vec![bank(1000, "DZ Bank"), bank(2000, "Unicredit")]);

        assert_eq!(
            snapshot.bank(2000).map(|bank| bank.name.as_str()),
            Some("Unicredit")
        );
        assert!(snapshot.bank(3000).is_none());
        assert_eq!(
            snapshot.bank_by_name("dz bank").map(|bank| bank.bank_id),
            Some(1000)
        );

        let uc_general = snapshot
            .bank(2000)
            .map(|bank| bank.general)
            .unwrap_or_default();
        assert_eq!(
            snapshot.bank_of(&uc_general).map(|bank| bank.bank_id),
            Some(2000)
        );
    }

    #[tokio::test]
    async fn snapshot_loads_from_a_registry() {
        let registry = InMemoryRegistry::new()
            .with_bank(bank(1000, "DZ Bank"))
            .with_bank(bank(2000, "Unicredit"));

        let snapshot = RegistrySnapshot::load(&registry).await.expect("snapshot");
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.bank(1000).is_some());
    }
}
