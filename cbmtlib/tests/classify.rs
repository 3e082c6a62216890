use async_trait::async_trait;
use cbmtlib::classify::{classify_transfer, Error, TransferCase, TransferIntent};
use cbmtlib::common::{Address, BankId, Currency, CurrencyId, TokenId};
use cbmtlib::registry::{BankInfo, Error as RegistryError, InMemoryRegistry, ReadOnlyRegistry};
use cbmtlib::units::TokenUnits;
use cbmtlib::utils::dummy_address;
use std::sync::atomic::{AtomicUsize, Ordering};

const DZ: BankId = 1000;
const UNICREDIT: BankId = 2000;

fn intent(receiver: Address, token_id: TokenId) -> TransferIntent {
    TransferIntent {
        sender: dummy_address(),
        receiver,
        token_id,
        amount: TokenUnits::from_tokens(25),
        label: Some("invoice 4711".to_string()),
    }
}

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

/// Registry with one general customer and one convert customer that prefers
/// DZ as EUR issuer and supports EUR within DZ.
fn fixture() -> (InMemoryRegistry, Address, Address) {
    let general_customer = dummy_address();
    let convert_customer = dummy_address();
    let registry = InMemoryRegistry::new()
        .with_bank(bank(DZ, "DZ Bank"))
        .with_bank(bank(UNICREDIT, "Unicredit"))
        .with_general_customer(general_customer)
        .with_convert_customer(convert_customer)
        .with_preferred_issuer(convert_customer, Currency::Eur.id(), DZ)
        .with_supported_currency(DZ, convert_customer, Currency::Eur.id());
    (registry, general_customer, convert_customer)
}

#[tokio::test]
async fn general_receiver_classifies_as_direct_transfer() {
    let (registry, general_customer, _) = fixture();

    let classification = classify_transfer(
        &registry,
        &intent(general_customer, TokenId::new(UNICREDIT, Currency::Usd)),
    )
    .await
    .expect("classification");

    assert_eq!(classification.case, TransferCase::DirectGeneralTransfer);
    assert_eq!(classification.token_issuer, UNICREDIT);
    assert_eq!(classification.token_currency, Currency::Usd.id());
}

#[tokio::test]
async fn supported_issuer_and_currency() {
    let (registry, _, convert_customer) = fixture();

    let classification = classify_transfer(
        &registry,
        &intent(convert_customer, TokenId::new(DZ, Currency::Eur)),
    )
    .await
    .expect("classification");

    assert_eq!(
        classification.case,
        TransferCase::SupportedIssuerSupportedCurrency
    );
    assert!(classification.case.is_direct());
}

#[tokio::test]
async fn supported_issuer_with_unsupported_currency() {
    let (registry, _, convert_customer) = fixture();
    // USD from DZ is preferred but not in the supported set.
    let registry = registry.with_preferred_issuer(convert_customer, Currency::Usd.id(), DZ);

    let classification = classify_transfer(
        &registry,
        &intent(convert_customer, TokenId::new(DZ, Currency::Usd)),
    )
    .await
    .expect("classification");

    assert_eq!(
        classification.case,
        TransferCase::SupportedIssuerUnsupportedCurrency
    );
}

#[tokio::test]
async fn unsupported_issuer_with_supported_currency() {
    let (registry, _, convert_customer) = fixture();
    // EUR is supported within Unicredit, but Unicredit is not a preferred issuer.
    let registry = registry.with_supported_currency(UNICREDIT, convert_customer, Currency::Eur.id());

    let classification = classify_transfer(
        &registry,
        &intent(convert_customer, TokenId::new(UNICREDIT, Currency::Eur)),
    )
    .await
    .expect("classification");

    assert_eq!(
        classification.case,
        TransferCase::UnsupportedIssuerSupportedCurrency
    );
    assert!(!classification.case.is_direct());
}

#[tokio::test]
async fn unsupported_issuer_and_currency() {
    let (registry, _, convert_customer) = fixture();

    let classification = classify_transfer(
        &registry,
        &intent(convert_customer, TokenId::new(UNICREDIT, Currency::Usd)),
    )
    .await
    .expect("classification");

    assert_eq!(
        classification.case,
        TransferCase::UnsupportedIssuerUnsupportedCurrency
    );
}

#[tokio::test]
async fn unregistered_receiver_is_rejected() {
    let (registry, _, _) = fixture();
    let stranger = dummy_address();

    let result = classify_transfer(
        &registry,
        &intent(stranger, TokenId::new(DZ, Currency::Eur)),
    )
    .await;

    match result {
        Err(Error::ReceiverUnregistered(address)) => assert_eq!(address, stranger),
        other => panic!("Expected unregistered receiver error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_token_currency_is_rejected() {
    let (registry, general_customer, _) = fixture();
    let odd_token = TokenId::from_raw(DZ + 999);

    let result = classify_transfer(&registry, &intent(general_customer, odd_token)).await;

    match result {
        Err(Error::UnknownTokenCurrency(token_id)) => assert_eq!(token_id, odd_token),
        other => panic!("Expected unknown currency error, got {other:?}"),
    }
}

struct FailingRegistry;

#[async_trait]
impl ReadOnlyRegistry for FailingRegistry {
    async fn participating_banks(&self) -> Result<Vec<BankInfo>, RegistryError> {
        Err(RegistryError::Unavailable("rpc node is down".to_string()))
    }

    async fn is_general_address(&self, _address: Address) -> Result<bool, RegistryError> {
        Err(RegistryError::Unavailable("rpc node is down".to_string()))
    }

    async fn is_convert_address(&self, _address: Address) -> Result<bool, RegistryError> {
        Err(RegistryError::Unavailable("rpc node is down".to_string()))
    }

    async fn is_preferred_issuer(
        &self,
        _address: Address,
        _currency_id: CurrencyId,
        _bank_id: BankId,
    ) -> Result<bool, RegistryError> {
        Err(RegistryError::Unavailable("rpc node is down".to_string()))
    }

    async fn is_currency_supported(
        &self,
        _bank_id: BankId,
        _address: Address,
        _currency_id: CurrencyId,
    ) -> Result<bool, RegistryError> {
        Err(RegistryError::Unavailable("rpc node is down".to_string()))
    }
}

#[tokio::test]
async fn registry_outage_surfaces_as_registry_error() {
    let result = classify_transfer(
        &FailingRegistry,
        &intent(dummy_address(), TokenId::new(DZ, Currency::Eur)),
    )
    .await;

    assert!(matches!(result, Err(Error::Registry(_))));
}

struct CountingRegistry {
    inner: InMemoryRegistry,
    convert_lookups: AtomicUsize,
}

#[async_trait]
impl ReadOnlyRegistry for CountingRegistry {
    async fn participating_banks(&self) -> Result<Vec<BankInfo>, RegistryError> {
        self.inner.participating_banks().await
    }

    async fn is_general_address(&self, address: Address) -> Result<bool, RegistryError> {
        self.inner.is_general_address(address).await
    }

    async fn is_convert_address(&self, address: Address) -> Result<bool, RegistryError> {
        let _ = self.convert_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.is_convert_address(address).await
    }

    async fn is_preferred_issuer(
        &self,
        address: Address,
        currency_id: CurrencyId,
        bank_id: BankId,
    ) -> Result<bool, RegistryError> {
        let _ = self.convert_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner
            .is_preferred_issuer(address, currency_id, bank_id)
            .await
    }

    async fn is_currency_supported(
        &self,
        bank_id: BankId,
        address: Address,
        currency_id: CurrencyId,
    ) -> Result<bool, RegistryError> {
        let _ = self.convert_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner
            .is_currency_supported(bank_id, address, currency_id)
            .await
    }
}

#[tokio::test]
async fn general_receiver_skips_convert_lookups() {
    let general_customer = dummy_address();
    let registry = CountingRegistry {
        inner: InMemoryRegistry::new().with_general_customer(general_customer),
        convert_lookups: AtomicUsize::new(0),
    };

    let classification = classify_transfer(
        &registry,
        &intent(general_customer, TokenId::new(DZ, Currency::Eur)),
    )
    .await
    .expect("classification");

    assert_eq!(classification.case, TransferCase::DirectGeneralTransfer);
    assert_eq!(registry.convert_lookups.load(Ordering::SeqCst), 0);
}
