// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use crate::common::{Address, EthereumWallet};
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Credential store is empty")]
    EmptyStore,
    #[error("Failed to read credential file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Credential file {0} declares both PRIVATE_KEY and MNEMONIC")]
    BothKeySources(PathBuf),
    #[error("Credential file {0} declares neither PRIVATE_KEY nor MNEMONIC")]
    NoKeySource(PathBuf),
    #[error("Credential file {0} declares an invalid PUBLIC_KEY")]
    DeclaredAddressInvalid(PathBuf),
    #[error("Private key is invalid")]
    PrivateKeyInvalid,
    #[error("Mnemonic is invalid: {0}")]
    MnemonicInvalid(String),
    #[error("Declared address {declared} does not match {derived} derived from the key material")]
    AddressMismatch { declared: Address, derived: Address },
    #[error("Address {address} is claimed by both {first} and {second}")]
    AmbiguousMatch {
        address: Address,
        first: String,
        second: String,
    },
    #[error("No credential loaded for {entity} with role {role}")]
    UnknownCredential { entity: String, role: Role },
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// The roles key material is kept under. Banks hold the first four,
/// customers hold general and convert keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Issuing,
    Mint,
    Redemption,
    General,
    Convert,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Issuing,
        Role::Mint,
        Role::Redemption,
        Role::General,
        Role::Convert,
    ];

    /// Suffix used in credential file names.
    pub fn suffix(self) -> &'static str {
        match self {
            Role::Issuing => "issuing",
            Role::Mint => "mint",
            Role::Redemption => "redemption",
            Role::General => "ga",
            Role::Convert => "ca",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.suffix() == suffix)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "issuing" => Ok(Role::Issuing),
            "mint" => Ok(Role::Mint),
            "redemption" => Ok(Role::Redemption),
            "ga" | "general" => Ok(Role::General),
            "ca" | "convert" => Ok(Role::Convert),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

/// Exactly one source of key material backs a credential.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    PrivateKey(String),
    Mnemonic {
        phrase: String,
        derivation_path: Option<String>,
    },
}

impl KeyMaterial {
    /// Build the signer, deriving from the mnemonic where needed.
    pub fn signer(&self) -> Result<PrivateKeySigner, Error> {
        match self {
            KeyMaterial::PrivateKey(key) => key.parse::<PrivateKeySigner>().map_err(|err| {
                error!("Error parsing private key: {err}");
                Error::PrivateKeyInvalid
            }),
            KeyMaterial::Mnemonic {
                phrase,
                derivation_path,
            } => {
                let mut builder = MnemonicBuilder::<English>::default().phrase(phrase.as_str());
                if let Some(path) = derivation_path {
                    builder = builder
                        .derivation_path(path)
                        .map_err(|err| Error::MnemonicInvalid(err.to_string()))?;
                }
                builder
                    .build()
                    .map_err(|err| Error::MnemonicInvalid(err.to_string()))
            }
        }
    }

    /// Address of the signing key.
    pub fn address(&self) -> Result<Address, Error> {
        Ok(self.signer()?.address())
    }
}

// Key material must never end up in logs.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::PrivateKey(_) => write!(f, "KeyMaterial::PrivateKey(..)"),
            KeyMaterial::Mnemonic { .. } => write!(f, "KeyMaterial::Mnemonic(..)"),
        }
    }
}

/// A named keypair from the configuration store.
#[derive(Clone, Debug)]
pub struct Credential {
    pub entity: String,
    pub role: Role,
    pub address: Address,
    material: KeyMaterial,
}

impl Credential {
    /// Build a credential, verifying any declared address against the one
    /// derived from the key material.
    pub fn new(
        entity: impl Into<String>,
        role: Role,
        material: KeyMaterial,
        declared_address: Option<Address>,
    ) -> Result<Self, Error> {
        let derived = material.address()?;
        if let Some(declared) = declared_address {
            if declared != derived {
                return Err(Error::AddressMismatch {
                    declared,
                    derived,
                });
            }
        }
        Ok(Self {
            entity: entity.into(),
            role,
            address: derived,
            material,
        })
    }

    pub fn signer(&self) -> Result<PrivateKeySigner, Error> {
        self.material.signer()
    }

    /// Wallet for transaction signing.
    pub fn wallet(&self) -> Result<EthereumWallet, Error> {
        Ok(EthereumWallet::from(self.signer()?))
    }

    /// Load a credential from a `KEY=value` file holding a `PRIVATE_KEY` or
    /// a `MNEMONIC` entry (never both), an optional `DERIVATION_PATH` for
    /// the latter, and an optional declared `PUBLIC_KEY`.
    pub fn from_env_file(
        entity: impl Into<String>,
        role: Role,
        path: &Path,
    ) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = parse_env_entries(&contents);

        let material = match (entries.get("PRIVATE_KEY"), entries.get("MNEMONIC")) {
            (Some(_), Some(_)) => return Err(Error::BothKeySources(path.to_path_buf())),
            (None, None) => return Err(Error::NoKeySource(path.to_path_buf())),
            (Some(key), None) => KeyMaterial::PrivateKey(key.clone()),
            (None, Some(phrase)) => KeyMaterial::Mnemonic {
                phrase: phrase.clone(),
                derivation_path: entries.get("DERIVATION_PATH").cloned(),
            },
        };

        let declared = match entries.get("PUBLIC_KEY") {
            Some(addr) => Some(
                Address::from_str(addr)
                    .map_err(|_| Error::DeclaredAddressInvalid(path.to_path_buf()))?,
            ),
            None => None,
        };

        Credential::new(entity, role, material, declared)
    }
}

fn parse_env_entries(contents: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            entries.insert(
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            );
        }
    }
    entries
}

/// Split a `{entity}-{role}` profile name. A bare entity name maps to its
/// general role.
pub fn parse_profile(name: &str) -> (String, Role) {
    if let Some((entity, suffix)) = name.rsplit_once('-') {
        if let Some(role) = Role::from_suffix(suffix) {
            return (entity.to_string(), role);
        }
    }
    (name.to_string(), Role::General)
}

/// Parse `.{entity}-{role}.env` into entity and role.
fn parse_credential_file_name(path: &Path) -> Option<(String, Role)> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_prefix('.')?.strip_suffix(".env")?;
    let (entity, suffix) = name.rsplit_once('-')?;
    let role = Role::from_suffix(suffix)?;
    if entity.is_empty() {
        return None;
    }
    Some((entity.to_string(), role))
}

/// All credentials available to the current profile, indexed by address.
///
/// The index is built while credentials are inserted; an address claimed by
/// two entities is rejected up front instead of surfacing as a surprising
/// signer pick later.
#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: Vec<Credential>,
    by_address: HashMap<Address, usize>,
    primary: Option<usize>,
    general_fallback: Option<usize>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.{entity}-{role}.env` credential file in the directory.
    ///
    /// Files with an unknown role suffix are skipped. Entries are loaded in
    /// file name order so the pool default stays deterministic.
    pub fn load_from_dir(dir: &Path) -> Result<Self, Error> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| Error::Read {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .collect();
        paths.sort();

        let mut store = CredentialStore::new();
        for path in paths {
            let (entity, role) = match parse_credential_file_name(&path) {
                Some(parsed) => parsed,
                None => continue,
            };
            let credential = Credential::from_env_file(entity, role, &path)?;
            debug!(
                "Loaded credential {} ({role}) with address {} from {path:?}",
                credential.entity, credential.address
            );
            store.insert(credential)?;
        }

        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credentials(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    /// Add a credential to the pool.
    pub fn insert(&mut self, credential: Credential) -> Result<(), Error> {
        if let Some(&existing) = self.by_address.get(&credential.address) {
            let existing = &self.credentials[existing];
            if existing.entity != credential.entity {
                return Err(Error::AmbiguousMatch {
                    address: credential.address,
                    first: existing.entity.clone(),
                    second: credential.entity.clone(),
                });
            }
            // One entity holding a key under several roles keeps the first
            // address mapping.
            self.credentials.push(credential);
            return Ok(());
        }
        self.by_address
            .insert(credential.address, self.credentials.len());
        self.credentials.push(credential);
        Ok(())
    }

    /// Mark the credential that signs when no specific address is requested.
    pub fn set_primary(&mut self, entity: &str, role: Role) -> Result<(), Error> {
        self.primary = Some(self.position(entity, role)?);
        Ok(())
    }

    /// Mark the credential used when a requested address matches nothing in
    /// the pool.
    pub fn set_general_fallback(&mut self, entity: &str, role: Role) -> Result<(), Error> {
        self.general_fallback = Some(self.position(entity, role)?);
        Ok(())
    }

    pub fn primary(&self) -> Option<&Credential> {
        self.primary.map(|index| &self.credentials[index])
    }

    pub fn get(&self, entity: &str, role: Role) -> Option<&Credential> {
        self.credentials
            .iter()
            .find(|credential| credential.entity == entity && credential.role == role)
    }

    pub fn by_address(&self, address: &Address) -> Option<&Credential> {
        self.by_address
            .get(address)
            .map(|&index| &self.credentials[index])
    }

    fn position(&self, entity: &str, role: Role) -> Result<usize, Error> {
        self.credentials
            .iter()
            .position(|credential| credential.entity == entity && credential.role == role)
            .ok_or_else(|| Error::UnknownCredential {
                entity: entity.to_string(),
                role,
            })
    }

    /// Pick the credential that signs for `requested`.
    ///
    /// The primary credential wins when no address is requested or the
    /// requested address is its own. Otherwise the pool is consulted by
    /// address, then the general fallback, then the first loaded credential.
    pub fn resolve_signer(&self, requested: Option<Address>) -> Result<&Credential, Error> {
        if self.credentials.is_empty() {
            return Err(Error::EmptyStore);
        }

        if let Some(primary) = self.primary() {
            match requested {
                None => return Ok(primary),
                Some(requested) if requested == primary.address => return Ok(primary),
                Some(_) => {}
            }
        }

        if let Some(requested) = requested {
            if let Some(credential) = self.by_address(&requested) {
                return Ok(credential);
            }
            debug!("No credential matches requested signer {requested}, falling back");
        }

        if let Some(index) = self.general_fallback {
            return Ok(&self.credentials[index]);
        }

        // Deterministic default: the first credential loaded.
        Ok(&self.credentials[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::LocalSigner;

    // Hardhat's well known developer accounts 0 and 1.
    const DEV_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const DEV_ADDRESS_1: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn random_credential(entity: &str, role: Role) -> Credential {
        let signer: PrivateKeySigner = LocalSigner::random();
        Credential {
            entity: entity.to_string(),
            role,
            address: signer.address(),
            material: KeyMaterial::PrivateKey(alloy::hex::encode(signer.to_bytes())),
        }
    }

    fn dev_address() -> Address {
        DEV_ADDRESS.parse().expect("valid address")
    }

    #[test]
    fn empty_store_fails_resolution() {
        let store = CredentialStore::new();
        assert!(matches!(
            store.resolve_signer(None),
            Err(Error::EmptyStore)
        ));
        assert!(matches!(
            store.resolve_signer(Some(dev_address())),
            Err(Error::EmptyStore)
        ));
    }

    #[test]
    fn primary_wins_without_request() {
        let mut store = CredentialStore::new();
        store.insert(random_credential("dz", Role::Mint)).expect("insert");
        store
            .insert(random_credential("dz", Role::Issuing))
            .expect("insert");
        store.set_primary("dz", Role::Issuing).expect("primary");

        let resolved = store.resolve_signer(None).expect("resolved");
        assert_eq!(resolved.role, Role::Issuing);
    }

    #[test]
    fn primary_wins_for_its_own_address() {
        let mut store = CredentialStore::new();
        store.insert(random_credential("dz", Role::Mint)).expect("insert");
        let primary = random_credential("dz", Role::Issuing);
        let primary_address = primary.address;
        store.insert(primary).expect("insert");
        store.set_primary("dz", Role::Issuing).expect("primary");

        let resolved = store.resolve_signer(Some(primary_address)).expect("resolved");
        assert_eq!(resolved.address, primary_address);
        assert_eq!(resolved.role, Role::Issuing);
    }

    #[test]
    fn unique_address_match_wins() {
        let mut store = CredentialStore::new();
        store.insert(random_credential("dz", Role::Issuing)).expect("insert");
        let pooled = random_credential("evonik", Role::General);
        let pooled_address = pooled.address;
        store.insert(pooled).expect("insert");
        store.insert(random_credential("basf", Role::General)).expect("insert");
        store.set_primary("dz", Role::Issuing).expect("primary");

        let resolved = store.resolve_signer(Some(pooled_address)).expect("resolved");
        assert_eq!(resolved.entity, "evonik");
        assert_eq!(resolved.address, pooled_address);
    }

    #[test]
    fn unmatched_request_falls_back_to_general() {
        let mut store = CredentialStore::new();
        store.insert(random_credential("dz", Role::Issuing)).expect("insert");
        store.insert(random_credential("dz", Role::General)).expect("insert");
        store.set_primary("dz", Role::Issuing).expect("primary");
        store
            .set_general_fallback("dz", Role::General)
            .expect("fallback");

        let stranger: PrivateKeySigner = LocalSigner::random();
        let resolved = store
            .resolve_signer(Some(stranger.address()))
            .expect("resolved");
        assert_eq!(resolved.role, Role::General);
    }

    #[test]
    fn unmatched_request_falls_back_to_first() {
        let mut store = CredentialStore::new();
        store.insert(random_credential("dz", Role::Issuing)).expect("insert");
        store.insert(random_credential("dz", Role::Mint)).expect("insert");

        let stranger: PrivateKeySigner = LocalSigner::random();
        let resolved = store
            .resolve_signer(Some(stranger.address()))
            .expect("resolved");
        assert_eq!(resolved.role, Role::Issuing);
    }

    #[test]
    fn duplicate_address_across_entities_is_ambiguous() {
        let signer: PrivateKeySigner = LocalSigner::random();
        let key = alloy::hex::encode(signer.to_bytes());
        let first = Credential {
            entity: "evonik".to_string(),
            role: Role::General,
            address: signer.address(),
            material: KeyMaterial::PrivateKey(key.clone()),
        };
        let second = Credential {
            entity: "basf".to_string(),
            role: Role::Convert,
            address: signer.address(),
            material: KeyMaterial::PrivateKey(key),
        };

        let mut store = CredentialStore::new();
        store.insert(first).expect("insert");
        match store.insert(second) {
            Err(Error::AmbiguousMatch { first, second, .. }) => {
                assert_eq!(first, "evonik");
                assert_eq!(second, "basf");
            }
            other => panic!("Expected ambiguous match, got {other:?}"),
        }
    }

    #[test]
    fn same_entity_may_reuse_a_key() {
        let signer: PrivateKeySigner = LocalSigner::random();
        let key = alloy::hex::encode(signer.to_bytes());
        let mut store = CredentialStore::new();
        for role in [Role::Mint, Role::Redemption] {
            store
                .insert(Credential {
                    entity: "dz".to_string(),
                    role,
                    address: signer.address(),
                    material: KeyMaterial::PrivateKey(key.clone()),
                })
                .expect("insert");
        }
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn private_key_file_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".dz-issuing.env");
        fs::write(
            &path,
            format!("PUBLIC_KEY={DEV_ADDRESS}\nPRIVATE_KEY={DEV_PRIVATE_KEY}\n"),
        )
        .expect("write");

        let credential =
            Credential::from_env_file("dz", Role::Issuing, &path).expect("credential");
        assert_eq!(credential.address, dev_address());
        assert_eq!(credential.entity, "dz");
    }

    #[test]
    fn mnemonic_file_derives_expected_address() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".evonik-ga.env");
        fs::write(&path, format!("MNEMONIC=\"{DEV_MNEMONIC}\"\n")).expect("write");

        let credential =
            Credential::from_env_file("evonik", Role::General, &path).expect("credential");
        assert_eq!(credential.address, dev_address());
    }

    #[test]
    fn mnemonic_derivation_path_is_honored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".evonik-ca.env");
        fs::write(
            &path,
            format!("MNEMONIC=\"{DEV_MNEMONIC}\"\nDERIVATION_PATH=m/44'/60'/0'/0/1\n"),
        )
        .expect("write");

        let credential =
            Credential::from_env_file("evonik", Role::Convert, &path).expect("credential");
        assert_eq!(
            credential.address,
            DEV_ADDRESS_1.parse::<Address>().expect("valid address")
        );
    }

    #[test]
    fn both_key_sources_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".dz-mint.env");
        fs::write(
            &path,
            format!("PRIVATE_KEY={DEV_PRIVATE_KEY}\nMNEMONIC=\"{DEV_MNEMONIC}\"\n"),
        )
        .expect("write");

        assert!(matches!(
            Credential::from_env_file("dz", Role::Mint, &path),
            Err(Error::BothKeySources(_))
        ));
    }

    #[test]
    fn missing_key_sources_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".dz-mint.env");
        fs::write(&path, format!("PUBLIC_KEY={DEV_ADDRESS}\n")).expect("write");

        assert!(matches!(
            Credential::from_env_file("dz", Role::Mint, &path),
            Err(Error::NoKeySource(_))
        ));
    }

    #[test]
    fn mismatched_declared_address_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".dz-ga.env");
        fs::write(
            &path,
            format!("PUBLIC_KEY={DEV_ADDRESS_1}\nPRIVATE_KEY={DEV_PRIVATE_KEY}\n"),
        )
        .expect("write");

        assert!(matches!(
            Credential::from_env_file("dz", Role::General, &path),
            Err(Error::AddressMismatch { .. })
        ));
    }

    #[test]
    fn load_from_dir_scans_credential_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer: PrivateKeySigner = LocalSigner::random();
        let other: PrivateKeySigner = LocalSigner::random();
        fs::write(
            dir.path().join(".dz-issuing.env"),
            format!("PRIVATE_KEY={}\n", alloy::hex::encode(signer.to_bytes())),
        )
        .expect("write");
        fs::write(
            dir.path().join(".evonik-ga.env"),
            format!("PRIVATE_KEY={}\n", alloy::hex::encode(other.to_bytes())),
        )
        .expect("write");
        // Not credential files; skipped.
        fs::write(dir.path().join("README.md"), "notes\n").expect("write");
        fs::write(dir.path().join(".deployment.env"), "RPC_URL=x\n").expect("write");

        let store = CredentialStore::load_from_dir(dir.path()).expect("store");
        assert_eq!(store.len(), 2);
        assert!(store.get("dz", Role::Issuing).is_some());
        assert!(store.get("evonik", Role::General).is_some());
    }

    #[test]
    fn profile_names_split_into_entity_and_role() {
        assert_eq!(
            parse_profile("dz-issuing"),
            ("dz".to_string(), Role::Issuing)
        );
        assert_eq!(
            parse_profile("bank-300-mint"),
            ("bank-300".to_string(), Role::Mint)
        );
        assert_eq!(parse_profile("evonik-ca"), ("evonik".to_string(), Role::Convert));
        assert_eq!(parse_profile("evonik"), ("evonik".to_string(), Role::General));
    }
}
