// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use cbmtlib::common::Address;
use cbmtlib::credential::{parse_profile, Credential, CredentialStore, Role};
use color_eyre::{
    eyre::{eyre, Context, Result},
    Section,
};
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn default_credentials_dir() -> Result<PathBuf> {
    let mut dir = dirs_next::data_dir()
        .ok_or_else(|| eyre!("Failed to obtain data dir, your OS might not be supported."))?;
    dir.push("cbmt");
    dir.push("credentials");
    std::fs::create_dir_all(dir.as_path())
        .wrap_err("Failed to create credentials dir")
        .with_suggestion(|| {
            format!("make sure you have the correct permissions to access {dir:?}")
        })?;
    Ok(dir)
}

/// Load the credential pool and mark the `--as` profile as the primary
/// signer. The profile entity's general key, when loaded, becomes the
/// fallback for requested addresses that match nothing in the pool.
pub fn load_credentials(
    credentials_dir: Option<&Path>,
    act_as: Option<&str>,
) -> Result<CredentialStore> {
    let dir = match credentials_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_credentials_dir()?,
    };
    let mut store = CredentialStore::load_from_dir(&dir)
        .wrap_err(format!("Failed to load credentials from {dir:?}"))
        .with_suggestion(|| {
            "credential files are named `.{entity}-{role}.env` and hold a PRIVATE_KEY or a MNEMONIC entry"
        })?;
    debug!("Loaded {} credentials from {dir:?}", store.len());

    if let Some(profile) = act_as {
        let (entity, role) = parse_profile(profile);
        store
            .set_primary(&entity, role)
            .wrap_err(format!("No credential matches the profile {profile}"))
            .with_suggestion(|| {
                "roles are issuing, mint, redemption, ga and ca, e.g. `--as dz-issuing`"
            })?;
        if store.get(&entity, Role::General).is_some() {
            store.set_general_fallback(&entity, Role::General)?;
        }
    }

    Ok(store)
}

/// Pick the signing credential for an optional requested address.
pub fn resolve_signer<'a>(
    store: &'a CredentialStore,
    requested: Option<Address>,
) -> Result<&'a Credential> {
    store
        .resolve_signer(requested)
        .wrap_err("Failed to resolve a signing credential")
        .with_suggestion(|| {
            "place `.{entity}-{role}.env` files in the credentials directory, or pass --credentials-dir"
        })
}

/// A credential the active entity must hold for this operation, looked up
/// by role.
pub fn require_role<'a>(
    store: &'a CredentialStore,
    entity: &str,
    role: Role,
) -> Result<&'a Credential> {
    store
        .get(entity, role)
        .ok_or_else(|| eyre!("No {role} credential loaded for {entity}"))
        .with_suggestion(|| format!("provide a `.{entity}-{}.env` credential file", role.suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardhat's well known developer account 0.
    const DEV_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn profile_selects_the_primary_signer() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(".dz-issuing.env"),
            format!("PRIVATE_KEY={DEV_PRIVATE_KEY}\n"),
        )
        .expect("write");

        let store = load_credentials(Some(dir.path()), Some("dz-issuing")).expect("store");
        let credential = store.resolve_signer(None).expect("resolved");
        assert_eq!(credential.entity, "dz");
        assert_eq!(credential.role, Role::Issuing);
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(".dz-issuing.env"),
            format!("PRIVATE_KEY={DEV_PRIVATE_KEY}\n"),
        )
        .expect("write");

        assert!(load_credentials(Some(dir.path()), Some("hsbc-mint")).is_err());
    }
}
