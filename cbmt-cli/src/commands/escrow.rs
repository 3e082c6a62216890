// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use super::{report_tx, Session};
use cbmtlib::common::{Address, Currency, TokenId};
use cbmtlib::contract::cbmt_token::CbmtTokenHandler;
use cbmtlib::contract::escrow_cbmt::{EscrowCbmtHandler, EscrowConditions};
use cbmtlib::units::TokenUnits;
use chrono::Utc;
use color_eyre::eyre::{eyre, Context, Result};
use color_eyre::Section;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

pub async fn set_conditions(
    payee: Address,
    arbiter: Address,
    amount: TokenUnits,
    currency: Currency,
    locked_days: u64,
    deposit_days: u64,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let wallet = session.wallet(credential)?;
    let handler = EscrowCbmtHandler::new(*session.network.escrow_cbmt_address(), wallet.provider())
        .with_confirmations(session.confirmations);

    let now = u64::try_from(Utc::now().timestamp())
        .map_err(|_| eyre!("System clock is before 1970"))?;
    let conditions = EscrowConditions {
        payee,
        arbiter,
        locked_until_timestamp: now + locked_days * SECS_PER_DAY,
        deposit_deadline: now + deposit_days * SECS_PER_DAY,
        amount: amount.as_raw(),
        currency_id: currency.id(),
    };
    let tx_hash = handler
        .set_contract_conditions(conditions)
        .await
        .wrap_err("Failed to propose the escrow agreement")?;
    report_tx(&session.network, tx_hash);

    // Ids are handed out sequentially, so the agreement just created holds
    // the id before the current counter value.
    let contract_id = handler
        .next_contract_id()
        .await
        .wrap_err("Failed to read back the escrow contract id")?
        .saturating_sub(1);
    println!(
        "Escrow contract {contract_id} proposed: {amount} {currency} to {payee}, arbiter {arbiter}"
    );
    Ok(())
}

pub async fn accept(contract: u64, session: &Session) -> Result<()> {
    let credential = session.signer(None)?;
    let wallet = session.wallet(credential)?;
    let handler = EscrowCbmtHandler::new(*session.network.escrow_cbmt_address(), wallet.provider())
        .with_confirmations(session.confirmations);
    let tx_hash = handler
        .accept_contract_conditions(contract)
        .await
        .wrap_err(format!("Failed to accept escrow contract {contract}"))
        .with_suggestion(|| "only the payee named in the conditions can accept")?;

    println!("Accepted escrow contract {contract}");
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn deposit(
    contract: u64,
    token: TokenId,
    approve: bool,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let wallet = session.wallet(credential)?;
    let escrow_address = *session.network.escrow_cbmt_address();

    if approve {
        let token_handler =
            CbmtTokenHandler::new(*session.network.cbmt_token_address(), wallet.provider())
                .with_confirmations(session.confirmations);
        println!("Granting the escrow contract operator approval...");
        let tx_hash = token_handler
            .set_approval_for_all(escrow_address, true)
            .await
            .wrap_err("Failed to grant operator approval")?;
        report_tx(&session.network, tx_hash);
    }

    let handler = EscrowCbmtHandler::new(escrow_address, wallet.provider())
        .with_confirmations(session.confirmations);
    let tx_hash = handler
        .deposit(contract, token)
        .await
        .wrap_err(format!("Failed to deposit into escrow contract {contract}"))
        .with_suggestion(|| {
            "the escrow contract needs ERC-1155 operator approval; rerun with --approve"
        })?;

    println!("Deposited token {token} into escrow contract {contract}");
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn release(contract: u64, session: &Session) -> Result<()> {
    let credential = session.signer(None)?;
    let wallet = session.wallet(credential)?;
    let handler = EscrowCbmtHandler::new(*session.network.escrow_cbmt_address(), wallet.provider())
        .with_confirmations(session.confirmations);
    let tx_hash = handler
        .approve_release_funds(contract)
        .await
        .wrap_err(format!("Failed to release escrow contract {contract}"))
        .with_suggestion(|| "only the arbiter can release, after the lock period has passed")?;

    println!("Released the funds of escrow contract {contract} to the payee");
    report_tx(&session.network, tx_hash);
    Ok(())
}
