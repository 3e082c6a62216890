// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use super::{bank_by_id_or_name, load_snapshot, own_bank, report_tx, Session};
use cbmtlib::classify::{classify_transfer, TransferIntent};
use cbmtlib::common::{Address, Calldata, Currency, TokenId};
use cbmtlib::contract::cbmt_token::CbmtTokenHandler;
use cbmtlib::contract::general_cbmt::GeneralCbmtHandler;
use cbmtlib::credential::Role;
use cbmtlib::units::TokenUnits;
use cbmtlib::utils::{format_ether, http_provider, parse_ether};
use cbmtlib::wallet::balance_of_gas_tokens;
use color_eyre::eyre::{Context, Result};
use color_eyre::Section;
use prettytable::{Cell, Row, Table};

pub async fn balance(
    account: Option<Address>,
    token: Option<TokenId>,
    session: &Session,
) -> Result<()> {
    let account = match account {
        Some(account) => account,
        None => session.signer(None)?.address,
    };
    let provider = http_provider(session.network.rpc_url().clone());
    let handler = CbmtTokenHandler::new(*session.network.cbmt_token_address(), provider);

    if let Some(token) = token {
        let balance = handler
            .balance_of(account, token)
            .await
            .wrap_err(format!("Failed to query the balance of token {token}"))?;
        println!("{}", TokenUnits::from(balance));
        return Ok(());
    }

    let snapshot = load_snapshot(session).await?;
    let mut table = Table::new();
    let mut header = vec![Cell::new("Bank"), Cell::new("Id")];
    for currency in Currency::ALL {
        header.push(Cell::new(currency.code()));
    }
    table.add_row(Row::new(header));

    for bank in snapshot.banks() {
        let mut row = vec![Cell::new(&bank.name), Cell::new(&bank.bank_id.to_string())];
        for currency in Currency::ALL {
            let token_id = TokenId::new(bank.bank_id, currency);
            let balance = handler
                .balance_of(account, token_id)
                .await
                .wrap_err(format!("Failed to query the balance of token {token_id}"))?;
            row.push(Cell::new(&TokenUnits::from(balance).to_string()));
        }
        table.add_row(Row::new(row));
    }

    println!("Balances of {account}:");
    table.printstd();

    let gas = balance_of_gas_tokens(account, &session.network)
        .await
        .wrap_err("Failed to query the gas token balance")?;
    println!("Gas tokens: {}", format_ether(gas));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn send(
    receiver: Address,
    amount: TokenUnits,
    token: TokenId,
    payer: Option<Address>,
    label: Option<String>,
    bank_transfer: bool,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(payer)?;
    let payer = payer.unwrap_or(credential.address);
    info!(
        "Sending {amount} of token {token} from {payer} to {receiver} signed by {}-{}",
        credential.entity, credential.role
    );

    // Classify before spending any gas; an unregistered receiver fails here.
    let read_provider = http_provider(session.network.rpc_url().clone());
    let registry = GeneralCbmtHandler::new(*session.network.general_cbmt_address(), read_provider);
    let intent = TransferIntent {
        sender: payer,
        receiver,
        token_id: token,
        amount,
        label: label.clone(),
    };
    let classification = classify_transfer(&registry, &intent)
        .await
        .wrap_err("The transfer cannot be routed")
        .with_suggestion(|| {
            "the receiver must be a registered general or convert address; run `cbmt classify` for details"
        })?;
    println!("Transfer case: {}", classification.case);

    let wallet = session.wallet(credential)?;
    let handler = CbmtTokenHandler::new(*session.network.cbmt_token_address(), wallet.provider())
        .with_confirmations(session.confirmations);

    let tx_hash = if bank_transfer {
        let snapshot = load_snapshot(session).await?;
        let bank = own_bank(&snapshot, credential)?;
        handler
            .transfer(bank.bank_id, receiver, token, amount.as_raw())
            .await
            .wrap_err("Failed to submit the bank transfer")?
    } else {
        let label = Calldata::from(label.unwrap_or_default().into_bytes());
        handler
            .safe_transfer_from(payer, receiver, token, amount.as_raw(), label)
            .await
            .wrap_err("Failed to submit the transfer")?
    };

    println!("Successfully sent {amount} of token {token} to {receiver}");
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn classify(
    receiver: Address,
    token: TokenId,
    amount: Option<TokenUnits>,
    session: &Session,
) -> Result<()> {
    // A dry run needs no signer; fall back to the zero address.
    let sender = session
        .signer(None)
        .map(|credential| credential.address)
        .unwrap_or(Address::ZERO);
    let amount = amount.unwrap_or(TokenUnits::zero());

    let provider = http_provider(session.network.rpc_url().clone());
    let registry = GeneralCbmtHandler::new(*session.network.general_cbmt_address(), provider);
    let intent = TransferIntent {
        sender,
        receiver,
        token_id: token,
        amount,
        label: None,
    };
    let classification = classify_transfer(&registry, &intent)
        .await
        .wrap_err("Failed to classify the transfer")
        .with_suggestion(|| "the receiver must be registered as a general or convert address")?;

    println!("Transfer case: {}", classification.case);
    println!("{}", classification.case.describe());
    println!("Token issuer: bank {}", classification.token_issuer);
    if let Some(currency) = Currency::from_id(classification.token_currency) {
        println!("Token currency: {currency}");
    }
    Ok(())
}

/// Mint tokens in two steps: blank tokens onto the issuing address, then a
/// stamp by the mint address. Both keys of the entity must be loaded.
pub async fn stamp(
    amount: TokenUnits,
    currency: Currency,
    label: Option<String>,
    session: &Session,
) -> Result<()> {
    let entity = session.signer(None)?.entity.clone();
    let issuing =
        crate::access::credentials::require_role(&session.credentials, &entity, Role::Issuing)?;
    let mint = crate::access::credentials::require_role(&session.credentials, &entity, Role::Mint)?;

    let snapshot = load_snapshot(session).await?;
    let bank = own_bank(&snapshot, issuing)?;
    info!("Minting {amount} {currency} as bank {} ({})", bank.bank_id, bank.name);

    let issuing_wallet = session.wallet(issuing)?;
    let handler = CbmtTokenHandler::new(
        *session.network.cbmt_token_address(),
        issuing_wallet.provider(),
    )
    .with_confirmations(session.confirmations);
    println!("Requesting {amount} blank {currency} tokens as {}...", bank.name);
    let tx_hash = handler
        .request_blank_token(bank.bank_id, currency.id(), amount.as_raw())
        .await
        .wrap_err("Failed to request blank tokens")
        .with_suggestion(|| "blank token requests must be signed with the bank's issuing key")?;
    report_tx(&session.network, tx_hash);

    let mint_wallet = session.wallet(mint)?;
    let handler = CbmtTokenHandler::new(
        *session.network.cbmt_token_address(),
        mint_wallet.provider(),
    )
    .with_confirmations(session.confirmations);
    println!("Stamping the blank tokens...");
    let label = Calldata::from(label.unwrap_or_default().into_bytes());
    let tx_hash = handler
        .stamp_token(bank.bank_id, currency.id(), amount.as_raw(), label)
        .await
        .wrap_err("Failed to stamp the blank tokens")
        .with_suggestion(|| "stamping must be signed with the bank's mint key")?;
    report_tx(&session.network, tx_hash);

    println!("Successfully minted {amount} {currency} tokens for {}", bank.name);
    Ok(())
}

pub async fn supply(
    customer: Address,
    amount: TokenUnits,
    currency: Currency,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let bank = own_bank(&snapshot, credential)?;

    let wallet = session.wallet(credential)?;
    let handler = CbmtTokenHandler::new(*session.network.cbmt_token_address(), wallet.provider())
        .with_confirmations(session.confirmations);
    let tx_hash = handler
        .request_token_from_customer(bank.bank_id, customer, currency.id(), amount.as_raw())
        .await
        .wrap_err("Failed to supply tokens to the customer")
        .with_suggestion(|| {
            "supplying must be signed with the bank's mint key and the customer must be whitelisted"
        })?;

    println!(
        "Successfully supplied {amount} {currency} of {} to {customer}",
        bank.name
    );
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn return_tokens(
    amount: TokenUnits,
    currency: Currency,
    bank: Option<&str>,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let bank = match bank {
        Some(bank) => bank_by_id_or_name(&snapshot, bank)?,
        None => own_bank(&snapshot, credential)?,
    };

    let wallet = session.wallet(credential)?;
    let handler = CbmtTokenHandler::new(*session.network.cbmt_token_address(), wallet.provider())
        .with_confirmations(session.confirmations);
    let tx_hash = handler
        .return_tokens(bank.bank_id, currency.id(), amount.as_raw())
        .await
        .wrap_err("Failed to return the tokens")?;

    println!(
        "Successfully returned {amount} {currency} to {} for destruction",
        bank.name
    );
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn gas(receiver: Address, amount: &str, session: &Session) -> Result<()> {
    let amount = parse_ether(amount)
        .wrap_err("Failed to parse the gas token amount")
        .with_suggestion(|| "pass whole gas tokens, e.g. `--amount 0.5`")?;
    let credential = session.signer(None)?;
    let wallet = session.wallet(credential)?;
    let tx_hash = wallet
        .transfer_gas_tokens(receiver, amount)
        .await
        .wrap_err("Failed to transfer gas tokens")?;

    println!(
        "Successfully sent {} gas tokens to {receiver}",
        format_ether(amount)
    );
    report_tx(&session.network, tx_hash);
    Ok(())
}

/// Sweep tokens of other issuers off a convert address by converting them
/// into tokens of the signing bank.
pub async fn cleanup_convert(customer: Address, session: &Session) -> Result<()> {
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let bank = own_bank(&snapshot, credential)?;

    let wallet = session.wallet(credential)?;
    let handler = CbmtTokenHandler::new(*session.network.cbmt_token_address(), wallet.provider())
        .with_confirmations(session.confirmations);

    let mut swept = 0u32;
    for issuer in snapshot.banks() {
        if issuer.bank_id == bank.bank_id {
            continue;
        }
        for currency in Currency::ALL {
            let token_id = TokenId::new(issuer.bank_id, currency);
            let balance = handler
                .balance_of(customer, token_id)
                .await
                .wrap_err(format!("Failed to query the balance of token {token_id}"))?;
            if balance.is_zero() {
                continue;
            }
            println!(
                "Converting {} of token {token_id} issued by {}...",
                TokenUnits::from(balance),
                issuer.name
            );
            let tx_hash = handler
                .convert_token_from_not_supported_issuer(
                    token_id,
                    bank.bank_id,
                    currency.id(),
                    balance,
                    customer,
                )
                .await
                .wrap_err(format!("Failed to convert token {token_id}"))?;
            report_tx(&session.network, tx_hash);
            swept += 1;
        }
    }

    if swept == 0 {
        println!("No foreign tokens found on {customer}");
    } else {
        println!(
            "Converted {swept} token positions on {customer} into tokens of {}",
            bank.name
        );
    }
    Ok(())
}
