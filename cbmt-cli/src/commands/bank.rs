// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use super::{bank_by_id_or_name, load_snapshot, own_bank, report_tx, Session};
use cbmtlib::common::{Address, Currency, U256};
use cbmtlib::contract::cbmt_token::CbmtTokenHandler;
use cbmtlib::contract::general_cbmt::GeneralCbmtHandler;
use cbmtlib::credential::Role;
use cbmtlib::units::TokenUnits;
use color_eyre::eyre::{eyre, Context, Result};
use color_eyre::Section;
use prettytable::{Cell, Row, Table};

pub async fn banks(session: &Session) -> Result<()> {
    let snapshot = load_snapshot(session).await?;
    if snapshot.is_empty() {
        println!("No participating banks are registered yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Id"),
        Cell::new("Name"),
        Cell::new("Issuing"),
        Cell::new("Mint"),
        Cell::new("Redemption"),
        Cell::new("General"),
    ]));
    for bank in snapshot.banks() {
        table.add_row(Row::new(vec![
            Cell::new(&bank.bank_id.to_string()),
            Cell::new(&bank.name),
            Cell::new(&bank.issuing.to_string()),
            Cell::new(&bank.mint.to_string()),
            Cell::new(&bank.redemption.to_string()),
            Cell::new(&bank.general.to_string()),
        ]));
    }
    table.printstd();
    Ok(())
}

pub async fn bank_info(bank: &str, session: &Session) -> Result<()> {
    let snapshot = load_snapshot(session).await?;
    let bank = bank_by_id_or_name(&snapshot, bank)?;

    println!("Bank {} ({})", bank.bank_id, bank.name);
    println!("Issuing:    {}", bank.issuing);
    println!("Mint:       {}", bank.mint);
    println!("Redemption: {}", bank.redemption);
    println!("General:    {}", bank.general);
    Ok(())
}

pub async fn add_bank(
    name: &str,
    issuing: Address,
    mint: Address,
    redemption: Address,
    general: Address,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let wallet = session.wallet(credential)?;
    let handler =
        GeneralCbmtHandler::new(*session.network.general_cbmt_address(), wallet.provider())
            .with_confirmations(session.confirmations);
    let tx_hash = handler
        .add_participating_bank(issuing, mint, redemption, general, name)
        .await
        .wrap_err(format!("Failed to register bank {name}"))
        .with_suggestion(|| "only the registry owner can add participating banks")?;

    println!("Successfully registered bank {name}");
    report_tx(&session.network, tx_hash);

    let snapshot = load_snapshot(session).await?;
    if let Some(bank) = snapshot.bank_by_name(name) {
        println!("Assigned bank id: {}", bank.bank_id);
    }
    Ok(())
}

pub async fn whitelist(customer: Address, remove: bool, session: &Session) -> Result<()> {
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let bank = own_bank(&snapshot, credential)?;

    let wallet = session.wallet(credential)?;
    let handler =
        GeneralCbmtHandler::new(*session.network.general_cbmt_address(), wallet.provider())
            .with_confirmations(session.confirmations);

    let tx_hash = if remove {
        handler
            .remove_from_whitelist(bank.bank_id, customer)
            .await
            .wrap_err("Failed to remove the customer from the whitelist")?
    } else {
        handler
            .add_to_whitelist(bank.bank_id, customer)
            .await
            .wrap_err("Failed to whitelist the customer")
            .with_suggestion(|| "whitelisting must be signed with the bank's mint key")?
    };

    if remove {
        println!("Removed {customer} from the whitelist of {}", bank.name);
    } else {
        println!("Whitelisted {customer} for {}", bank.name);
    }
    report_tx(&session.network, tx_hash);
    Ok(())
}

/// Register the signing address as a convert address of a customer. The
/// customer is identified by its general address.
pub async fn register_convert(
    customer: Option<Address>,
    bank: &str,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let customer = match customer {
        Some(customer) => customer,
        None => session
            .credentials
            .get(&credential.entity, Role::General)
            .map(|general| general.address)
            .ok_or_else(|| eyre!("No general credential loaded for {}", credential.entity))
            .with_suggestion(|| "pass --customer or provide a `.{entity}-ga.env` credential")?,
    };
    let snapshot = load_snapshot(session).await?;
    let bank = bank_by_id_or_name(&snapshot, bank)?;

    let wallet = session.wallet(credential)?;
    let handler =
        GeneralCbmtHandler::new(*session.network.general_cbmt_address(), wallet.provider())
            .with_confirmations(session.confirmations);
    let tx_hash = handler
        .register_customer(bank.bank_id, customer)
        .await
        .wrap_err("Failed to register the convert address")
        .with_suggestion(|| "sign with the customer's convert key, e.g. `--as evonik-ca`")?;

    println!(
        "Registered {} as a convert address of {customer} with {}",
        credential.address, bank.name
    );
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn add_currency(
    customer: Address,
    currencies: &[Currency],
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let bank = own_bank(&snapshot, credential)?;

    let wallet = session.wallet(credential)?;
    let handler =
        GeneralCbmtHandler::new(*session.network.general_cbmt_address(), wallet.provider())
            .with_confirmations(session.confirmations);
    let currency_ids: Vec<_> = currencies.iter().map(|currency| currency.id()).collect();
    let tx_hash = handler
        .add_currency_to_customer(bank.bank_id, customer, &currency_ids)
        .await
        .wrap_err("Failed to add the currencies to the customer")
        .with_suggestion(|| "currency changes must be signed with the bank's mint key")?;

    let codes: Vec<_> = currencies.iter().map(|currency| currency.code()).collect();
    println!("Allowed {} on {customer} within {}", codes.join(", "), bank.name);
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn remove_currency(
    customer: Address,
    currency: Currency,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let bank = own_bank(&snapshot, credential)?;

    let wallet = session.wallet(credential)?;
    let handler =
        GeneralCbmtHandler::new(*session.network.general_cbmt_address(), wallet.provider())
            .with_confirmations(session.confirmations);
    let tx_hash = handler
        .remove_currency_from_customer(bank.bank_id, customer, currency.id())
        .await
        .wrap_err("Failed to remove the currency from the customer")
        .with_suggestion(|| "currency changes must be signed with the bank's mint key")?;

    println!("Removed {currency} from {customer} within {}", bank.name);
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn set_rate(
    from_currency: Currency,
    to_currency: Currency,
    rate: u64,
    session: &Session,
) -> Result<()> {
    if from_currency == to_currency {
        return Err(eyre!("The conversion currencies must differ"));
    }
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let bank = own_bank(&snapshot, credential)?;

    let wallet = session.wallet(credential)?;
    let handler = CbmtTokenHandler::new(*session.network.cbmt_token_address(), wallet.provider())
        .with_confirmations(session.confirmations);
    let tx_hash = handler
        .set_exchange_rate(
            bank.bank_id,
            from_currency.id(),
            to_currency.id(),
            U256::from(rate),
        )
        .await
        .wrap_err("Failed to set the exchange rate")
        .with_suggestion(|| "exchange rates must be signed with the bank's general key")?;

    println!(
        "Set the {from_currency} to {to_currency} rate of {} to {rate}",
        bank.name
    );
    report_tx(&session.network, tx_hash);
    Ok(())
}

pub async fn settle(
    counterparty: &str,
    amount: TokenUnits,
    currency: Currency,
    net: bool,
    session: &Session,
) -> Result<()> {
    let credential = session.signer(None)?;
    let snapshot = load_snapshot(session).await?;
    let own = own_bank(&snapshot, credential)?;
    let counterparty = bank_by_id_or_name(&snapshot, counterparty)?;
    if own.bank_id == counterparty.bank_id {
        return Err(eyre!("Cannot settle {} against itself", own.name));
    }

    let wallet = session.wallet(credential)?;
    let handler = CbmtTokenHandler::new(*session.network.cbmt_token_address(), wallet.provider())
        .with_confirmations(session.confirmations);
    let tx_hash = if net {
        handler
            .start_net_settlement(
                own.bank_id,
                counterparty.bank_id,
                currency.id(),
                amount.as_raw(),
            )
            .await
            .wrap_err("Failed to start the net settlement")?
    } else {
        handler
            .gross_settlement(
                own.bank_id,
                counterparty.bank_id,
                currency.id(),
                amount.as_raw(),
            )
            .await
            .wrap_err("Failed to run the gross settlement")?
    };

    println!(
        "Settled {amount} {currency} between {} and {} ({})",
        own.name,
        counterparty.name,
        if net { "net" } else { "gross" }
    );
    report_tx(&session.network, tx_hash);
    Ok(())
}
