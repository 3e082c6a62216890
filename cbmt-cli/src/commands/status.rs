// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use super::{load_snapshot, Session};
use cbmtlib::common::{Address, BankId, Currency};
use cbmtlib::contract::cbmt_token::CbmtTokenHandler;
use cbmtlib::contract::general_cbmt::GeneralCbmtHandler;
use cbmtlib::units::TokenUnits;
use cbmtlib::utils::http_provider;
use chrono::NaiveDate;
use color_eyre::eyre::{eyre, Context, Result};
use serde::Serialize;

/// What the network knows about the active profile.
#[derive(Serialize)]
struct ProfileInfo {
    entity: String,
    role: String,
    address: Address,
    contract_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bank: Option<BankMembership>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<CustomerInfo>,
}

#[derive(Serialize)]
struct BankMembership {
    bank_id: BankId,
    name: String,
    role: String,
}

#[derive(Serialize)]
struct CustomerInfo {
    is_general_address: bool,
    is_convert_address: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    registrations: Vec<ConvertRegistration>,
}

#[derive(Serialize)]
struct ConvertRegistration {
    bank_id: BankId,
    bank_name: String,
    convert_address: Address,
    currencies: Vec<CurrencyFlags>,
}

#[derive(Serialize)]
struct CurrencyFlags {
    currency: String,
    supported: bool,
    preferred_issuer: bool,
}

pub async fn info(json: bool, session: &Session) -> Result<()> {
    let credential = session.signer(None)?;
    let general = GeneralCbmtHandler::new(
        *session.network.general_cbmt_address(),
        http_provider(session.network.rpc_url().clone()),
    );
    let token = CbmtTokenHandler::new(
        *session.network.cbmt_token_address(),
        http_provider(session.network.rpc_url().clone()),
    );
    let contract_version = token
        .contract_version()
        .await
        .wrap_err("Failed to query the token contract version")?;
    let snapshot = load_snapshot(session).await?;

    let bank = snapshot.role_of(&credential.address).map(|(bank_id, role)| {
        let name = snapshot
            .bank(bank_id)
            .map(|bank| bank.name.clone())
            .unwrap_or_default();
        BankMembership {
            bank_id,
            name,
            role: role.to_string(),
        }
    });

    let customer = match bank {
        Some(_) => None,
        None => {
            let is_general = general
                .is_customer_general_address(credential.address)
                .await?;
            let is_convert = general
                .is_customer_convert_address(credential.address)
                .await?;
            // Flags hang off the convert addresses, which the contract
            // indexes by the customer's general address.
            let general_address = if is_convert {
                general
                    .customer_general_address(credential.address)
                    .await?
            } else {
                credential.address
            };

            let mut registrations = Vec::new();
            if is_general || is_convert {
                for bank in snapshot.banks() {
                    let convert_addresses = general
                        .customer_convert_addresses(general_address, bank.bank_id)
                        .await?;
                    for convert_address in convert_addresses {
                        let mut currencies = Vec::new();
                        for currency in Currency::ALL {
                            let supported = general
                                .is_customer_supported_currency(
                                    bank.bank_id,
                                    convert_address,
                                    currency.id(),
                                )
                                .await?;
                            let preferred_issuer = general
                                .is_customer_preferred_issuer(
                                    convert_address,
                                    currency.id(),
                                    bank.bank_id,
                                )
                                .await?;
                            currencies.push(CurrencyFlags {
                                currency: currency.code().to_string(),
                                supported,
                                preferred_issuer,
                            });
                        }
                        registrations.push(ConvertRegistration {
                            bank_id: bank.bank_id,
                            bank_name: bank.name.clone(),
                            convert_address,
                            currencies,
                        });
                    }
                }
            }
            Some(CustomerInfo {
                is_general_address: is_general,
                is_convert_address: is_convert,
                registrations,
            })
        }
    };

    let profile = ProfileInfo {
        entity: credential.entity.clone(),
        role: credential.role.to_string(),
        address: credential.address,
        contract_version,
        bank,
        customer,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("Profile: {}-{}", profile.entity, profile.role);
    println!("Address: {}", profile.address);
    println!("Contract version: {}", profile.contract_version);
    match (&profile.bank, &profile.customer) {
        (Some(bank), _) => {
            println!(
                "Bank: {} (id {}, {} address)",
                bank.name, bank.bank_id, bank.role
            );
        }
        (None, Some(customer)) if customer.is_general_address || customer.is_convert_address => {
            let kind = if customer.is_general_address {
                "general"
            } else {
                "convert"
            };
            println!("Customer {kind} address");
            for registration in &customer.registrations {
                println!(
                    "Convert address {} at {} (bank {})",
                    registration.convert_address, registration.bank_name, registration.bank_id
                );
                for flags in &registration.currencies {
                    println!(
                        "  {}: supported {}, preferred issuer {}",
                        flags.currency, flags.supported, flags.preferred_issuer
                    );
                }
            }
        }
        _ => println!("The address is not registered as a bank or customer"),
    }
    Ok(())
}

pub async fn history(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    max_blocks: Option<u64>,
    session: &Session,
) -> Result<()> {
    let today = chrono::Utc::now().date_naive();
    let from = from.unwrap_or(today);
    let to = to.unwrap_or(today);
    let from_timestamp = day_bound(from, 0, 0, 0)?;
    let to_timestamp = day_bound(to, 23, 59, 59)?;
    if from_timestamp > to_timestamp {
        return Err(eyre!("--from must not be after --to"));
    }

    let events = session
        .network
        .transfer_history(from_timestamp, to_timestamp, max_blocks)
        .await
        .wrap_err("Failed to scan for token transfers")?;

    if events.is_empty() {
        println!("No token transfers between {from} and {to}");
        return Ok(());
    }
    for event in &events {
        println!(
            "{};{};{};{};{}",
            event.kind.event_name(),
            event.from,
            event.to,
            event.token_id,
            TokenUnits::from(event.amount)
        );
    }
    info!("Found {} token transfers between {from} and {to}", events.len());
    Ok(())
}

fn day_bound(date: NaiveDate, hour: u32, min: u32, sec: u32) -> Result<u64> {
    let timestamp = date
        .and_hms_opt(hour, min, sec)
        .ok_or_else(|| eyre!("Invalid time of day"))?
        .and_utc()
        .timestamp();
    u64::try_from(timestamp).map_err(|_| eyre!("Dates before 1970 are not supported"))
}
