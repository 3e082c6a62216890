// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

mod bank;
mod escrow;
mod status;
mod token;

use crate::opt::Opt;
use cbmtlib::common::{Address, BankId, Currency, TokenId, TxHash};
use cbmtlib::contract::general_cbmt::GeneralCbmtHandler;
use cbmtlib::credential::{Credential, CredentialStore};
use cbmtlib::registry::{BankInfo, RegistrySnapshot};
use cbmtlib::units::TokenUnits;
use cbmtlib::utils::http_provider;
use cbmtlib::wallet::Wallet;
use cbmtlib::Network;
use chrono::NaiveDate;
use clap::Subcommand;
use color_eyre::eyre::{eyre, Context, Result};
use color_eyre::Section;
use std::time::Duration;

#[derive(Subcommand, Debug)]
pub enum SubCmd {
    /// Show CBMT token balances of an account.
    Balance {
        /// Account to query. Defaults to the active profile's address.
        #[arg(long)]
        account: Option<Address>,
        /// Restrict the query to one token id.
        #[arg(long)]
        token: Option<TokenId>,
    },

    /// Send CBMT tokens to a customer or bank address.
    Send {
        /// Receiving address.
        #[arg(long)]
        receiver: Address,
        /// Amount in tokens, e.g. "12.5".
        #[arg(long)]
        amount: TokenUnits,
        /// Token id to send, issuing bank id plus currency id.
        #[arg(long)]
        token: TokenId,
        /// Address the tokens move from. Defaults to the signer.
        #[arg(long)]
        payer: Option<Address>,
        /// Payment reference attached to the transfer.
        #[arg(long)]
        label: Option<String>,
        /// Use the bank to bank entry point instead of an ERC-1155 transfer.
        #[arg(long)]
        bank_transfer: bool,
    },

    /// Classify a transfer without submitting anything.
    Classify {
        /// Receiving address.
        #[arg(long)]
        receiver: Address,
        /// Token id that would be sent.
        #[arg(long)]
        token: TokenId,
        /// Amount that would be sent.
        #[arg(long)]
        amount: Option<TokenUnits>,
    },

    /// Mint new tokens: request blank tokens with the issuing key, then
    /// stamp them with the mint key.
    Stamp {
        /// Amount in tokens.
        #[arg(long)]
        amount: TokenUnits,
        /// Currency of the minted tokens.
        #[arg(long, default_value = "EUR")]
        currency: Currency,
        /// Label stamped onto the tokens.
        #[arg(long)]
        label: Option<String>,
    },

    /// Supply stamped tokens to a whitelisted customer. Sign with the
    /// bank's mint key.
    Supply {
        /// Customer general address.
        #[arg(long)]
        customer: Address,
        /// Amount in tokens.
        #[arg(long)]
        amount: TokenUnits,
        /// Currency of the supplied tokens.
        #[arg(long, default_value = "EUR")]
        currency: Currency,
    },

    /// Return tokens to their issuing bank for destruction.
    ReturnTokens {
        /// Amount in tokens.
        #[arg(long)]
        amount: TokenUnits,
        /// Currency of the returned tokens.
        #[arg(long, default_value = "EUR")]
        currency: Currency,
        /// Issuing bank id or name. Defaults to the signer's own bank.
        #[arg(long)]
        bank: Option<String>,
    },

    /// Send native gas tokens to an account.
    Gas {
        /// Receiving address.
        #[arg(long)]
        receiver: Address,
        /// Amount in whole gas tokens, e.g. "0.5".
        #[arg(long)]
        amount: String,
    },

    /// List the participating banks.
    Banks,

    /// Show the registered addresses of one bank.
    BankInfo {
        /// Bank id or name.
        #[arg(long)]
        bank: String,
    },

    /// Register a new participating bank.
    AddBank {
        /// Bank name.
        #[arg(long)]
        name: String,
        /// Issuing address.
        #[arg(long)]
        issuing: Address,
        /// Mint address.
        #[arg(long)]
        mint: Address,
        /// Redemption address.
        #[arg(long)]
        redemption: Address,
        /// General address.
        #[arg(long)]
        general: Address,
    },

    /// Whitelist a customer general address for the signing bank. Sign
    /// with the bank's mint key.
    Whitelist {
        /// Customer general address.
        #[arg(long)]
        customer: Address,
        /// Remove the address from the whitelist instead.
        #[arg(long)]
        remove: bool,
    },

    /// Register a convert address with a bank. Sign with the customer's
    /// convert key; the signing address becomes the convert address.
    RegisterConvert {
        /// Customer general address. Defaults to the entity's general
        /// credential.
        #[arg(long)]
        customer: Option<Address>,
        /// Bank id or name to register with.
        #[arg(long)]
        bank: String,
    },

    /// Allow currencies on a customer convert address. Sign with the
    /// bank's mint key.
    AddCurrency {
        /// Customer convert address.
        #[arg(long)]
        customer: Address,
        /// Currency to allow. May be passed more than once.
        #[arg(long, required = true)]
        currency: Vec<Currency>,
    },

    /// Remove a currency from a customer convert address. Sign with the
    /// bank's mint key.
    RemoveCurrency {
        /// Customer convert address.
        #[arg(long)]
        customer: Address,
        /// Currency to remove.
        #[arg(long)]
        currency: Currency,
    },

    /// Sweep foreign tokens off a customer convert address into tokens of
    /// the signing bank. Sign with the bank's mint key.
    CleanupConvert {
        /// Customer convert address.
        #[arg(long)]
        customer: Address,
    },

    /// Set the exchange rate between two currencies for the signing bank.
    /// Sign with the bank's general key.
    SetRate {
        /// Currency converted from.
        #[arg(long)]
        from_currency: Currency,
        /// Currency converted to.
        #[arg(long)]
        to_currency: Currency,
        /// Rate scaled by 10^6, e.g. 1060000 for 1.06.
        #[arg(long)]
        rate: u64,
    },

    /// Settle an outstanding balance with another bank.
    Settle {
        #[command(subcommand)]
        command: SettleCmd,
    },

    /// Show what the network knows about the active profile.
    Info {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List token transfers on the network in a date window.
    History {
        /// First day to include, as YYYY-MM-DD. Defaults to today.
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include, as YYYY-MM-DD. Defaults to today.
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Upper bound on blocks walked during the scan.
        #[arg(long)]
        max_blocks: Option<u64>,
    },

    /// Escrowed transfers released by an arbiter.
    Escrow {
        #[command(subcommand)]
        command: EscrowCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettleCmd {
    /// Net the mutual balances and move only the difference.
    Net {
        /// Counterparty bank id or name.
        #[arg(long)]
        bank: String,
        /// Amount in tokens.
        #[arg(long)]
        amount: TokenUnits,
        /// Settlement currency.
        #[arg(long, default_value = "EUR")]
        currency: Currency,
    },

    /// Move the full amount without netting.
    Gross {
        /// Counterparty bank id or name.
        #[arg(long)]
        bank: String,
        /// Amount in tokens.
        #[arg(long)]
        amount: TokenUnits,
        /// Settlement currency.
        #[arg(long, default_value = "EUR")]
        currency: Currency,
    },
}

#[derive(Subcommand, Debug)]
pub enum EscrowCmd {
    /// Propose an escrow agreement as the payer.
    SetConditions {
        /// Receiving address once the funds release.
        #[arg(long)]
        payee: Address,
        /// Address allowed to release the funds.
        #[arg(long)]
        arbiter: Address,
        /// Amount in tokens.
        #[arg(long)]
        amount: TokenUnits,
        /// Currency of the escrowed tokens.
        #[arg(long, default_value = "EUR")]
        currency: Currency,
        /// Days the deposit stays locked before release.
        #[arg(long, default_value_t = 5)]
        locked_days: u64,
        /// Days the payer has to deposit after proposing.
        #[arg(long, default_value_t = 2)]
        deposit_days: u64,
    },

    /// Accept a proposed agreement as the payee.
    Accept {
        /// Escrow contract id.
        #[arg(long)]
        contract: u64,
    },

    /// Deposit the agreed tokens as the payer.
    Deposit {
        /// Escrow contract id.
        #[arg(long)]
        contract: u64,
        /// Token id to deposit.
        #[arg(long)]
        token: TokenId,
        /// Grant the escrow contract operator approval first.
        #[arg(long)]
        approve: bool,
    },

    /// Release the deposited funds to the payee as the arbiter.
    Release {
        /// Escrow contract id.
        #[arg(long)]
        contract: u64,
    },
}

pub async fn handle_subcommand(opt: Opt) -> Result<()> {
    let session = Session::new(&opt)?;

    match opt.command {
        SubCmd::Balance { account, token } => token::balance(account, token, &session).await,
        SubCmd::Send {
            receiver,
            amount,
            token,
            payer,
            label,
            bank_transfer,
        } => token::send(receiver, amount, token, payer, label, bank_transfer, &session).await,
        SubCmd::Classify {
            receiver,
            token,
            amount,
        } => token::classify(receiver, token, amount, &session).await,
        SubCmd::Stamp {
            amount,
            currency,
            label,
        } => token::stamp(amount, currency, label, &session).await,
        SubCmd::Supply {
            customer,
            amount,
            currency,
        } => token::supply(customer, amount, currency, &session).await,
        SubCmd::ReturnTokens {
            amount,
            currency,
            bank,
        } => token::return_tokens(amount, currency, bank.as_deref(), &session).await,
        SubCmd::Gas { receiver, amount } => token::gas(receiver, &amount, &session).await,
        SubCmd::Banks => bank::banks(&session).await,
        SubCmd::BankInfo { bank } => bank::bank_info(&bank, &session).await,
        SubCmd::AddBank {
            name,
            issuing,
            mint,
            redemption,
            general,
        } => bank::add_bank(&name, issuing, mint, redemption, general, &session).await,
        SubCmd::Whitelist { customer, remove } => bank::whitelist(customer, remove, &session).await,
        SubCmd::RegisterConvert { customer, bank } => {
            bank::register_convert(customer, &bank, &session).await
        }
        SubCmd::AddCurrency { customer, currency } => {
            bank::add_currency(customer, &currency, &session).await
        }
        SubCmd::RemoveCurrency { customer, currency } => {
            bank::remove_currency(customer, currency, &session).await
        }
        SubCmd::CleanupConvert { customer } => token::cleanup_convert(customer, &session).await,
        SubCmd::SetRate {
            from_currency,
            to_currency,
            rate,
        } => bank::set_rate(from_currency, to_currency, rate, &session).await,
        SubCmd::Settle { command } => match command {
            SettleCmd::Net {
                bank,
                amount,
                currency,
            } => bank::settle(&bank, amount, currency, true, &session).await,
            SettleCmd::Gross {
                bank,
                amount,
                currency,
            } => bank::settle(&bank, amount, currency, false, &session).await,
        },
        SubCmd::Info { json } => status::info(json, &session).await,
        SubCmd::History {
            from,
            to,
            max_blocks,
        } => status::history(from, to, max_blocks, &session).await,
        SubCmd::Escrow { command } => match command {
            EscrowCmd::SetConditions {
                payee,
                arbiter,
                amount,
                currency,
                locked_days,
                deposit_days,
            } => {
                escrow::set_conditions(
                    payee,
                    arbiter,
                    amount,
                    currency,
                    locked_days,
                    deposit_days,
                    &session,
                )
                .await
            }
            EscrowCmd::Accept { contract } => escrow::accept(contract, &session).await,
            EscrowCmd::Deposit {
                contract,
                token,
                approve,
            } => escrow::deposit(contract, token, approve, &session).await,
            EscrowCmd::Release { contract } => escrow::release(contract, &session).await,
        },
    }
}

/// Everything a command needs besides its own arguments: the deployment,
/// the loaded credential pool and the confirmation depth.
pub(crate) struct Session {
    pub network: Network,
    pub credentials: CredentialStore,
    pub confirmations: u64,
}

impl Session {
    fn new(opt: &Opt) -> Result<Self> {
        let network = crate::access::network::get_network()?;
        let credentials = crate::access::credentials::load_credentials(
            opt.credentials_dir.as_deref(),
            opt.act_as.as_deref(),
        )?;
        Ok(Self {
            network,
            credentials,
            confirmations: opt.confirmations,
        })
    }

    /// The signing credential for an optional requested address.
    pub fn signer(&self, requested: Option<Address>) -> Result<&Credential> {
        crate::access::credentials::resolve_signer(&self.credentials, requested)
    }

    pub fn wallet(&self, credential: &Credential) -> Result<Wallet> {
        Wallet::from_credential(credential, self.network.clone()).wrap_err(format!(
            "Failed to derive a wallet for {}-{}",
            credential.entity, credential.role
        ))
    }
}

const ROSTER_ATTEMPTS: u32 = 3;
const ROSTER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bank roster snapshot, indexed by address. Roster reads are retried a
/// few times so that a brief RPC outage does not fail a settlement command.
pub(crate) async fn load_snapshot(session: &Session) -> Result<RegistrySnapshot> {
    let provider = http_provider(session.network.rpc_url().clone());
    let registry = GeneralCbmtHandler::new(*session.network.general_cbmt_address(), provider);

    let mut attempt = 1;
    loop {
        match RegistrySnapshot::load(&registry).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(err) if attempt < ROSTER_ATTEMPTS => {
                debug!("Bank roster fetch attempt {attempt} failed, retrying: {err}");
                tokio::time::sleep(ROSTER_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err)
                    .wrap_err("Failed to fetch the participating bank roster")
                    .with_suggestion(|| {
                        "check the RPC endpoint and the GENERAL_CBMT_ADDRESS deployment"
                    });
            }
        }
    }
}

/// A bank picked by id or by name on the command line.
pub(crate) fn bank_by_id_or_name<'a>(
    snapshot: &'a RegistrySnapshot,
    bank: &str,
) -> Result<&'a BankInfo> {
    let found = match bank.parse::<BankId>() {
        Ok(id) => snapshot.bank(id),
        Err(_) => snapshot.bank_by_name(bank),
    };
    found
        .ok_or_else(|| eyre!("No participating bank matches {bank}"))
        .with_suggestion(|| "run `cbmt banks` to list the registered banks")
}

/// The bank the signing address belongs to, via the snapshot address index.
pub(crate) fn own_bank<'a>(
    snapshot: &'a RegistrySnapshot,
    signer: &Credential,
) -> Result<&'a BankInfo> {
    snapshot
        .bank_of(&signer.address)
        .ok_or_else(|| {
            eyre!(
                "Signer {} ({}-{}) is not registered for any participating bank",
                signer.address,
                signer.entity,
                signer.role
            )
        })
        .with_suggestion(|| "bank operations need a registered bank key, e.g. `--as dz-mint`")
}

const TX_HASH_RECORD: &str = "transaction-hash.txt";

/// Print the settled transaction and keep a local record of the hash.
pub(crate) fn report_tx(network: &Network, tx_hash: TxHash) {
    println!("Transaction: {tx_hash}");
    if let Some(url) = network.explorer_tx_url(tx_hash) {
        println!("You can see the tx status: {url}");
    }
    if let Err(err) = record_tx_hash(tx_hash) {
        debug!("Could not record {tx_hash} in {TX_HASH_RECORD}: {err}");
    }
}

fn record_tx_hash(tx_hash: TxHash) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(TX_HASH_RECORD)?;
    writeln!(file, "{tx_hash}")
}
