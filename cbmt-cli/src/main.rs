// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

#[macro_use]
extern crate tracing;

mod access;
mod commands;
mod opt;

use clap::Parser;
use color_eyre::Result;
use opt::Opt;
use tracing_log::AsTrace;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::parse();

    let registry = tracing_subscriber::registry().with(tracing_subscriber::fmt::layer());
    // Use `RUST_LOG` if set, else use the verbosity flag (where `-vvvv` is trace level).
    let _ = if std::env::var_os("RUST_LOG").is_some() {
        registry.with(EnvFilter::from_env("RUST_LOG")).try_init()
    } else {
        let level = opt.verbose.log_level_filter().as_trace();
        let filter = tracing_subscriber::filter::Targets::new()
            .with_target(env!("CARGO_BIN_NAME").replace('-', "_"), level)
            .with_target("cbmtlib", level);
        registry.with(filter).try_init()
    };

    commands::handle_subcommand(opt).await
}
