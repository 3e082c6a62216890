// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::SubCmd;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Opt {
    /// Credential profile to act as, e.g. "dz-issuing" or "evonik".
    ///
    /// A bare entity name maps to its general role. The profile's entity
    /// also provides the fallback signer when a requested address matches
    /// no loaded credential.
    #[clap(long = "as", global = true, value_name = "entity[-role]")]
    pub act_as: Option<String>,

    /// Directory holding `.{entity}-{role}.env` credential files.
    ///
    /// Defaults to the `cbmt/credentials` directory under the platform
    /// data dir.
    #[clap(long, global = true, value_name = "dir")]
    pub credentials_dir: Option<PathBuf>,

    /// Number of confirmations to wait for after each transaction.
    #[clap(long, global = true, default_value_t = 3)]
    pub confirmations: u64,

    #[command(flatten)]
    pub(crate) verbose: clap_verbosity_flag::Verbosity,

    /// Available sub commands.
    #[clap(subcommand)]
    pub command: SubCmd,
}
