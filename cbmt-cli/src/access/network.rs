// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

use cbmtlib::utils::{
    cbmt_network_from_env, CBMT_CONTRACT_ADDRESS, CBMT_RPC_URL, ESCROW_CBMT_ADDRESS,
    GENERAL_CBMT_ADDRESS,
};
use cbmtlib::Network;
use color_eyre::eyre::Context;
use color_eyre::Result;
use color_eyre::Section;

pub fn get_network() -> Result<Network> {
    cbmt_network_from_env()
        .wrap_err("Please provide a valid CBMT network deployment to connect to")
        .with_suggestion(|| {
            format!(
                "make sure you've set the {CBMT_RPC_URL}, {GENERAL_CBMT_ADDRESS}, {CBMT_CONTRACT_ADDRESS} and {ESCROW_CBMT_ADDRESS} env vars"
            )
        })
        .with_suggestion(|| "a contract address looks like this: 0x5FbDB2315678afecb367f032d93F642f64180aa3")
}
