// Copyright 2024 CBMT Developers.
//
// This CBMT Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the CBMT Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the CBMT Software.

pub(crate) mod credentials;
pub(crate) mod network;
