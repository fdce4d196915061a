// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Links to transactions, accounts, and objects in a block explorer.

use sui_types::base_types::{ObjectID, SuiAddress, TransactionDigest};

use crate::config::Network;

const SUISCAN_BASE_URL: &str = "https://suiscan.xyz";

/// Builds explorer links for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explorer {
    network: Network,
    base_url: Option<String>,
}

impl Explorer {
    /// Creates an explorer for `network`.
    ///
    /// Links point to Suiscan unless `base_url` is given, in which case they are rooted at it.
    pub fn new(network: Network, base_url: Option<String>) -> Self {
        Self { network, base_url }
    }

    /// The network links are built for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Link to a transaction.
    pub fn transaction_url(&self, digest: &TransactionDigest) -> String {
        self.url("tx", &digest.to_string())
    }

    /// Link to an account.
    pub fn address_url(&self, address: &SuiAddress) -> String {
        self.url("account", &address.to_string())
    }

    /// Link to an object.
    pub fn object_url(&self, object_id: &ObjectID) -> String {
        self.url("object", &object_id.to_string())
    }

    fn url(&self, kind: &str, id: &str) -> String {
        match &self.base_url {
            Some(base_url) => format!("{}/{kind}/{id}", base_url.trim_end_matches('/')),
            None => format!("{SUISCAN_BASE_URL}/{}/{kind}/{id}", self.network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_parameterized_by_network() {
        let digest = TransactionDigest::new([1; 32]);
        let explorer = Explorer::new(Network::Devnet, None);

        assert_eq!(
            explorer.transaction_url(&digest),
            format!("https://suiscan.xyz/devnet/tx/{digest}")
        );
        assert!(
            explorer
                .address_url(&SuiAddress::ZERO)
                .starts_with("https://suiscan.xyz/devnet/account/0x")
        );
        assert!(
            Explorer::new(Network::Mainnet, None)
                .object_url(&ObjectID::ZERO)
                .starts_with("https://suiscan.xyz/mainnet/object/0x")
        );
    }

    #[test]
    fn custom_base_url_overrides_the_default() {
        let explorer = Explorer::new(Network::Localnet, Some("http://localhost:3000/".into()));

        assert_eq!(
            explorer.object_url(&ObjectID::ZERO),
            format!("http://localhost:3000/object/{}", ObjectID::ZERO)
        );
    }
}
