// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Module, function, and struct identifiers of the voting contracts.
//!
//! Argument order of every function is noted next to its identifier; the transaction builder
//! relies on it and does not validate it against the on-chain signature.

use std::fmt;

use anyhow::Result;
use move_core_types::language_storage::StructTag as MoveStructTag;
use sui_types::{Identifier, base_types::ObjectID};

/// A Move function of one of the voting modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionTag<'a> {
    /// The module containing the function.
    pub module: &'a str,
    /// The function name.
    pub name: &'a str,
}

impl FunctionTag<'_> {
    /// Returns the `module::function` identifier.
    pub fn target(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }
}

impl fmt::Display for FunctionTag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// A Move struct of one of the voting modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructTag<'a> {
    /// The module containing the struct.
    pub module: &'a str,
    /// The struct name.
    pub name: &'a str,
}

impl StructTag<'_> {
    /// Returns the fully qualified Move struct tag for the given package.
    pub fn to_move_struct_tag(&self, package_id: ObjectID) -> Result<MoveStructTag> {
        Ok(MoveStructTag {
            address: package_id.into(),
            module: Identifier::new(self.module)?,
            name: Identifier::new(self.name)?,
            type_params: vec![],
        })
    }

    /// Returns the `package::module::Name` type string as rendered by the full node.
    pub fn type_string(&self, package_id: ObjectID) -> String {
        format!("{}::{}::{}", package_id, self.module, self.name)
    }

    /// The `::module::Name` suffix shared by all packages, used to recognize object types.
    pub fn type_suffix(&self) -> String {
        format!("::{}::{}", self.module, self.name)
    }
}

macro_rules! contract_ident {
    (struct $modname:ident::$itemname:ident) => {
        #[allow(non_upper_case_globals)]
        #[doc = concat!("Move struct `", stringify!($modname), "::", stringify!($itemname), "`.")]
        pub const $itemname: StructTag = StructTag {
            module: stringify!($modname),
            name: stringify!($itemname),
        };
    };
    (fn $modname:ident::$itemname:ident ($($args:tt)*)) => {
        #[allow(non_upper_case_globals)]
        #[doc = concat!(
            "Move function `", stringify!($modname), "::", stringify!($itemname),
            "(", stringify!($($args)*), ")`."
        )]
        pub const $itemname: FunctionTag = FunctionTag {
            module: stringify!($modname),
            name: stringify!($itemname),
        };
    };
}

/// The registry of proposals, ballots, and administrators.
pub mod dashboard {
    use super::*;

    contract_ident!(struct dashboard::Dashboard);
    contract_ident!(struct dashboard::AdminCap);
    contract_ident!(struct dashboard::SuperAdminCap);

    contract_ident!(fn dashboard::grant_admin(admin_cap, dashboard, new_admin: address));
    contract_ident!(fn dashboard::grant_admin_super(super_admin_cap, dashboard, new_admin: address));
    contract_ident!(fn dashboard::grant_super_admin(super_admin_cap, dashboard, new_admin: address));
    contract_ident!(fn dashboard::revoke_admin(super_admin_cap, dashboard, admin: address));
    contract_ident!(fn dashboard::revoke_super_admin(super_admin_cap, dashboard, admin: address));
    contract_ident!(fn dashboard::register_proposal(dashboard, admin_cap, proposal_id: ID));
    contract_ident!(fn dashboard::register_proposal_super(dashboard, super_admin_cap, proposal_id: ID));
    contract_ident!(fn dashboard::register_voter_for_private_proposal(
        dashboard, admin_cap, proposal_id: ID, voter: address
    ));
    contract_ident!(fn dashboard::register_voter_for_private_proposal_super(
        dashboard, super_admin_cap, proposal_id: ID, voter: address
    ));
    contract_ident!(fn dashboard::unregister_voter_for_private_proposal(
        dashboard, admin_cap, proposal_id: ID, voter: address
    ));
    contract_ident!(fn dashboard::unregister_voter_for_private_proposal_super(
        dashboard, super_admin_cap, proposal_id: ID, voter: address
    ));
    contract_ident!(fn dashboard::is_voter_registered_for_proposal(
        dashboard, proposal_id: ID, voter: address
    ));
    contract_ident!(fn dashboard::get_registered_voters(dashboard, proposal_id: ID));
}

/// Yes/no proposals.
pub mod proposal {
    use super::*;

    contract_ident!(struct proposal::Proposal);
    contract_ident!(struct proposal::VoteProofNFT);

    contract_ident!(fn proposal::create(
        admin_cap, title: String, description: String, expiration: u64, is_private: bool
    ));
    contract_ident!(fn proposal::create_super(
        super_admin_cap, title: String, description: String, expiration: u64, is_private: bool
    ));
    contract_ident!(fn proposal::vote(proposal, dashboard, vote_yes: bool, clock));
    contract_ident!(fn proposal::set_active_status(admin_cap, proposal, clock));
    contract_ident!(fn proposal::set_active_status_super(super_admin_cap, proposal, clock));
    contract_ident!(fn proposal::set_delisted_status(admin_cap, proposal));
    contract_ident!(fn proposal::set_delisted_status_super(super_admin_cap, proposal));
    contract_ident!(fn proposal::remove(proposal, admin_cap));
    contract_ident!(fn proposal::remove_super(proposal, super_admin_cap));
    contract_ident!(fn proposal::change_expiration_date(
        proposal, admin_cap, expiration: u64, clock
    ));
}

/// Multi-candidate ballots.
pub mod ballot {
    use super::*;

    contract_ident!(struct ballot::Ballot);
    contract_ident!(struct ballot::Candidate);

    contract_ident!(fn ballot::create_ballot(
        admin_cap, title: String, description: String, expiration: u64, is_private: bool, clock
    ));
    contract_ident!(fn ballot::create_ballot_super(
        super_admin_cap, title: String, description: String, expiration: u64, is_private: bool,
        clock
    ));
    contract_ident!(fn ballot::add_candidate(ballot, admin_cap, name: String, description: String));
    contract_ident!(fn ballot::add_candidate_super(
        ballot, super_admin_cap, name: String, description: String
    ));
    contract_ident!(fn ballot::add_candidate_with_image(
        ballot, admin_cap, name: String, description: String, image_url: String
    ));
    contract_ident!(fn ballot::add_candidate_with_image_super(
        ballot, super_admin_cap, name: String, description: String, image_url: String
    ));
    contract_ident!(fn ballot::vote(ballot, candidate_id: u64, clock));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_tags_are_qualified_by_package() -> Result<()> {
        let package_id = ObjectID::from_hex_literal("0x42")?;
        let tag = dashboard::AdminCap.to_move_struct_tag(package_id)?;

        assert_eq!(tag.module.as_str(), "dashboard");
        assert_eq!(tag.name.as_str(), "AdminCap");
        assert_eq!(ObjectID::from(tag.address), package_id);
        assert!(
            dashboard::AdminCap
                .type_string(package_id)
                .ends_with(&dashboard::AdminCap.type_suffix())
        );
        Ok(())
    }

    #[test]
    fn function_targets() {
        assert_eq!(
            proposal::set_delisted_status_super.target(),
            "proposal::set_delisted_status_super"
        );
        assert_eq!(ballot::vote.to_string(), "ballot::vote");
    }
}
