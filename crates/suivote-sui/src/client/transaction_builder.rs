// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Construction of calls to the voting contracts.
//!
//! [`VotingCallBuilder`] produces [`CallPlan`]s without any I/O. A plan is turned into a
//! programmable transaction by [`CallPlan::resolve`], which looks up the references of the object
//! arguments. Argument order follows the contract signatures documented in
//! [`contracts`][crate::contracts]; it is not checked locally.

use std::str::FromStr;

use anyhow::anyhow;
use sui_types::{
    Identifier,
    SUI_CLOCK_OBJECT_ID,
    SUI_CLOCK_OBJECT_SHARED_VERSION,
    base_types::{ObjectID, SuiAddress},
    programmable_transaction_builder::ProgrammableTransactionBuilder,
    transaction::{Argument, ObjectArg, ProgrammableTransaction, SharedObjectMutability},
};

use super::{
    SuiClientResult,
    capability::{AuthorizedCap, CapabilityKind},
    read_client::{ChainReadApi, Mutability},
};
use crate::contracts::{FunctionTag, ballot, dashboard, proposal};

/// A pure argument with its wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PureArg {
    /// `address`.
    Address(SuiAddress),
    /// `bool`.
    Bool(bool),
    /// `u64`.
    U64(u64),
    /// `0x1::string::String`.
    String(String),
    /// `0x2::object::ID`.
    Id(ObjectID),
}

impl PureArg {
    fn add_to(&self, pt_builder: &mut ProgrammableTransactionBuilder) -> anyhow::Result<Argument> {
        match self {
            Self::Address(address) => pt_builder.pure(*address),
            Self::Bool(value) => pt_builder.pure(*value),
            Self::U64(value) => pt_builder.pure(*value),
            Self::String(value) => pt_builder.pure(value.as_str()),
            Self::Id(id) => pt_builder.pure(*id),
        }
    }
}

/// An argument of a planned call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanArg {
    /// An object owned by the sender, such as a capability.
    Owned(ObjectID),
    /// A shared object.
    Shared {
        /// The object.
        id: ObjectID,
        /// Whether the call mutates it.
        mutability: Mutability,
    },
    /// The shared `0x6::clock::Clock`.
    Clock,
    /// A pure value.
    Pure(PureArg),
    /// The result of the call at the given index of the same plan.
    Result(usize),
}

impl PlanArg {
    fn shared_mut(id: ObjectID) -> Self {
        Self::Shared {
            id,
            mutability: Mutability::Mutable,
        }
    }

    fn shared(id: ObjectID) -> Self {
        Self::Shared {
            id,
            mutability: Mutability::Immutable,
        }
    }
}

/// One Move call of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCall {
    /// The called function.
    pub function: FunctionTag<'static>,
    /// The arguments, in signature order.
    pub arguments: Vec<PlanArg>,
}

/// An ordered sequence of calls forming one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    package_id: ObjectID,
    calls: Vec<PlannedCall>,
}

impl CallPlan {
    fn single(
        package_id: ObjectID,
        function: FunctionTag<'static>,
        arguments: Vec<PlanArg>,
    ) -> Self {
        Self {
            package_id,
            calls: vec![PlannedCall {
                function,
                arguments,
            }],
        }
    }

    /// The package called.
    pub fn package_id(&self) -> ObjectID {
        self.package_id
    }

    /// The calls, in execution order.
    pub fn calls(&self) -> &[PlannedCall] {
        &self.calls
    }

    /// The function of the first call, which names the action.
    pub fn primary_function(&self) -> Option<FunctionTag<'static>> {
        self.calls.first().map(|call| call.function)
    }

    /// The shared objects the plan may mutate, without duplicates.
    pub fn mutated_objects(&self) -> Vec<ObjectID> {
        let mut ids: Vec<_> = self
            .calls
            .iter()
            .flat_map(|call| &call.arguments)
            .filter_map(|argument| match argument {
                PlanArg::Shared {
                    id,
                    mutability: Mutability::Mutable,
                } => Some(*id),
                _ => None,
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Resolves the object arguments and builds the programmable transaction.
    pub async fn resolve(
        &self,
        read_client: &dyn ChainReadApi,
    ) -> SuiClientResult<ProgrammableTransaction> {
        let mut pt_builder = ProgrammableTransactionBuilder::new();
        let mut results = Vec::with_capacity(self.calls.len());

        for call in &self.calls {
            let mut arguments = Vec::with_capacity(call.arguments.len());
            for argument in &call.arguments {
                let argument = match argument {
                    PlanArg::Owned(id) => {
                        pt_builder.obj(read_client.object_arg(*id, Mutability::Mutable).await?)?
                    }
                    PlanArg::Shared { id, mutability } => {
                        pt_builder.obj(read_client.object_arg(*id, *mutability).await?)?
                    }
                    PlanArg::Clock => pt_builder.obj(ObjectArg::SharedObject {
                        id: SUI_CLOCK_OBJECT_ID,
                        initial_shared_version: SUI_CLOCK_OBJECT_SHARED_VERSION,
                        mutability: SharedObjectMutability::Immutable,
                    })?,
                    PlanArg::Pure(value) => value.add_to(&mut pt_builder)?,
                    PlanArg::Result(index) => *results.get(*index).ok_or_else(|| {
                        anyhow!(
                            "call {} refers to the result of a later call {index}",
                            call.function
                        )
                    })?,
                };
                arguments.push(argument);
            }
            results.push(pt_builder.programmable_move_call(
                self.package_id,
                Identifier::from_str(call.function.module)?,
                Identifier::from_str(call.function.name)?,
                vec![],
                arguments,
            ));
        }

        Ok(pt_builder.finish())
    }
}

/// Builds [`CallPlan`]s for the functions of the voting package.
///
/// Where a function has a `_super` variant, the variant is chosen by the kind of the capability
/// passed in; callers pass [`Privileges::strongest`][super::capability::Privileges::strongest] to
/// prefer the super-admin path when both capabilities are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingCallBuilder {
    package_id: ObjectID,
    dashboard_id: ObjectID,
}

impl VotingCallBuilder {
    /// Creates a builder for the given package and dashboard.
    pub fn new(package_id: ObjectID, dashboard_id: ObjectID) -> Self {
        Self {
            package_id,
            dashboard_id,
        }
    }

    fn variant(
        cap: AuthorizedCap,
        admin: FunctionTag<'static>,
        super_admin: FunctionTag<'static>,
    ) -> FunctionTag<'static> {
        match cap.kind {
            CapabilityKind::AdminCap => admin,
            CapabilityKind::SuperAdminCap => super_admin,
        }
    }

    fn dashboard(&self) -> PlanArg {
        PlanArg::shared_mut(self.dashboard_id)
    }

    /// `dashboard::grant_admin` or `dashboard::grant_admin_super`.
    pub fn grant_admin(&self, cap: AuthorizedCap, new_admin: SuiAddress) -> CallPlan {
        CallPlan::single(
            self.package_id,
            Self::variant(cap, dashboard::grant_admin, dashboard::grant_admin_super),
            vec![
                PlanArg::Owned(cap.cap_id),
                self.dashboard(),
                PlanArg::Pure(PureArg::Address(new_admin)),
            ],
        )
    }

    /// `dashboard::grant_super_admin`.
    pub fn grant_super_admin(&self, super_admin_cap: ObjectID, new_admin: SuiAddress) -> CallPlan {
        self.super_admin_call(dashboard::grant_super_admin, super_admin_cap, new_admin)
    }

    /// `dashboard::revoke_admin`.
    pub fn revoke_admin(&self, super_admin_cap: ObjectID, admin: SuiAddress) -> CallPlan {
        self.super_admin_call(dashboard::revoke_admin, super_admin_cap, admin)
    }

    /// `dashboard::revoke_super_admin`.
    pub fn revoke_super_admin(&self, super_admin_cap: ObjectID, admin: SuiAddress) -> CallPlan {
        self.super_admin_call(dashboard::revoke_super_admin, super_admin_cap, admin)
    }

    fn super_admin_call(
        &self,
        function: FunctionTag<'static>,
        super_admin_cap: ObjectID,
        address: SuiAddress,
    ) -> CallPlan {
        CallPlan::single(
            self.package_id,
            function,
            vec![
                PlanArg::Owned(super_admin_cap),
                self.dashboard(),
                PlanArg::Pure(PureArg::Address(address)),
            ],
        )
    }

    /// `dashboard::register_proposal[_super]` for an existing proposal or ballot.
    pub fn register_proposal(&self, cap: AuthorizedCap, proposal_id: ObjectID) -> CallPlan {
        CallPlan::single(
            self.package_id,
            Self::variant(
                cap,
                dashboard::register_proposal,
                dashboard::register_proposal_super,
            ),
            vec![
                self.dashboard(),
                PlanArg::Owned(cap.cap_id),
                PlanArg::Pure(PureArg::Id(proposal_id)),
            ],
        )
    }

    /// `dashboard::register_voter_for_private_proposal[_super]`.
    pub fn register_voter(
        &self,
        cap: AuthorizedCap,
        proposal_id: ObjectID,
        voter: SuiAddress,
    ) -> CallPlan {
        self.voter_registry_call(
            Self::variant(
                cap,
                dashboard::register_voter_for_private_proposal,
                dashboard::register_voter_for_private_proposal_super,
            ),
            cap,
            proposal_id,
            voter,
        )
    }

    /// `dashboard::unregister_voter_for_private_proposal[_super]`.
    pub fn unregister_voter(
        &self,
        cap: AuthorizedCap,
        proposal_id: ObjectID,
        voter: SuiAddress,
    ) -> CallPlan {
        self.voter_registry_call(
            Self::variant(
                cap,
                dashboard::unregister_voter_for_private_proposal,
                dashboard::unregister_voter_for_private_proposal_super,
            ),
            cap,
            proposal_id,
            voter,
        )
    }

    fn voter_registry_call(
        &self,
        function: FunctionTag<'static>,
        cap: AuthorizedCap,
        proposal_id: ObjectID,
        voter: SuiAddress,
    ) -> CallPlan {
        CallPlan::single(
            self.package_id,
            function,
            vec![
                self.dashboard(),
                PlanArg::Owned(cap.cap_id),
                PlanArg::Pure(PureArg::Id(proposal_id)),
                PlanArg::Pure(PureArg::Address(voter)),
            ],
        )
    }

    /// `dashboard::is_voter_registered_for_proposal`, for dev-inspect.
    pub fn is_voter_registered(&self, proposal_id: ObjectID, voter: SuiAddress) -> CallPlan {
        CallPlan::single(
            self.package_id,
            dashboard::is_voter_registered_for_proposal,
            vec![
                PlanArg::shared(self.dashboard_id),
                PlanArg::Pure(PureArg::Id(proposal_id)),
                PlanArg::Pure(PureArg::Address(voter)),
            ],
        )
    }

    /// `dashboard::get_registered_voters`, for dev-inspect.
    pub fn registered_voters(&self, proposal_id: ObjectID) -> CallPlan {
        CallPlan::single(
            self.package_id,
            dashboard::get_registered_voters,
            vec![
                PlanArg::shared(self.dashboard_id),
                PlanArg::Pure(PureArg::Id(proposal_id)),
            ],
        )
    }

    /// `proposal::create[_super]` followed by the registration of the new proposal.
    pub fn create_proposal(
        &self,
        cap: AuthorizedCap,
        title: &str,
        description: &str,
        expiration_ms: u64,
        is_private: bool,
    ) -> CallPlan {
        let create = PlannedCall {
            function: Self::variant(cap, proposal::create, proposal::create_super),
            arguments: vec![
                PlanArg::Owned(cap.cap_id),
                PlanArg::Pure(PureArg::String(title.to_owned())),
                PlanArg::Pure(PureArg::String(description.to_owned())),
                PlanArg::Pure(PureArg::U64(expiration_ms)),
                PlanArg::Pure(PureArg::Bool(is_private)),
            ],
        };
        self.create_and_register(cap, create)
    }

    /// `ballot::create_ballot[_super]` followed by the registration of the new ballot.
    pub fn create_ballot(
        &self,
        cap: AuthorizedCap,
        title: &str,
        description: &str,
        expiration_ms: u64,
        is_private: bool,
    ) -> CallPlan {
        let create = PlannedCall {
            function: Self::variant(cap, ballot::create_ballot, ballot::create_ballot_super),
            arguments: vec![
                PlanArg::Owned(cap.cap_id),
                PlanArg::Pure(PureArg::String(title.to_owned())),
                PlanArg::Pure(PureArg::String(description.to_owned())),
                PlanArg::Pure(PureArg::U64(expiration_ms)),
                PlanArg::Pure(PureArg::Bool(is_private)),
                PlanArg::Clock,
            ],
        };
        self.create_and_register(cap, create)
    }

    fn create_and_register(&self, cap: AuthorizedCap, create: PlannedCall) -> CallPlan {
        let register = PlannedCall {
            function: Self::variant(
                cap,
                dashboard::register_proposal,
                dashboard::register_proposal_super,
            ),
            arguments: vec![self.dashboard(), PlanArg::Owned(cap.cap_id), PlanArg::Result(0)],
        };
        CallPlan {
            package_id: self.package_id,
            calls: vec![create, register],
        }
    }

    /// `proposal::vote`.
    pub fn vote(&self, proposal_id: ObjectID, vote_yes: bool) -> CallPlan {
        CallPlan::single(
            self.package_id,
            proposal::vote,
            vec![
                PlanArg::shared_mut(proposal_id),
                PlanArg::shared(self.dashboard_id),
                PlanArg::Pure(PureArg::Bool(vote_yes)),
                PlanArg::Clock,
            ],
        )
    }

    /// `proposal::set_active_status[_super]`.
    pub fn set_active_status(&self, cap: AuthorizedCap, proposal_id: ObjectID) -> CallPlan {
        CallPlan::single(
            self.package_id,
            Self::variant(
                cap,
                proposal::set_active_status,
                proposal::set_active_status_super,
            ),
            vec![
                PlanArg::Owned(cap.cap_id),
                PlanArg::shared_mut(proposal_id),
                PlanArg::Clock,
            ],
        )
    }

    /// `proposal::set_delisted_status[_super]`.
    pub fn set_delisted_status(&self, cap: AuthorizedCap, proposal_id: ObjectID) -> CallPlan {
        CallPlan::single(
            self.package_id,
            Self::variant(
                cap,
                proposal::set_delisted_status,
                proposal::set_delisted_status_super,
            ),
            vec![PlanArg::Owned(cap.cap_id), PlanArg::shared_mut(proposal_id)],
        )
    }

    /// `proposal::remove[_super]`.
    pub fn remove_proposal(&self, cap: AuthorizedCap, proposal_id: ObjectID) -> CallPlan {
        CallPlan::single(
            self.package_id,
            Self::variant(cap, proposal::remove, proposal::remove_super),
            vec![PlanArg::shared_mut(proposal_id), PlanArg::Owned(cap.cap_id)],
        )
    }

    /// `proposal::change_expiration_date`, which only exists for the admin capability.
    pub fn change_expiration_date(
        &self,
        admin_cap: ObjectID,
        proposal_id: ObjectID,
        expiration_ms: u64,
    ) -> CallPlan {
        CallPlan::single(
            self.package_id,
            proposal::change_expiration_date,
            vec![
                PlanArg::shared_mut(proposal_id),
                PlanArg::Owned(admin_cap),
                PlanArg::Pure(PureArg::U64(expiration_ms)),
                PlanArg::Clock,
            ],
        )
    }

    /// `ballot::add_candidate[_super]`, or the `_with_image` variant if an image is given.
    pub fn add_candidate(
        &self,
        cap: AuthorizedCap,
        ballot_id: ObjectID,
        name: &str,
        description: &str,
        image_url: Option<&str>,
    ) -> CallPlan {
        let mut arguments = vec![
            PlanArg::shared_mut(ballot_id),
            PlanArg::Owned(cap.cap_id),
            PlanArg::Pure(PureArg::String(name.to_owned())),
            PlanArg::Pure(PureArg::String(description.to_owned())),
        ];
        let function = match image_url {
            Some(image_url) => {
                arguments.push(PlanArg::Pure(PureArg::String(image_url.to_owned())));
                Self::variant(
                    cap,
                    ballot::add_candidate_with_image,
                    ballot::add_candidate_with_image_super,
                )
            }
            None => Self::variant(cap, ballot::add_candidate, ballot::add_candidate_super),
        };
        CallPlan::single(self.package_id, function, arguments)
    }

    /// `ballot::vote`.
    pub fn vote_ballot(&self, ballot_id: ObjectID, candidate_id: u64) -> CallPlan {
        CallPlan::single(
            self.package_id,
            ballot::vote,
            vec![
                PlanArg::shared_mut(ballot_id),
                PlanArg::Pure(PureArg::U64(candidate_id)),
                PlanArg::Clock,
            ],
        )
    }
}
