// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Rust counterparts of the voting contracts' objects, events, and errors.

pub mod events;
pub mod move_errors;
pub mod move_structs;

pub use events::{BallotVoteCast, ChainEvent, ProposalVoteCast, VoteConfirmation};
pub use move_structs::{
    Ballot,
    Candidate,
    CapabilityHandle,
    Dashboard,
    Proposal,
    Status,
    VoteProof,
};
