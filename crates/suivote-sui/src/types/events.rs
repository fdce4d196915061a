// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Events emitted by the voting contracts.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sui_sdk::rpc_types::SuiEvent;
use sui_types::base_types::{ObjectID, SuiAddress};

use crate::decoder::FieldBag;

const PROPOSAL_VOTE_EVENT: &str = "::proposal::VoteCast";
const BALLOT_VOTE_EVENT: &str = "::ballot::VoteCast";

/// An event as emitted by a transaction, reduced to the parts this crate reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// The Move type of the event, e.g. `0x..::proposal::VoteCast`.
    pub event_type: String,
    /// The sender of the emitting transaction.
    pub sender: Option<SuiAddress>,
    /// The event fields as JSON.
    pub parsed_json: Value,
}

impl From<&SuiEvent> for ChainEvent {
    fn from(event: &SuiEvent) -> Self {
        Self {
            event_type: event.type_.to_canonical_string(true),
            sender: Some(event.sender),
            parsed_json: event.parsed_json.clone(),
        }
    }
}

fn ensure_event_type(event: &ChainEvent, suffix: &str) -> Result<()> {
    if !event.event_type.ends_with(suffix) {
        bail!(
            "event type {} does not match the expected type {}",
            event.event_type,
            suffix
        );
    }
    Ok(())
}

/// A vote on a yes/no proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVoteCast {
    /// The proposal voted on.
    pub proposal_id: Option<ObjectID>,
    /// The voter.
    pub voter: Option<SuiAddress>,
    /// Whether the vote was in favor.
    pub vote_yes: bool,
}

impl TryFrom<&ChainEvent> for ProposalVoteCast {
    type Error = anyhow::Error;

    fn try_from(event: &ChainEvent) -> Result<Self> {
        ensure_event_type(event, PROPOSAL_VOTE_EVENT)?;
        let fields = FieldBag::new(Some(&event.parsed_json));
        Ok(Self {
            proposal_id: fields.object_id("proposal_id"),
            voter: fields.address("voter"),
            vote_yes: fields.bool("vote_yes"),
        })
    }
}

/// A vote for a ballot candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotVoteCast {
    /// The ballot voted on.
    pub ballot_id: Option<ObjectID>,
    /// The voter.
    pub voter: Option<SuiAddress>,
    /// The candidate chosen.
    pub candidate_id: u64,
}

impl TryFrom<&ChainEvent> for BallotVoteCast {
    type Error = anyhow::Error;

    fn try_from(event: &ChainEvent) -> Result<Self> {
        ensure_event_type(event, BALLOT_VOTE_EVENT)?;
        let fields = FieldBag::new(Some(&event.parsed_json));
        Ok(Self {
            ballot_id: fields.object_id("ballot_id"),
            voter: fields.address("voter"),
            candidate_id: fields.u64("candidate_id"),
        })
    }
}

/// Structured confirmation of a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteConfirmation {
    /// A proposal vote.
    Proposal(ProposalVoteCast),
    /// A ballot vote.
    Ballot(BallotVoteCast),
}

impl VoteConfirmation {
    /// Extracts the vote confirmations contained in `events`, skipping unrelated events.
    pub fn from_events(events: &[ChainEvent]) -> Vec<Self> {
        events
            .iter()
            .filter_map(|event| {
                ProposalVoteCast::try_from(event)
                    .map(Self::Proposal)
                    .or_else(|_| BallotVoteCast::try_from(event).map(Self::Ballot))
                    .ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(event_type: &str, parsed_json: Value) -> ChainEvent {
        ChainEvent {
            event_type: event_type.to_owned(),
            sender: None,
            parsed_json,
        }
    }

    #[test]
    fn vote_events_are_recognized() {
        let events = [
            event(
                "0x2a::proposal::VoteCast",
                json!({ "proposal_id": "0xa", "voter": "0x1", "vote_yes": true }),
            ),
            event("0x2::coin::CoinCreated", json!({})),
            event(
                "0x2a::ballot::VoteCast",
                json!({ "ballot_id": "0xb", "voter": "0x1", "candidate_id": "2" }),
            ),
        ];

        let confirmations = VoteConfirmation::from_events(&events);
        assert_eq!(confirmations.len(), 2);
        assert!(matches!(
            confirmations[0],
            VoteConfirmation::Proposal(ProposalVoteCast { vote_yes: true, .. })
        ));
        assert!(matches!(
            confirmations[1],
            VoteConfirmation::Ballot(BallotVoteCast { candidate_id: 2, .. })
        ));
    }

    #[test]
    fn wrong_event_type_is_rejected() {
        let result = ProposalVoteCast::try_from(&event("0x2a::ballot::VoteCast", json!({})));
        assert!(result.is_err());
    }
}
