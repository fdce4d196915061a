// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Records decoded from the voting contracts' Move objects.

use std::fmt;

use serde::{Deserialize, Serialize};
use sui_types::base_types::{ObjectID, SuiAddress};

use crate::decoder::{FieldBag, MoveRecord};

/// Lifecycle status of a proposal or ballot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Open for votes.
    Active,
    /// The expiration date has passed.
    Expired,
    /// Hidden by an administrator.
    Delisted,
    /// Closed with a majority in favor.
    Passed,
    /// Closed with a majority against.
    Rejected,
    /// The status field is missing.
    Unknown,
    /// A tag or raw value that is not one of the known variants.
    Other(String),
}

impl Status {
    /// Maps a variant name to a status, ignoring case.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "expired" => Self::Expired,
            "delisted" => Self::Delisted,
            "passed" => Self::Passed,
            "rejected" => Self::Rejected,
            _ => Self::Other(tag.to_owned()),
        }
    }

    /// Returns true if the status allows voting.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Expired => write!(f, "Expired"),
            Self::Delisted => write!(f, "Delisted"),
            Self::Passed => write!(f, "Passed"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Unknown => write!(f, "Unknown"),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// The dashboard registry object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Object ID of the dashboard.
    pub id: ObjectID,
    /// IDs of all registered proposals and ballots.
    pub proposals_ids: Vec<ObjectID>,
    /// Addresses holding an admin capability.
    pub admin_addresses: Vec<SuiAddress>,
    /// Addresses holding a super-admin capability.
    pub super_admin_addresses: Vec<SuiAddress>,
}

impl Dashboard {
    /// Returns true if `address` is listed as an admin or super admin.
    pub fn is_admin(&self, address: &SuiAddress) -> bool {
        self.admin_addresses.contains(address) || self.is_super_admin(address)
    }

    /// Returns true if `address` is listed as a super admin.
    pub fn is_super_admin(&self, address: &SuiAddress) -> bool {
        self.super_admin_addresses.contains(address)
    }
}

impl MoveRecord for Dashboard {
    fn from_fields(id: ObjectID, fields: &FieldBag<'_>) -> Self {
        Self {
            id,
            proposals_ids: fields.id_list("proposals_ids"),
            admin_addresses: fields.address_set("admin_addresses"),
            super_admin_addresses: fields.address_set("super_admin_addresses"),
        }
    }
}

/// A yes/no proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Object ID of the proposal.
    pub id: ObjectID,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Number of yes votes.
    pub voted_yes_count: u64,
    /// Number of no votes.
    pub voted_no_count: u64,
    /// Expiration time in milliseconds since the Unix epoch.
    pub expiration_ms: u64,
    /// Creator of the proposal.
    pub creator: Option<SuiAddress>,
    /// Lifecycle status.
    pub status: Status,
    /// Whether only registered voters may vote.
    pub is_private: bool,
    /// Voters registered for a private proposal, if the object exposes them.
    pub voter_registry: Vec<SuiAddress>,
}

impl Proposal {
    /// Total number of votes cast.
    pub fn total_votes(&self) -> u64 {
        self.voted_yes_count.saturating_add(self.voted_no_count)
    }

    /// Returns true if the proposal is expired at `now_ms`, by status or by date.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.status == Status::Expired || (self.expiration_ms != 0 && self.expiration_ms <= now_ms)
    }
}

impl MoveRecord for Proposal {
    fn from_fields(id: ObjectID, fields: &FieldBag<'_>) -> Self {
        Self {
            id,
            title: fields.string("title"),
            description: fields.string("description"),
            voted_yes_count: fields.u64("voted_yes_count"),
            voted_no_count: fields.u64("voted_no_count"),
            expiration_ms: fields.timestamp_ms("expiration"),
            creator: fields.address("creator"),
            status: fields.status("status"),
            is_private: fields.bool("is_private"),
            voter_registry: fields.address_set("voter_registry"),
        }
    }
}

/// A candidate of a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate number, unique within the ballot.
    pub id: u64,
    /// Name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Optional image URL.
    pub image_url: Option<String>,
    /// Number of votes received.
    pub votes: u64,
}

impl Candidate {
    fn from_fields(fields: &FieldBag<'_>) -> Self {
        Self {
            id: fields.u64("id"),
            name: fields.string("name"),
            description: fields.string("description"),
            image_url: fields
                .optional_string("image_url")
                .filter(|url| !url.is_empty()),
            votes: fields.u64("votes"),
        }
    }
}

/// A multi-candidate ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// Object ID of the ballot.
    pub id: ObjectID,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Expiration time in milliseconds since the Unix epoch.
    pub expiration_ms: u64,
    /// Creator of the ballot.
    pub creator: Option<SuiAddress>,
    /// Lifecycle status.
    pub status: Status,
    /// Whether only registered voters may vote.
    pub is_private: bool,
    /// Candidates in contract order.
    pub candidates: Vec<Candidate>,
    /// Total number of votes cast.
    pub total_votes: u64,
}

impl Ballot {
    /// Returns the candidate with the most votes; ties resolve to the lower candidate ID.
    pub fn leading_candidate(&self) -> Option<&Candidate> {
        self.candidates
            .iter()
            .max_by(|a, b| a.votes.cmp(&b.votes).then(b.id.cmp(&a.id)))
    }

    /// Returns true if the ballot is expired at `now_ms`, by status or by date.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.status == Status::Expired || (self.expiration_ms != 0 && self.expiration_ms <= now_ms)
    }
}

impl MoveRecord for Ballot {
    fn from_fields(id: ObjectID, fields: &FieldBag<'_>) -> Self {
        let candidates: Vec<_> = fields
            .items("candidates")
            .iter()
            .map(Candidate::from_fields)
            .collect();
        let total_votes = match fields.u64("total_votes") {
            0 => candidates
                .iter()
                .fold(0u64, |sum, candidate| sum.saturating_add(candidate.votes)),
            total => total,
        };
        Self {
            id,
            title: fields.string("title"),
            description: fields.string("description"),
            expiration_ms: fields.timestamp_ms("expiration"),
            creator: fields.address("creator"),
            status: fields.status("status"),
            is_private: fields.bool("is_private"),
            candidates,
            total_votes,
        }
    }
}

/// The NFT minted to a voter as proof of having voted on a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteProof {
    /// Object ID of the NFT.
    pub id: ObjectID,
    /// The proposal the vote was cast on.
    pub proposal_id: Option<ObjectID>,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Display image URL.
    pub url: Option<String>,
}

impl MoveRecord for VoteProof {
    fn from_fields(id: ObjectID, fields: &FieldBag<'_>) -> Self {
        Self {
            id,
            proposal_id: fields.object_id("proposal_id"),
            name: fields.string("name"),
            description: fields.string("description"),
            url: fields.optional_string("url"),
        }
    }
}

/// An owned capability object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityHandle {
    /// Object ID of the capability.
    pub object_id: ObjectID,
    /// Address owning the capability, if the object exposes it.
    pub owner: Option<SuiAddress>,
}

impl MoveRecord for CapabilityHandle {
    fn from_fields(id: ObjectID, _fields: &FieldBag<'_>) -> Self {
        Self {
            object_id: id,
            owner: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        decoder::{ChainObject, decode},
        test_utils::address,
    };

    #[test]
    fn candidates_with_optional_images() {
        let object = ChainObject::from_json(json!({
            "objectId": "0xb",
            "content": {
                "dataType": "moveObject",
                "type": "0x1::ballot::Ballot",
                "fields": {
                    "candidates": { "fields": { "contents": [
                        { "fields": { "id": 1, "name": "A", "image_url": { "vec": ["https://a.png"] } } },
                        { "fields": { "id": "2", "name": "B", "image_url": { "vec": [] }, "votes": "3" } },
                        { "fields": { "id": "3", "name": "C", "image_url": null, "votes": "3" } },
                    ] } },
                    "total_votes": "9",
                }
            }
        }));
        let ballot = decode::<Ballot>(Some(&object)).expect("a move object decodes");

        assert_eq!(ballot.candidates.len(), 3);
        assert_eq!(ballot.candidates[0].image_url.as_deref(), Some("https://a.png"));
        assert_eq!(ballot.candidates[1].image_url, None);
        assert_eq!(ballot.candidates[2].image_url, None);
        assert_eq!(ballot.total_votes, 9);
        assert_eq!(ballot.leading_candidate().map(|candidate| candidate.id), Some(2));
    }

    #[test]
    fn expiration_by_date_or_status() {
        let proposal = Proposal {
            id: ObjectID::ZERO,
            title: "t".to_owned(),
            description: String::new(),
            voted_yes_count: 2,
            voted_no_count: 1,
            expiration_ms: 1_000,
            creator: None,
            status: Status::Active,
            is_private: false,
            voter_registry: vec![],
        };

        assert!(!proposal.is_expired_at(999));
        assert!(proposal.is_expired_at(1_000));
        assert_eq!(proposal.total_votes(), 3);

        let expired = Proposal {
            status: Status::Expired,
            expiration_ms: 0,
            ..proposal
        };
        assert!(expired.is_expired_at(0));
    }

    #[test]
    fn super_admins_count_as_admins() {
        let dashboard = Dashboard {
            id: ObjectID::ZERO,
            proposals_ids: vec![],
            admin_addresses: vec![address(1)],
            super_admin_addresses: vec![address(2)],
        };

        assert!(dashboard.is_admin(&address(1)));
        assert!(!dashboard.is_super_admin(&address(1)));
        assert!(dashboard.is_admin(&address(2)));
        assert!(dashboard.is_super_admin(&address(2)));
        assert!(!dashboard.is_admin(&address(3)));
    }

    #[test]
    fn status_tags_ignore_case() {
        assert_eq!(Status::from_tag("ACTIVE"), Status::Active);
        assert_eq!(Status::from_tag("Custom"), Status::Other("Custom".to_owned()));
        assert_eq!(Status::Other("Custom".to_owned()).to_string(), "Custom");
    }
}
