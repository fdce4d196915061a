// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! The arguments to the suivote binary.

use std::{
    path::PathBuf,
    time::{Duration, SystemTime},
};

use anyhow::{Result, anyhow, bail, ensure};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sui_types::base_types::ObjectID;
use suivote_sui::config::Network;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Voting dashboard client for Sui", long_about = None)]
#[clap(name = env!("CARGO_BIN_NAME"))]
#[clap(rename_all = "kebab-case")]
pub(crate) struct App {
    /// The path to the suivote configuration file.
    ///
    /// If no path is specified explicitly, the CLI looks for `suivote_config.yaml` or
    /// `suivote_config.yml` in the following locations (in order):
    ///
    /// 1. The current working directory (`./`).
    /// 2. If the environment variable `XDG_CONFIG_HOME` is set, in `$XDG_CONFIG_HOME/suivote/`.
    /// 3. In `~/.config/suivote/`.
    /// 4. In `~/.suivote/`.
    // NB: Keep this in sync with `suivote_sui::config::default_configuration_paths`.
    #[clap(short, long, verbatim_doc_comment)]
    pub(crate) config: Option<PathBuf>,
    /// The context of a multi-context configuration file to use.
    ///
    /// Takes precedence over the selected network.
    #[clap(long)]
    pub(crate) context: Option<String>,
    /// The network to use for this invocation.
    ///
    /// Defaults to the network persisted with `suivote network select`, if any.
    #[clap(long, value_enum)]
    pub(crate) network: Option<Network>,
    /// The path to the Sui wallet configuration file.
    ///
    /// The wallet configuration is taken from the following locations:
    ///
    /// 1. From this configuration parameter, if set.
    /// 2. From the path specified in the suivote configuration, if set.
    /// 3. From `./client.yaml` or `./sui_config.yaml`.
    /// 4. From `~/.sui/sui_config/client.yaml`.
    ///
    /// Without a wallet, only read commands are available.
    #[clap(short, long, verbatim_doc_comment)]
    pub(crate) wallet: Option<PathBuf>,
    /// The gas budget for transactions, overriding the configuration.
    #[clap(short, long)]
    pub(crate) gas_budget: Option<u64>,
    /// Write output as JSON.
    #[clap(long, action)]
    pub(crate) json: bool,
    /// Print the collected RPC and submission metrics to stderr before exiting.
    #[clap(long, action)]
    pub(crate) print_metrics: bool,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub(crate) enum Commands {
    /// Show the dashboard and its administrators.
    Dashboard,
    /// List the proposals registered in the dashboard.
    #[clap(alias("ls"))]
    Proposals,
    /// List the ballots registered in the dashboard.
    Ballots,
    /// Show a single proposal.
    Proposal {
        /// The proposal object.
        proposal_id: ObjectID,
    },
    /// Show a single ballot with its candidates.
    Ballot {
        /// The ballot object.
        ballot_id: ObjectID,
    },
    /// Show the capabilities of the wallet's active address.
    Privileges,
    /// Vote on a proposal.
    Vote {
        /// The proposal object.
        proposal_id: ObjectID,
        /// The vote.
        #[clap(value_enum)]
        choice: VoteChoice,
    },
    /// Vote for a candidate of a ballot.
    VoteBallot {
        /// The ballot object.
        ballot_id: ObjectID,
        /// The candidate, as listed by `suivote ballot`.
        candidate_id: u64,
    },
    /// Check whether an address voted on a proposal, based on its vote proofs.
    HasVoted {
        /// The proposal object.
        proposal_id: ObjectID,
        /// The voter; defaults to the wallet's active address.
        #[clap(long)]
        voter: Option<String>,
    },
    /// Check whether an address is registered for a private proposal or ballot.
    IsRegistered {
        /// The proposal or ballot object.
        proposal_id: ObjectID,
        /// The voter; defaults to the wallet's active address.
        #[clap(long)]
        voter: Option<String>,
    },
    /// List the voters registered for a private proposal or ballot.
    Voters {
        /// The proposal or ballot object.
        proposal_id: ObjectID,
    },
    /// Administrative commands, requiring an admin or super-admin capability.
    #[command(subcommand)]
    Admin(AdminCommands),
    /// Show or change the selected network.
    #[command(subcommand)]
    Network(NetworkCommands),
}

/// The vote on a yes/no proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum VoteChoice {
    /// In favor.
    Yes,
    /// Against.
    No,
}

impl VoteChoice {
    pub(crate) fn is_yes(self) -> bool {
        self == Self::Yes
    }
}

#[derive(Subcommand, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub(crate) enum AdminCommands {
    /// Grant admin rights to an address.
    GrantAdmin {
        /// The new admin.
        address: String,
    },
    /// Grant super-admin rights to an address.
    GrantSuperAdmin {
        /// The new super admin.
        address: String,
    },
    /// Revoke the admin rights of an address.
    RevokeAdmin {
        /// The admin.
        address: String,
    },
    /// Revoke the super-admin rights of an address.
    RevokeSuperAdmin {
        /// The super admin.
        address: String,
    },
    /// Create a proposal and register it in the dashboard.
    CreateProposal {
        #[clap(flatten)]
        details: ItemDetails,
    },
    /// Create a ballot and register it in the dashboard.
    CreateBallot {
        #[clap(flatten)]
        details: ItemDetails,
    },
    /// Register an existing proposal or ballot in the dashboard.
    RegisterProposal {
        /// The proposal or ballot object.
        proposal_id: ObjectID,
    },
    /// Register a voter for a private proposal or ballot.
    RegisterVoter {
        /// The proposal or ballot object.
        proposal_id: ObjectID,
        /// The voter.
        voter: String,
    },
    /// Remove a voter from a private proposal or ballot.
    UnregisterVoter {
        /// The proposal or ballot object.
        proposal_id: ObjectID,
        /// The voter.
        voter: String,
    },
    /// Set a proposal to active.
    Activate {
        /// The proposal object.
        proposal_id: ObjectID,
    },
    /// Delist a proposal.
    Delist {
        /// The proposal object.
        proposal_id: ObjectID,
    },
    /// Remove a proposal.
    Remove {
        /// The proposal object.
        proposal_id: ObjectID,
    },
    /// Move the expiration of a proposal; requires the admin capability.
    ChangeExpiration {
        /// The proposal object.
        proposal_id: ObjectID,
        #[clap(flatten)]
        expiration: ExpirationArg,
    },
    /// Add a candidate to a ballot.
    AddCandidate {
        /// The ballot object.
        ballot_id: ObjectID,
        /// The name of the candidate.
        #[clap(long)]
        name: String,
        /// The description of the candidate.
        #[clap(long, default_value = "")]
        description: String,
        /// An http(s) URL of an image of the candidate.
        #[clap(long)]
        image_url: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub(crate) enum NetworkCommands {
    /// Show the selected network and where the selection is stored.
    Show,
    /// Select the network used by later invocations.
    Select {
        /// The network.
        #[clap(value_enum)]
        network: Network,
    },
}

/// The details of a new proposal or ballot.
#[derive(Debug, Clone, Args)]
#[clap(rename_all = "kebab-case")]
pub(crate) struct ItemDetails {
    /// The title.
    #[clap(long)]
    pub(crate) title: String,
    /// The description.
    #[clap(long, default_value = "")]
    pub(crate) description: String,
    /// Restrict voting to registered voters.
    #[clap(long, action)]
    pub(crate) private: bool,
    #[clap(flatten)]
    pub(crate) expiration: ExpirationArg,
}

/// The expiration of a proposal or ballot.
#[derive(Debug, Clone, Args, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub(crate) struct ExpirationArg {
    /// The time until the expiration, e.g. `7days` or `12h 30m`.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub(crate) expires_in: Option<Duration>,
    /// The expiration as an RFC 3339 timestamp, e.g. `2030-01-01T12:00:00Z`.
    #[clap(long, value_parser = humantime::parse_rfc3339_weak)]
    pub(crate) expires_at: Option<SystemTime>,
}

impl ExpirationArg {
    /// The expiration in milliseconds since the Unix epoch, relative to `now`.
    pub(crate) fn expiration_ms(&self, now: SystemTime) -> Result<u64> {
        let expiration = match (self.expires_in, self.expires_at) {
            (Some(expires_in), _) => now
                .checked_add(expires_in)
                .ok_or_else(|| anyhow!("the expiration is too far in the future"))?,
            (None, Some(expires_at)) => expires_at,
            (None, None) => bail!("either --expires-in or --expires-at is required"),
        };
        ensure!(expiration > now, "the expiration must be in the future");
        let millis = expiration
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_millis();
        Ok(u64::try_from(millis)?)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }

    #[test]
    fn parses_admin_commands() -> Result<()> {
        let app = App::try_parse_from([
            "suivote",
            "--network",
            "devnet",
            "admin",
            "create-ballot",
            "--title",
            "Board",
            "--expires-in",
            "7days",
            "--private",
        ])?;

        assert_eq!(app.network, Some(Network::Devnet));
        let Commands::Admin(AdminCommands::CreateBallot { details }) = app.command else {
            panic!("expected the create-ballot command");
        };
        assert_eq!(details.title, "Board");
        assert!(details.private);
        assert_eq!(
            details.expiration.expires_in,
            Some(Duration::from_secs(7 * 24 * 3600))
        );
        Ok(())
    }

    #[test]
    fn expiration_options_are_exclusive() {
        let result = App::try_parse_from([
            "suivote",
            "admin",
            "change-expiration",
            "0x1",
            "--expires-in",
            "1h",
            "--expires-at",
            "2030-01-01T00:00:00Z",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn expiration_is_converted_to_milliseconds() -> Result<()> {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let relative = ExpirationArg {
            expires_in: Some(Duration::from_secs(60)),
            expires_at: None,
        };
        assert_eq!(relative.expiration_ms(now)?, 1_060_000);

        let past = ExpirationArg {
            expires_in: None,
            expires_at: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(10)),
        };
        assert!(past.expiration_ms(now).is_err());
        Ok(())
    }

    #[test]
    fn votes_take_a_choice() -> Result<()> {
        let app = App::try_parse_from(["suivote", "vote", "0xa", "no"])?;
        let Commands::Vote { choice, .. } = app.command else {
            panic!("expected the vote command");
        };
        assert!(!choice.is_yes());
        Ok(())
    }
}
