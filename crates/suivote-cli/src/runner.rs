// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Helper struct to run the suivote commands.

use std::{sync::Arc, time::SystemTime};

use anyhow::{Context, Result, anyhow};
use prometheus::{Encoder as _, TextEncoder};
use sui_types::base_types::SuiAddress;
use suivote_sui::{
    client::{CandidateParams, ProposalParams, TracingNotifier, VotingClient},
    config::{ClientConfig, Network, NetworkSelectionStore, load_configuration},
    validation::parse_address,
    wallet::Wallet,
};
use suivote_utils::metrics::Registry;

use crate::{
    args::{AdminCommands, App, Commands, ExpirationArg, ItemDetails, NetworkCommands},
    output::{
        BallotOutput,
        BallotsOutput,
        CliOutput,
        DashboardOutput,
        HasVotedOutput,
        NetworkOutput,
        PrivilegesOutput,
        ProposalOutput,
        ProposalsOutput,
        RegistrationOutput,
        TransactionOutput,
        VotersOutput,
    },
};

/// Runs the commands of the suivote binary.
#[derive(Debug)]
pub(crate) struct ClientCommandRunner {
    /// The configuration, if it could be loaded.
    config: Result<ClientConfig>,
    /// The wallet, if it could be loaded.
    wallet: Result<Wallet>,
    /// Where the network selection is stored.
    selection_store: Option<NetworkSelectionStore>,
    /// The network in use, from the arguments or the stored selection.
    network: Option<Network>,
    /// Whether to output JSON.
    json: bool,
    /// The registry of the client metrics.
    registry: Registry,
}

impl ClientCommandRunner {
    /// Creates a new runner, loading the configuration and wallet.
    ///
    /// Loading errors are kept and only reported by the commands that need the failed part.
    pub(crate) fn new(app: &App) -> Self {
        let selection_store = NetworkSelectionStore::at_default_location();
        let stored_network = selection_store.as_ref().and_then(|store| {
            store
                .load()
                .inspect_err(|error| tracing::warn!(%error, "ignoring the stored network selection"))
                .ok()
                .flatten()
        });
        let network = app.network.or(stored_network);

        let config = load_configuration(app.config.as_ref(), app.context.as_deref(), network)
            .map(|mut config| {
                config.gas_budget = app.gas_budget.or(config.gas_budget);
                config
            });
        let wallet_path = app.wallet.clone().or_else(|| {
            config
                .as_ref()
                .ok()
                .and_then(|config| config.wallet_config.clone())
        });
        let wallet = Wallet::load(wallet_path.as_deref());

        Self {
            config,
            wallet,
            selection_store,
            network,
            json: app.json,
            registry: Registry::new(prometheus::Registry::new()),
        }
    }

    /// Runs `command`, printing its output to stdout.
    pub(crate) async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Network(command) => self.network_command(command),
            Commands::Admin(command) => {
                let client = self.connect(true).await?;
                self.admin_command(&client, command).await
            }
            command => {
                let client = self.connect(false).await?;
                self.read_or_vote_command(&client, command).await
            }
        }
    }

    /// Writes the collected metrics to stderr in the Prometheus text format.
    pub(crate) fn print_metrics(&self) -> Result<()> {
        let mut buffer = vec![];
        TextEncoder::new().encode(&self.registry.inner().gather(), &mut buffer)?;
        eprintln!("{}", String::from_utf8(buffer)?);
        Ok(())
    }

    async fn connect(&self, require_wallet: bool) -> Result<VotingClient> {
        let config = match &self.config {
            Ok(config) => config.clone(),
            Err(error) => return Err(anyhow!("{error:#}")).context("no usable configuration"),
        };
        let wallet = match &self.wallet {
            Ok(wallet) => Some(wallet.clone()),
            Err(error) if require_wallet => {
                return Err(anyhow!("{error:#}")).context("this command requires a wallet");
            }
            Err(error) => {
                tracing::debug!(%error, "continuing without a wallet");
                None
            }
        };
        Ok(VotingClient::connect(
            config,
            wallet,
            Arc::new(TracingNotifier),
            Some(&self.registry),
        )
        .await?)
    }

    fn account_or(client: &VotingClient, voter: Option<String>) -> Result<SuiAddress> {
        match voter {
            Some(voter) => Ok(parse_address(&voter)?),
            None => client
                .account()
                .ok_or_else(|| anyhow!("no voter given and no wallet is connected")),
        }
    }

    async fn read_or_vote_command(&self, client: &VotingClient, command: Commands) -> Result<()> {
        let explorer = client.explorer();
        match command {
            Commands::Dashboard => DashboardOutput {
                network: client.config().network,
                dashboard: client.dashboard().await?,
                explorer_url: explorer.object_url(&client.config().contract_config.dashboard_object),
            }
            .print_output(self.json),
            Commands::Proposals => {
                let classification = client.classify_dashboard().await?;
                ProposalsOutput {
                    proposals: client.list_proposals_with(&classification).await?,
                    unresolved: classification.unresolved,
                }
                .print_output(self.json)
            }
            Commands::Ballots => {
                let classification = client.classify_dashboard().await?;
                BallotsOutput {
                    ballots: client.list_ballots_with(&classification).await?,
                    unresolved: classification.unresolved,
                }
                .print_output(self.json)
            }
            Commands::Proposal { proposal_id } => {
                let proposal = client
                    .proposal(proposal_id)
                    .await?
                    .ok_or_else(|| anyhow!("{proposal_id} is not a proposal"))?;
                ProposalOutput {
                    proposal,
                    explorer_url: explorer.object_url(&proposal_id),
                }
                .print_output(self.json)
            }
            Commands::Ballot { ballot_id } => {
                let ballot = client
                    .ballot(ballot_id)
                    .await?
                    .ok_or_else(|| anyhow!("{ballot_id} is not a ballot"))?;
                BallotOutput {
                    ballot,
                    explorer_url: explorer.object_url(&ballot_id),
                }
                .print_output(self.json)
            }
            Commands::Privileges => PrivilegesOutput {
                account: client.account(),
                privileges: client.refresh_capabilities().await,
            }
            .print_output(self.json),
            Commands::Vote {
                proposal_id,
                choice,
            } => TransactionOutput {
                action: "vote",
                receipt: client.vote(proposal_id, choice.is_yes()).await?,
            }
            .print_output(self.json),
            Commands::VoteBallot {
                ballot_id,
                candidate_id,
            } => TransactionOutput {
                action: "vote",
                receipt: client.vote_ballot(ballot_id, candidate_id).await?,
            }
            .print_output(self.json),
            Commands::HasVoted { proposal_id, voter } => {
                let voter = Self::account_or(client, voter)?;
                HasVotedOutput {
                    proposal_id,
                    voter,
                    has_voted: client.has_voted(voter, proposal_id).await?,
                }
                .print_output(self.json)
            }
            Commands::IsRegistered { proposal_id, voter } => {
                let voter = Self::account_or(client, voter)?;
                RegistrationOutput {
                    proposal_id,
                    voter,
                    registered: client.is_voter_registered(proposal_id, voter).await?,
                }
                .print_output(self.json)
            }
            Commands::Voters { proposal_id } => VotersOutput {
                proposal_id,
                voters: client.registered_voters(proposal_id).await?,
            }
            .print_output(self.json),
            Commands::Admin(_) | Commands::Network(_) => {
                unreachable!("dispatched in `run`")
            }
        }
    }

    async fn admin_command(&self, client: &VotingClient, command: AdminCommands) -> Result<()> {
        let (action, receipt) = match command {
            AdminCommands::GrantAdmin { address } => {
                ("grant admin", client.grant_admin(&address).await?)
            }
            AdminCommands::GrantSuperAdmin { address } => (
                "grant super admin",
                client.grant_super_admin(&address).await?,
            ),
            AdminCommands::RevokeAdmin { address } => {
                ("revoke admin", client.revoke_admin(&address).await?)
            }
            AdminCommands::RevokeSuperAdmin { address } => (
                "revoke super admin",
                client.revoke_super_admin(&address).await?,
            ),
            AdminCommands::CreateProposal { details } => (
                "create proposal",
                client.create_proposal(&proposal_params(details)?).await?,
            ),
            AdminCommands::CreateBallot { details } => (
                "create ballot",
                client.create_ballot(&proposal_params(details)?).await?,
            ),
            AdminCommands::RegisterProposal { proposal_id } => (
                "register proposal",
                client.register_proposal(proposal_id).await?,
            ),
            AdminCommands::RegisterVoter { proposal_id, voter } => (
                "register voter",
                client.register_voter(proposal_id, &voter).await?,
            ),
            AdminCommands::UnregisterVoter { proposal_id, voter } => (
                "unregister voter",
                client.unregister_voter(proposal_id, &voter).await?,
            ),
            AdminCommands::Activate { proposal_id } => {
                ("activate", client.set_active_status(proposal_id).await?)
            }
            AdminCommands::Delist { proposal_id } => {
                ("delist", client.set_delisted_status(proposal_id).await?)
            }
            AdminCommands::Remove { proposal_id } => {
                ("remove", client.remove_proposal(proposal_id).await?)
            }
            AdminCommands::ChangeExpiration {
                proposal_id,
                expiration,
            } => (
                "change expiration",
                client
                    .change_expiration_date(proposal_id, expiration_ms(&expiration)?)
                    .await?,
            ),
            AdminCommands::AddCandidate {
                ballot_id,
                name,
                description,
                image_url,
            } => (
                "add candidate",
                client
                    .add_candidate(
                        ballot_id,
                        &CandidateParams {
                            name,
                            description,
                            image_url,
                        },
                    )
                    .await?,
            ),
        };
        TransactionOutput { action, receipt }.print_output(self.json)
    }

    fn network_command(&self, command: NetworkCommands) -> Result<()> {
        let stored_at = self
            .selection_store
            .as_ref()
            .map(|store| store.path().to_path_buf());
        match command {
            NetworkCommands::Show => NetworkOutput {
                selected: self.network,
                stored_at,
            }
            .print_output(self.json),
            NetworkCommands::Select { network } => {
                let store = self
                    .selection_store
                    .as_ref()
                    .ok_or_else(|| anyhow!("the home directory is unknown"))?;
                store.save(network)?;
                NetworkOutput {
                    selected: Some(network),
                    stored_at,
                }
                .print_output(self.json)
            }
        }
    }
}

fn expiration_ms(expiration: &ExpirationArg) -> Result<u64> {
    expiration.expiration_ms(SystemTime::now())
}

fn proposal_params(details: ItemDetails) -> Result<ProposalParams> {
    Ok(ProposalParams {
        expiration_ms: expiration_ms(&details.expiration)?,
        title: details.title,
        description: details.description,
        is_private: details.private,
    })
}
