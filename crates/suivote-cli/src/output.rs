// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Human-readable and JSON output of the suivote commands.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use prettytable::{Table, format, row};
use serde::Serialize;
use serde_json::json;
use sui_types::base_types::{ObjectID, SuiAddress};
use suivote_sui::{
    client::{CapabilityState, Privileges, SubmissionError, SubmissionReceipt},
    config::Network,
    types::{Ballot, Dashboard, Proposal, Status, VoteConfirmation},
};

/// A timestamp that cannot be shown as a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum TimestampError {
    /// The timestamp is outside the range of calendar dates.
    #[error("timestamp {0} ms is outside the representable date range")]
    OutOfRange(u64),
}

const TIMESTAMP_HINT: &str = "An expiration date on chain could not be displayed. This usually \
    means the object stores its expiration in an unexpected unit or has a corrupted value; the \
    remaining data can still be read with --json.";

/// Formats a timestamp in milliseconds since the Unix epoch as a UTC date.
pub(crate) fn format_timestamp_ms(timestamp_ms: u64) -> Result<String, TimestampError> {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|date| date.format("%Y-%m-%d %H:%M UTC").to_string())
        .ok_or(TimestampError::OutOfRange(timestamp_ms))
}

/// Formats an expiration for a table cell, marking it as invalid instead of failing the listing.
fn expiration_cell(expiration_ms: u64) -> String {
    format_timestamp_ms(expiration_ms).unwrap_or_else(|error| {
        tracing::warn!(%error, "showing an invalid expiration date");
        format!("invalid date ({expiration_ms} ms)")
    })
}

/// Returns the string `Success:` colored in green for terminal output.
pub(crate) fn success() -> ColoredString {
    "Success:".bold().green()
}

/// Returns the string `Error:` colored in red for terminal output.
pub(crate) fn error() -> ColoredString {
    "Error:".bold().red()
}

fn colored_status(status: &Status) -> ColoredString {
    let text = status.to_string();
    match status {
        Status::Active => text.green(),
        Status::Passed => text.cyan(),
        Status::Expired | Status::Rejected => text.yellow(),
        Status::Delisted => text.red(),
        Status::Unknown | Status::Other(_) => text.normal(),
    }
}

fn privacy(is_private: bool) -> &'static str {
    if is_private { "private" } else { "public" }
}

/// Output of a command, printable for humans or as JSON.
pub(crate) trait CliOutput: Serialize {
    /// Prints the output for humans.
    fn print_cli_output(&self) -> Result<()>;

    /// Prints the output as JSON if `json` is set, and for humans otherwise.
    fn print_output(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            Ok(())
        } else {
            self.print_cli_output()
        }
    }
}

/// The dashboard with a link to it.
#[derive(Debug, Serialize)]
pub(crate) struct DashboardOutput {
    pub(crate) network: Network,
    pub(crate) dashboard: Dashboard,
    pub(crate) explorer_url: String,
}

impl CliOutput for DashboardOutput {
    fn print_cli_output(&self) -> Result<()> {
        println!("{} ({})", "Voting dashboard".bold(), self.network);
        println!("Object: {}", self.dashboard.id);
        println!("Entries: {}", self.dashboard.proposals_ids.len());
        println!("Explorer: {}", self.explorer_url);
        for (title, addresses) in [
            ("Admins", &self.dashboard.admin_addresses),
            ("Super admins", &self.dashboard.super_admin_addresses),
        ] {
            println!("\n{}", title.bold().green());
            if addresses.is_empty() {
                println!("none");
            }
            for address in addresses {
                println!("{address}");
            }
        }
        Ok(())
    }
}

/// The proposals of the dashboard.
#[derive(Debug, Serialize)]
pub(crate) struct ProposalsOutput {
    pub(crate) proposals: Vec<Proposal>,
    /// Entries that could not be classified in time.
    pub(crate) unresolved: Vec<ObjectID>,
}

impl CliOutput for ProposalsOutput {
    fn print_cli_output(&self) -> Result<()> {
        if self.proposals.is_empty() {
            println!("No proposals found.");
        } else {
            let mut table = Table::new();
            table.set_format(default_table_format());
            table.set_titles(row![b->"Proposal", b->"Title", b->"Status", b->"Yes", b->"No",
                b->"Expires", b->"Access"]);
            for proposal in &self.proposals {
                table.add_row(row![
                    proposal.id,
                    proposal.title,
                    colored_status(&proposal.status),
                    r->proposal.voted_yes_count,
                    r->proposal.voted_no_count,
                    expiration_cell(proposal.expiration_ms),
                    privacy(proposal.is_private),
                ]);
            }
            table.printstd();
        }
        print_unresolved(&self.unresolved);
        Ok(())
    }
}

/// The ballots of the dashboard.
#[derive(Debug, Serialize)]
pub(crate) struct BallotsOutput {
    pub(crate) ballots: Vec<Ballot>,
    /// Entries that could not be classified in time.
    pub(crate) unresolved: Vec<ObjectID>,
}

impl CliOutput for BallotsOutput {
    fn print_cli_output(&self) -> Result<()> {
        if self.ballots.is_empty() {
            println!("No ballots found.");
        } else {
            let mut table = Table::new();
            table.set_format(default_table_format());
            table.set_titles(row![b->"Ballot", b->"Title", b->"Status", b->"Candidates",
                b->"Votes", b->"Leading", b->"Expires"]);
            for ballot in &self.ballots {
                table.add_row(row![
                    ballot.id,
                    ballot.title,
                    colored_status(&ballot.status),
                    r->ballot.candidates.len(),
                    r->ballot.total_votes,
                    ballot
                        .leading_candidate()
                        .map_or_else(|| "-".to_owned(), |candidate| candidate.name.clone()),
                    expiration_cell(ballot.expiration_ms),
                ]);
            }
            table.printstd();
        }
        print_unresolved(&self.unresolved);
        Ok(())
    }
}

fn print_unresolved(unresolved: &[ObjectID]) {
    if !unresolved.is_empty() {
        println!(
            "\n{} {} dashboard entries could not be loaded in time and are not shown.",
            "Warning:".bold().yellow(),
            unresolved.len()
        );
    }
}

/// A single proposal.
#[derive(Debug, Serialize)]
pub(crate) struct ProposalOutput {
    pub(crate) proposal: Proposal,
    pub(crate) explorer_url: String,
}

impl CliOutput for ProposalOutput {
    fn print_cli_output(&self) -> Result<()> {
        let proposal = &self.proposal;
        println!("{}", proposal.title.bold());
        if !proposal.description.is_empty() {
            println!("{}", proposal.description);
        }
        println!();
        println!("Status: {}", colored_status(&proposal.status));
        println!(
            "Votes: {} yes, {} no ({} total)",
            proposal.voted_yes_count,
            proposal.voted_no_count,
            proposal.total_votes()
        );
        println!("Expires: {}", format_timestamp_ms(proposal.expiration_ms)?);
        println!("Access: {}", privacy(proposal.is_private));
        if let Some(creator) = proposal.creator {
            println!("Creator: {creator}");
        }
        println!("Explorer: {}", self.explorer_url);
        Ok(())
    }
}

/// A single ballot.
#[derive(Debug, Serialize)]
pub(crate) struct BallotOutput {
    pub(crate) ballot: Ballot,
    pub(crate) explorer_url: String,
}

impl CliOutput for BallotOutput {
    fn print_cli_output(&self) -> Result<()> {
        let ballot = &self.ballot;
        println!("{}", ballot.title.bold());
        if !ballot.description.is_empty() {
            println!("{}", ballot.description);
        }
        println!();
        println!("Status: {}", colored_status(&ballot.status));
        println!("Expires: {}", format_timestamp_ms(ballot.expiration_ms)?);
        println!("Access: {}", privacy(ballot.is_private));
        println!("Explorer: {}", self.explorer_url);

        let mut table = Table::new();
        table.set_format(default_table_format());
        table.set_titles(row![b->"ID", b->"Candidate", b->"Votes", b->"Image"]);
        for candidate in &ballot.candidates {
            table.add_row(row![
                r->candidate.id,
                candidate.name,
                r->candidate.votes,
                candidate.image_url.as_deref().unwrap_or("-"),
            ]);
        }
        println!("\n{} ({} votes)", "Candidates".bold().green(), ballot.total_votes);
        table.printstd();
        Ok(())
    }
}

/// The capabilities of an account.
#[derive(Debug, Serialize)]
pub(crate) struct PrivilegesOutput {
    pub(crate) account: Option<SuiAddress>,
    pub(crate) privileges: Privileges,
}

fn capability_line(state: &CapabilityState) -> String {
    match (&state.error, state.capability_id) {
        (Some(error), _) => format!("{} {error}", "lookup failed:".red()),
        (None, Some(cap_id)) if state.has_capability => format!("{} ({cap_id})", "yes".green()),
        _ => "no".to_owned(),
    }
}

impl CliOutput for PrivilegesOutput {
    fn print_cli_output(&self) -> Result<()> {
        let Some(account) = self.account else {
            println!("No wallet is connected.");
            return Ok(());
        };
        println!("Account: {account}");
        println!("AdminCap: {}", capability_line(&self.privileges.admin));
        println!(
            "SuperAdminCap: {}",
            capability_line(&self.privileges.super_admin)
        );
        Ok(())
    }
}

/// The result of a submitted transaction.
#[derive(Debug, Serialize)]
pub(crate) struct TransactionOutput {
    pub(crate) action: &'static str,
    #[serde(flatten)]
    pub(crate) receipt: SubmissionReceipt,
}

impl CliOutput for TransactionOutput {
    fn print_cli_output(&self) -> Result<()> {
        println!(
            "{} {} executed in transaction {}.",
            success(),
            self.action,
            self.receipt.transaction.digest
        );
        for object_id in &self.receipt.created {
            println!("Created object: {object_id}");
        }
        for confirmation in &self.receipt.confirmations {
            match confirmation {
                VoteConfirmation::Proposal(vote) => println!(
                    "Vote recorded: {}",
                    if vote.vote_yes { "yes" } else { "no" }
                ),
                VoteConfirmation::Ballot(vote) => {
                    println!("Vote recorded for candidate {}", vote.candidate_id)
                }
            }
        }
        println!("Explorer: {}", self.receipt.explorer_url);
        Ok(())
    }
}

/// Whether an address voted on a proposal.
#[derive(Debug, Serialize)]
pub(crate) struct HasVotedOutput {
    pub(crate) proposal_id: ObjectID,
    pub(crate) voter: SuiAddress,
    pub(crate) has_voted: bool,
}

impl CliOutput for HasVotedOutput {
    fn print_cli_output(&self) -> Result<()> {
        let verdict = if self.has_voted {
            "has voted".green()
        } else {
            "has not voted".normal()
        };
        println!("{} {verdict} on {}.", self.voter, self.proposal_id);
        Ok(())
    }
}

/// Whether an address is registered for a private proposal or ballot.
#[derive(Debug, Serialize)]
pub(crate) struct RegistrationOutput {
    pub(crate) proposal_id: ObjectID,
    pub(crate) voter: SuiAddress,
    pub(crate) registered: bool,
}

impl CliOutput for RegistrationOutput {
    fn print_cli_output(&self) -> Result<()> {
        let verdict = if self.registered {
            "is registered".green()
        } else {
            "is not registered".yellow()
        };
        println!("{} {verdict} for {}.", self.voter, self.proposal_id);
        Ok(())
    }
}

/// The voters registered for a private proposal or ballot.
#[derive(Debug, Serialize)]
pub(crate) struct VotersOutput {
    pub(crate) proposal_id: ObjectID,
    pub(crate) voters: Vec<SuiAddress>,
}

impl CliOutput for VotersOutput {
    fn print_cli_output(&self) -> Result<()> {
        println!(
            "{} registered voter(s) for {}",
            self.voters.len(),
            self.proposal_id
        );
        for voter in &self.voters {
            println!("{voter}");
        }
        Ok(())
    }
}

/// The selected network.
#[derive(Debug, Serialize)]
pub(crate) struct NetworkOutput {
    pub(crate) selected: Option<Network>,
    pub(crate) stored_at: Option<PathBuf>,
}

impl CliOutput for NetworkOutput {
    fn print_cli_output(&self) -> Result<()> {
        match self.selected {
            Some(network) => println!("Selected network: {}", network.to_string().bold()),
            None => println!(
                "No network selected; using the default context of the configuration."
            ),
        }
        if let Some(path) = &self.stored_at {
            println!("Stored in: {}", path.display());
        }
        Ok(())
    }
}

/// Prints the report of a failed command to stderr.
///
/// Failures of the submission pipeline are shown with their user-facing message; timestamps that
/// cannot be displayed get an explanation.
pub(crate) fn report_error(error: &anyhow::Error, json: bool) {
    let hint = if error.downcast_ref::<TimestampError>().is_some() {
        Some(TIMESTAMP_HINT)
    } else {
        None
    };
    let message = match error.downcast_ref::<SubmissionError>() {
        Some(SubmissionError::Failed { message, .. }) => message.clone(),
        _ => format!("{error:#}"),
    };

    if json {
        eprintln!(
            "{}",
            json!({ "error": message, "details": format!("{error:?}"), "hint": hint })
        );
        return;
    }
    eprintln!("{} {message}", self::error());
    if let Some(hint) = hint {
        eprintln!("{hint}");
    }
    eprintln!("Run with RUST_LOG=debug for details.");
}

fn default_table_format() -> format::TableFormat {
    format::FormatBuilder::new()
        .separators(
            &[format::LinePosition::Title],
            format::LineSeparator::new('-', '+', '+', '+'),
        )
        .padding(1, 1)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_formatted_in_utc() -> Result<()> {
        assert_eq!(format_timestamp_ms(0)?, "1970-01-01 00:00 UTC");
        assert_eq!(
            format_timestamp_ms(1_700_000_000_000)?,
            "2023-11-14 22:13 UTC"
        );
        Ok(())
    }

    #[test]
    fn out_of_range_timestamps_are_reported() {
        assert_eq!(
            format_timestamp_ms(u64::MAX),
            Err(TimestampError::OutOfRange(u64::MAX))
        );
    }

    #[test]
    fn invalid_expirations_are_marked_in_table_cells() {
        assert_eq!(expiration_cell(0), "1970-01-01 00:00 UTC");
        assert_eq!(
            expiration_cell(u64::MAX),
            format!("invalid date ({} ms)", u64::MAX)
        );
    }

    #[test]
    fn timestamp_errors_are_found_behind_context() {
        let error = anyhow::Error::from(TimestampError::OutOfRange(1))
            .context("failed to print the proposal");
        assert!(error.downcast_ref::<TimestampError>().is_some());
    }
}
