// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Classification of transaction failures into domain errors.
//!
//! Move aborts carry the aborting module and an abort code. A deployment may map abort codes to
//! categories with [`AbortCodes`]; aborts without a mapping and failures without a recognizable
//! abort are classified by matching the lowercased error text against known phrases. That
//! classification is best-effort.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maps one abort code of a module to a failure category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortCodeMapping {
    /// The aborting module, e.g. `proposal`.
    pub module: String,
    /// The abort code.
    pub code: u64,
    /// The category of the abort.
    pub category: FailureCategory,
}

/// The abort codes a deployment of the voting contracts is known to use. Empty by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbortCodes(Vec<AbortCodeMapping>);

impl AbortCodes {
    /// Creates the table from `(module, code, category)` triples.
    pub fn new<'a>(mappings: impl IntoIterator<Item = (&'a str, u64, FailureCategory)>) -> Self {
        Self(
            mappings
                .into_iter()
                .map(|(module, code, category)| AbortCodeMapping {
                    module: module.to_owned(),
                    code,
                    category,
                })
                .collect(),
        )
    }

    /// Returns true if no abort code is mapped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up the category of `abort`.
    pub fn category(&self, abort: &MoveAbort) -> Option<FailureCategory> {
        self.0
            .iter()
            .find(|mapping| mapping.module == abort.module && mapping.code == abort.code)
            .map(|mapping| mapping.category)
    }
}

static MOVE_ABORT_DEBUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        MoveAbort\(MoveLocation\x20\{\x20module:\x20ModuleId\x20\{\x20address:\x20\w+,
        \x20name:\x20Identifier\("(?P<module>\w+)"\)\x20\},.*?
        function_name:\x20(?:Some\("(?P<function>\w+)"\)|None)\x20\},\x20(?P<code>\d+)\)"#,
    )
    .expect("this regex is valid")
});

static MOVE_ABORT_DISPLAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"abort code: (?P<code>\d+), in '0x[0-9a-fA-F]+::(?P<module>\w+)::(?P<function>\w+)'",
    )
    .expect("this regex is valid")
});

/// A Move abort extracted from an execution error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAbort {
    /// The aborting module.
    pub module: String,
    /// The aborting function, if reported.
    pub function: Option<String>,
    /// The abort code.
    pub code: u64,
}

impl MoveAbort {
    /// Extracts a Move abort from an error string, in either the debug rendering of the
    /// execution status or the rendering used by wallets.
    pub fn parse(error: &str) -> Option<Self> {
        [&*MOVE_ABORT_DEBUG, &*MOVE_ABORT_DISPLAY]
            .into_iter()
            .find_map(|regex| regex.captures(error))
            .and_then(|captures| {
                Some(Self {
                    module: captures.name("module")?.as_str().to_owned(),
                    function: captures
                        .name("function")
                        .map(|function| function.as_str().to_owned()),
                    code: captures.name("code")?.as_str().parse().ok()?,
                })
            })
    }

}

impl fmt::Display for MoveAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "abort {} in {}::{}", self.code, self.module, function),
            None => write!(f, "abort {} in {}", self.code, self.module),
        }
    }
}

/// A failed execution of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveExecutionError {
    /// The error reported by the node.
    pub message: String,
    /// The Move abort, if the failure was one.
    pub abort: Option<MoveAbort>,
}

impl From<&str> for MoveExecutionError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_owned(),
            abort: MoveAbort::parse(message),
        }
    }
}

impl fmt::Display for MoveExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// User-facing categories of submission failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The proposal or ballot has expired.
    Expired,
    /// The sender is not registered for a private proposal or ballot.
    NotRegistered,
    /// The deployer's admin rights cannot be revoked.
    CannotRevokeDeployer,
    /// The sender already voted.
    AlreadyVoted,
    /// The proposal is delisted.
    Delisted,
    /// The user declined to sign.
    UserRejected,
    /// Anything else.
    Generic,
}

impl FailureCategory {
    /// Classifies an error, preferring a Move abort mapped in `abort_codes` over text matching.
    pub fn classify(abort_codes: &AbortCodes, abort: Option<&MoveAbort>, error: &str) -> Self {
        abort
            .and_then(|abort| abort_codes.category(abort))
            .unwrap_or_else(|| Self::from_text(error))
    }

    /// Classifies an error by known phrases in its lowercased text.
    pub fn from_text(error: &str) -> Self {
        let error = error.to_lowercase();
        let contains_any = |phrases: &[&str]| phrases.iter().any(|phrase| error.contains(phrase));
        if contains_any(&["expired"]) {
            Self::Expired
        } else if contains_any(&["not registered", "not_registered", "notregistered"]) {
            Self::NotRegistered
        } else if contains_any(&["cannot revoke deployer", "cannot_revoke_deployer"]) {
            Self::CannotRevokeDeployer
        } else if contains_any(&["already voted", "duplicate vote"]) {
            Self::AlreadyVoted
        } else if contains_any(&["delisted"]) {
            Self::Delisted
        } else if contains_any(&["rejected by user", "user rejected", "rejected the request"]) {
            Self::UserRejected
        } else {
            Self::Generic
        }
    }

    /// The message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Expired => "This item has expired and no longer accepts this action.",
            Self::NotRegistered => "You are not registered to vote on this private item.",
            Self::CannotRevokeDeployer => "The deployer's admin rights cannot be revoked.",
            Self::AlreadyVoted => "You have already voted on this item.",
            Self::Delisted => "This item has been delisted.",
            Self::UserRejected => "The transaction was not signed.",
            Self::Generic => "The transaction failed. Please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBUG_ABORT: &str = "MoveAbort(MoveLocation { module: ModuleId { address: \
        2a0000000000000000000000000000000000000000000000000000000000002a, name: \
        Identifier(\"proposal\") }, function: 4, instruction: 17, function_name: \
        Some(\"vote\") }, 2) in command 0";

    fn deployment_codes() -> AbortCodes {
        AbortCodes::new([
            ("proposal", 2, FailureCategory::Expired),
            ("dashboard", 1, FailureCategory::CannotRevokeDeployer),
        ])
    }

    #[test]
    fn parses_debug_rendering() {
        let abort = MoveAbort::parse(DEBUG_ABORT).expect("the string holds an abort");
        assert_eq!(abort.module, "proposal");
        assert_eq!(abort.function.as_deref(), Some("vote"));
        assert_eq!(abort.code, 2);
        assert_eq!(
            deployment_codes().category(&abort),
            Some(FailureCategory::Expired)
        );
    }

    #[test]
    fn parses_wallet_rendering() {
        let error = "MoveAbort in 1st command, abort code: 1, in \
            '0x2a::dashboard::revoke_admin' (line 88)";
        let abort = MoveAbort::parse(error).expect("the string holds an abort");
        assert_eq!(abort.module, "dashboard");
        assert_eq!(abort.code, 1);
        assert_eq!(
            FailureCategory::classify(&deployment_codes(), Some(&abort), error),
            FailureCategory::CannotRevokeDeployer
        );
    }

    #[test]
    fn unmapped_aborts_without_known_phrases_are_generic() {
        let abort = MoveAbort::parse(DEBUG_ABORT).expect("the string holds an abort");
        assert_eq!(
            FailureCategory::classify(&AbortCodes::default(), Some(&abort), DEBUG_ABORT),
            FailureCategory::Generic
        );
    }

    #[test]
    fn text_classification_is_case_insensitive() {
        assert_eq!(
            FailureCategory::from_text("Proposal EXPIRED at epoch 3"),
            FailureCategory::Expired
        );
        assert_eq!(
            FailureCategory::from_text("voter Not Registered"),
            FailureCategory::NotRegistered
        );
        assert_eq!(
            FailureCategory::from_text("insufficient gas"),
            FailureCategory::Generic
        );
    }

    #[test]
    fn unknown_abort_codes_fall_back_to_text() {
        let abort = MoveAbort {
            module: "proposal".to_owned(),
            function: None,
            code: 99,
        };
        assert_eq!(
            FailureCategory::classify(&deployment_codes(), Some(&abort), "abort: already voted"),
            FailureCategory::AlreadyVoted
        );
    }

    #[test]
    fn abort_codes_are_read_from_yaml() -> Result<(), serde_yaml::Error> {
        let codes: AbortCodes = serde_yaml::from_str(
            "- module: ballot\n  code: 0\n  category: expired\n",
        )?;
        let abort = MoveAbort {
            module: "ballot".to_owned(),
            function: Some("vote".to_owned()),
            code: 0,
        };
        assert_eq!(codes.category(&abort), Some(FailureCategory::Expired));
        Ok(())
    }
}
