// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Module for the configuration of the voting package and the dashboard object.

use serde::{Deserialize, Serialize};
use sui_types::base_types::ObjectID;

use crate::{
    contracts::{StructTag, dashboard},
    types::move_errors::AbortCodes,
};

/// Deployed package and dashboard of one network.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContractConfig {
    /// ID of the package containing the `dashboard`, `proposal`, and `ballot` modules.
    pub package_id: ObjectID,
    /// ID of the shared dashboard object.
    pub dashboard_object: ObjectID,
    /// Abort codes of the deployed package with a known meaning.
    #[serde(default, skip_serializing_if = "AbortCodes::is_empty")]
    pub abort_codes: AbortCodes,
}

impl ContractConfig {
    /// Creates a new [`ContractConfig`].
    pub fn new(package_id: ObjectID, dashboard_object: ObjectID) -> Self {
        Self {
            package_id,
            dashboard_object,
            abort_codes: AbortCodes::default(),
        }
    }

    /// Sets the abort codes of the deployment.
    pub fn with_abort_codes(mut self, abort_codes: AbortCodes) -> Self {
        self.abort_codes = abort_codes;
        self
    }

    /// The full type of a struct of the configured package.
    pub fn type_string(&self, tag: StructTag<'_>) -> String {
        tag.type_string(self.package_id)
    }

    /// The full type of the admin capability.
    pub fn admin_cap_type(&self) -> String {
        self.type_string(dashboard::AdminCap)
    }
}
