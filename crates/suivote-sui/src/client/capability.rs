// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Detection of the capability objects held by the connected account.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use sui_types::base_types::{ObjectID, SuiAddress};
use tokio::sync::{Mutex, watch};

use super::read_client::ChainReadApi;
use crate::{
    contracts::{StructTag, dashboard},
    decoder::decode,
    types::CapabilityHandle,
};

/// The capability objects that authorize privileged calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    /// `dashboard::AdminCap`.
    AdminCap,
    /// `dashboard::SuperAdminCap`.
    SuperAdminCap,
}

impl CapabilityKind {
    /// The Move struct of the capability.
    pub fn struct_tag(&self) -> StructTag<'static> {
        match self {
            Self::AdminCap => dashboard::AdminCap,
            Self::SuperAdminCap => dashboard::SuperAdminCap,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdminCap => write!(f, "AdminCap"),
            Self::SuperAdminCap => write!(f, "SuperAdminCap"),
        }
    }
}

/// What is known about one capability of the connected account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityState {
    /// Whether the account owns the capability.
    pub has_capability: bool,
    /// The capability object to pass to calls.
    pub capability_id: Option<ObjectID>,
    /// Whether a lookup is running.
    pub is_loading: bool,
    /// The error of the last lookup, if it failed.
    pub error: Option<String>,
}

/// Tracks whether the connected account holds one kind of capability.
///
/// The state is published through a watch channel so that views can react to changes. A gate is
/// bound to one package; switching networks builds new gates.
#[derive(Debug)]
pub struct CapabilityGate {
    kind: CapabilityKind,
    package_id: ObjectID,
    read_client: Arc<dyn ChainReadApi>,
    state: watch::Sender<CapabilityState>,
    /// The account of the last successful evaluation; `None` if it must be re-run.
    evaluated_for: Mutex<Option<Option<SuiAddress>>>,
}

impl CapabilityGate {
    /// Creates a gate for `kind` in the package `package_id`.
    pub fn new(
        kind: CapabilityKind,
        package_id: ObjectID,
        read_client: Arc<dyn ChainReadApi>,
    ) -> Self {
        Self {
            kind,
            package_id,
            read_client,
            state: watch::Sender::new(CapabilityState::default()),
            evaluated_for: Mutex::new(None),
        }
    }

    /// The capability tracked by the gate.
    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<CapabilityState> {
        self.state.subscribe()
    }

    /// The current state.
    pub fn current(&self) -> CapabilityState {
        self.state.borrow().clone()
    }

    /// Forces the next [`refresh`][Self::refresh] to query the chain, e.g. after a grant or
    /// revoke transaction.
    pub async fn invalidate(&self) {
        *self.evaluated_for.lock().await = None;
    }

    /// Evaluates the gate for `account`.
    ///
    /// Without an account, the empty state is published and no query is issued. The chain is
    /// only queried again if the account changed or the gate was invalidated.
    pub async fn refresh(&self, account: Option<SuiAddress>) -> CapabilityState {
        let mut evaluated_for = self.evaluated_for.lock().await;
        if *evaluated_for == Some(account) {
            return self.current();
        }

        let Some(owner) = account else {
            self.state.send_replace(CapabilityState::default());
            *evaluated_for = Some(None);
            return CapabilityState::default();
        };

        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });
        let state = self.query(owner).await;
        if state.error.is_none() {
            *evaluated_for = Some(account);
        }
        self.state.send_replace(state.clone());
        state
    }

    async fn query(&self, owner: SuiAddress) -> CapabilityState {
        let struct_tag = match self.kind.struct_tag().to_move_struct_tag(self.package_id) {
            Ok(struct_tag) => struct_tag,
            Err(error) => return Self::failed(error.to_string()),
        };

        match self
            .read_client
            .owned_objects_of_type(owner, struct_tag)
            .await
        {
            Ok(objects) => {
                let mut ids: Vec<_> = objects
                    .iter()
                    .filter_map(|object| decode::<CapabilityHandle>(Some(object)))
                    .map(|handle| handle.object_id)
                    .collect();
                ids.sort();
                ids.dedup();
                if ids.len() > 1 {
                    tracing::warn!(
                        kind = %self.kind,
                        %owner,
                        count = ids.len(),
                        "account owns several capabilities of the same kind; using the lowest ID"
                    );
                }
                CapabilityState {
                    has_capability: !ids.is_empty(),
                    capability_id: ids.first().copied(),
                    is_loading: false,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(kind = %self.kind, %owner, %error, "capability lookup failed");
                Self::failed(error.to_string())
            }
        }
    }

    fn failed(error: String) -> CapabilityState {
        CapabilityState {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// A capability the account holds, ready to be passed to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedCap {
    /// The kind of capability.
    pub kind: CapabilityKind,
    /// The capability object.
    pub cap_id: ObjectID,
}

/// The admin and super-admin states of the connected account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Privileges {
    /// State of the `AdminCap` lookup.
    pub admin: CapabilityState,
    /// State of the `SuperAdminCap` lookup.
    pub super_admin: CapabilityState,
}

impl Privileges {
    /// The capability of `kind`, if held.
    pub fn get(&self, kind: CapabilityKind) -> Option<AuthorizedCap> {
        let state = match kind {
            CapabilityKind::AdminCap => &self.admin,
            CapabilityKind::SuperAdminCap => &self.super_admin,
        };
        state
            .capability_id
            .filter(|_| state.has_capability)
            .map(|cap_id| AuthorizedCap { kind, cap_id })
    }

    /// The highest-privilege capability held, preferring the super-admin capability.
    pub fn strongest(&self) -> Option<AuthorizedCap> {
        self.get(CapabilityKind::SuperAdminCap)
            .or_else(|| self.get(CapabilityKind::AdminCap))
    }

    /// Whether either lookup is running.
    pub fn is_loading(&self) -> bool {
        self.admin.is_loading || self.super_admin.is_loading
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{client::read_client::MockChainReadApi, decoder::ChainObject};

    fn cap_object(id: &str) -> ChainObject {
        ChainObject::from_json(json!({
            "objectId": id,
            "type": "0x2a::dashboard::AdminCap",
            "content": {
                "dataType": "moveObject",
                "type": "0x2a::dashboard::AdminCap",
                "fields": { "id": { "id": id } },
            },
        }))
    }

    fn gate(read_client: MockChainReadApi) -> CapabilityGate {
        CapabilityGate::new(
            CapabilityKind::AdminCap,
            ObjectID::from_single_byte(0x2a),
            Arc::new(read_client),
        )
    }

    #[tokio::test]
    async fn no_account_issues_no_query() {
        let mut read_client = MockChainReadApi::new();
        read_client.expect_owned_objects_of_type().never();
        let gate = gate(read_client);

        let state = gate.refresh(None).await;

        assert!(!state.has_capability);
        assert_eq!(state.capability_id, None);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn single_owned_capability_is_reported() {
        let mut read_client = MockChainReadApi::new();
        read_client
            .expect_owned_objects_of_type()
            .withf(|_, struct_tag| struct_tag.name.as_str() == "AdminCap")
            .times(1)
            .returning(|_, _| Ok(vec![cap_object("0x7")]));
        let gate = gate(read_client);
        let mut receiver = gate.subscribe();

        let state = gate.refresh(Some(SuiAddress::ZERO)).await;

        assert!(state.has_capability);
        assert_eq!(state.capability_id, Some(ObjectID::from_single_byte(7)));
        assert!(receiver.has_changed().unwrap_or(false));
        assert_eq!(*receiver.borrow_and_update(), state);
    }

    #[tokio::test]
    async fn several_capabilities_resolve_to_the_lowest_id() {
        let mut read_client = MockChainReadApi::new();
        read_client
            .expect_owned_objects_of_type()
            .returning(|_, _| Ok(vec![cap_object("0x9"), cap_object("0x3"), cap_object("0x5")]));
        let gate = gate(read_client);

        let state = gate.refresh(Some(SuiAddress::ZERO)).await;

        assert_eq!(state.capability_id, Some(ObjectID::from_single_byte(3)));
    }

    #[tokio::test]
    async fn query_errors_are_published() {
        let mut read_client = MockChainReadApi::new();
        read_client
            .expect_owned_objects_of_type()
            .times(2)
            .returning(|_, _| Err(anyhow::anyhow!("node unavailable").into()));
        let gate = gate(read_client);

        let state = gate.refresh(Some(SuiAddress::ZERO)).await;
        assert!(!state.has_capability);
        assert!(state.error.is_some_and(|error| error.contains("node unavailable")));

        // A failed lookup is not cached.
        gate.refresh(Some(SuiAddress::ZERO)).await;
    }

    #[tokio::test]
    async fn reevaluates_only_on_account_change_or_invalidation() {
        let mut read_client = MockChainReadApi::new();
        read_client
            .expect_owned_objects_of_type()
            .times(3)
            .returning(|_, _| Ok(vec![cap_object("0x7")]));
        let gate = gate(read_client);
        let account = SuiAddress::ZERO;
        let other = SuiAddress::from(ObjectID::from_single_byte(1));

        gate.refresh(Some(account)).await;
        gate.refresh(Some(account)).await;
        gate.refresh(Some(other)).await;
        gate.invalidate().await;
        gate.refresh(Some(other)).await;
    }

    #[test]
    fn super_admin_capability_is_preferred() {
        let held = |id| CapabilityState {
            has_capability: true,
            capability_id: Some(ObjectID::from_single_byte(id)),
            ..Default::default()
        };
        let privileges = Privileges {
            admin: held(1),
            super_admin: held(2),
        };

        assert_eq!(
            privileges.strongest(),
            Some(AuthorizedCap {
                kind: CapabilityKind::SuperAdminCap,
                cap_id: ObjectID::from_single_byte(2),
            })
        );
        assert_eq!(
            Privileges {
                super_admin: CapabilityState::default(),
                ..privileges
            }
            .strongest()
            .map(|cap| cap.kind),
            Some(CapabilityKind::AdminCap)
        );
    }
}
