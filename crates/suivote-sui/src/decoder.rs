// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Decoding of raw chain objects into typed records.
//!
//! The full node renders Move values as JSON whose shape depends on the Move type and on the
//! serialization version of the node. Every accessor in this module is total: a missing or
//! malformed field decodes to a zero value, an empty collection, or [`Status::Unknown`].

use itertools::Itertools;
use serde_json::{Map, Value};
use sui_sdk::rpc_types::SuiObjectData;
use sui_types::base_types::{ObjectID, SuiAddress};

use crate::{contracts, types::Status};

/// Raw values below this bound are treated as seconds rather than milliseconds.
const SECONDS_TIMESTAMP_BOUND: u64 = 100_000_000_000;

/// Paths probed, in order, when a value is expected to hold a collection.
const COLLECTION_POINTERS: [&str; 5] = [
    "/fields/contents",
    "/fields/vec",
    "/fields/items",
    "/vec",
    "/contents",
];

/// The JSON rendering of an object as returned by the full node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainObject(Value);

impl ChainObject {
    /// Wraps a JSON value in the `SuiObjectData` shape.
    pub fn from_json(value: Value) -> Self {
        Self(value)
    }

    /// Converts object data received from the full node.
    pub fn from_object_data(data: &SuiObjectData) -> Result<Self, serde_json::Error> {
        serde_json::to_value(data).map(Self)
    }

    /// The underlying JSON value.
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// The ID of the object, if present and well-formed.
    pub fn object_id(&self) -> Option<ObjectID> {
        self.0
            .get("objectId")
            .and_then(Value::as_str)
            .and_then(parse_object_id)
    }

    /// The Move type of the object, taken from the object data or from its content.
    pub fn object_type(&self) -> Option<&str> {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .or_else(|| self.0.pointer("/content/type").and_then(Value::as_str))
    }

    /// Returns the fields of the object if its content is a Move object.
    pub fn move_fields(&self) -> Option<FieldBag<'_>> {
        let content = self.0.get("content")?;
        if content.get("dataType").and_then(Value::as_str) != Some("moveObject") {
            return None;
        }
        Some(FieldBag::new(content.get("fields")))
    }

    /// Classifies the object by its Move type.
    pub fn kind(&self) -> ObjectKind {
        self.object_type()
            .map(ObjectKind::from_type)
            .unwrap_or(ObjectKind::Other)
    }
}

/// The kinds of dashboard entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A yes/no proposal.
    Proposal,
    /// A multi-candidate ballot.
    Ballot,
    /// Anything else, including objects that could not be read.
    Other,
}

impl ObjectKind {
    /// Classifies a Move type string such as `0x2a::proposal::Proposal`.
    pub fn from_type(type_: &str) -> Self {
        if contains_type(type_, &contracts::proposal::Proposal.type_suffix()) {
            Self::Proposal
        } else if contains_type(type_, &contracts::ballot::Ballot.type_suffix()) {
            Self::Ballot
        } else {
            Self::Other
        }
    }
}

/// Returns true if `suffix` occurs in `type_` as a complete type name.
fn contains_type(type_: &str, suffix: &str) -> bool {
    type_.match_indices(suffix).any(|(start, matched)| {
        matches!(
            type_[start + matched.len()..].chars().next(),
            None | Some('<' | '>' | ',' | ' ')
        )
    })
}

/// A typed projection of a Move object.
pub trait MoveRecord: Sized {
    /// Builds the record from the object's ID and fields. Must not fail.
    fn from_fields(id: ObjectID, fields: &FieldBag<'_>) -> Self;
}

/// Decodes an object into a record.
///
/// Returns `None` if there is no object or its content is not a Move object.
pub fn decode<R: MoveRecord>(object: Option<&ChainObject>) -> Option<R> {
    let object = object?;
    let fields = object.move_fields()?;
    let id = object
        .object_id()
        .or_else(|| fields.uid())
        .unwrap_or(ObjectID::ZERO);
    Some(R::from_fields(id, &fields))
}

/// Read-only access to the fields of a Move struct.
#[derive(Debug, Clone, Copy)]
pub struct FieldBag<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> FieldBag<'a> {
    /// Wraps a value holding struct fields; accepts both `{..}` and `{type, fields: {..}}`.
    pub fn new(value: Option<&'a Value>) -> Self {
        Self {
            fields: value.map(unwrap_struct).and_then(Value::as_object),
        }
    }

    /// The raw value of a field.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields?.get(name)
    }

    /// A string field, empty if missing.
    pub fn string(&self, name: &str) -> String {
        self.optional_string(name).unwrap_or_default()
    }

    /// A string field that may be absent, including Move `Option<String>` encodings.
    pub fn optional_string(&self, name: &str) -> Option<String> {
        value_as_string(self.get(name)?)
    }

    /// An integer field coerced with [`coerce_u64`].
    pub fn u64(&self, name: &str) -> u64 {
        self.get(name).map(coerce_u64).unwrap_or_default()
    }

    /// A timestamp field in milliseconds, see [`normalize_timestamp_ms`].
    pub fn timestamp_ms(&self, name: &str) -> u64 {
        normalize_timestamp_ms(self.u64(name))
    }

    /// A boolean field, false if missing.
    pub fn bool(&self, name: &str) -> bool {
        match self.get(name) {
            Some(Value::Bool(value)) => *value,
            Some(Value::String(value)) => value.trim().eq_ignore_ascii_case("true"),
            Some(value @ Value::Number(_)) => coerce_u64(value) != 0,
            _ => false,
        }
    }

    /// An address field.
    pub fn address(&self, name: &str) -> Option<SuiAddress> {
        self.get(name)
            .and_then(value_as_id)
            .map(SuiAddress::from)
    }

    /// An `ID` or `UID` field.
    pub fn object_id(&self, name: &str) -> Option<ObjectID> {
        self.get(name).and_then(value_as_id)
    }

    /// The `id: UID` field of a Move object.
    pub fn uid(&self) -> Option<ObjectID> {
        self.object_id("id")
    }

    /// A set of addresses, e.g. a `VecSet<address>`.
    pub fn address_set(&self, name: &str) -> Vec<SuiAddress> {
        self.collection(name)
            .iter()
            .filter_map(value_as_id)
            .map(SuiAddress::from)
            .unique()
            .collect()
    }

    /// A list of object IDs, e.g. a `vector<ID>`.
    pub fn id_list(&self, name: &str) -> Vec<ObjectID> {
        self.collection(name)
            .iter()
            .filter_map(value_as_id)
            .collect()
    }

    /// A status enum field.
    pub fn status(&self, name: &str) -> Status {
        decode_status(self.get(name))
    }

    /// The fields of a nested struct.
    pub fn nested(&self, name: &str) -> FieldBag<'a> {
        FieldBag::new(self.get(name))
    }

    /// The elements of a collection of structs.
    pub fn items(&self, name: &str) -> Vec<FieldBag<'a>> {
        self.collection(name)
            .iter()
            .map(|item| FieldBag::new(Some(item)))
            .collect()
    }

    fn collection(&self, name: &str) -> &'a [Value] {
        self.get(name).map(extract_collection).unwrap_or_default()
    }
}

/// Returns the elements of a collection value.
///
/// Accepts a direct array and the wrapped encodings `{fields: {contents | vec | items: [..]}}`
/// as well as `{vec: [..]}` and `{contents: [..]}`. The first encoding holding a non-empty
/// array wins; if none does, the result is empty.
pub fn extract_collection(value: &Value) -> &[Value] {
    let direct = value.as_array().map(Vec::as_slice);
    let wrapped = COLLECTION_POINTERS
        .iter()
        .map(|pointer| value.pointer(pointer).and_then(Value::as_array).map(Vec::as_slice));
    std::iter::once(direct)
        .chain(wrapped)
        .flatten()
        .find(|elements| !elements.is_empty())
        .unwrap_or_default()
}

/// Coerces a JSON number or numeric string into a `u64`.
///
/// Fractions are truncated. Negative, non-finite, and non-numeric input yields 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn coerce_u64(value: &Value) -> u64 {
    fn from_f64(value: f64) -> u64 {
        if value.is_finite() && value >= 0.0 {
            // Saturates at `u64::MAX`.
            value.trunc() as u64
        } else {
            0
        }
    }

    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_i64().map(|_| 0))
            .or_else(|| number.as_f64().map(from_f64))
            .unwrap_or_default(),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(from_f64))
                .unwrap_or_default()
        }
        _ => 0,
    }
}

/// Converts a timestamp to milliseconds; values below 10^11 are taken to be in seconds.
pub fn normalize_timestamp_ms(raw: u64) -> u64 {
    if raw < SECONDS_TIMESTAMP_BOUND {
        raw.saturating_mul(1000)
    } else {
        raw
    }
}

/// Decodes a status value.
///
/// Checks `.variant`, `.fields.name`, and `.name` in this order; a plain string is used as the
/// tag directly. Any other value is kept in its JSON rendering as [`Status::Other`].
pub fn decode_status(value: Option<&Value>) -> Status {
    let value = match value {
        None | Some(Value::Null) => return Status::Unknown,
        Some(value) => value,
    };
    if let Some(tag) = value.as_str() {
        return Status::from_tag(tag);
    }
    ["/variant", "/fields/name", "/name"]
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .map(Status::from_tag)
        .unwrap_or_else(|| Status::Other(value.to_string()))
}

/// Parses `0x`-prefixed or bare hex, padding short literals.
pub fn parse_object_id(text: &str) -> Option<ObjectID> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with("0x") {
        ObjectID::from_hex_literal(text).ok()
    } else {
        ObjectID::from_hex_literal(&format!("0x{text}")).ok()
    }
}

fn unwrap_struct(value: &Value) -> &Value {
    match value.get("fields") {
        Some(fields) if fields.is_object() => fields,
        _ => value,
    }
}

fn value_as_id(value: &Value) -> Option<ObjectID> {
    match value {
        Value::String(text) => parse_object_id(text),
        Value::Object(_) => ["/id", "/bytes", "/fields/id", "/id/id"]
            .iter()
            .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
            .and_then(parse_object_id),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(_) | Value::Object(_) => extract_collection(value)
            .first()
            .and_then(value_as_string),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{Ballot, Dashboard, Proposal};

    const ADDRESS_A: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";
    const ADDRESS_B: &str = "0x00000000000000000000000000000000000000000000000000000000000000bb";

    fn move_object(object_id: &str, type_: &str, fields: Value) -> ChainObject {
        ChainObject::from_json(json!({
            "objectId": object_id,
            "version": "3",
            "digest": "11111111111111111111111111111111",
            "type": type_,
            "content": {
                "dataType": "moveObject",
                "type": type_,
                "hasPublicTransfer": false,
                "fields": fields,
            }
        }))
    }

    #[test]
    fn non_move_content_is_not_decoded() {
        let package = ChainObject::from_json(json!({
            "objectId": "0x2",
            "content": { "dataType": "package", "disassembled": {} }
        }));
        assert!(decode::<Proposal>(Some(&package)).is_none());
        assert!(decode::<Proposal>(None).is_none());
        assert!(decode::<Proposal>(Some(&ChainObject::from_json(json!({})))).is_none());
    }

    #[test]
    fn missing_fields_decode_to_defaults() -> anyhow::Result<()> {
        let object = move_object("0xa", "0x1::proposal::Proposal", json!({}));
        let proposal = decode::<Proposal>(Some(&object)).expect("a move object decodes");

        assert_eq!(proposal.id, ObjectID::from_hex_literal("0xa")?);
        assert_eq!(proposal.title, "");
        assert_eq!(proposal.voted_yes_count, 0);
        assert_eq!(proposal.voted_no_count, 0);
        assert_eq!(proposal.expiration_ms, 0);
        assert_eq!(proposal.status, Status::Unknown);
        assert!(proposal.creator.is_none());
        assert!(!proposal.is_private);

        let ballot = decode::<Ballot>(Some(&object)).expect("a move object decodes");
        assert!(ballot.candidates.is_empty());
        assert_eq!(ballot.total_votes, 0);
        Ok(())
    }

    #[test]
    fn malformed_fields_decode_to_defaults() {
        let object = move_object(
            "0xa",
            "0x1::proposal::Proposal",
            json!({
                "title": { "unexpected": true },
                "voted_yes_count": "not a number",
                "voted_no_count": -4,
                "expiration": [1, 2],
                "creator": 17,
                "status": 3,
            }),
        );
        let proposal = decode::<Proposal>(Some(&object)).expect("a move object decodes");

        assert_eq!(proposal.title, "");
        assert_eq!(proposal.voted_yes_count, 0);
        assert_eq!(proposal.voted_no_count, 0);
        assert_eq!(proposal.expiration_ms, 0);
        assert!(proposal.creator.is_none());
        assert_eq!(proposal.status, Status::Other("3".to_owned()));
    }

    #[test]
    fn collection_encodings_yield_the_same_addresses() {
        let addresses = json!([ADDRESS_A, ADDRESS_B]);
        let encodings = [
            addresses.clone(),
            json!({ "type": "0x2::vec_set::VecSet<address>", "fields": { "contents": addresses } }),
            json!({ "fields": { "vec": addresses } }),
            json!({ "fields": { "items": addresses } }),
        ];

        let decoded: Vec<_> = encodings
            .into_iter()
            .map(|encoding| {
                let object = move_object(
                    "0x1",
                    "0x1::dashboard::Dashboard",
                    json!({ "admin_addresses": encoding }),
                );
                decode::<Dashboard>(Some(&object))
                    .expect("a move object decodes")
                    .admin_addresses
            })
            .collect();

        assert_eq!(decoded[0].len(), 2);
        assert!(decoded.iter().all(|addresses| addresses == &decoded[0]));
    }

    #[test]
    fn first_non_empty_collection_wins() {
        let value = json!({ "fields": { "contents": [], "vec": ["0x1"], "items": ["0x2", "0x3"] } });
        assert_eq!(extract_collection(&value), &[json!("0x1")]);
        assert!(extract_collection(&json!({ "fields": { "contents": [] } })).is_empty());
        assert!(extract_collection(&json!("0x1")).is_empty());
    }

    #[test]
    fn decoding_is_idempotent() {
        let object = move_object(
            "0xb",
            "0x1::ballot::Ballot",
            json!({
                "title": "Board election",
                "expiration": "1700000000",
                "candidates": [
                    { "type": "0x1::ballot::Candidate", "fields": { "id": "1", "name": "A", "votes": "4" } },
                    { "type": "0x1::ballot::Candidate", "fields": { "id": "2", "name": "B", "votes": 6 } },
                ],
                "status": { "variant": "Active", "fields": {} },
            }),
        );

        let first = decode::<Ballot>(Some(&object));
        let second = decode::<Ballot>(Some(&object));
        assert_eq!(first, second);
        let ballot = first.expect("a move object decodes");
        assert_eq!(ballot.total_votes, 10);
        assert_eq!(ballot.expiration_ms, 1_700_000_000_000);
    }

    #[test]
    fn numbers_are_coerced() {
        assert_eq!(coerce_u64(&json!("42")), 42);
        assert_eq!(coerce_u64(&json!(" 7 ")), 7);
        assert_eq!(coerce_u64(&json!(12)), 12);
        assert_eq!(coerce_u64(&json!(3.9)), 3);
        assert_eq!(coerce_u64(&json!("18446744073709551615")), u64::MAX);
        assert_eq!(coerce_u64(&json!("NaN")), 0);
        assert_eq!(coerce_u64(&json!("-3")), 0);
        assert_eq!(coerce_u64(&json!(null)), 0);
        assert_eq!(coerce_u64(&json!(true)), 0);
    }

    #[test]
    fn timestamps_in_seconds_are_scaled() {
        assert_eq!(normalize_timestamp_ms(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_timestamp_ms(1_700_000_000_000), 1_700_000_000_000);
        assert_eq!(normalize_timestamp_ms(0), 0);
    }

    #[test]
    fn status_shapes_are_decoded_in_priority_order() {
        assert_eq!(
            decode_status(Some(&json!({ "variant": "Delisted", "fields": { "name": "Active" } }))),
            Status::Delisted
        );
        assert_eq!(
            decode_status(Some(&json!({ "fields": { "name": "Expired" } }))),
            Status::Expired
        );
        assert_eq!(decode_status(Some(&json!({ "name": "passed" }))), Status::Passed);
        assert_eq!(decode_status(Some(&json!("Rejected"))), Status::Rejected);
        assert_eq!(
            decode_status(Some(&json!({ "variant": "Paused" }))),
            Status::Other("Paused".to_owned())
        );
        assert_eq!(
            decode_status(Some(&json!({ "kind": 1 }))),
            Status::Other(r#"{"kind":1}"#.to_owned())
        );
        assert_eq!(decode_status(None), Status::Unknown);
    }

    #[test]
    fn object_types_are_classified() {
        assert_eq!(
            ObjectKind::from_type("0xabc::proposal::Proposal"),
            ObjectKind::Proposal
        );
        assert_eq!(ObjectKind::from_type("0xabc::ballot::Ballot"), ObjectKind::Ballot);
        assert_eq!(
            ObjectKind::from_type("0xabc::proposal::ProposalStatus"),
            ObjectKind::Other
        );
        assert_eq!(ObjectKind::from_type("0x2::coin::Coin<0x2::sui::SUI>"), ObjectKind::Other);
    }

    #[test]
    fn ids_accept_short_and_wrapped_forms() -> anyhow::Result<()> {
        let expected = ObjectID::from_hex_literal("0xa")?;
        assert_eq!(parse_object_id("0xa"), Some(expected));
        assert_eq!(parse_object_id("a"), Some(expected));
        assert_eq!(value_as_id(&json!({ "id": "0xa" })), Some(expected));
        assert_eq!(value_as_id(&json!({ "bytes": "0xa" })), Some(expected));
        assert_eq!(parse_object_id("not hex"), None);
        Ok(())
    }
}
