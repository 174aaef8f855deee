//! Remote collection contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
use crate::project::ProjectId;
use crate::wire::{InsertReceipt, RawPatch, RawProject};

/// The remote persistence service holding the project collection.
///
/// Timeouts and transport failures are the implementation's business; they
/// surface as [`RemoteError`]s like any other failure.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// The full current collection. Never paged.
    async fn list(&self) -> Result<Vec<RawProject>, RemoteError>;

    /// Persist a new row and return the identity the remote assigned.
    async fn insert(&self, row: RawProject) -> Result<InsertReceipt, RemoteError>;

    /// Apply a partial update to an existing row.
    async fn update(&self, id: &ProjectId, patch: RawPatch) -> Result<(), RemoteError>;

    /// Delete a row. The response body is returned undecoded; see [`DeleteAck`].
    async fn delete(&self, id: &ProjectId) -> Result<Value, RemoteError>;
}

/// Response shapes accepted as a successful delete.
///
/// Backends disagree on what a delete returns, so each known shape is tried
/// in the order of [`DeleteAck::ACCEPTED`]. Anything else is not a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAck {
    /// A bare `true`
    Bool,
    /// An object whose `id` is the deleted id
    MatchingId,
    /// A non-empty array of deleted rows, one of which carries the id
    DeletedRows,
    /// `{"deleted": <truthy>}`
    DeletedFlag,
    /// `{"ok": <truthy>}`
    OkFlag,
    /// `{"success": <truthy>}`
    SuccessFlag,
}

impl DeleteAck {
    pub const ACCEPTED: [DeleteAck; 6] = [
        DeleteAck::Bool,
        DeleteAck::MatchingId,
        DeleteAck::DeletedRows,
        DeleteAck::DeletedFlag,
        DeleteAck::OkFlag,
        DeleteAck::SuccessFlag,
    ];

    /// The first accepted shape `response` matches, if any.
    pub fn decode(response: &Value, id: &ProjectId) -> Option<DeleteAck> {
        Self::ACCEPTED
            .into_iter()
            .find(|shape| shape.matches(response, id))
    }

    pub fn matches(self, response: &Value, id: &ProjectId) -> bool {
        match self {
            DeleteAck::Bool => response.as_bool() == Some(true),
            DeleteAck::MatchingId => response.get("id").is_some_and(|v| is_id(v, id)),
            DeleteAck::DeletedRows => response
                .as_array()
                .is_some_and(|rows| rows.iter().any(|row| row.get("id").is_some_and(|v| is_id(v, id)))),
            DeleteAck::DeletedFlag => flag(response, "deleted"),
            DeleteAck::OkFlag => flag(response, "ok"),
            DeleteAck::SuccessFlag => flag(response, "success"),
        }
    }
}

fn is_id(value: &Value, id: &ProjectId) -> bool {
    match value {
        Value::Number(n) => match (n.as_i64(), id.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => n.to_string() == id.as_str(),
        },
        Value::String(s) => s == id.as_str(),
        _ => false,
    }
}

fn flag(response: &Value, key: &str) -> bool {
    response.is_object() && response.get(key).is_some_and(truthy)
}

/// Loose truthiness as a JSON client would apply it.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "false" || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one() -> ProjectId {
        ProjectId::from(1)
    }

    #[test]
    fn decodes_each_shape() {
        assert_eq!(DeleteAck::decode(&json!(true), &one()), Some(DeleteAck::Bool));
        assert_eq!(DeleteAck::decode(&json!({"id": 1}), &one()), Some(DeleteAck::MatchingId));
        assert_eq!(DeleteAck::decode(&json!({"id": "1"}), &one()), Some(DeleteAck::MatchingId));
        assert_eq!(
            DeleteAck::decode(&json!([{"id": 1, "businessName": "A"}]), &one()),
            Some(DeleteAck::DeletedRows)
        );
        assert_eq!(DeleteAck::decode(&json!({"deleted": true}), &one()), Some(DeleteAck::DeletedFlag));
        assert_eq!(DeleteAck::decode(&json!({"ok": 1}), &one()), Some(DeleteAck::OkFlag));
        assert_eq!(DeleteAck::decode(&json!({"success": "yes"}), &one()), Some(DeleteAck::SuccessFlag));
    }

    #[test]
    fn rejects_unconfirmed_shapes() {
        for response in [
            json!(false),
            json!(null),
            json!({}),
            json!([]),
            json!({"id": 2}),
            json!([{"id": 2}]),
            json!({"deleted": false}),
            json!({"ok": 0}),
            json!({"success": "false"}),
            json!({"error": "permission denied"}),
            json!("true"),
        ] {
            assert_eq!(DeleteAck::decode(&response, &one()), None, "{response}");
        }
    }

    #[test]
    fn string_ids_match() {
        let id = ProjectId::from("9f2c");
        assert_eq!(DeleteAck::decode(&json!({"id": "9f2c"}), &id), Some(DeleteAck::MatchingId));
        assert_eq!(DeleteAck::decode(&json!({"id": 9}), &id), None);
    }
}
