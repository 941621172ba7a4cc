//! Decoding raw documents into caller-defined records.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{fields_to_json, Document};

/// A document whose fields were decoded into `T`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDocument<T> {
    /// Last segment of the resource name.
    pub id: String,
    /// Full resource name.
    pub name: String,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
    pub fields: T,
}

/// Decode a raw document with serde.
///
/// Field values are flattened to plain JSON first (see [`crate::types::Value::to_json`]),
/// so `T` is written as an ordinary serde struct. Documents without fields
/// (missing documents) decode from an empty object.
pub fn extract_fields<T: DeserializeOwned>(document: &Document) -> FirestoreResult<TypedDocument<T>> {
    let json = serde_json::Value::Object(fields_to_json(document.fields.as_ref()));
    let name = document.name.clone().unwrap_or_default();

    let fields = serde_json::from_value(json).map_err(|e| {
        FirestoreError::SerializationError(format!("failed to decode document {:?}: {}", name, e))
    })?;

    Ok(TypedDocument {
        id: document.id().unwrap_or_default().to_string(),
        name,
        create_time: document.create_time.clone(),
        update_time: document.update_time.clone(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
        #[serde(default)]
        tags: Vec<String>,
        address: Option<Address>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Address {
        city: String,
    }

    fn raw(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_fields_into_struct() {
        let doc = raw(json!({
            "name": "projects/p/databases/(default)/documents/users/alice",
            "fields": {
                "name": { "stringValue": "Alice" },
                "age": { "integerValue": "31" },
                "tags": { "arrayValue": { "values": [{ "stringValue": "admin" }] } },
                "address": { "mapValue": { "fields": { "city": { "stringValue": "Oslo" } } } }
            },
            "createTime": "2024-05-01T00:00:00Z",
            "updateTime": "2024-05-02T00:00:00Z"
        }));

        let typed: TypedDocument<User> = extract_fields(&doc).unwrap();
        assert_eq!(typed.id, "alice");
        assert_eq!(typed.name, "projects/p/databases/(default)/documents/users/alice");
        assert_eq!(typed.update_time.as_deref(), Some("2024-05-02T00:00:00Z"));
        assert_eq!(
            typed.fields,
            User {
                name: "Alice".to_string(),
                age: 31,
                tags: vec!["admin".to_string()],
                address: Some(Address { city: "Oslo".to_string() }),
            }
        );
    }

    #[test]
    fn test_missing_document_decodes_from_empty_fields() {
        let doc = raw(json!({ "name": "projects/p/databases/(default)/documents/users/ghost" }));
        let typed: TypedDocument<serde_json::Map<String, serde_json::Value>> =
            extract_fields(&doc).unwrap();
        assert_eq!(typed.id, "ghost");
        assert!(typed.fields.is_empty());
        assert!(typed.create_time.is_none());
    }

    #[test]
    fn test_shape_mismatch_is_serialization_error() {
        let doc = raw(json!({
            "name": "projects/p/databases/(default)/documents/users/bob",
            "fields": { "name": { "integerValue": "5" } }
        }));
        let err = extract_fields::<User>(&doc).unwrap_err();
        assert!(matches!(err, FirestoreError::SerializationError(ref m) if m.contains("users/bob")));
    }
}
