use crate::document::ObjectId;
use crate::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common bookkeeping fields, meant to be flattened into a model:
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Model)]
/// pub struct User {
///     #[serde(flatten)]
///     pub base: Base,
///     #[docschema("unique,required")]
///     pub email: String,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
pub struct Base {
    #[serde(rename = "_id", default, skip_serializing_if = "ObjectId::is_zero")]
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version counter.
    #[serde(rename = "__v", default)]
    pub version: i64,
}

impl Base {
    /// Fresh identity with both timestamps set to now.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            created_at: Some(now),
            updated_at: Some(now),
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_base_serializes_sparse() {
        let value = serde_json::to_value(Base::default()).unwrap();
        assert_eq!(value, json!({ "__v": 0 }));
    }

    #[test]
    fn test_new_base_has_identity() {
        let base = Base::new();
        assert!(!base.id.is_zero());
        let value = serde_json::to_value(&base).unwrap();
        assert_eq!(value["_id"], json!(base.id.to_hex()));
        assert!(value.get("created_at").is_some());
    }
}
