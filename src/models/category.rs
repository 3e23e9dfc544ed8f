//! Category model
//!
//! A category names a kind of content block and lists the content-type tags
//! (`allowTypes`) it accepts. Themes reference categories; content blocks
//! point at one category each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    /// Unique name
    pub name: String,
    /// Content-type tags accepted by this category, e.g. `["image", "video"]`
    pub allow_types: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(name: String, allow_types: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            allow_types,
            created_at: now,
            updated_at: now,
        }
    }

    /// `{id, name, allowTypes}` projection used in expanded read models
    pub fn reference(&self) -> CategoryRef {
        CategoryRef {
            id: self.id,
            name: self.name.clone(),
            allow_types: self.allow_types.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
    pub allow_types: Vec<String>,
}

/// Validated input for creating or replacing a category
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub allow_types: Vec<String>,
}

/// Encode `allowTypes` for the `allow_types` text column
pub fn encode_allow_types(types: &[String]) -> anyhow::Result<String> {
    Ok(serde_json::to_string(types)?)
}

/// Decode the `allow_types` text column
pub fn decode_allow_types(raw: &str) -> anyhow::Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("Corrupt allow_types value {:?}: {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_allow_types_in_camel_case() {
        let category = Category::new("Photo".to_string(), vec!["image".to_string()]);
        let json = serde_json::to_value(&category).unwrap();

        assert_eq!(json["allowTypes"], serde_json::json!(["image"]));
        assert!(json.get("allow_types").is_none());
    }

    #[test]
    fn test_allow_types_column_encoding() {
        let types = vec!["image".to_string(), "video".to_string()];
        let raw = encode_allow_types(&types).unwrap();

        assert_eq!(raw, r#"["image","video"]"#);
        assert_eq!(decode_allow_types(&raw).unwrap(), types);
        assert!(decode_allow_types("not json").is_err());
    }
}
