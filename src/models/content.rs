//! Content model
//!
//! A content record belongs to one theme and owns an ordered list of
//! content-type blocks. Blocks are never addressed directly by clients; they
//! are created, updated and removed through their parent content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CategoryRef, ThemeSummary, UserSummary};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Opaque image reference (URL or encoded payload)
    pub image: String,
    /// Owning user id, fixed at creation
    pub creator: i64,
    pub theme: i64,
    /// Ids of the owned content-type blocks, in order
    pub content_type: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One content block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentType {
    pub id: i64,
    /// Owning content id
    pub content: i64,
    pub category: i64,
    pub data: String,
    pub position: i32,
}

/// A block as submitted by a client; `id` is set when it refers to an
/// existing block of the same content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeItem {
    pub id: Option<i64>,
    pub category: i64,
    pub data: String,
}

/// Validated input for creating or replacing a content record
#[derive(Debug, Clone)]
pub struct ContentInput {
    pub title: String,
    pub description: String,
    pub image: String,
    pub theme: i64,
    pub items: Vec<ContentTypeItem>,
}

impl ContentInput {
    /// Categories referenced by the submitted blocks, in submission order
    pub fn category_ids(&self) -> Vec<i64> {
        self.items.iter().map(|item| item.category).collect()
    }
}

/// Field values written to the `contents` row itself
#[derive(Debug, Clone)]
pub struct ContentFields {
    pub title: String,
    pub description: String,
    pub image: String,
    pub theme: i64,
}

impl From<&ContentInput> for ContentFields {
    fn from(input: &ContentInput) -> Self {
        Self {
            title: input.title.clone(),
            description: input.description.clone(),
            image: input.image.clone(),
            theme: input.theme,
        }
    }
}

/// A block to write, with its final position in the parent's sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockWrite {
    pub category: i64,
    pub data: String,
    pub position: i32,
}

/// Changes that bring a content's stored blocks in line with a submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSyncPlan {
    /// Existing blocks to overwrite, keyed by id
    pub updates: Vec<(i64, BlockWrite)>,
    /// New blocks to insert
    pub inserts: Vec<BlockWrite>,
    /// Existing blocks absent from the submission
    pub deletes: Vec<i64>,
}

/// Content with theme, creator and blocks expanded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: String,
    pub creator: UserSummary,
    pub theme: ThemeSummary,
    pub content_type: Vec<ContentTypeDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypeDetail {
    pub id: i64,
    pub category: CategoryRef,
    pub data: String,
    pub position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_serializes_content_type_field() {
        let now = Utc::now();
        let content = Content {
            id: 3,
            title: "Lisbon".to_string(),
            description: "Weekend trip".to_string(),
            image: "lisbon.png".to_string(),
            creator: 1,
            theme: 2,
            content_type: vec![10, 11],
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["contentType"], serde_json::json!([10, 11]));
        assert_eq!(json["creator"], 1);
    }

    #[test]
    fn test_category_ids_keep_submission_order() {
        let input = ContentInput {
            title: "t".to_string(),
            description: "d".to_string(),
            image: "i".to_string(),
            theme: 1,
            items: vec![
                ContentTypeItem { id: None, category: 4, data: "a".to_string() },
                ContentTypeItem { id: Some(9), category: 2, data: "b".to_string() },
            ],
        };

        assert_eq!(input.category_ids(), vec![4, 2]);
    }
}
