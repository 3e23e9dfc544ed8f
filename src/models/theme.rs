//! Theme model
//!
//! A theme groups content and lists, in order, the categories its content
//! blocks may use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CategoryRef;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: i64,
    /// Unique name
    pub name: String,
    /// Permitted category ids, in theme order
    pub categories: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Theme {
    pub fn new(name: String, categories: Vec<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            categories,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the theme permits at least one of `category_ids`
    pub fn permits_any(&self, category_ids: &[i64]) -> bool {
        self.categories.iter().any(|id| category_ids.contains(id))
    }

    pub fn summary(&self) -> ThemeSummary {
        ThemeSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// `{id, name}` projection of a theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub id: i64,
    pub name: String,
}

/// Theme with its categories expanded, in theme order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeDetail {
    pub id: i64,
    pub name: String,
    pub categories: Vec<CategoryRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating or replacing a theme
#[derive(Debug, Clone)]
pub struct ThemeInput {
    pub name: String,
    pub categories: Vec<i64>,
}
