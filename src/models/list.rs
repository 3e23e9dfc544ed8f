//! Listing options
//!
//! Clients filter and sort lists with free-form field names. Every entity
//! publishes a [`ListSchema`] naming the columns a client may use; anything
//! else is rejected before it can reach SQL.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Raw list parameters as received from a query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Substring searched in the entity's text field(s)
    pub search: Option<String>,
    /// Sort field
    pub sort: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    /// Exact-match filter field
    pub field: Option<String>,
    /// Exact-match filter value
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortOrder {
    type Err = ListQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ListQueryError::InvalidOrder(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

/// A column clients may refer to, with the names they may use for it
#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// SQL column name
    pub name: &'static str,
    /// Accepted spellings besides `name`
    pub aliases: &'static [&'static str],
    pub kind: ColumnKind,
    /// Usable with the exact-match `field`/`value` filter
    pub filterable: bool,
}

impl Column {
    fn matches(&self, requested: &str) -> bool {
        self.name == requested || self.aliases.contains(&requested)
    }
}

/// Whitelist of list columns for one table
#[derive(Debug, Clone, Copy)]
pub struct ListSchema {
    pub columns: &'static [Column],
    /// Columns matched by `search` (OR-ed)
    pub search_columns: &'static [&'static str],
    pub default_sort: &'static str,
}

/// A bound value for a list filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
}

/// Validated list options, safe to splice into SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub search: Option<String>,
    pub search_columns: &'static [&'static str],
    pub filter: Option<(&'static str, FilterValue)>,
    pub sort_column: &'static str,
    pub order: SortOrder,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ListQueryError {
    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),
    #[error("Unknown filter field: {0}")]
    UnknownFilterField(String),
    #[error("Invalid sort order '{0}', expected asc or desc")]
    InvalidOrder(String),
    #[error("Invalid value '{value}' for field {field}")]
    InvalidFilterValue { field: String, value: String },
}

impl ListSchema {
    /// Validate raw parameters against this schema.
    ///
    /// Sort defaults to the schema's creation column, descending. The exact
    /// match filter only applies when both `field` and `value` are given.
    pub fn resolve(&self, query: &ListQuery) -> Result<ListOptions, ListQueryError> {
        let sort_column = match non_blank(&query.sort) {
            Some(requested) => self
                .find(requested)
                .map(|c| c.name)
                .ok_or_else(|| ListQueryError::UnknownSortField(requested.to_string()))?,
            None => self.default_sort,
        };

        let order = match non_blank(&query.order) {
            Some(order) => order.parse()?,
            None => SortOrder::Desc,
        };

        let filter = match (non_blank(&query.field), query.value.as_deref()) {
            (Some(field), Some(value)) => {
                let column = self
                    .find(field)
                    .filter(|c| c.filterable)
                    .ok_or_else(|| ListQueryError::UnknownFilterField(field.to_string()))?;
                let value = match column.kind {
                    ColumnKind::Text => FilterValue::Text(value.to_string()),
                    ColumnKind::Integer => value.trim().parse().map(FilterValue::Integer).map_err(
                        |_| ListQueryError::InvalidFilterValue {
                            field: field.to_string(),
                            value: value.to_string(),
                        },
                    )?,
                };
                Some((column.name, value))
            }
            _ => None,
        };

        Ok(ListOptions {
            search: non_blank(&query.search).map(str::to_string),
            search_columns: self.search_columns,
            filter,
            sort_column,
            order,
        })
    }

    fn find(&self, requested: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.matches(requested))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

const fn col(
    name: &'static str,
    aliases: &'static [&'static str],
    kind: ColumnKind,
    filterable: bool,
) -> Column {
    Column {
        name,
        aliases,
        kind,
        filterable,
    }
}

const ID: Column = col("id", &[], ColumnKind::Integer, false);
const CREATED_AT: Column = col("created_at", &["createdAt"], ColumnKind::Text, false);
const UPDATED_AT: Column = col("updated_at", &["updatedAt"], ColumnKind::Text, false);

pub const USER_LIST: ListSchema = ListSchema {
    columns: &[
        ID,
        col("username", &[], ColumnKind::Text, false),
        col("email", &[], ColumnKind::Text, false),
        col("role", &["rol"], ColumnKind::Text, false),
        CREATED_AT,
        UPDATED_AT,
    ],
    search_columns: &["username", "email"],
    default_sort: "created_at",
};

pub const CATEGORY_LIST: ListSchema = ListSchema {
    columns: &[ID, col("name", &[], ColumnKind::Text, false), CREATED_AT, UPDATED_AT],
    search_columns: &["name"],
    default_sort: "created_at",
};

pub const THEME_LIST: ListSchema = ListSchema {
    columns: &[ID, col("name", &[], ColumnKind::Text, false), CREATED_AT, UPDATED_AT],
    search_columns: &["name"],
    default_sort: "created_at",
};

/// The only list that takes the exact-match filter
pub const CONTENT_LIST: ListSchema = ListSchema {
    columns: &[
        col("id", &[], ColumnKind::Integer, true),
        col("title", &[], ColumnKind::Text, true),
        col("description", &[], ColumnKind::Text, true),
        col("creator_id", &["creator", "creatorId"], ColumnKind::Integer, true),
        col("theme_id", &["theme", "themeId"], ColumnKind::Integer, true),
        CREATED_AT,
        UPDATED_AT,
    ],
    search_columns: &["title"],
    default_sort: "created_at",
};

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sort: Option<&str>, order: Option<&str>) -> ListQuery {
        ListQuery {
            sort: sort.map(String::from),
            order: order.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_to_created_at_desc() {
        let options = CATEGORY_LIST.resolve(&ListQuery::default()).unwrap();

        assert_eq!(options.sort_column, "created_at");
        assert_eq!(options.order, SortOrder::Desc);
        assert!(options.search.is_none());
        assert!(options.filter.is_none());
    }

    #[test]
    fn test_accepts_camel_and_snake_case() {
        let camel = THEME_LIST.resolve(&query(Some("createdAt"), Some("ASC"))).unwrap();
        let snake = THEME_LIST.resolve(&query(Some("created_at"), Some("asc"))).unwrap();

        assert_eq!(camel, snake);
        assert_eq!(camel.order, SortOrder::Asc);
    }

    #[test]
    fn test_rejects_unknown_sort_field() {
        let err = USER_LIST
            .resolve(&query(Some("password_hash"), None))
            .unwrap_err();
        assert_eq!(err, ListQueryError::UnknownSortField("password_hash".to_string()));
    }

    #[test]
    fn test_rejects_injection_in_order() {
        let err = USER_LIST
            .resolve(&query(Some("id"), Some("desc; DROP TABLE users")))
            .unwrap_err();
        assert!(matches!(err, ListQueryError::InvalidOrder(_)));
    }

    #[test]
    fn test_filter_requires_field_and_value() {
        let only_field = ListQuery {
            field: Some("title".to_string()),
            ..Default::default()
        };
        assert!(CONTENT_LIST.resolve(&only_field).unwrap().filter.is_none());

        let both = ListQuery {
            field: Some("theme".to_string()),
            value: Some("4".to_string()),
            ..Default::default()
        };
        assert_eq!(
            CONTENT_LIST.resolve(&both).unwrap().filter,
            Some(("theme_id", FilterValue::Integer(4)))
        );
    }

    #[test]
    fn test_filter_rejects_bad_values_and_fields() {
        let bad_value = ListQuery {
            field: Some("creator".to_string()),
            value: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CONTENT_LIST.resolve(&bad_value),
            Err(ListQueryError::InvalidFilterValue { .. })
        ));

        let not_filterable = ListQuery {
            field: Some("createdAt".to_string()),
            value: Some("2024".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CONTENT_LIST.resolve(&not_filterable),
            Err(ListQueryError::UnknownFilterField(_))
        ));
    }

    #[test]
    fn test_filter_is_content_only() {
        let by_role = ListQuery {
            field: Some("role".to_string()),
            value: Some("ADMIN".to_string()),
            ..Default::default()
        };
        assert_eq!(
            USER_LIST.resolve(&by_role).unwrap_err(),
            ListQueryError::UnknownFilterField("role".to_string())
        );

        let by_name = ListQuery {
            field: Some("name".to_string()),
            value: Some("Photo".to_string()),
            ..Default::default()
        };
        assert!(CATEGORY_LIST.resolve(&by_name).is_err());
        assert!(THEME_LIST.resolve(&by_name).is_err());

        let by_id = ListQuery {
            field: Some("id".to_string()),
            value: Some("1".to_string()),
            ..Default::default()
        };
        assert!(USER_LIST.resolve(&by_id).is_err());
        assert_eq!(
            CONTENT_LIST.resolve(&by_id).unwrap().filter,
            Some(("id", FilterValue::Integer(1)))
        );

        // Sorting on those columns is still allowed
        assert!(USER_LIST.resolve(&query(Some("role"), None)).is_ok());
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let blank = ListQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(USER_LIST.resolve(&blank).unwrap().search.is_none());
    }
}
