//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity; operations
//! that touch several tables run inside one transaction.

pub mod category;
pub mod content;
pub mod session;
pub mod theme;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use content::{ContentRepository, SqlxContentRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use theme::{SqlxThemeRepository, ThemeRepository};
pub use user::{SqlxUserRepository, UserRepository};

use crate::models::{FilterValue, ListOptions};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

/// Append the WHERE and ORDER BY clauses for `options` to `select`.
///
/// Column names come from a `ListSchema` whitelist; user-supplied values only
/// ever travel as bind parameters, returned in placeholder order.
pub(crate) fn build_list_query(select: &str, options: &ListOptions) -> (String, Vec<FilterValue>) {
    let mut sql = String::from(select);
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let Some(search) = &options.search {
        let pattern = format!("%{}%", search);
        let ors: Vec<String> = options
            .search_columns
            .iter()
            .map(|column| {
                binds.push(FilterValue::Text(pattern.clone()));
                format!("{} LIKE ?", column)
            })
            .collect();
        if !ors.is_empty() {
            conditions.push(format!("({})", ors.join(" OR ")));
        }
    }

    if let Some((column, value)) = &options.filter {
        conditions.push(format!("{} = ?", column));
        binds.push(value.clone());
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    // id breaks ties between rows written within the same timestamp
    sql.push_str(&format!(
        " ORDER BY {col} {dir}, id {dir}",
        col = options.sort_column,
        dir = options.order.as_sql()
    ));

    (sql, binds)
}

/// `?, ?, ?` with `n` placeholders, for `IN (...)` clauses
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn bind_filters_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &[FilterValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            FilterValue::Text(value) => query.bind(value.clone()),
            FilterValue::Integer(value) => query.bind(*value),
        };
    }
    query
}

pub(crate) fn bind_filters_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    binds: &[FilterValue],
) -> Query<'q, MySql, MySqlArguments> {
    for bind in binds {
        query = match bind {
            FilterValue::Text(value) => query.bind(value.clone()),
            FilterValue::Integer(value) => query.bind(*value),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListQuery, CONTENT_LIST, USER_LIST};

    #[test]
    fn test_build_list_query_defaults() {
        let options = USER_LIST.resolve(&ListQuery::default()).unwrap();
        let (sql, binds) = build_list_query("SELECT * FROM users", &options);

        assert_eq!(sql, "SELECT * FROM users ORDER BY created_at DESC, id DESC");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_build_list_query_search_and_filter() {
        let users = USER_LIST
            .resolve(&ListQuery {
                search: Some("ana".to_string()),
                ..Default::default()
            })
            .unwrap();
        let (sql, binds) = build_list_query("SELECT * FROM users", &users);
        assert!(sql.contains("WHERE (username LIKE ? OR email LIKE ?)"));
        assert_eq!(binds, vec![
            FilterValue::Text("%ana%".to_string()),
            FilterValue::Text("%ana%".to_string()),
        ]);

        let contents = CONTENT_LIST
            .resolve(&ListQuery {
                search: Some("trip".to_string()),
                sort: Some("title".to_string()),
                order: Some("asc".to_string()),
                field: Some("themeId".to_string()),
                value: Some("7".to_string()),
            })
            .unwrap();
        let (sql, binds) = build_list_query("SELECT * FROM contents", &contents);
        assert_eq!(
            sql,
            "SELECT * FROM contents WHERE (title LIKE ?) AND theme_id = ? ORDER BY title ASC, id ASC"
        );
        assert_eq!(binds[1], FilterValue::Integer(7));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
