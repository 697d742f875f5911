//! Per-provider syntax capabilities.
//!
//! Builders never match on [`DatabaseProvider`] directly. They ask the provider's
//! [`DialectCapabilities`] which clause forms exist and how placeholders and pagination render.

use tessera_common::models::DatabaseProvider;

pub trait DialectCapabilities: Send + Sync {
    /// `REPLACE INTO`.
    fn supports_replace(&self) -> bool {
        false
    }
    /// `ON CONFLICT (...) DO UPDATE | DO NOTHING`.
    fn supports_on_conflict(&self) -> bool {
        false
    }
    /// `ON DUPLICATE KEY UPDATE`.
    fn supports_on_duplicate_key(&self) -> bool {
        false
    }
    /// Native `RETURNING` on INSERT and DELETE.
    fn supports_returning(&self) -> bool {
        false
    }
    /// `DELETE t FROM t JOIN ...`.
    fn supports_join_delete(&self) -> bool {
        false
    }
    /// `COMMENT` clauses on columns and tables in CREATE TABLE.
    fn supports_comments(&self) -> bool {
        false
    }

    /// Placeholder for the 1-based positional parameter `index`.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Column modifier for auto-incrementing keys.
    fn auto_increment(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    /// Trailing pagination clause, including its leading space. Empty when both are absent.
    fn pagination(&self, limit: Option<i64>, offset: Option<i64>, _has_order_by: bool) -> String {
        let mut clause = String::new();
        if let Some(limit) = limit {
            clause.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = offset {
            clause.push_str(&format!(" OFFSET {}", offset));
        }
        clause
    }
}

pub struct MySqlCapabilities;
impl DialectCapabilities for MySqlCapabilities {
    fn supports_replace(&self) -> bool {
        true
    }
    fn supports_on_duplicate_key(&self) -> bool {
        true
    }
    fn supports_join_delete(&self) -> bool {
        true
    }
    fn supports_comments(&self) -> bool {
        true
    }
    fn auto_increment(&self) -> &'static str {
        "AUTO_INCREMENT"
    }
    fn pagination(&self, limit: Option<i64>, offset: Option<i64>, _has_order_by: bool) -> String {
        match (limit, offset) {
            // MySQL has no bare OFFSET.
            (None, Some(offset)) => format!(" LIMIT 18446744073709551615 OFFSET {}", offset),
            (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            (None, None) => String::new(),
        }
    }
}

pub struct PostgreSqlCapabilities;
impl DialectCapabilities for PostgreSqlCapabilities {
    fn supports_on_conflict(&self) -> bool {
        true
    }
    fn supports_returning(&self) -> bool {
        true
    }
    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

pub struct SqliteCapabilities;
impl DialectCapabilities for SqliteCapabilities {
    fn supports_replace(&self) -> bool {
        true
    }
    fn supports_on_conflict(&self) -> bool {
        true
    }
    fn supports_returning(&self) -> bool {
        true
    }
    fn auto_increment(&self) -> &'static str {
        "AUTOINCREMENT"
    }
    fn pagination(&self, limit: Option<i64>, offset: Option<i64>, _has_order_by: bool) -> String {
        match (limit, offset) {
            (None, Some(offset)) => format!(" LIMIT -1 OFFSET {}", offset),
            (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            (None, None) => String::new(),
        }
    }
}

pub struct OracleCapabilities;
impl DialectCapabilities for OracleCapabilities {
    fn placeholder(&self, index: usize) -> String {
        format!(":{}", index)
    }
    fn pagination(&self, limit: Option<i64>, offset: Option<i64>, _has_order_by: bool) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => {
                format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
            }
            (Some(limit), None) => format!(" FETCH FIRST {} ROWS ONLY", limit),
            (None, Some(offset)) => format!(" OFFSET {} ROWS", offset),
            (None, None) => String::new(),
        }
    }
}

pub struct MsSqlCapabilities;
impl DialectCapabilities for MsSqlCapabilities {
    fn supports_join_delete(&self) -> bool {
        true
    }
    fn placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }
    fn auto_increment(&self) -> &'static str {
        "IDENTITY(1,1)"
    }
    fn pagination(&self, limit: Option<i64>, offset: Option<i64>, has_order_by: bool) -> String {
        if limit.is_none() && offset.is_none() {
            return String::new();
        }
        // OFFSET..FETCH is only valid after ORDER BY.
        let mut clause = if has_order_by {
            String::new()
        } else {
            " ORDER BY (SELECT NULL)".to_string()
        };
        clause.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
        if let Some(limit) = limit {
            clause.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
        }
        clause
    }
}

static MYSQL: MySqlCapabilities = MySqlCapabilities;
static POSTGRES: PostgreSqlCapabilities = PostgreSqlCapabilities;
static SQLITE: SqliteCapabilities = SqliteCapabilities;
static ORACLE: OracleCapabilities = OracleCapabilities;
static MSSQL: MsSqlCapabilities = MsSqlCapabilities;

/// Resolves the capability set for a provider. MariaDB shares MySQL's.
pub fn capabilities(provider: DatabaseProvider) -> &'static dyn DialectCapabilities {
    match provider {
        DatabaseProvider::MySql | DatabaseProvider::MariaDb => &MYSQL,
        DatabaseProvider::PostgreSql => &POSTGRES,
        DatabaseProvider::Sqlite => &SQLITE,
        DatabaseProvider::Oracle => &ORACLE,
        DatabaseProvider::MsSql => &MSSQL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_matrix() {
        let mysql = capabilities(DatabaseProvider::MariaDb);
        assert!(mysql.supports_replace());
        assert!(mysql.supports_on_duplicate_key());
        assert!(!mysql.supports_returning());

        let pg = capabilities(DatabaseProvider::PostgreSql);
        assert!(pg.supports_on_conflict());
        assert!(pg.supports_returning());
        assert!(!pg.supports_join_delete());

        assert!(capabilities(DatabaseProvider::MsSql).supports_join_delete());
        assert!(capabilities(DatabaseProvider::Sqlite).supports_replace());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(capabilities(DatabaseProvider::PostgreSql).placeholder(3), "$3");
        assert_eq!(capabilities(DatabaseProvider::MySql).placeholder(3), "?");
        assert_eq!(capabilities(DatabaseProvider::MsSql).placeholder(1), "@P1");
        assert_eq!(capabilities(DatabaseProvider::Oracle).placeholder(2), ":2");
    }

    #[test]
    fn test_pagination_per_dialect() {
        let standard = capabilities(DatabaseProvider::PostgreSql);
        assert_eq!(standard.pagination(Some(10), Some(20), false), " LIMIT 10 OFFSET 20");
        assert_eq!(standard.pagination(None, None, false), "");

        let oracle = capabilities(DatabaseProvider::Oracle);
        assert_eq!(oracle.pagination(Some(5), None, false), " FETCH FIRST 5 ROWS ONLY");
        assert_eq!(
            oracle.pagination(Some(5), Some(10), true),
            " OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
        );

        let mssql = capabilities(DatabaseProvider::MsSql);
        assert_eq!(
            mssql.pagination(Some(5), None, false),
            " ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
        assert_eq!(
            mssql.pagination(Some(5), Some(5), true),
            " OFFSET 5 ROWS FETCH NEXT 5 ROWS ONLY"
        );

        assert_eq!(
            capabilities(DatabaseProvider::Sqlite).pagination(None, Some(3), false),
            " LIMIT -1 OFFSET 3"
        );
    }
}
