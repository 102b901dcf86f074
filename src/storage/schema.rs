//! Database schema definitions
//!
//! This module contains the SQL schema for the article archive.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvested article, keyed by url
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT,
    description TEXT,
    author TEXT,
    article_text TEXT,
    date_published TEXT,
    date_modified TEXT,
    fetched_at TEXT,
    parsed_at TEXT,
    paywall INTEGER,
    source_id TEXT NOT NULL,
    stored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_source_id ON articles(source_id);
CREATE INDEX IF NOT EXISTS idx_articles_date_published ON articles(date_published);
CREATE INDEX IF NOT EXISTS idx_articles_date_modified ON articles(date_modified);
CREATE INDEX IF NOT EXISTS idx_articles_stored_at ON articles(stored_at);
"#;

/// Column list in the order `StoredArticle` rows are read and exported
pub const ARTICLE_COLUMNS: [&str; 13] = [
    "id",
    "url",
    "title",
    "description",
    "author",
    "article_text",
    "date_published",
    "date_modified",
    "fetched_at",
    "parsed_at",
    "paywall",
    "source_id",
    "stored_at",
];

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_indices_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for index in [
            "idx_articles_source_id",
            "idx_articles_date_published",
            "idx_articles_date_modified",
            "idx_articles_stored_at",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                    [index],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Index {} should exist", index);
        }
    }

    #[test]
    fn test_column_list_matches_table() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('articles')").unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(names, ARTICLE_COLUMNS.to_vec());
    }
}
