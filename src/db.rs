use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS receipts (
    id TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    original_name TEXT NOT NULL,
    checksum TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'upload',
    vendor TEXT,
    invoice_no TEXT,
    invoice_date TEXT,
    currency TEXT,
    subtotal REAL,
    tax REAL,
    total REAL,
    raw_json TEXT,
    parse_status TEXT NOT NULL DEFAULT 'pending',
    parse_error TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY,
    receipt_id TEXT,
    date TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT,
    amount REAL NOT NULL,
    currency TEXT NOT NULL,
    vendor TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (receipt_id) REFERENCES receipts(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS vendor_rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    match_type TEXT NOT NULL DEFAULT 'exact',
    category TEXT NOT NULL,
    priority INTEGER DEFAULT 0,
    hit_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_expenses_date ON expenses(date);
CREATE INDEX IF NOT EXISTS ix_expenses_category ON expenses(category);
CREATE INDEX IF NOT EXISTS ix_receipts_checksum ON receipts(checksum);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn get_metadata(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM metadata WHERE key = ?1", [key], |r| r.get(0))
        .optional()
        .ok()
        .flatten()
}

pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["receipts", "expenses", "vendor_rules", "metadata"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_metadata_upsert() {
        let (_dir, conn) = test_db();
        assert_eq!(get_metadata(&conn, "demo_loaded"), None);
        set_metadata(&conn, "demo_loaded", "1").unwrap();
        set_metadata(&conn, "demo_loaded", "2").unwrap();
        assert_eq!(get_metadata(&conn, "demo_loaded").as_deref(), Some("2"));
    }

    #[test]
    fn test_deleting_receipt_unlinks_expenses() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO receipts (id, file_path, original_name, checksum) VALUES ('r1', 'x.jpg', 'x.jpg', 'abc')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO expenses (receipt_id, date, category, amount, currency) \
             VALUES ('r1', '2024-01-15', 'Food', 3.0, 'EUR')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM receipts WHERE id = 'r1'", []).unwrap();
        let link: Option<String> = conn
            .query_row("SELECT receipt_id FROM expenses LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(link, None);
    }
}
