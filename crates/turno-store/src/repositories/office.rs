//! Office config repository — one JSON config row per office.

use rusqlite::{Connection, OptionalExtension, params};

use turno_core::time::now_rfc3339;

use crate::errors::Result;
use crate::row_types::OfficeConfigRow;

/// Office config repository — stateless, every method takes `&Connection`.
pub struct OfficeConfigRepo;

impl OfficeConfigRepo {
    /// Get the config row for an office.
    pub fn get(conn: &Connection, office_id: &str) -> Result<Option<OfficeConfigRow>> {
        let row = conn
            .query_row(
                "SELECT office_id, config, updated_at FROM office_configs WHERE office_id = ?1",
                params![office_id],
                |row| {
                    Ok(OfficeConfigRow {
                        office_id: row.get(0)?,
                        config: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Insert or replace the config for an office.
    pub fn put(conn: &Connection, office_id: &str, config_json: &str) -> Result<()> {
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO office_configs (office_id, config, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(office_id) DO UPDATE SET config = ?2, updated_at = ?3",
            params![office_id, config_json, now],
        )?;
        Ok(())
    }

    /// List all office IDs that have a stored config.
    pub fn list_office_ids(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT office_id FROM office_configs ORDER BY office_id")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = setup();
        assert!(OfficeConfigRepo::get(&conn, "ofi_centro").unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trip() {
        let conn = setup();
        OfficeConfigRepo::put(&conn, "ofi_centro", r#"{"maxConcurrentSessions":5}"#).unwrap();

        let row = OfficeConfigRepo::get(&conn, "ofi_centro").unwrap().unwrap();
        assert_eq!(row.office_id, "ofi_centro");
        assert!(row.config.contains("maxConcurrentSessions"));
    }

    #[test]
    fn put_overwrites_existing_config() {
        let conn = setup();
        OfficeConfigRepo::put(&conn, "ofi_centro", r#"{"maxConcurrentSessions":3}"#).unwrap();
        OfficeConfigRepo::put(&conn, "ofi_centro", r#"{"maxConcurrentSessions":6}"#).unwrap();

        let row = OfficeConfigRepo::get(&conn, "ofi_centro").unwrap().unwrap();
        assert!(row.config.contains('6'));

        let ids = OfficeConfigRepo::list_office_ids(&conn).unwrap();
        assert_eq!(ids, ["ofi_centro"]);
    }

    #[test]
    fn list_office_ids_sorted() {
        let conn = setup();
        OfficeConfigRepo::put(&conn, "ofi_norte", "{}").unwrap();
        OfficeConfigRepo::put(&conn, "ofi_centro", "{}").unwrap();

        let ids = OfficeConfigRepo::list_office_ids(&conn).unwrap();
        assert_eq!(ids, ["ofi_centro", "ofi_norte"]);
    }
}
