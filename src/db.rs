use crate::entities::{
    detail::normalize_state, CanonicalPayer, PayerGroup, RawDetailRecord, UNKNOWN_GROUP_ID,
    UNMAPPED_PAYER_ID,
};
use crate::error::{ResolverError, Result};
use crate::store::{BatchWrites, PayerStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Event for audit trail: every operator command and committed batch
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Counts from one CSV import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Groups / Payers / Details
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS payer_groups (
            group_id TEXT PRIMARY KEY,
            group_name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payers (
            payer_id TEXT PRIMARY KEY,
            payer_name TEXT NOT NULL,
            pretty_name TEXT,
            group_id TEXT NOT NULL REFERENCES payer_groups(group_id),
            UNIQUE (payer_name, group_id)
        )",
        [],
    )?;

    // payer_id is not a declared foreign key: raw ids arrive before the
    // payers they will resolve to.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS payer_details (
            detail_id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            payer_id TEXT NOT NULL,
            payer_name TEXT NOT NULL,
            state TEXT,
            source TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_details_payer ON payer_details(payer_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payers_group ON payers(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    // ==========================================================================
    // Sentinels
    // ==========================================================================
    conn.execute(
        "INSERT OR IGNORE INTO payer_groups (group_id, group_name) VALUES (?1, ?2)",
        params![UNKNOWN_GROUP_ID, crate::entities::UNKNOWN_GROUP_NAME],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO payers (payer_id, payer_name, pretty_name, group_id)
         VALUES (?1, 'Unmapped Payer', 'Unmapped', ?2)",
        params![UNMAPPED_PAYER_ID, UNKNOWN_GROUP_ID],
    )?;

    Ok(())
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// Read normalized rows (payer_id, payer_name, state, source)
///
/// Rows without a source get `default_source`, else the file stem. Rows
/// without a payer_id get a synthetic "ID<row>" so they can still seed a
/// payer.
pub fn load_csv(csv_path: &Path, default_source: Option<&str>) -> Result<Vec<RawDetailRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let source = default_source.map(str::to_string).unwrap_or_else(|| {
        csv_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let mut records = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        let mut record: RawDetailRecord = result?;
        if record.payer_id.is_empty() {
            record.payer_id = format!("ID{}", index);
        }
        if record.source.is_empty() {
            record.source = source.clone();
        }
        records.push(record);
    }

    Ok(records)
}

pub fn insert_details(conn: &Connection, records: &[RawDetailRecord]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (index, record) in records.iter().enumerate() {
        if record.payer_name.trim().is_empty() {
            warn!("Skipping row {} due to missing payer_name", index + 1);
            summary.skipped += 1;
            continue;
        }

        let hash = record.compute_idempotency_hash();
        let state = record.state.as_deref().and_then(normalize_state);

        let result = conn.execute(
            "INSERT INTO payer_details (idempotency_hash, payer_id, payer_name, state, source)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![hash, record.payer_id, record.payer_name, state, record.source],
        );

        match result {
            Ok(_) => summary.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        "Imported {} detail records ({} duplicates, {} skipped)",
        summary.inserted, summary.duplicates, summary.skipped
    );

    Ok(summary)
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn import_details(&self, records: &[RawDetailRecord]) -> Result<ImportSummary> {
        insert_details(&self.conn, records)
    }

    pub fn add_group(&self, group: &PayerGroup) -> Result<()> {
        self.conn.execute(
            "INSERT INTO payer_groups (group_id, group_name) VALUES (?1, ?2)",
            params![group.group_id, group.group_name],
        )?;
        Ok(())
    }

    /// Insert a canonical payer, creating its group as a placeholder if needed
    pub fn add_payer(&mut self, payer: &CanonicalPayer) -> Result<()> {
        let tx = self.conn.transaction()?;
        ensure_group(&tx, &payer.group_id)?;
        tx.execute(
            "INSERT INTO payers (payer_id, payer_name, pretty_name, group_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![payer.payer_id, payer.payer_name, payer.pretty_name, payer.group_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn find_payer(&self, payer_id: &str) -> Result<Option<CanonicalPayer>> {
        let payer = self
            .conn
            .query_row(
                "SELECT payer_id, payer_name, pretty_name, group_id FROM payers WHERE payer_id = ?1",
                [payer_id],
                row_to_payer,
            )
            .optional()?;
        Ok(payer)
    }

    pub fn find_detail(&self, detail_id: i64) -> Result<Option<RawDetailRecord>> {
        let detail = self
            .conn
            .query_row(
                "SELECT detail_id, payer_id, payer_name, state, source
                 FROM payer_details WHERE detail_id = ?1",
                [detail_id],
                row_to_detail,
            )
            .optional()?;
        Ok(detail)
    }

    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        get_events_for_entity(&self.conn, entity_type, entity_id)
    }
}

fn row_to_payer(row: &rusqlite::Row<'_>) -> rusqlite::Result<CanonicalPayer> {
    Ok(CanonicalPayer {
        payer_id: row.get(0)?,
        payer_name: row.get(1)?,
        pretty_name: row.get(2)?,
        group_id: row.get(3)?,
    })
}

fn row_to_detail(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDetailRecord> {
    let source: Option<String> = row.get(4)?;
    Ok(RawDetailRecord {
        detail_id: row.get(0)?,
        payer_id: row.get(1)?,
        payer_name: row.get(2)?,
        state: row.get(3)?,
        source: source.unwrap_or_default(),
    })
}

fn payer_exists(conn: &Connection, payer_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payers WHERE payer_id = ?1",
        [payer_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn group_name_taken(conn: &Connection, group_name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payer_groups WHERE group_name = ?1",
        [group_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Create a placeholder group named after its id; true if it was created
fn ensure_group(conn: &Connection, group_id: &str) -> Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payer_groups WHERE group_id = ?1",
        [group_id],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Ok(false);
    }

    let mut placeholder = PayerGroup::placeholder(group_id);
    let mut attempt = 1;
    while group_name_taken(conn, &placeholder.group_name)? {
        attempt += 1;
        placeholder = PayerGroup::placeholder_numbered(group_id, attempt);
    }
    if attempt > 1 {
        warn!(
            "Group name '{}' already in use, placeholder {} named '{}'",
            group_id, group_id, placeholder.group_name
        );
    }

    conn.execute(
        "INSERT INTO payer_groups (group_id, group_name) VALUES (?1, ?2)",
        params![placeholder.group_id, placeholder.group_name],
    )?;
    Ok(true)
}

impl PayerStore for SqliteStore {
    fn fetch_details(&self, offset: usize, limit: usize) -> Result<Vec<RawDetailRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT detail_id, payer_id, payer_name, state, source
             FROM payer_details
             ORDER BY detail_id
             LIMIT ?1 OFFSET ?2",
        )?;

        let details = stmt
            .query_map(params![limit as i64, offset as i64], row_to_detail)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(details)
    }

    fn count_details(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM payer_details", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn fetch_canonical_payers(&self) -> Result<Vec<CanonicalPayer>> {
        let mut stmt = self.conn.prepare(
            "SELECT payer_id, payer_name, pretty_name, group_id FROM payers ORDER BY payer_id",
        )?;

        let payers = stmt
            .query_map([], row_to_payer)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(payers)
    }

    fn fetch_groups(&self) -> Result<Vec<PayerGroup>> {
        let mut stmt = self
            .conn
            .prepare("SELECT group_id, group_name FROM payer_groups ORDER BY rowid")?;

        let groups = stmt
            .query_map([], |row| {
                Ok(PayerGroup {
                    group_id: row.get(0)?,
                    group_name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    fn payer_states(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT payer_id, state FROM payer_details
             WHERE state IS NOT NULL AND state != ''
             ORDER BY detail_id",
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut states = HashMap::new();
        for (payer_id, state) in rows {
            states.entry(payer_id).or_insert(state);
        }
        Ok(states)
    }

    fn commit_batch(&mut self, writes: &BatchWrites) -> Result<()> {
        // Dropping the transaction on any error rolls the whole batch back
        let tx = self.conn.transaction()?;

        for payer in &writes.new_payers {
            ensure_group(&tx, &payer.group_id)?;
            tx.execute(
                "INSERT INTO payers (payer_id, payer_name, pretty_name, group_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(payer_id) DO NOTHING",
                params![payer.payer_id, payer.payer_name, payer.pretty_name, payer.group_id],
            )?;
        }

        for (detail_id, payer_id) in &writes.assignments {
            tx.execute(
                "UPDATE payer_details SET payer_id = ?2 WHERE detail_id = ?1",
                params![detail_id, payer_id],
            )?;
        }

        let event = Event::new(
            "batch_committed",
            "resolution_run",
            &writes.run_id,
            serde_json::json!({
                "batch": writes.batch,
                "new_payers": writes.new_payers.len(),
                "assignments": writes.assignments.len(),
            }),
            "resolver",
        );
        insert_event(&tx, &event)?;

        tx.commit()?;
        Ok(())
    }

    fn assign_detail_payer(&mut self, detail_id: i64, payer_id: &str) -> Result<()> {
        if !payer_exists(&self.conn, payer_id)? {
            return Err(ResolverError::PayerNotFound(payer_id.to_string()));
        }

        let updated = self.conn.execute(
            "UPDATE payer_details SET payer_id = ?2 WHERE detail_id = ?1",
            params![detail_id, payer_id],
        )?;
        if updated == 0 {
            return Err(ResolverError::DetailNotFound(detail_id));
        }
        Ok(())
    }

    fn set_pretty_name(&mut self, payer_id: &str, pretty_name: &str) -> Result<()> {
        let trimmed = pretty_name.trim();
        let value = if trimmed.is_empty() { None } else { Some(trimmed) };

        let updated = self.conn.execute(
            "UPDATE payers SET pretty_name = ?2 WHERE payer_id = ?1",
            params![payer_id, value],
        )?;
        if updated == 0 {
            return Err(ResolverError::PayerNotFound(payer_id.to_string()));
        }
        Ok(())
    }

    fn set_payer_group(&mut self, payer_id: &str, group_id: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;

        if !payer_exists(&tx, payer_id)? {
            return Err(ResolverError::PayerNotFound(payer_id.to_string()));
        }

        let created = ensure_group(&tx, group_id)?;
        tx.execute(
            "UPDATE payers SET group_id = ?2 WHERE payer_id = ?1",
            params![payer_id, group_id],
        )?;

        tx.commit()?;
        Ok(created)
    }

    fn record_event(&mut self, event: &Event) -> Result<()> {
        insert_event(&self.conn, event)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_detail(payer_id: &str, name: &str, state: Option<&str>) -> RawDetailRecord {
        RawDetailRecord::new(0, payer_id, name, state, "Vyne")
    }

    #[test]
    fn test_setup_creates_sentinels() {
        let store = SqliteStore::open_in_memory().unwrap();

        let groups = store.fetch_groups().unwrap();
        assert_eq!(groups, vec![PayerGroup::unknown()]);

        let unmapped = store.find_payer(UNMAPPED_PAYER_ID).unwrap().unwrap();
        assert_eq!(unmapped.group_id, UNKNOWN_GROUP_ID);
        assert_eq!(unmapped.display_name(), "Unmapped");

        // running setup twice is harmless
        setup_database(store.connection()).unwrap();
        assert_eq!(store.fetch_canonical_payers().unwrap().len(), 1);
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records = vec![
            create_test_detail("86027", "Delta Dental of Arizona", Some("AZ")),
            create_test_detail("AET01", "Aetna", None),
            create_test_detail("X", "  ", None),
        ];

        let first = store.import_details(&records).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 1);

        let second = store.import_details(&records).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);

        assert_eq!(store.count_details().unwrap(), 2);
    }

    #[test]
    fn test_fetch_details_pages_in_id_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records: Vec<_> = (0..5)
            .map(|i| create_test_detail(&format!("P{}", i), &format!("Payer {}", i), None))
            .collect();
        store.import_details(&records).unwrap();

        let page = store.fetch_details(2, 2).unwrap();
        let ids: Vec<&str> = page.iter().map(|d| d.payer_id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P3"]);
        assert!(page[0].detail_id < page[1].detail_id);

        assert!(store.fetch_details(10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_payer_states_uses_earliest_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .import_details(&[
                create_test_detail("86027", "Delta Dental of Arizona", None),
                create_test_detail("86027", "Delta Dental AZ", Some("AZ")),
                create_test_detail("86027", "Delta Dental Arizona", Some("NM")),
            ])
            .unwrap();

        let states = store.payer_states().unwrap();
        assert_eq!(states.get("86027"), Some(&"AZ".to_string()));
    }

    #[test]
    fn test_commit_batch() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .import_details(&[create_test_detail("DD-AZ-1", "Delta Dental Arizona", Some("AZ"))])
            .unwrap();
        let detail_id = store.fetch_details(0, 1).unwrap()[0].detail_id;

        let mut writes = BatchWrites::new("run-1", 0);
        writes
            .new_payers
            .push(CanonicalPayer::new("86027", "Delta Dental of Arizona", UNKNOWN_GROUP_ID));
        writes.assignments.push((detail_id, "86027".to_string()));
        store.commit_batch(&writes).unwrap();

        assert!(store.find_payer("86027").unwrap().is_some());
        assert_eq!(store.find_detail(detail_id).unwrap().unwrap().payer_id, "86027");
        assert_eq!(store.events_for("resolution_run", "run-1").unwrap().len(), 1);

        // same batch again changes nothing
        store.commit_batch(&writes).unwrap();
        assert_eq!(store.fetch_canonical_payers().unwrap().len(), 2);
    }

    #[test]
    fn test_commit_batch_rolls_back_on_failure() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .add_payer(&CanonicalPayer::new("A1", "Delta Dental", UNKNOWN_GROUP_ID))
            .unwrap();

        let mut writes = BatchWrites::new("run-1", 3);
        writes
            .new_payers
            .push(CanonicalPayer::new("Z1", "Zenith Health", UNKNOWN_GROUP_ID));
        // violates UNIQUE(payer_name, group_id)
        writes
            .new_payers
            .push(CanonicalPayer::new("B1", "Delta Dental", UNKNOWN_GROUP_ID));

        assert!(store.commit_batch(&writes).is_err());
        assert!(store.find_payer("Z1").unwrap().is_none());
        assert!(store.events_for("resolution_run", "run-1").unwrap().is_empty());
    }

    #[test]
    fn test_assign_detail_payer_referential_gaps() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .import_details(&[create_test_detail("DD-AZ-2", "Delta Dent AZ", Some("AZ"))])
            .unwrap();
        let detail_id = store.fetch_details(0, 1).unwrap()[0].detail_id;

        let err = store.assign_detail_payer(detail_id, "NOPE").unwrap_err();
        assert!(matches!(err, ResolverError::PayerNotFound(_)));
        assert_eq!(store.find_detail(detail_id).unwrap().unwrap().payer_id, "DD-AZ-2");

        let err = store.assign_detail_payer(9999, UNMAPPED_PAYER_ID).unwrap_err();
        assert!(matches!(err, ResolverError::DetailNotFound(9999)));

        store.assign_detail_payer(detail_id, UNMAPPED_PAYER_ID).unwrap();
        assert_eq!(
            store.find_detail(detail_id).unwrap().unwrap().payer_id,
            UNMAPPED_PAYER_ID
        );
    }

    #[test]
    fn test_set_pretty_name() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .add_payer(&CanonicalPayer::new("86027", "Delta Dental of Arizona", UNKNOWN_GROUP_ID))
            .unwrap();

        store.set_pretty_name("86027", " Delta Dental AZ ").unwrap();
        assert_eq!(
            store.find_payer("86027").unwrap().unwrap().pretty_name,
            Some("Delta Dental AZ".to_string())
        );

        store.set_pretty_name("86027", "").unwrap();
        assert_eq!(store.find_payer("86027").unwrap().unwrap().pretty_name, None);

        assert!(matches!(
            store.set_pretty_name("NOPE", "x"),
            Err(ResolverError::PayerNotFound(_))
        ));
    }

    #[test]
    fn test_set_payer_group_creates_placeholder() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .add_payer(&CanonicalPayer::new("86027", "Delta Dental of Arizona", UNKNOWN_GROUP_ID))
            .unwrap();

        assert!(store.set_payer_group("86027", "DD").unwrap());
        assert!(!store.set_payer_group("86027", "DD").unwrap());

        assert_eq!(store.find_payer("86027").unwrap().unwrap().group_id, "DD");
        assert!(store.fetch_groups().unwrap().contains(&PayerGroup::placeholder("DD")));

        let err = store.set_payer_group("NOPE", "NEW").unwrap_err();
        assert!(err.is_referential_gap());
        assert!(!store
            .fetch_groups()
            .unwrap()
            .iter()
            .any(|g| g.group_id == "NEW"));
    }

    #[test]
    fn test_placeholder_group_avoids_taken_name() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.add_group(&PayerGroup::new("DD", "Delta Dental")).unwrap();
        store.add_group(&PayerGroup::new("DD2", "Delta Dental #2")).unwrap();
        store
            .add_payer(&CanonicalPayer::new("86027", "Delta Dental of Arizona", UNKNOWN_GROUP_ID))
            .unwrap();

        assert!(store.set_payer_group("86027", "Delta Dental").unwrap());

        assert_eq!(store.find_payer("86027").unwrap().unwrap().group_id, "Delta Dental");
        let groups = store.fetch_groups().unwrap();
        assert!(groups.contains(&PayerGroup::placeholder_numbered("Delta Dental", 3)));
        assert!(groups.contains(&PayerGroup::new("DD", "Delta Dental")));
    }

    #[test]
    fn test_event_log() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let event = Event::new(
            "pretty_name_updated",
            "payer",
            "86027",
            serde_json::json!({ "pretty_name": "Delta Dental AZ" }),
            "operator",
        );
        store.record_event(&event).unwrap();

        let events = store.events_for("payer", "86027").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, event.event_id);
        assert_eq!(events[0].data["pretty_name"], "Delta Dental AZ");
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "payer_id,payer_name,state,source").unwrap();
        writeln!(file, "86027, Delta Dental of Arizona ,az,Availity").unwrap();
        writeln!(file, ",Zenith Health,,").unwrap();
        file.flush().unwrap();

        let records = load_csv(file.path(), Some("Vyne")).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].payer_id, "86027");
        assert_eq!(records[0].payer_name, "Delta Dental of Arizona");
        assert_eq!(records[0].state, Some("AZ".to_string()));
        assert_eq!(records[0].source, "Availity");

        assert_eq!(records[1].payer_id, "ID1");
        assert_eq!(records[1].state, None);
        assert_eq!(records[1].source, "Vyne");
    }
}
