use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use crate::db::lists::list_exists;
use crate::db::Db;
use crate::error::{ColdlistError, Result};
use crate::ingest::table::Record;
use crate::leads::{LeadRecord, LeadStatus};
use crate::progress::ProgressContext;

/// Outcome of one bulk insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub failed: usize,
}

/// A lead as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredLead {
    pub id: String,
    pub list_id: String,
    pub data: Record,
    pub status: LeadStatus,
    pub call_attempts: u32,
    pub last_contacted_at: Option<String>,
    pub created_at: String,
}

/// One committed file import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportHistoryEntry {
    pub id: String,
    pub list_id: String,
    pub file_name: String,
    pub file_hash: String,
    pub row_count: usize,
    pub inserted: usize,
    pub failed: usize,
    pub created_at: String,
}

/// Insert leads into a list in batches of `batch_size`
///
/// Each batch is one transaction. A batch that fails is rolled back, logged
/// and counted in `failed`; the remaining batches still run. Progress is
/// advanced after every batch.
pub async fn insert_leads(
    db: &Db,
    list_id: &str,
    leads: Vec<LeadRecord>,
    batch_size: usize,
    progress: &ProgressContext,
) -> Result<ImportReport> {
    if leads.is_empty() {
        return Err(ColdlistError::InvalidInput("no data rows to import".to_string()));
    }
    if batch_size == 0 {
        return Err(ColdlistError::InvalidInput("batch_size must be greater than 0".to_string()));
    }

    let id = list_id.to_string();
    if !db.with_connection(move |conn| list_exists(conn, &id)).await? {
        return Err(ColdlistError::ListNotFound(list_id.to_string()));
    }

    let total = leads.len();
    let mut report = ImportReport::default();
    let mut done = 0;

    let mut remaining = leads.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<LeadRecord> = remaining.by_ref().take(batch_size).collect();
        let count = batch.len();
        let list_id_owned = list_id.to_string();

        let result = db
            .with_connection(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO leads (id, list_id, data_json, status, call_attempts, created_at)
                         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                    )?;
                    for lead in &batch {
                        stmt.execute(params![
                            uuid::Uuid::new_v4().to_string(),
                            list_id_owned,
                            serde_json::to_string(&lead.data)?,
                            lead.status.as_str(),
                            now,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => report.inserted += count,
            Err(e) => {
                log::error!("Batch of {} leads failed for list {}: {}", count, list_id, e);
                report.failed += count;
            }
        }

        done += count;
        progress.advance(done, total);
    }

    log::info!(
        "Inserted {} lead(s) into list {} ({} failed)",
        report.inserted,
        list_id,
        report.failed
    );
    Ok(report)
}

const LEAD_COLUMNS: &str = "id, list_id, data_json, status, call_attempts, last_contacted_at, created_at";

struct LeadRow {
    id: String,
    list_id: String,
    data_json: String,
    status: String,
    call_attempts: i64,
    last_contacted_at: Option<String>,
    created_at: String,
}

impl LeadRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            list_id: row.get(1)?,
            data_json: row.get(2)?,
            status: row.get(3)?,
            call_attempts: row.get(4)?,
            last_contacted_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_lead(self) -> Result<StoredLead> {
        Ok(StoredLead {
            data: serde_json::from_str(&self.data_json)?,
            status: self.status.parse()?,
            call_attempts: self.call_attempts.max(0) as u32,
            id: self.id,
            list_id: self.list_id,
            last_contacted_at: self.last_contacted_at,
            created_at: self.created_at,
        })
    }
}

fn query_leads(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<StoredLead>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, LeadRow::from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    rows.into_iter().map(LeadRow::into_lead).collect()
}

fn load_lead(conn: &Connection, lead_id: &str) -> Result<StoredLead> {
    conn.query_row(
        &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS),
        params![lead_id],
        LeadRow::from_row,
    )
    .optional()?
    .ok_or_else(|| ColdlistError::LeadNotFound(lead_id.to_string()))?
    .into_lead()
}

/// Leads of a list in insertion order
pub async fn fetch_leads(db: &Db, list_id: &str) -> Result<Vec<StoredLead>> {
    let list_id = list_id.to_string();
    db.with_connection(move |conn| {
        if !list_exists(conn, &list_id)? {
            return Err(ColdlistError::ListNotFound(list_id));
        }
        query_leads(
            conn,
            &format!("SELECT {} FROM leads WHERE list_id = ?1 ORDER BY rowid", LEAD_COLUMNS),
            params![list_id],
        )
    })
    .await
}

/// Every stored lead across all lists, in insertion order
pub async fn fetch_all_leads(db: &Db) -> Result<Vec<StoredLead>> {
    db.with_connection(|conn| {
        query_leads(conn, &format!("SELECT {} FROM leads ORDER BY rowid", LEAD_COLUMNS), [])
    })
    .await
}

pub async fn get_lead(db: &Db, lead_id: &str) -> Result<StoredLead> {
    let lead_id = lead_id.to_string();
    db.with_connection(move |conn| load_lead(conn, &lead_id)).await
}

/// Count one call on a lead and stamp when it happened
pub async fn record_call_attempt(db: &Db, lead_id: &str) -> Result<StoredLead> {
    let lead_id = lead_id.to_string();
    db.with_connection(move |conn| {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE leads
             SET call_attempts = call_attempts + 1, last_contacted_at = ?1, updated_at = ?1
             WHERE id = ?2",
            params![now, lead_id],
        )?;
        if changed == 0 {
            return Err(ColdlistError::LeadNotFound(lead_id));
        }
        let lead = load_lead(conn, &lead_id)?;
        log::debug!("Lead {} called {} time(s)", lead.id, lead.call_attempts);
        Ok(lead)
    })
    .await
}

/// Move a lead to a new status
pub async fn update_lead_status(db: &Db, lead_id: &str, status: LeadStatus) -> Result<StoredLead> {
    let lead_id = lead_id.to_string();
    db.with_connection(move |conn| {
        let changed = conn.execute(
            "UPDATE leads SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), chrono::Utc::now().to_rfc3339(), lead_id],
        )?;
        if changed == 0 {
            return Err(ColdlistError::LeadNotFound(lead_id));
        }
        load_lead(conn, &lead_id)
    })
    .await
}

/// Record a committed import; returns the history entry id
pub async fn record_import(
    db: &Db,
    list_id: &str,
    file_name: &str,
    file_hash: &str,
    row_count: usize,
    report: ImportReport,
) -> Result<String> {
    let entry_id = uuid::Uuid::new_v4().to_string();
    let id = entry_id.clone();
    let list_id = list_id.to_string();
    let file_name = file_name.to_string();
    let file_hash = file_hash.to_string();
    let now = chrono::Utc::now().to_rfc3339();

    db.with_connection(move |conn| {
        conn.execute(
            "INSERT INTO imports (id, list_id, file_name, file_hash, row_count, inserted, failed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                list_id,
                file_name,
                file_hash,
                row_count as i64,
                report.inserted as i64,
                report.failed as i64,
                now
            ],
        )?;
        Ok(())
    })
    .await?;

    Ok(entry_id)
}

/// Most recent import of a file with this content hash, in any list
pub async fn find_import_by_hash(db: &Db, file_hash: &str) -> Result<Option<ImportHistoryEntry>> {
    let file_hash = file_hash.to_string();
    db.with_connection(move |conn| {
        let entry = conn
            .query_row(
                "SELECT id, list_id, file_name, file_hash, row_count, inserted, failed, created_at
                 FROM imports WHERE file_hash = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![file_hash],
                |row| {
                    Ok(ImportHistoryEntry {
                        id: row.get(0)?,
                        list_id: row.get(1)?,
                        file_name: row.get(2)?,
                        file_hash: row.get(3)?,
                        row_count: row.get::<_, i64>(4)? as usize,
                        inserted: row.get::<_, i64>(5)? as usize,
                        failed: row.get::<_, i64>(6)? as usize,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    })
    .await
}
