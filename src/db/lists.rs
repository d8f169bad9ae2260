use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::db::Db;
use crate::error::{ColdlistError, Result};
use crate::schema::field::FieldSet;

/// Lifecycle status of a list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStatus {
    #[default]
    Active,
    Archived,
    Blocklist,
}

impl ListStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListStatus::Active => "active",
            ListStatus::Archived => "archived",
            ListStatus::Blocklist => "blocklist",
        }
    }
}

impl fmt::Display for ListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListStatus {
    type Err = ColdlistError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ListStatus::Active),
            "archived" => Ok(ListStatus::Archived),
            "blocklist" => Ok(ListStatus::Blocklist),
            other => Err(ColdlistError::InvalidInput(format!("unknown list status: {}", other))),
        }
    }
}

/// Per-list calling preferences, stored as a JSON object
///
/// Unset options are omitted from the stored JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListSettings {
    /// Dialling prefix put in front of numbers stored without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepend_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_identifiers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_on_defaults: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_colleagues_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_blocklist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritise_new_leads: Option<bool>,
    /// Call script shown to agents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    // Comma-separated outcome categories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_categories: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_categories: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loser_categories: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_categories: Option<String>,
}

/// A stored contact list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub fields: FieldSet,
    pub settings: ListSettings,
    pub status: ListStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update of a list; `None` leaves the column untouched
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub fields: Option<FieldSet>,
    pub settings: Option<ListSettings>,
    pub status: Option<ListStatus>,
}

impl ListUpdate {
    fn apply(self, list: &mut ListRecord) -> Result<()> {
        if let Some(name) = self.name {
            list.name = validate_name(&name)?;
        }
        if let Some(description) = self.description {
            list.description = clean_description(description.as_deref());
        }
        if let Some(fields) = self.fields {
            list.fields = fields;
        }
        if let Some(settings) = self.settings {
            list.settings = settings;
        }
        if let Some(status) = self.status {
            list.status = status;
        }
        Ok(())
    }
}

/// Per-status lead counts of one list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeadCounts {
    pub total: usize,
    pub new: usize,
    pub callback: usize,
    pub won: usize,
    pub lost: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListSummary {
    pub list: ListRecord,
    pub counts: LeadCounts,
}

const LIST_COLUMNS: &str = "id, name, description, fields_json, settings_json, status, created_at, updated_at";

struct ListRow {
    id: String,
    name: String,
    description: Option<String>,
    fields_json: String,
    settings_json: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl ListRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            fields_json: row.get(3)?,
            settings_json: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<ListRecord> {
        Ok(ListRecord {
            fields: serde_json::from_str(&self.fields_json)?,
            settings: serde_json::from_str(&self.settings_json)?,
            status: self.status.parse()?,
            id: self.id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ColdlistError::InvalidInput("list name is required".to_string()));
    }
    Ok(name.to_string())
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string)
}

pub(crate) fn list_exists(conn: &Connection, list_id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM lists WHERE id = ?1", params![list_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn load_list(conn: &Connection, list_id: &str) -> Result<ListRecord> {
    conn.query_row(
        &format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS),
        params![list_id],
        ListRow::from_row,
    )
    .optional()?
    .ok_or_else(|| ColdlistError::ListNotFound(list_id.to_string()))?
    .into_record()
}

/// Create an active list with the given fields; the name must not be blank
pub async fn create_list(
    db: &Db,
    name: &str,
    fields: &FieldSet,
    description: Option<&str>,
) -> Result<ListRecord> {
    let now = chrono::Utc::now().to_rfc3339();
    let record = ListRecord {
        id: uuid::Uuid::new_v4().to_string(),
        name: validate_name(name)?,
        description: clean_description(description),
        fields: fields.clone(),
        settings: ListSettings::default(),
        status: ListStatus::Active,
        created_at: now.clone(),
        updated_at: now,
    };
    let fields_json = serde_json::to_string(&record.fields)?;
    let settings_json = serde_json::to_string(&record.settings)?;

    let row = record.clone();
    db.with_connection(move |conn| {
        conn.execute(
            "INSERT INTO lists (id, name, description, fields_json, settings_json, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id,
                row.name,
                row.description,
                fields_json,
                settings_json,
                row.status.as_str(),
                row.created_at,
                row.updated_at
            ],
        )?;
        Ok(())
    })
    .await?;

    log::info!("Created list {:?} ({}) with {} field(s)", record.name, record.id, record.fields.len());
    Ok(record)
}

pub async fn get_list(db: &Db, list_id: &str) -> Result<ListRecord> {
    let list_id = list_id.to_string();
    db.with_connection(move |conn| load_list(conn, &list_id)).await
}

/// All lists, newest first, with lead counts
pub async fn list_lists(db: &Db) -> Result<Vec<ListSummary>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT l.id, l.name, l.description, l.fields_json, l.settings_json, l.status,
                    l.created_at, l.updated_at,
                    COUNT(ld.id),
                    SUM(CASE WHEN ld.status = 'new' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN ld.status = 'callback' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN ld.status = 'won' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN ld.status = 'lost' THEN 1 ELSE 0 END)
             FROM lists l
             LEFT JOIN leads ld ON ld.list_id = l.id
             GROUP BY l.id
             ORDER BY l.created_at DESC, l.rowid DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let count = |idx: usize| -> rusqlite::Result<usize> {
                    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0) as usize)
                };
                let counts = LeadCounts {
                    total: count(8)?,
                    new: count(9)?,
                    callback: count(10)?,
                    won: count(11)?,
                    lost: count(12)?,
                };
                Ok((ListRow::from_row(row)?, counts))
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        rows.into_iter()
            .map(|(row, counts)| {
                Ok(ListSummary {
                    list: row.into_record()?,
                    counts,
                })
            })
            .collect()
    })
    .await
}

/// Apply a partial update and return the stored result
pub async fn update_list(db: &Db, list_id: &str, update: ListUpdate) -> Result<ListRecord> {
    let list_id = list_id.to_string();

    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        let mut list = load_list(&tx, &list_id)?;
        update.apply(&mut list)?;
        list.updated_at = chrono::Utc::now().to_rfc3339();

        tx.execute(
            "UPDATE lists
             SET name = ?1, description = ?2, fields_json = ?3, settings_json = ?4, status = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                list.name,
                list.description,
                serde_json::to_string(&list.fields)?,
                serde_json::to_string(&list.settings)?,
                list.status.as_str(),
                list.updated_at,
                list.id
            ],
        )?;
        tx.commit()?;

        log::debug!("Updated list {} ({})", list.id, list.status);
        Ok(list)
    })
    .await
}

/// Replace a list's field definitions
pub async fn update_fields(db: &Db, list_id: &str, fields: &FieldSet) -> Result<()> {
    let update = ListUpdate {
        fields: Some(fields.clone()),
        ..ListUpdate::default()
    };
    update_list(db, list_id, update).await?;
    Ok(())
}

/// Delete a list, removing its leads `batch_size` at a time first
///
/// Returns the number of leads removed.
pub async fn delete_list(db: &Db, list_id: &str, batch_size: usize) -> Result<usize> {
    if batch_size == 0 {
        return Err(ColdlistError::InvalidInput("batch_size must be greater than 0".to_string()));
    }
    let list_id = list_id.to_string();

    db.with_connection(move |conn| {
        if !list_exists(conn, &list_id)? {
            return Err(ColdlistError::ListNotFound(list_id));
        }

        let mut removed = 0;
        loop {
            let deleted = conn.execute(
                "DELETE FROM leads WHERE rowid IN
                    (SELECT rowid FROM leads WHERE list_id = ?1 LIMIT ?2)",
                params![list_id, batch_size as i64],
            )?;
            if deleted == 0 {
                break;
            }
            removed += deleted;
            log::debug!("Deleted {} leads of list {}", removed, list_id);
        }

        conn.execute("DELETE FROM lists WHERE id = ?1", params![list_id])?;
        log::info!("Deleted list {} and {} lead(s)", list_id, removed);
        Ok(removed)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::schema::field::{FieldDescriptor, FieldType};

    fn sample_fields() -> FieldSet {
        FieldSet::new(vec![
            FieldDescriptor::new("Name", FieldType::PlainText),
            FieldDescriptor::new("Phone", FieldType::Phone),
        ])
    }

    #[tokio::test]
    async fn test_create_and_get_list() {
        let (_dir, db) = test_db().await;
        let fields = sample_fields();

        let created = create_list(&db, "  Vilnius cafes ", &fields, Some("spring campaign")).await.unwrap();
        assert_eq!(created.name, "Vilnius cafes");
        assert_eq!(created.status, ListStatus::Active);
        assert_eq!(created.settings, ListSettings::default());

        let loaded = get_list(&db, &created.id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.fields.get(1).unwrap().id(), fields.get(1).unwrap().id());
    }

    #[tokio::test]
    async fn test_create_list_requires_name() {
        let (_dir, db) = test_db().await;
        let result = create_list(&db, "   ", &sample_fields(), None).await;
        assert!(matches!(result, Err(ColdlistError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_missing_list() {
        let (_dir, db) = test_db().await;
        let result = get_list(&db, "missing").await;
        assert!(matches!(result, Err(ColdlistError::ListNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_update_fields() {
        let (_dir, db) = test_db().await;
        let list = create_list(&db, "Leads", &sample_fields(), None).await.unwrap();

        let mut fields = list.fields.clone();
        fields.move_field(1, 0).unwrap();
        fields.set_visible(1, false).unwrap();
        update_fields(&db, &list.id, &fields).await.unwrap();

        let loaded = get_list(&db, &list.id).await.unwrap();
        assert_eq!(loaded.fields.get(0).unwrap().name, "Phone");
        assert!(!loaded.fields.get(1).unwrap().visible);

        assert!(matches!(
            update_fields(&db, "missing", &fields).await,
            Err(ColdlistError::ListNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_list_name_status_and_settings() {
        let (_dir, db) = test_db().await;
        let list = create_list(&db, "Leads", &sample_fields(), Some("old")).await.unwrap();

        let settings = ListSettings {
            prepend_phone: Some("+370".to_string()),
            script: Some("Hello, this is...".to_string()),
            cc_email: Some("sales@acme.lt".to_string()),
            ..ListSettings::default()
        };
        let updated = update_list(
            &db,
            &list.id,
            ListUpdate {
                name: Some("Archived leads".to_string()),
                description: Some(None),
                status: Some(ListStatus::Archived),
                settings: Some(settings.clone()),
                ..ListUpdate::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Archived leads");
        assert_eq!(updated.description, None);
        assert_eq!(updated.fields, list.fields);

        let loaded = get_list(&db, &list.id).await.unwrap();
        assert_eq!(loaded.status, ListStatus::Archived);
        assert_eq!(loaded.settings, settings);
        assert_eq!(loaded, updated);
    }

    #[tokio::test]
    async fn test_update_list_rejects_blank_name() {
        let (_dir, db) = test_db().await;
        let list = create_list(&db, "Leads", &sample_fields(), None).await.unwrap();
        let update = ListUpdate {
            name: Some(" ".to_string()),
            ..ListUpdate::default()
        };
        assert!(matches!(update_list(&db, &list.id, update).await, Err(ColdlistError::InvalidInput(_))));
        assert_eq!(get_list(&db, &list.id).await.unwrap().name, "Leads");
    }

    #[test]
    fn test_settings_json_shape() {
        let settings = ListSettings {
            prepend_phone: Some("370".to_string()),
            is_blocklist: Some(true),
            ..ListSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"prependPhone":"370","isBlocklist":true}"#);

        let back: ListSettings = serde_json::from_str(r#"{"script":"Hi","unknownKey":1}"#).unwrap();
        assert_eq!(back.script.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_list_status_text() {
        for status in ["active", "archived", "blocklist"] {
            assert_eq!(status.parse::<ListStatus>().unwrap().as_str(), status);
        }
        assert!("paused".parse::<ListStatus>().is_err());
    }

    #[tokio::test]
    async fn test_list_lists_empty_counts() {
        let (_dir, db) = test_db().await;
        create_list(&db, "First", &sample_fields(), None).await.unwrap();
        create_list(&db, "Second", &FieldSet::default(), None).await.unwrap();

        let lists = list_lists(&db).await.unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].list.name, "Second");
        assert_eq!(lists[0].counts, LeadCounts::default());
    }

    #[tokio::test]
    async fn test_delete_missing_list() {
        let (_dir, db) = test_db().await;
        assert!(matches!(
            delete_list(&db, "missing", 500).await,
            Err(ColdlistError::ListNotFound(_))
        ));
    }
}
