pub mod loaders;
pub mod metadata;
pub mod table;

use serde::Serialize;
use std::path::Path;

use crate::config::ImportConfig;
use crate::db::{self, Db, ImportReport, ListRecord};
use crate::error::{ColdlistError, Result};
use crate::leads::{materialize, materialize_mapped};
use crate::progress::ProgressContext;
use crate::schema::field::FieldSet;
use crate::schema::mapping::MappingPlan;

pub use loaders::{Delimiter, LoaderRegistry, Loader};
pub use metadata::{compute_content_hash, display_name, file_extension};
pub use table::{RawTable, Record};

/// An uploaded file decoded into a table, with what is needed to record the import
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub file_name: String,
    pub content_hash: String,
    pub table: RawTable,
}

/// Read and decode a file from disk
pub fn load_file(path: &Path, registry: &LoaderRegistry) -> Result<LoadedFile> {
    let bytes = std::fs::read(path)
        .map_err(|e| ColdlistError::UnreadableFile(format!("{}: {}", path.display(), e)))?;
    load_bytes(&bytes, &display_name(path), registry)
}

/// Decode in-memory file bytes; the loader is chosen by `file_name`'s extension
pub fn load_bytes(bytes: &[u8], file_name: &str, registry: &LoaderRegistry) -> Result<LoadedFile> {
    let table = registry.load(bytes, file_name)?;
    Ok(LoadedFile {
        file_name: file_name.to_string(),
        content_hash: compute_content_hash(bytes),
        table,
    })
}

/// Turn the headerless (empty) outcome into `NoHeaders`
pub fn require_headers(table: &RawTable) -> Result<()> {
    if table.is_empty() {
        return Err(ColdlistError::NoHeaders);
    }
    Ok(())
}

/// Summary shown before an import is committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub file_name: String,
    pub row_count: usize,
    pub column_count: usize,
    /// Headers that map onto an existing field
    pub matched: Vec<String>,
    /// Headers carried as new data
    pub new: Vec<String>,
    /// Storage keys more than one column would be written to
    pub conflicts: Vec<String>,
    /// False when there are no data rows to persist or columns collide
    pub can_commit: bool,
}

impl ImportPreview {
    /// Every header counts as new
    pub fn new(file: &LoadedFile) -> Self {
        Self::build(file, Vec::new(), file.table.headers.clone(), Vec::new())
    }

    /// Preview of an import into a list with `fields` using `plan`
    pub fn mapped(file: &LoadedFile, plan: &MappingPlan, fields: &FieldSet) -> Self {
        Self::build(
            file,
            plan.matched_headers().into_iter().map(str::to_string).collect(),
            plan.new_headers().into_iter().map(str::to_string).collect(),
            plan.conflicting_keys(fields),
        )
    }

    fn build(file: &LoadedFile, matched: Vec<String>, new: Vec<String>, conflicts: Vec<String>) -> Self {
        Self {
            file_name: file.file_name.clone(),
            row_count: file.table.row_count(),
            column_count: file.table.column_count(),
            matched,
            new,
            can_commit: file.table.row_count() > 0 && conflicts.is_empty(),
            conflicts,
        }
    }
}

fn ensure_rows(file: &LoadedFile) -> Result<()> {
    require_headers(&file.table)?;
    if file.table.row_count() == 0 {
        return Err(ColdlistError::InvalidInput("no data rows to import".to_string()));
    }
    Ok(())
}

/// Create a list with `fields` and import every row of `file` into it
///
/// If nothing could be stored the new list is deleted again.
pub async fn commit_new_list(
    db: &Db,
    file: &LoadedFile,
    name: &str,
    description: Option<&str>,
    fields: &FieldSet,
    config: &ImportConfig,
    progress: &ProgressContext,
) -> Result<(ListRecord, ImportReport)> {
    ensure_rows(file)?;

    progress.start("Creating list...");
    let list = match db::create_list(db, name, fields, description).await {
        Ok(list) => list,
        Err(e) => {
            progress.reset();
            return Err(e);
        }
    };

    match insert_and_record(db, file, &list.id, materialize(&file.table), config, progress).await {
        Ok(report) => Ok((list, report)),
        Err(e) => {
            if let Err(cleanup) = db::delete_list(db, &list.id, config.delete_batch_size).await {
                log::error!("Could not remove list {} after a failed import: {}", list.id, cleanup);
            } else {
                log::warn!("Removed list {} after a failed import", list.id);
            }
            Err(e)
        }
    }
}

/// Import every row of `file` into an existing list using the confirmed mapping
pub async fn commit_import(
    db: &Db,
    file: &LoadedFile,
    list: &ListRecord,
    plan: &MappingPlan,
    config: &ImportConfig,
    progress: &ProgressContext,
) -> Result<ImportReport> {
    ensure_rows(file)?;
    let leads = materialize_mapped(&file.table, plan, &list.fields)?;

    progress.start("Preparing import...");
    insert_and_record(db, file, &list.id, leads, config, progress).await
}

/// Insert and record history; progress is back to idle when this returns
async fn insert_and_record(
    db: &Db,
    file: &LoadedFile,
    list_id: &str,
    leads: Vec<crate::leads::LeadRecord>,
    config: &ImportConfig,
    progress: &ProgressContext,
) -> Result<ImportReport> {
    let result = insert_and_record_inner(db, file, list_id, leads, config, progress).await;
    progress.reset();
    result
}

async fn insert_and_record_inner(
    db: &Db,
    file: &LoadedFile,
    list_id: &str,
    leads: Vec<crate::leads::LeadRecord>,
    config: &ImportConfig,
    progress: &ProgressContext,
) -> Result<ImportReport> {
    let report = db::insert_leads(db, list_id, leads, config.batch_size, progress).await?;
    if report.inserted == 0 {
        return Err(ColdlistError::ImportFailed(format!(
            "none of the {} lead(s) from {} could be stored",
            report.failed, file.file_name
        )));
    }

    progress.finish("Finalizing import...");
    db::record_import(
        db,
        list_id,
        &file.file_name,
        &file.content_hash,
        file.table.row_count(),
        report,
    )
    .await?;

    log::info!(
        "Imported {} into list {}: {} inserted, {} failed",
        file.file_name,
        list_id,
        report.inserted,
        report.failed
    );
    Ok(report)
}
