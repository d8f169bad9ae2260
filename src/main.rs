use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coldlist::db::{self, Db, ListRecord, ListSettings, ListStatus, ListUpdate, StoredLead};
use coldlist::ingest::{self, ImportPreview, LoaderRegistry};
use coldlist::leads::{find_duplicate_groups, DuplicateCandidate, LeadView};
use coldlist::schema::{infer_fields, MappingPlan};
use coldlist::{Config, LeadStatus, ProgressContext};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "coldlist")]
#[command(version, about = "Import contact files into cold-calling lead lists")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show row and column counts and the fields that would be created
    Inspect { file: PathBuf },

    /// Create a new list from a file
    Create {
        file: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Import a file into an existing list
    Import {
        file: PathBuf,
        /// Target list id
        #[arg(long)]
        list: String,
        /// Override a proposed mapping: `header=field`, or `header=` to keep the column unmapped
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, Option<String>)>,
        /// Import even if an identical file was imported before
        #[arg(short, long)]
        force: bool,
    },

    /// List all lists with lead counts
    Lists,

    /// Show a list's fields, optionally reordering them
    Fields {
        list: String,
        /// Move the field at position `from` to position `to` (zero-based), e.g. `3:0`
        #[arg(long = "move", value_parser = parse_move)]
        moves: Vec<(usize, usize)>,
    },

    /// Change a list's name, description, status or settings
    Edit {
        list: String,
        #[arg(long)]
        name: Option<String>,
        /// Empty text clears the description
        #[arg(long)]
        description: Option<String>,
        /// active, archived or blocklist
        #[arg(long)]
        status: Option<ListStatus>,
        /// Dialling prefix for numbers stored without one
        #[arg(long)]
        prepend_phone: Option<String>,
        /// Call script shown to agents
        #[arg(long)]
        script: Option<String>,
        #[arg(long)]
        cc_email: Option<String>,
    },

    /// Show a lead, optionally logging a call or changing its status
    Lead {
        id: String,
        /// Count one call attempt
        #[arg(long)]
        called: bool,
        #[arg(long)]
        status: Option<LeadStatus>,
    },

    /// Report leads sharing a company code or phone number, in one list or across all
    Duplicates {
        #[arg(long)]
        list: Option<String>,
    },

    /// Delete a list and all of its leads
    Delete { list: String },
}

fn parse_mapping(s: &str) -> std::result::Result<(String, Option<String>), String> {
    let (header, field) = s
        .split_once('=')
        .ok_or_else(|| format!("expected header=field, got {:?}", s))?;
    let field = field.trim();
    Ok((
        header.trim().to_string(),
        (!field.is_empty()).then(|| field.to_string()),
    ))
}

fn parse_move(s: &str) -> std::result::Result<(usize, usize), String> {
    let (from, to) = s
        .split_once(':')
        .ok_or_else(|| format!("expected from:to, got {:?}", s))?;
    let parse = |v: &str| v.trim().parse::<usize>().map_err(|e| format!("{:?}: {}", v, e));
    Ok((parse(from)?, parse(to)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.coldlist.log_level.as_str())
    ).init();

    log::debug!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    db.migrate(config.migrations_dir())
        .await
        .with_context(|| format!("Failed to migrate {}", config.db_path().display()))?;

    match cli.command {
        Command::Inspect { file } => inspect(&file)?,
        Command::Create { file, name, description } => {
            create(&db, &config, &file, &name, description.as_deref()).await?
        }
        Command::Import { file, list, mappings, force } => {
            import(&db, &config, &file, &list, &mappings, force).await?
        }
        Command::Lists => lists(&db).await?,
        Command::Fields { list, moves } => fields(&db, &list, &moves).await?,
        Command::Edit { list, name, description, status, prepend_phone, script, cc_email } => {
            let settings = SettingsEdit { prepend_phone, script, cc_email };
            edit(&db, &list, name, description, status, settings).await?
        }
        Command::Lead { id, called, status } => lead(&db, &id, called, status).await?,
        Command::Duplicates { list } => duplicates(&db, &config, list.as_deref()).await?,
        Command::Delete { list } => {
            let removed = db::delete_list(&db, &list, config.import.delete_batch_size).await?;
            println!("Deleted list {} ({} leads)", list, removed);
        }
    }

    Ok(())
}

fn load(file: &Path) -> Result<ingest::LoadedFile> {
    let loaded = ingest::load_file(file, &LoaderRegistry::new())?;
    ingest::require_headers(&loaded.table)?;
    Ok(loaded)
}

fn log_watcher_result(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        log::warn!("Progress watcher failed: {}", e);
    }
}

fn print_preview(preview: &ImportPreview) {
    println!("File:    {}", preview.file_name);
    println!("Rows:    {}", preview.row_count);
    println!("Columns: {}", preview.column_count);
    if !preview.matched.is_empty() {
        println!("Matched: {}", preview.matched.join(", "));
    }
    if !preview.new.is_empty() {
        println!("New:     {}", preview.new.join(", "));
    }
    if !preview.conflicts.is_empty() {
        println!("Clashes: {}", preview.conflicts.join(", "));
    }
}

fn inspect(file: &Path) -> Result<()> {
    let loaded = load(file)?;
    print_preview(&ImportPreview::new(&loaded));

    println!();
    for field in infer_fields(&loaded.table).iter() {
        println!("  {:<30} {}", field.name, field.field_type);
    }
    Ok(())
}

/// Log progress changes until the import drops its context
fn watch_progress(progress: &ProgressContext) -> tokio::task::JoinHandle<()> {
    let mut rx = progress.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            if state.is_uploading {
                log::info!("[{:>3.0}%] {}", state.progress, state.message);
            }
        }
    })
}

async fn check_not_imported(db: &Db, loaded: &ingest::LoadedFile, force: bool) -> Result<()> {
    if let Some(previous) = db::find_import_by_hash(db, &loaded.content_hash).await? {
        if !force {
            bail!(
                "{} was already imported into list {} on {} (use --force to import again)",
                loaded.file_name,
                previous.list_id,
                previous.created_at
            );
        }
        log::warn!("{} was already imported into list {}", loaded.file_name, previous.list_id);
    }
    Ok(())
}

async fn create(
    db: &Db,
    config: &Config,
    file: &Path,
    name: &str,
    description: Option<&str>,
) -> Result<()> {
    let loaded = load(file)?;
    let preview = ImportPreview::new(&loaded);
    if !preview.can_commit {
        bail!("{} has no data rows to import", preview.file_name);
    }

    let fields = infer_fields(&loaded.table);
    let progress = ProgressContext::new();
    let watcher = watch_progress(&progress);
    let start = Instant::now();

    let (list, report) =
        ingest::commit_new_list(db, &loaded, name, description, &fields, &config.import, &progress).await?;

    drop(progress);
    log_watcher_result(watcher.await);

    println!("Created list {} ({})", list.name, list.id);
    println!("Leads imported: {} (failed: {}) in {:?}", report.inserted, report.failed, start.elapsed());
    Ok(())
}

async fn import(
    db: &Db,
    config: &Config,
    file: &Path,
    list_id: &str,
    mappings: &[(String, Option<String>)],
    force: bool,
) -> Result<()> {
    let list = db::get_list(db, list_id).await?;
    let loaded = load(file)?;
    check_not_imported(db, &loaded, force).await?;

    let mut plan = MappingPlan::propose(&loaded.table.headers, &list.fields);
    for (header, field) in mappings {
        plan.assign_by_name(header, field.as_deref(), &list.fields)?;
    }

    let preview = ImportPreview::mapped(&loaded, &plan, &list.fields);
    print_preview(&preview);
    if !preview.conflicts.is_empty() {
        bail!(
            "more than one column would be stored as {}; use --map to unmap or remap one of them",
            preview.conflicts.join(", ")
        );
    }
    if !preview.can_commit {
        bail!("{} has no data rows to import", preview.file_name);
    }

    let progress = ProgressContext::new();
    let watcher = watch_progress(&progress);
    let report = ingest::commit_import(db, &loaded, &list, &plan, &config.import, &progress).await?;
    drop(progress);
    log_watcher_result(watcher.await);

    println!("Leads imported into {}: {} (failed: {})", list.name, report.inserted, report.failed);
    Ok(())
}

async fn lists(db: &Db) -> Result<()> {
    let summaries = db::list_lists(db).await?;
    if summaries.is_empty() {
        println!("No lists yet.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<24} {:>7} {:>7} {:>8} {:>5} {:>5}",
        "ID", "NAME", "TOTAL", "NEW", "CALLBACK", "WON", "LOST"
    );
    for s in summaries {
        println!(
            "{:<36}  {:<24} {:>7} {:>7} {:>8} {:>5} {:>5}",
            s.list.id, s.list.name, s.counts.total, s.counts.new, s.counts.callback, s.counts.won, s.counts.lost
        );
    }
    Ok(())
}

async fn fields(db: &Db, list_id: &str, moves: &[(usize, usize)]) -> Result<()> {
    let list = db::get_list(db, list_id).await?;
    let mut fields = list.fields.clone();

    if !moves.is_empty() {
        for &(from, to) in moves {
            fields.move_field(from, to)?;
        }
        db::update_fields(db, &list.id, &fields).await?;
    }

    for (idx, field) in fields.iter().enumerate() {
        println!(
            "{:>3}  {:<30} {:<18} {}",
            idx,
            field.name,
            field.field_type.to_string(),
            if field.visible { "visible" } else { "hidden" }
        );
    }
    Ok(())
}

/// Settings flags given to `edit`; unset flags keep the stored value
#[derive(Debug, Default)]
struct SettingsEdit {
    prepend_phone: Option<String>,
    script: Option<String>,
    cc_email: Option<String>,
}

impl SettingsEdit {
    fn is_empty(&self) -> bool {
        self.prepend_phone.is_none() && self.script.is_none() && self.cc_email.is_none()
    }

    /// Empty text clears a setting
    fn apply(self, settings: &mut ListSettings) {
        let set = |slot: &mut Option<String>, value: Option<String>| {
            if let Some(value) = value {
                let value = value.trim();
                *slot = (!value.is_empty()).then(|| value.to_string());
            }
        };
        set(&mut settings.prepend_phone, self.prepend_phone);
        set(&mut settings.script, self.script);
        set(&mut settings.cc_email, self.cc_email);
    }
}

async fn edit(
    db: &Db,
    list_id: &str,
    name: Option<String>,
    description: Option<String>,
    status: Option<ListStatus>,
    settings_edit: SettingsEdit,
) -> Result<()> {
    let settings = if settings_edit.is_empty() {
        None
    } else {
        let mut settings = db::get_list(db, list_id).await?.settings;
        settings_edit.apply(&mut settings);
        Some(settings)
    };

    let update = ListUpdate {
        name,
        description: description.map(|d| (!d.trim().is_empty()).then_some(d)),
        status,
        settings,
        ..ListUpdate::default()
    };
    let list = db::update_list(db, list_id, update).await?;

    println!("{} ({})", list.name, list.id);
    println!("Status:      {}", list.status);
    if let Some(description) = &list.description {
        println!("Description: {}", description);
    }
    println!("Settings:    {}", serde_json::to_string(&list.settings)?);
    Ok(())
}

async fn lead(db: &Db, lead_id: &str, called: bool, status: Option<LeadStatus>) -> Result<()> {
    let mut lead = db::get_lead(db, lead_id).await?;
    if called {
        lead = db::record_call_attempt(db, lead_id).await?;
    }
    if let Some(status) = status {
        lead = db::update_lead_status(db, lead_id, status).await?;
    }

    let list = db::get_list(db, &lead.list_id).await?;
    let view = LeadView::new(&lead.data, &list.fields);
    println!("{}  {}", lead.id, view.display_name());
    println!("List:     {}", list.name);
    println!("Status:   {}", lead.status);
    println!(
        "Calls:    {} (last: {})",
        lead.call_attempts,
        lead.last_contacted_at.as_deref().unwrap_or("never")
    );
    for (field, value) in view.visible_values() {
        println!("  {:<30} {}", field.name, value);
    }
    Ok(())
}

async fn duplicates(db: &Db, config: &Config, list_id: Option<&str>) -> Result<()> {
    let (lists, leads): (HashMap<String, ListRecord>, Vec<StoredLead>) = match list_id {
        Some(id) => {
            let list = db::get_list(db, id).await?;
            let leads = db::fetch_leads(db, &list.id).await?;
            (HashMap::from([(list.id.clone(), list)]), leads)
        }
        None => {
            let lists = db::list_lists(db)
                .await?
                .into_iter()
                .map(|s| (s.list.id.clone(), s.list))
                .collect();
            (lists, db::fetch_all_leads(db).await?)
        }
    };

    let by_id: HashMap<&str, (&StoredLead, &ListRecord)> = leads
        .iter()
        .filter_map(|l| lists.get(&l.list_id).map(|list| (l.id.as_str(), (l, list))))
        .collect();
    let groups = find_duplicate_groups(
        leads.iter().filter_map(|l| {
            lists
                .get(&l.list_id)
                .map(|list| DuplicateCandidate::new(&l.id, &l.data, &list.fields))
        }),
        &config.leads,
    )?;

    if groups.is_empty() {
        println!("No duplicates found.");
        return Ok(());
    }

    for group in &groups {
        println!("{} {} ({} leads)", group.matched_on, group.value, group.lead_ids.len());
        for id in &group.lead_ids {
            if let Some((lead, list)) = by_id.get(id.as_str()) {
                let name = LeadView::new(&lead.data, &list.fields).display_name();
                println!("    {}  {:<30} {}", lead.id, name, list.name);
            }
        }
    }
    Ok(())
}
