//! bommerge command-line management tool.
//!
//! Provides subcommands for inspecting registered sources, running merges
//! with conflict detection, applying field corrections, managing merged
//! snapshots, viewing the audit log, and generating / validating
//! configuration files.

mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use bommerge_core::config::AppConfig;
use bommerge_core::db::Database;
use bommerge_core::merge::{FieldEdit, MergeSession};
use bommerge_core::models::{NewPartRecord, PartRecord};
use bommerge_core::registry::SourceRegistry;
use bommerge_core::snapshot::SnapshotStore;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// bommerge command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "bommerge",
    version,
    about = "Manage and inspect a bommerge part-list store"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/bommerge/config.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show store counts.
    Status,

    /// Manage imported sources.
    Sources {
        #[command(subcommand)]
        action: SourcesAction,
    },

    /// Merge sources and report field-level conflicts.
    Merge {
        /// Stable source ids, in merge order.
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Display names (legacy fallback when an id no longer resolves).
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,

        /// Field correction to apply and persist, as PART_ID:FIELD=VALUE.
        /// May be given multiple times; conflicts are re-checked afterwards.
        #[arg(long = "set", value_name = "PART_ID:FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Manage merged snapshots.
    Snapshots {
        #[command(subcommand)]
        action: SnapshotsAction,
    },

    /// Show recent audit log entries.
    Audit {
        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./bommerge.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(Subcommand, Debug)]
enum SourcesAction {
    /// List all registered sources.
    List,
    /// Show details of one source.
    Show {
        /// Stable source id.
        id: String,
    },
    /// Register a source from a JSON file of already-parsed part records.
    Register {
        /// Path to a JSON array of part records.
        records: PathBuf,

        /// Display name (defaults to the filename stem).
        #[arg(long, default_value = "")]
        name: String,

        /// Original spreadsheet filename.
        #[arg(long)]
        filename: String,

        /// Original spreadsheet size in bytes.
        #[arg(long, default_value = "0")]
        file_size: i64,
    },
    /// Change a source's display name.
    Rename {
        /// Stable source id.
        id: String,
        /// New display name.
        name: String,
    },
    /// Delete a source and its part records.
    Delete {
        /// Stable source id.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SnapshotsAction {
    /// List all merged snapshots.
    List,
    /// Show the part copies of a snapshot.
    Parts {
        /// Snapshot id.
        id: i64,
    },
    /// Merge the given sources and save the result as a named snapshot.
    Save {
        /// Snapshot name.
        name: String,

        /// Stable source ids, in merge order.
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Delete a snapshot and all of its part copies.
    Delete {
        /// Snapshot id.
        id: i64,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Delete a single part copy from a snapshot.
    DeletePart {
        /// Snapshot id.
        id: i64,
        /// Part copy id.
        part_id: i64,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        _ => {
            // All other commands need the config and database
            let config = AppConfig::load_and_validate(&cli.config)
                .context("failed to load configuration file")?;
            let db = open_database(&config)?;

            match cli.command {
                Commands::Status => cmd_status(&db),
                Commands::Sources { action } => cmd_sources(&db, action),
                Commands::Merge { ids, names, set } => cmd_merge(&db, &ids, &names, &set),
                Commands::Snapshots { action } => cmd_snapshots(&db, &config, action),
                Commands::Audit { limit } => cmd_audit(&db, limit),
                _ => unreachable!(),
            }
        }
    }
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let db = Database::new(config.db_path()).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;
    Ok(db)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &PathBuf) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, AppConfig::sample_toml()).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file (listen address, data directory)");
    println!(
        "  2. Validate with: bommerge validate --config {}",
        output.display()
    );
    println!(
        "  3. Start the server: bommerge-server --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &PathBuf) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Listen         : {}", config.server.listen);
    println!("  Data directory : {}", config.server.data_dir.display());
    println!("  Database       : {}", config.db_path().display());
    println!(
        "  Unique names   : {}",
        if config.snapshot.enforce_unique_names {
            "enforced"
        } else {
            "not enforced"
        }
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_status(db: &Database) -> Result<()> {
    let sources = db.count_sources().context("failed to count sources")?;
    let parts = db.count_parts().context("failed to count parts")?;
    let snapshots = db.count_snapshots().context("failed to count snapshots")?;

    println!("bommerge Status");
    println!("===============");
    println!();
    println!("  Sources          : {}", sources);
    println!("  Part records     : {}", parts);
    println!("  Merged snapshots : {}", snapshots);

    Ok(())
}

fn cmd_sources(db: &Database, action: SourcesAction) -> Result<()> {
    match action {
        SourcesAction::List => {
            let sources = SourceRegistry::list(db).context("failed to list sources")?;

            if sources.is_empty() {
                println!("No sources registered.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["ID", "Name", "File", "Rows", "Imported"]);

            for s in &sources {
                table.add_row(vec![
                    Cell::new(&s.id),
                    Cell::new(&s.display_name),
                    Cell::new(&s.original_filename),
                    Cell::new(s.rows_imported),
                    Cell::new(s.imported_at.format("%Y-%m-%d %H:%M").to_string()),
                ]);
            }

            println!("{}", table);
            println!();
            println!("{} source(s)", sources.len());
            Ok(())
        }

        SourcesAction::Show { id } => {
            let source = SourceRegistry::get(db, &id).context("failed to load source")?;

            println!("{}", style::header(&format!("Source {}", source.id)));
            println!();
            println!("  Display name : {}", source.display_name);
            println!("  Filename     : {}", source.original_filename);
            println!("  File size    : {} bytes", source.file_size);
            println!("  Rows imported: {}", source.rows_imported);
            println!("  Status       : {}", source.status);
            println!("  Imported at  : {}", source.imported_at.to_rfc3339());
            Ok(())
        }

        SourcesAction::Register {
            records,
            name,
            filename,
            file_size,
        } => {
            let contents = std::fs::read_to_string(&records)
                .with_context(|| format!("failed to read {}", records.display()))?;
            let parsed: Vec<NewPartRecord> = serde_json::from_str(&contents)
                .context("records file must be a JSON array of part records")?;

            let source = SourceRegistry::register(db, &name, &filename, file_size, parsed)
                .context("failed to register source")?;

            println!(
                "{}",
                style::success(&format!(
                    "Registered source '{}' ({} rows) with id {}",
                    source.display_name, source.rows_imported, source.id
                ))
            );
            Ok(())
        }

        SourcesAction::Rename { id, name } => {
            let source =
                SourceRegistry::rename(db, &id, &name).context("failed to rename source")?;
            println!(
                "{}",
                style::success(&format!(
                    "Source {} renamed to '{}'",
                    source.id, source.display_name
                ))
            );
            println!(
                "{}",
                style::dim("The stable id and saved snapshots are unaffected.")
            );
            Ok(())
        }

        SourcesAction::Delete { id, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete source {} and all of its part records?",
                        id
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            let parts_deleted =
                SourceRegistry::delete(db, &id).context("failed to delete source")?;
            println!(
                "{}",
                style::success(&format!(
                    "Source {} deleted ({} part records removed)",
                    id, parts_deleted
                ))
            );
            Ok(())
        }
    }
}

fn cmd_merge(db: &Database, ids: &[String], names: &[String], set: &[String]) -> Result<()> {
    let mut session = MergeSession::open_with_fallback(db, ids, names)
        .map_err(|e| anyhow::anyhow!("merge failed: {}", e))?;

    if !set.is_empty() {
        let edits: Vec<FieldEdit> = set
            .iter()
            .map(|raw| parse_edit(raw))
            .collect::<Result<_>>()?;

        let accepted = session.stage_all(&edits);
        if accepted < edits.len() {
            println!(
                "{}",
                style::warn(&format!(
                    "{} edit(s) address non-editable fields and were ignored",
                    edits.len() - accepted
                ))
            );
        }

        let outcome = session
            .commit(db)
            .map_err(|e| anyhow::anyhow!("failed to commit edits: {}", e))?;
        println!(
            "{}",
            style::success(&format!("{} record(s) updated", outcome.updated_count))
        );
        println!();
    }

    print_records_table(session.records());

    let conflicts = session.conflicts();
    println!();
    if conflicts.is_empty() {
        println!("{}", style::success("No conflicts"));
        return Ok(());
    }

    println!(
        "{}",
        style::header(&format!("Conflicts ({})", conflicts.len()))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Part code", "Conflicting fields"]);
    for (code, fields) in &conflicts {
        table.add_row(vec![Cell::new(code), Cell::new(fields.join(", "))]);
    }
    println!("{}", table);

    Ok(())
}

fn cmd_snapshots(db: &Database, config: &AppConfig, action: SnapshotsAction) -> Result<()> {
    match action {
        SnapshotsAction::List => {
            let snapshots = SnapshotStore::list(db).context("failed to list snapshots")?;

            if snapshots.is_empty() {
                println!("No merged snapshots found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["ID", "Name", "Sources", "Parts", "Created"]);

            for s in &snapshots {
                let lineage = if s.source_ids.is_empty() {
                    format!("{} (by name)", s.source_names.len())
                } else {
                    s.source_ids.len().to_string()
                };
                table.add_row(vec![
                    Cell::new(s.id),
                    Cell::new(&s.name),
                    Cell::new(lineage),
                    Cell::new(s.part_count),
                    Cell::new(s.created_at.format("%Y-%m-%d %H:%M").to_string()),
                ]);
            }

            println!("{}", table);
            println!();
            println!("{} snapshot(s)", snapshots.len());
            Ok(())
        }

        SnapshotsAction::Parts { id } => {
            let parts = SnapshotStore::parts(db, id).context("failed to load snapshot parts")?;
            print_records_table(&parts);
            println!();
            println!("{} part(s)", parts.len());
            Ok(())
        }

        SnapshotsAction::Save { name, ids } => {
            let session = MergeSession::open_with_fallback(db, &ids, &[])
                .map_err(|e| anyhow::anyhow!("merge failed: {}", e))?;

            // Record the display names in effect right now as the fallback
            // lineage.
            let mut source_names = Vec::with_capacity(ids.len());
            for id in &ids {
                source_names.push(SourceRegistry::get(db, id)?.display_name);
            }

            let snapshot_id = SnapshotStore::save(
                db,
                &config.snapshot,
                &name,
                &ids,
                &source_names,
                session.records(),
            )
            .map_err(|e| anyhow::anyhow!("failed to save snapshot: {}", e))?;

            println!(
                "{}",
                style::success(&format!(
                    "Saved merged snapshot '{}' (id {}, {} parts)",
                    name,
                    snapshot_id,
                    session.records().len()
                ))
            );
            Ok(())
        }

        SnapshotsAction::Delete { id, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete merged snapshot {} and all of its parts?",
                        id
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            SnapshotStore::delete(db, id).context("failed to delete snapshot")?;
            println!(
                "{}",
                style::success(&format!("Merged snapshot {} deleted", id))
            );
            Ok(())
        }

        SnapshotsAction::DeletePart { id, part_id, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete part {} from merged snapshot {}?",
                        part_id, id
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            SnapshotStore::delete_part(db, id, part_id)
                .context("failed to delete snapshot part")?;
            println!(
                "{}",
                style::success(&format!(
                    "Part {} removed from merged snapshot {}",
                    part_id, id
                ))
            );
            Ok(())
        }
    }
}

fn cmd_audit(db: &Database, limit: u32) -> Result<()> {
    let entries = db
        .list_audit_log(limit)
        .context("failed to list audit entries")?;

    if entries.is_empty() {
        println!("No audit log entries found.");
        return Ok(());
    }

    println!("{:<22} {:<24} {:<4} DETAILS", "TIMESTAMP", "ACTION", "OK");
    println!("{}", "-".repeat(90));

    for entry in &entries {
        println!(
            "{:<22} {:<24} {:<4} {}",
            truncate(&entry.created_at, 20),
            entry.action,
            if entry.success { "yes" } else { "no" },
            truncate(entry.details.as_deref().unwrap_or(""), 50),
        );
    }

    println!();
    println!("{} entries shown", entries.len());

    Ok(())
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

/// Parse a `PART_ID:FIELD=VALUE` correction argument.
fn parse_edit(raw: &str) -> Result<FieldEdit> {
    let (id_part, rest) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("invalid edit '{}': expected PART_ID:FIELD=VALUE", raw))?;
    let (field, value) = rest
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid edit '{}': expected PART_ID:FIELD=VALUE", raw))?;
    let part_id: i64 = id_part
        .trim()
        .parse()
        .with_context(|| format!("invalid part id in edit '{}'", raw))?;

    Ok(FieldEdit {
        part_id,
        field: field.trim().to_string(),
        value: value.to_string(),
    })
}

fn print_records_table(records: &[PartRecord]) {
    if records.is_empty() {
        println!("No part records.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Level", "Code", "Name", "Spec", "Material", "Qty", "Source",
    ]);

    for r in records {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.level.as_deref().unwrap_or("")),
            Cell::new(r.part_code.as_deref().unwrap_or("")),
            Cell::new(r.part_name.as_deref().unwrap_or("")),
            Cell::new(r.spec.as_deref().unwrap_or("")),
            Cell::new(r.material.as_deref().unwrap_or("")),
            Cell::new(r.unit_count_per_level.as_deref().unwrap_or("")),
            Cell::new(&r.source_name),
        ]);
    }

    println!("{}", table);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}
